//! Error types and status codes.
//!
//! Every fallible operation returns a [`FilterError`]. Each error maps to
//! exactly one [`Status`] code, which is what hosts bridging to a C-style
//! surface report. Human-readable detail for the most recent failure on a
//! context is kept in an [`ErrorSlot`] owned by that context.

use crate::core::handle::{FilterId, ImageId, QueueId};
use crate::core::types::ParameterType;
use crate::filters::kind::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Status codes reported by every operation.
///
/// All failures are negative; success is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    OutOfMemory = -3,
    InvalidImage = -6,
    UnsupportedImageFormat = -8,
    InvalidObject = -11,
    InvalidParameter = -12,
    InvalidContext = -15,
    InvalidQueue = -16,
    InvalidFilter = -17,
    InvalidFilterArgumentName = -18,
    Unimplemented = -19,
    InvalidApiVersion = -20,
    InternalError = -21,
    IoError = -22,
    InvalidParameterType = -23,
    Unsupported = -24,
}

impl Status {
    /// All status codes in declaration order.
    pub const ALL: [Status; 16] = [
        Status::Success,
        Status::OutOfMemory,
        Status::InvalidImage,
        Status::UnsupportedImageFormat,
        Status::InvalidObject,
        Status::InvalidParameter,
        Status::InvalidContext,
        Status::InvalidQueue,
        Status::InvalidFilter,
        Status::InvalidFilterArgumentName,
        Status::Unimplemented,
        Status::InvalidApiVersion,
        Status::InternalError,
        Status::IoError,
        Status::InvalidParameterType,
        Status::Unsupported,
    ];

    /// Numeric code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a status by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Whether this is the success code.
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Symbolic name of the code.
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::OutOfMemory => "ERROR_OUT_OF_MEMORY",
            Status::InvalidImage => "ERROR_INVALID_IMAGE",
            Status::UnsupportedImageFormat => "ERROR_UNSUPPORTED_IMAGE_FORMAT",
            Status::InvalidObject => "ERROR_INVALID_OBJECT",
            Status::InvalidParameter => "ERROR_INVALID_PARAMETER",
            Status::InvalidContext => "ERROR_INVALID_CONTEXT",
            Status::InvalidQueue => "ERROR_INVALID_QUEUE",
            Status::InvalidFilter => "ERROR_INVALID_FILTER",
            Status::InvalidFilterArgumentName => "ERROR_INVALID_FILTER_ARGUMENT_NAME",
            Status::Unimplemented => "ERROR_UNIMPLEMENTED",
            Status::InvalidApiVersion => "ERROR_INVALID_API_VERSION",
            Status::InternalError => "ERROR_INTERNAL_ERROR",
            Status::IoError => "ERROR_IO_ERROR",
            Status::InvalidParameterType => "ERROR_INVALID_PARAMETER_TYPE",
            Status::Unsupported => "ERROR_UNSUPPORTED",
        }
    }

    /// Human-readable description of the code.
    pub fn description(self) -> &'static str {
        match self {
            Status::Success => "The operation completed successfully",
            Status::OutOfMemory => "Not enough device or host memory for the request",
            Status::InvalidImage => {
                "The image handle is not valid, or the image is mapped or was deleted"
            }
            Status::UnsupportedImageFormat => {
                "The image descriptor names an unsupported pixel format"
            }
            Status::InvalidObject => "The object handle is not valid",
            Status::InvalidParameter => {
                "An argument is out of range, missing, or a buffer is too small"
            }
            Status::InvalidContext => "The context is not valid or could not be created",
            Status::InvalidQueue => "The command queue handle is not valid",
            Status::InvalidFilter => "The filter handle is not valid",
            Status::InvalidFilterArgumentName => "The filter type has no parameter with this name",
            Status::Unimplemented => "The requested functionality is not implemented",
            Status::InvalidApiVersion => {
                "The requested API version is not supported by this library"
            }
            Status::InternalError => {
                "An internal error occurred; please report it with the last error message"
            }
            Status::IoError => "A file or stream could not be read or written",
            Status::InvalidParameterType => {
                "The value type does not match the declared type, or the info key is unknown"
            }
            Status::Unsupported => "The requested functionality is not supported on this device",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Symbolic name for a raw status code, `"UNKNOWN_ERROR"` if unassigned.
pub fn error_code_string(code: i32) -> &'static str {
    Status::from_code(code).map(Status::name).unwrap_or("UNKNOWN_ERROR")
}

/// Description for a raw status code.
pub fn error_code_description(code: i32) -> &'static str {
    Status::from_code(code)
        .map(Status::description)
        .unwrap_or("Unknown error code")
}

/// Errors reported by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Invalid image {image}: {reason}")]
    InvalidImage { image: ImageId, reason: String },

    #[error("Invalid image: {0}")]
    InvalidImageDescriptor(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Buffer too small: need {required} bytes, have {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Command queue {0} not found")]
    InvalidQueue(QueueId),

    #[error("Filter {0} not found")]
    InvalidFilter(FilterId),

    #[error("Filter '{filter_type}' has no parameter named '{name}'")]
    UnknownParameter { filter_type: FilterType, name: String },

    #[error("Parameter '{name}' is {expected}, got {got}")]
    ParameterTypeMismatch {
        name: String,
        expected: ParameterType,
        got: ParameterType,
    },

    #[error("Unknown {object} info key {key:#x}")]
    UnknownInfoKey { object: &'static str, key: u32 },

    #[error("Not implemented: {0}")]
    Unimplemented(String),

    #[error("API version {requested} is not supported (library is {supported})")]
    InvalidApiVersion { requested: String, supported: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Kernel '{filter_type}' failed: {message}")]
    Kernel { filter_type: FilterType, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl FilterError {
    /// The status code this error reports.
    pub fn status(&self) -> Status {
        match self {
            FilterError::OutOfMemory(_) => Status::OutOfMemory,
            FilterError::InvalidImage { .. } | FilterError::InvalidImageDescriptor(_) => {
                Status::InvalidImage
            }
            FilterError::UnsupportedImageFormat(_) => Status::UnsupportedImageFormat,
            FilterError::InvalidObject(_) => Status::InvalidObject,
            FilterError::InvalidParameter(_) | FilterError::BufferTooSmall { .. } => {
                Status::InvalidParameter
            }
            FilterError::InvalidContext(_) => Status::InvalidContext,
            FilterError::InvalidQueue(_) => Status::InvalidQueue,
            FilterError::InvalidFilter(_) => Status::InvalidFilter,
            FilterError::UnknownParameter { .. } => Status::InvalidFilterArgumentName,
            FilterError::ParameterTypeMismatch { .. } | FilterError::UnknownInfoKey { .. } => {
                Status::InvalidParameterType
            }
            FilterError::Unimplemented(_) => Status::Unimplemented,
            FilterError::InvalidApiVersion { .. } => Status::InvalidApiVersion,
            FilterError::Internal(_) | FilterError::Kernel { .. } => Status::InternalError,
            FilterError::Io(_) => Status::IoError,
            FilterError::Unsupported(_) => Status::Unsupported,
        }
    }

    /// Whether this is a caller validation error (state left unchanged).
    pub fn is_validation(&self) -> bool {
        matches!(
            self.status(),
            Status::InvalidImage
                | Status::InvalidObject
                | Status::InvalidParameter
                | Status::InvalidContext
                | Status::InvalidQueue
                | Status::InvalidFilter
                | Status::InvalidFilterArgumentName
                | Status::InvalidParameterType
                | Status::InvalidApiVersion
        )
    }

    /// Build an invalid-image error.
    pub fn invalid_image(image: ImageId, reason: impl Into<String>) -> Self {
        FilterError::InvalidImage {
            image,
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the operation that failed.
    pub fn io(what: impl fmt::Display, error: std::io::Error) -> Self {
        FilterError::Io(format!("{}: {}", what, error))
    }
}

/// Result type alias for engine operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Most recent failure recorded on a context.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot {
    last: Option<(Status, String)>,
}

impl ErrorSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure, replacing the previous one.
    pub fn record(&mut self, error: &FilterError) {
        self.last = Some((error.status(), error.to_string()));
    }

    /// Message of the last failure.
    pub fn message(&self) -> Option<&str> {
        self.last.as_ref().map(|(_, m)| m.as_str())
    }

    /// Status of the last failure.
    pub fn status(&self) -> Option<Status> {
        self.last.as_ref().map(|(s, _)| *s)
    }

    /// Forget the last failure.
    pub fn clear(&mut self) {
        self.last = None;
    }
}
