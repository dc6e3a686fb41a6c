//! Core types and traits of the filter engine.
//!
//! This module contains the foundational pieces every other layer builds on:
//! - Object handles and status codes
//! - Image descriptors and parameter values
//! - The info query encoding
//! - Parameter schemas, kernel traits and kernel contexts
//! - Working pixel buffers

pub mod handle;
pub mod error;
pub mod types;
pub mod info;
pub mod pixels;
pub mod parameter;
pub mod context;
pub mod kernel;

// Re-export commonly used types
pub use handle::{ContextId, FilterId, ImageId, Object, QueueId};
pub use error::{ErrorSlot, FilterError, FilterResult, Status};
pub use types::{
    BackendApi, ComponentType, ComputeType, ImageDescriptor, MapAccess, ParameterType,
    ParameterValue, PerformanceStatistic, Rect,
};
pub use info::{write_info, InfoValue};
pub use pixels::PixelBuffer;
pub use parameter::{Constraint, ParameterDefinition, ParameterSchema};
pub use context::{KernelContext, ParameterTable, ValidationContext};
pub use kernel::{FilterMetadata, Kernel};
