//! Descriptor and value types shared by every object kind.
//!
//! Parameter values use a closed enum, like every other value that crosses
//! the API: arity and element type are fields of the variant rather than
//! separate entry points, and serde handles the tagging.

use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::ImageId;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Image layout
// ============================================================================

/// Storage type of one pixel component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ComponentType {
    /// 8-bit unsigned normalized.
    Uint8 = 0x1,
    /// IEEE 754 half precision.
    Float16 = 0x2,
    /// IEEE 754 single precision.
    Float32 = 0x3,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::Uint8 => 1,
            ComponentType::Float16 => 2,
            ComponentType::Float32 => 4,
        }
    }

    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x1 => Some(ComponentType::Uint8),
            0x2 => Some(ComponentType::Float16),
            0x3 => Some(ComponentType::Float32),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Uint8 => write!(f, "uint8"),
            ComponentType::Float16 => write!(f, "float16"),
            ComponentType::Float32 => write!(f, "float32"),
        }
    }
}

/// Layout of an image: dimensions, pitches and component format.
///
/// Pitches of zero mean "tightly packed"; [`ImageDescriptor::resolved`]
/// replaces them with the computed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Number of slices
    pub depth: u32,
    /// Row size in bytes (0 = packed)
    pub row_pitch: u32,
    /// Slice size in bytes (0 = packed)
    pub slice_pitch: u32,
    /// 1 grey, 2 grey+alpha, 3 RGB, 4 RGBA
    pub num_components: u32,
    /// Component storage type
    pub component_type: ComponentType,
}

/// C-layout mirror of [`ImageDescriptor`], as written by image info queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawImageDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u32,
    pub slice_pitch: u32,
    pub num_components: u32,
    pub component_type: u32,
}

impl ImageDescriptor {
    /// Create a packed single-slice descriptor.
    pub fn new(
        width: u32,
        height: u32,
        num_components: u32,
        component_type: ComponentType,
    ) -> Self {
        Self {
            width,
            height,
            depth: 1,
            row_pitch: 0,
            slice_pitch: 0,
            num_components,
            component_type,
        }
    }

    /// Set the number of slices.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set an explicit row pitch in bytes.
    pub fn with_row_pitch(mut self, row_pitch: u32) -> Self {
        self.row_pitch = row_pitch;
        self
    }

    /// Set an explicit slice pitch in bytes.
    pub fn with_slice_pitch(mut self, slice_pitch: u32) -> Self {
        self.slice_pitch = slice_pitch;
        self
    }

    /// Bytes per pixel.
    pub fn pixel_size(&self) -> usize {
        self.num_components as usize * self.component_type.size()
    }

    /// Bytes in one packed row.
    pub fn packed_row_size(&self) -> usize {
        self.width as usize * self.pixel_size()
    }

    /// Effective row pitch in bytes.
    pub fn row_pitch_bytes(&self) -> usize {
        if self.row_pitch == 0 {
            self.packed_row_size()
        } else {
            self.row_pitch as usize
        }
    }

    /// Effective slice pitch in bytes, saturating at `usize::MAX`.
    pub fn slice_pitch_bytes(&self) -> usize {
        if self.slice_pitch == 0 {
            self.row_pitch_bytes().saturating_mul(self.height as usize)
        } else {
            self.slice_pitch as usize
        }
    }

    /// Total bytes of pixel storage, saturating at `usize::MAX`.
    pub fn storage_size(&self) -> usize {
        self.slice_pitch_bytes().saturating_mul(self.depth as usize)
    }

    /// Packed slice size and total storage, or `None` when either overflows.
    fn checked_sizes(&self) -> Option<(usize, usize)> {
        let packed_slice = self.row_pitch_bytes().checked_mul(self.height as usize)?;
        let slice = if self.slice_pitch == 0 {
            packed_slice
        } else {
            self.slice_pitch as usize
        };
        let storage = slice.checked_mul(self.depth as usize)?;
        Some((packed_slice, storage))
    }

    /// Check the descriptor describes a storable image.
    pub fn validate(&self) -> FilterResult<()> {
        let (packed_slice, _) = self.checked_sizes().ok_or_else(|| {
            FilterError::OutOfMemory(format!("storage for {} overflows the address space", self))
        })?;
        if !(1..=4).contains(&self.num_components) {
            return Err(FilterError::UnsupportedImageFormat(format!(
                "{} components (expected 1 to 4)",
                self.num_components
            )));
        }
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(FilterError::InvalidImageDescriptor(format!(
                "dimensions {}x{}x{} must be non-zero",
                self.width, self.height, self.depth
            )));
        }
        if self.row_pitch != 0 && (self.row_pitch as usize) < self.packed_row_size() {
            return Err(FilterError::InvalidImageDescriptor(format!(
                "row pitch {} is smaller than a packed row ({} bytes)",
                self.row_pitch,
                self.packed_row_size()
            )));
        }
        if self.slice_pitch != 0 && (self.slice_pitch as usize) < packed_slice {
            return Err(FilterError::InvalidImageDescriptor(format!(
                "slice pitch {} is smaller than {} rows",
                self.slice_pitch, self.height
            )));
        }
        u32::try_from(self.slice_pitch_bytes())
            .map_err(|_| FilterError::OutOfMemory("slice pitch exceeds 4 GiB".to_string()))?;
        Ok(())
    }

    /// Copy with zero pitches replaced by the computed values.
    pub fn resolved(&self) -> Self {
        let mut desc = *self;
        desc.row_pitch = self.row_pitch_bytes() as u32;
        desc.slice_pitch = self.slice_pitch_bytes() as u32;
        desc
    }

    /// Whether two descriptors describe the same pixel grid.
    pub fn same_extent(&self, other: &ImageDescriptor) -> bool {
        self.width == other.width && self.height == other.height && self.depth == other.depth
    }

    /// C-layout form.
    pub fn to_raw(&self) -> RawImageDescriptor {
        RawImageDescriptor {
            width: self.width,
            height: self.height,
            depth: self.depth,
            row_pitch: self.row_pitch,
            slice_pitch: self.slice_pitch,
            num_components: self.num_components,
            component_type: self.component_type.code(),
        }
    }

    /// Decode from C-layout form.
    pub fn from_raw(raw: &RawImageDescriptor) -> FilterResult<Self> {
        let component_type = ComponentType::from_code(raw.component_type).ok_or_else(|| {
            FilterError::UnsupportedImageFormat(format!(
                "component type {:#x}",
                raw.component_type
            ))
        })?;
        Ok(Self {
            width: raw.width,
            height: raw.height,
            depth: raw.depth,
            row_pitch: raw.row_pitch,
            slice_pitch: raw.slice_pitch,
            num_components: raw.num_components,
            component_type,
        })
    }
}

impl fmt::Display for ImageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {}x{}",
            self.width, self.height, self.depth, self.num_components, self.component_type
        )
    }
}

/// Sub-rectangle of an output image processed by an attachment.
///
/// Every component must be a multiple of 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Required alignment of every component.
    pub const ALIGNMENT: u32 = 8;

    /// Create a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether every component is a multiple of [`Rect::ALIGNMENT`].
    pub fn is_aligned(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v % Self::ALIGNMENT == 0)
    }

    /// Whether the rectangle lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    /// Whether a pixel lies inside the rectangle.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x - self.x < self.width && y - self.y < self.height
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Host access requested when mapping an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MapAccess {
    Read = 0x1,
    Write = 0x2,
    ReadWrite = 0x3,
}

impl MapAccess {
    /// Decode access flags.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x1 => Some(MapAccess::Read),
            0x2 => Some(MapAccess::Write),
            0x3 => Some(MapAccess::ReadWrite),
            _ => None,
        }
    }

    /// Whether the mapping may be read.
    pub fn readable(self) -> bool {
        matches!(self, MapAccess::Read | MapAccess::ReadWrite)
    }

    /// Whether the mapping may be written.
    pub fn writable(self) -> bool {
        matches!(self, MapAccess::Write | MapAccess::ReadWrite)
    }
}

// ============================================================================
// Execution settings
// ============================================================================

/// Precision of a filter's internal computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ComputeType {
    #[default]
    Float32 = 0x0,
    Float16 = 0x1,
}

impl ComputeType {
    /// Decode a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0x0 => Some(ComputeType::Float32),
            0x1 => Some(ComputeType::Float16),
            _ => None,
        }
    }

    /// Short name used in cache keys and logs.
    pub fn name(self) -> &'static str {
        match self {
            ComputeType::Float32 => "fp32",
            ComputeType::Float16 => "fp16",
        }
    }
}

/// Compute API a context dispatches through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum BackendApi {
    OpenCl = 0,
    Metal = 1,
    DirectX12 = 2,
}

impl BackendApi {
    /// All backend APIs.
    pub const ALL: [BackendApi; 3] = [BackendApi::OpenCl, BackendApi::Metal, BackendApi::DirectX12];

    /// Decode a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|b| *b as u32 == code)
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            BackendApi::OpenCl => "OpenCL",
            BackendApi::Metal => "Metal",
            BackendApi::DirectX12 => "DirectX 12",
        }
    }
}

impl fmt::Display for BackendApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Optional profiling output of an execution.
///
/// Set the `measure_*` flags to request a measurement; the matching field is
/// filled once the execution completes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceStatistic {
    /// Device execution time in microseconds
    pub execution_time: u64,
    pub measure_execution_time: bool,
    /// Kernel preparation time in milliseconds
    pub compile_time: f32,
    pub measure_compile_time: bool,
}

impl PerformanceStatistic {
    /// Request both measurements.
    pub fn measure_all() -> Self {
        Self {
            measure_execution_time: true,
            measure_compile_time: true,
            ..Self::default()
        }
    }

    /// Whether any measurement is requested.
    pub fn is_requested(&self) -> bool {
        self.measure_execution_time || self.measure_compile_time
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Declared type of a filter parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ParameterType {
    Float1 = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    Float8 = 4,
    Float16 = 5,
    UInt1 = 6,
    UInt2 = 7,
    UInt3 = 8,
    UInt4 = 9,
    UInt8 = 10,
    UInt16 = 11,
    Int1 = 12,
    Int2 = 13,
    Int3 = 14,
    Int4 = 15,
    Int8 = 16,
    Int16 = 17,
    Image = 18,
    String = 19,
    FloatArray = 20,
    UIntArray = 21,
    IntArray = 22,
    ImageArray = 23,
    LocalMemory = 24,
}

/// Vector widths a parameter may declare.
pub const VECTOR_ARITIES: [usize; 6] = [1, 2, 3, 4, 8, 16];

impl ParameterType {
    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    fn vector(base: u32, arity: usize) -> Option<Self> {
        let offset = VECTOR_ARITIES.iter().position(|a| *a == arity)? as u32;
        Self::from_code(base + offset)
    }

    /// Float vector type of the given arity.
    pub fn float(arity: usize) -> Option<Self> {
        Self::vector(0, arity)
    }

    /// Unsigned vector type of the given arity.
    pub fn uint(arity: usize) -> Option<Self> {
        Self::vector(6, arity)
    }

    /// Signed vector type of the given arity.
    pub fn int(arity: usize) -> Option<Self> {
        Self::vector(12, arity)
    }

    /// Decode a numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        use ParameterType::*;
        const TABLE: [ParameterType; 25] = [
            Float1, Float2, Float3, Float4, Float8, Float16, UInt1, UInt2, UInt3, UInt4, UInt8,
            UInt16, Int1, Int2, Int3, Int4, Int8, Int16, Image, String, FloatArray, UIntArray,
            IntArray, ImageArray, LocalMemory,
        ];
        TABLE.get(code as usize).copied()
    }

    /// Vector width for scalar/vector types.
    pub fn arity(self) -> Option<usize> {
        match self.code() {
            c @ 0..=17 => Some(VECTOR_ARITIES[(c % 6) as usize]),
            _ => None,
        }
    }

    /// Whether values of this type hold image handles.
    pub fn is_image(self) -> bool {
        matches!(self, ParameterType::Image | ParameterType::ImageArray)
    }

    /// Human-readable name.
    pub fn display_name(self) -> String {
        match self.code() {
            c @ 0..=5 => format!("float{}", VECTOR_ARITIES[c as usize]),
            c @ 6..=11 => format!("uint{}", VECTOR_ARITIES[(c - 6) as usize]),
            c @ 12..=17 => format!("int{}", VECTOR_ARITIES[(c - 12) as usize]),
            _ => match self {
                ParameterType::Image => "image".to_string(),
                ParameterType::String => "string".to_string(),
                ParameterType::FloatArray => "float[]".to_string(),
                ParameterType::UIntArray => "uint[]".to_string(),
                ParameterType::IntArray => "int[]".to_string(),
                ParameterType::ImageArray => "image[]".to_string(),
                _ => "local_memory".to_string(),
            },
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A value bound to a filter parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Float scalar or vector (1, 2, 3, 4, 8 or 16 components)
    Float(Vec<f32>),
    /// Unsigned scalar or vector
    UInt(Vec<u32>),
    /// Signed scalar or vector
    Int(Vec<i32>),
    FloatArray(Vec<f32>),
    UIntArray(Vec<u32>),
    IntArray(Vec<i32>),
    /// Image handle; `None` is the cleared state
    Image(Option<ImageId>),
    ImageArray(Vec<ImageId>),
    String(String),
    /// Size in bytes of device local memory to reserve
    LocalMemory(u32),
}

impl ParameterValue {
    /// Float scalar.
    pub fn float(x: f32) -> Self {
        ParameterValue::Float(vec![x])
    }

    /// Unsigned scalar.
    pub fn uint(x: u32) -> Self {
        ParameterValue::UInt(vec![x])
    }

    /// Signed scalar.
    pub fn int(x: i32) -> Self {
        ParameterValue::Int(vec![x])
    }

    /// Image handle.
    pub fn image(id: ImageId) -> Self {
        ParameterValue::Image(Some(id))
    }

    /// The type of this value, or `None` for a vector of unsupported width.
    pub fn parameter_type(&self) -> Option<ParameterType> {
        match self {
            ParameterValue::Float(v) => ParameterType::float(v.len()),
            ParameterValue::UInt(v) => ParameterType::uint(v.len()),
            ParameterValue::Int(v) => ParameterType::int(v.len()),
            ParameterValue::FloatArray(_) => Some(ParameterType::FloatArray),
            ParameterValue::UIntArray(_) => Some(ParameterType::UIntArray),
            ParameterValue::IntArray(_) => Some(ParameterType::IntArray),
            ParameterValue::Image(_) => Some(ParameterType::Image),
            ParameterValue::ImageArray(_) => Some(ParameterType::ImageArray),
            ParameterValue::String(_) => Some(ParameterType::String),
            ParameterValue::LocalMemory(_) => Some(ParameterType::LocalMemory),
        }
    }

    /// Element count for vectors and arrays.
    pub fn len(&self) -> usize {
        match self {
            ParameterValue::Float(v) | ParameterValue::FloatArray(v) => v.len(),
            ParameterValue::UInt(v) | ParameterValue::UIntArray(v) => v.len(),
            ParameterValue::Int(v) | ParameterValue::IntArray(v) => v.len(),
            ParameterValue::ImageArray(v) => v.len(),
            ParameterValue::Image(image) => usize::from(image.is_some()),
            ParameterValue::String(_) | ParameterValue::LocalMemory(_) => 1,
        }
    }

    /// Whether the value holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First float component.
    pub fn as_float(&self) -> Option<f32> {
        self.as_floats().and_then(|v| v.first().copied())
    }

    /// All float components.
    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            ParameterValue::Float(v) | ParameterValue::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    /// First unsigned component.
    pub fn as_uint(&self) -> Option<u32> {
        self.as_uints().and_then(|v| v.first().copied())
    }

    /// All unsigned components.
    pub fn as_uints(&self) -> Option<&[u32]> {
        match self {
            ParameterValue::UInt(v) | ParameterValue::UIntArray(v) => Some(v),
            _ => None,
        }
    }

    /// All signed components.
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            ParameterValue::Int(v) | ParameterValue::IntArray(v) => Some(v),
            _ => None,
        }
    }

    /// Image handle, if set.
    pub fn as_image(&self) -> Option<ImageId> {
        match self {
            ParameterValue::Image(image) => *image,
            _ => None,
        }
    }

    /// Image handles referenced by this value.
    pub fn images(&self) -> Vec<ImageId> {
        match self {
            ParameterValue::Image(Some(id)) => vec![*id],
            ParameterValue::ImageArray(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }

    /// String contents.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Packed element bytes, as written by parameter value queries.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ParameterValue::Float(v) | ParameterValue::FloatArray(v) => {
                bytemuck::cast_slice(v).to_vec()
            }
            ParameterValue::UInt(v) | ParameterValue::UIntArray(v) => {
                bytemuck::cast_slice(v).to_vec()
            }
            ParameterValue::Int(v) | ParameterValue::IntArray(v) => {
                bytemuck::cast_slice(v).to_vec()
            }
            ParameterValue::Image(image) => image
                .map(|id| id.as_bytes().to_vec())
                .unwrap_or_default(),
            ParameterValue::ImageArray(ids) => {
                ids.iter().flat_map(|id| id.as_bytes().iter().copied()).collect()
            }
            ParameterValue::String(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                bytes
            }
            ParameterValue::LocalMemory(size) => size.to_ne_bytes().to_vec(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Float(v) if v.len() == 1 => write!(f, "{:.4}", v[0]),
            ParameterValue::UInt(v) if v.len() == 1 => write!(f, "{}", v[0]),
            ParameterValue::Int(v) if v.len() == 1 => write!(f, "{}", v[0]),
            ParameterValue::Float(v) | ParameterValue::FloatArray(v) => write!(f, "{:?}", v),
            ParameterValue::UInt(v) | ParameterValue::UIntArray(v) => write!(f, "{:?}", v),
            ParameterValue::Int(v) | ParameterValue::IntArray(v) => write!(f, "{:?}", v),
            ParameterValue::Image(Some(id)) => write!(f, "Image({})", id),
            ParameterValue::Image(None) => write!(f, "Image(unset)"),
            ParameterValue::ImageArray(ids) => write!(f, "Images[{}]", ids.len()),
            ParameterValue::String(s) => write!(f, "\"{}\"", s),
            ParameterValue::LocalMemory(size) => write!(f, "LocalMemory({} bytes)", size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_packed_pitches() {
        let desc = ImageDescriptor::new(800, 600, 3, ComponentType::Uint8);
        assert_eq!(desc.row_pitch_bytes(), 2400);
        assert_eq!(desc.slice_pitch_bytes(), 2400 * 600);
        assert_eq!(desc.storage_size(), 2400 * 600);

        let resolved = desc.resolved();
        assert_eq!(resolved.row_pitch, 2400);
        assert!(resolved.same_extent(&desc));
    }

    #[test]
    fn test_descriptor_explicit_pitch() {
        let desc = ImageDescriptor::new(10, 4, 4, ComponentType::Float16).with_row_pitch(96);
        assert!(desc.validate().is_ok());
        assert_eq!(desc.storage_size(), 96 * 4);

        let narrow = ImageDescriptor::new(10, 4, 4, ComponentType::Float16).with_row_pitch(40);
        assert_eq!(
            narrow.validate().unwrap_err().status(),
            crate::core::error::Status::InvalidImage
        );
    }

    #[test]
    fn test_descriptor_overflowing_size() {
        let huge = ImageDescriptor::new(u32::MAX, u32::MAX, 4, ComponentType::Float32);
        assert_eq!(
            huge.validate().unwrap_err().status(),
            crate::core::error::Status::OutOfMemory
        );
        assert_eq!(huge.storage_size(), usize::MAX);

        let deep = ImageDescriptor::new(65536, 65536, 4, ComponentType::Float32)
            .with_depth(u32::MAX);
        assert_eq!(
            deep.validate().unwrap_err().status(),
            crate::core::error::Status::OutOfMemory
        );

        let tall = ImageDescriptor::new(65536, 65536, 4, ComponentType::Float32);
        assert_eq!(
            tall.validate().unwrap_err().status(),
            crate::core::error::Status::OutOfMemory
        );
    }

    #[test]
    fn test_descriptor_rejects_bad_components() {
        let desc = ImageDescriptor::new(8, 8, 5, ComponentType::Float32);
        assert_eq!(
            desc.validate().unwrap_err().status(),
            crate::core::error::Status::UnsupportedImageFormat
        );
    }

    #[test]
    fn test_descriptor_raw_round_trip() {
        let desc = ImageDescriptor::new(16, 8, 2, ComponentType::Float16).resolved();
        let raw = desc.to_raw();
        assert_eq!(std::mem::size_of::<RawImageDescriptor>(), 28);
        assert_eq!(ImageDescriptor::from_raw(&raw).unwrap(), desc);
    }

    #[test]
    fn test_rect_alignment() {
        assert!(Rect::new(0, 8, 16, 64).is_aligned());
        assert!(!Rect::new(0, 8, 15, 64).is_aligned());
        assert!(Rect::new(8, 8, 16, 16).fits_within(24, 24));
        assert!(!Rect::new(16, 8, 16, 16).fits_within(24, 24));
        assert!(Rect::new(8, 8, 8, 8).contains(15, 8));
        assert!(!Rect::new(8, 8, 8, 8).contains(16, 8));
    }

    #[test]
    fn test_parameter_type_codes() {
        assert_eq!(ParameterType::float(8), Some(ParameterType::Float8));
        assert_eq!(ParameterType::uint(2), Some(ParameterType::UInt2));
        assert_eq!(ParameterType::int(16), Some(ParameterType::Int16));
        assert_eq!(ParameterType::float(5), None);
        assert_eq!(ParameterType::Int3.arity(), Some(3));
        assert_eq!(ParameterType::Image.arity(), None);
        assert_eq!(ParameterType::from_code(24), Some(ParameterType::LocalMemory));
        assert_eq!(ParameterType::from_code(25), None);
        assert_eq!(ParameterType::UInt16.display_name(), "uint16");
    }

    #[test]
    fn test_value_type_inference() {
        assert_eq!(ParameterValue::float(2.0).parameter_type(), Some(ParameterType::Float1));
        assert_eq!(
            ParameterValue::UInt(vec![1, 2]).parameter_type(),
            Some(ParameterType::UInt2)
        );
        assert_eq!(ParameterValue::Int(vec![0; 5]).parameter_type(), None);
        assert_eq!(
            ParameterValue::FloatArray(vec![0.0; 5]).parameter_type(),
            Some(ParameterType::FloatArray)
        );
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(ParameterValue::uint(3).to_bytes(), 3u32.to_ne_bytes().to_vec());
        assert_eq!(ParameterValue::String("ab".to_string()).to_bytes(), b"ab\0".to_vec());
        assert!(ParameterValue::Image(None).to_bytes().is_empty());
        assert_eq!(ParameterValue::image(ImageId::new()).to_bytes().len(), 16);
    }

    #[test]
    fn test_map_access() {
        assert!(MapAccess::ReadWrite.readable() && MapAccess::ReadWrite.writable());
        assert!(!MapAccess::Read.writable());
        assert_eq!(MapAccess::from_bits(2), Some(MapAccess::Write));
        assert_eq!(MapAccess::from_bits(4), None);
    }
}
