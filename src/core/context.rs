//! Validation and kernel contexts.
//!
//! Contexts give kernels read access to the filter's bound parameters and
//! the images involved in one attachment. The validation context carries
//! only descriptors; the kernel context carries decoded pixels.

use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::{FilterId, ImageId};
use crate::core::pixels::PixelBuffer;
use crate::core::types::{ComputeType, ImageDescriptor, ParameterValue};
use crate::filters::kind::FilterType;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Parameter table of one filter: name to current value, `None` when unset.
pub type ParameterTable = IndexMap<String, Option<ParameterValue>>;

/// Context provided while validating an attachment before dispatch.
#[derive(Debug, Clone)]
pub struct ValidationContext<'a> {
    /// Filter being validated
    pub filter: FilterId,
    pub filter_type: FilterType,
    /// Input image layout
    pub input: ImageDescriptor,
    /// Output image layout
    pub output: ImageDescriptor,
    parameters: &'a ParameterTable,
    images: &'a HashMap<ImageId, ImageDescriptor>,
}

impl<'a> ValidationContext<'a> {
    /// Create a validation context.
    pub fn new(
        filter: FilterId,
        filter_type: FilterType,
        input: ImageDescriptor,
        output: ImageDescriptor,
        parameters: &'a ParameterTable,
        images: &'a HashMap<ImageId, ImageDescriptor>,
    ) -> Self {
        Self {
            filter,
            filter_type,
            input,
            output,
            parameters,
            images,
        }
    }

    fn invalid(&self, message: String) -> FilterError {
        FilterError::InvalidParameter(format!("{} {}: {}", self.filter_type, self.filter, message))
    }

    /// Get a bound parameter value.
    pub fn get_parameter(&self, name: &str) -> FilterResult<&ParameterValue> {
        lookup(self.parameters, name)
            .ok_or_else(|| self.invalid(format!("parameter '{}' is not set", name)))
    }

    /// Get a float parameter.
    pub fn get_float(&self, name: &str) -> FilterResult<f32> {
        self.get_parameter(name)?
            .as_float()
            .ok_or_else(|| self.invalid(format!("parameter '{}' is not a float", name)))
    }

    /// Get an unsigned parameter.
    pub fn get_uint(&self, name: &str) -> FilterResult<u32> {
        self.get_parameter(name)?
            .as_uint()
            .ok_or_else(|| self.invalid(format!("parameter '{}' is not unsigned", name)))
    }

    /// Get all components of an unsigned parameter.
    pub fn get_uints(&self, name: &str) -> FilterResult<&[u32]> {
        self.get_parameter(name)?
            .as_uints()
            .ok_or_else(|| self.invalid(format!("parameter '{}' is not unsigned", name)))
    }

    /// Descriptor of the image bound to an image parameter.
    pub fn image_descriptor(&self, name: &str) -> FilterResult<ImageDescriptor> {
        let id = self
            .get_parameter(name)?
            .as_image()
            .ok_or_else(|| self.invalid(format!("image parameter '{}' is not set", name)))?;
        self.images
            .get(&id)
            .copied()
            .ok_or_else(|| FilterError::invalid_image(id, "image was deleted"))
    }

    /// Descriptors of every image in an image-array parameter.
    pub fn image_descriptors(&self, name: &str) -> FilterResult<Vec<ImageDescriptor>> {
        self.get_parameter(name)?
            .images()
            .into_iter()
            .map(|id| {
                self.images
                    .get(&id)
                    .copied()
                    .ok_or_else(|| FilterError::invalid_image(id, "image was deleted"))
            })
            .collect()
    }

    /// Require input and output to cover the same pixel grid.
    pub fn require_same_extent(&self) -> FilterResult<()> {
        if !self.input.same_extent(&self.output) {
            return Err(self.invalid(format!(
                "input {} and output {} differ in size",
                self.input, self.output
            )));
        }
        Ok(())
    }

    /// Require an image parameter to match the output extent.
    pub fn require_image_extent(&self, name: &str) -> FilterResult<()> {
        let desc = self.image_descriptor(name)?;
        if !desc.same_extent(&self.output) {
            return Err(self.invalid(format!(
                "'{}' image {} differs in size from output {}",
                name, desc, self.output
            )));
        }
        Ok(())
    }
}

/// Context provided to a kernel on the device worker.
#[derive(Debug)]
pub struct KernelContext<'a> {
    pub filter_type: FilterType,
    /// Precision the kernel should emulate
    pub compute: ComputeType,
    /// Output image layout
    pub output: ImageDescriptor,
    input: &'a PixelBuffer,
    parameters: &'a ParameterTable,
    images: &'a HashMap<ImageId, PixelBuffer>,
}

impl<'a> KernelContext<'a> {
    /// Create a kernel context.
    pub fn new(
        filter_type: FilterType,
        compute: ComputeType,
        input: &'a PixelBuffer,
        output: ImageDescriptor,
        parameters: &'a ParameterTable,
        images: &'a HashMap<ImageId, PixelBuffer>,
    ) -> Self {
        Self {
            filter_type,
            compute,
            output,
            input,
            parameters,
            images,
        }
    }

    fn fail(&self, message: String) -> FilterError {
        FilterError::Kernel {
            filter_type: self.filter_type,
            message,
        }
    }

    /// Decoded input pixels.
    pub fn input(&self) -> &PixelBuffer {
        self.input
    }

    /// Get a bound parameter value.
    pub fn get_parameter(&self, name: &str) -> FilterResult<&ParameterValue> {
        lookup(self.parameters, name)
            .ok_or_else(|| self.fail(format!("parameter '{}' is not set", name)))
    }

    /// Get a float parameter.
    pub fn get_float(&self, name: &str) -> FilterResult<f32> {
        self.get_parameter(name)?
            .as_float()
            .ok_or_else(|| self.fail(format!("parameter '{}' is not a float", name)))
    }

    /// Get all components of a float parameter.
    pub fn get_floats(&self, name: &str) -> FilterResult<&[f32]> {
        self.get_parameter(name)?
            .as_floats()
            .ok_or_else(|| self.fail(format!("parameter '{}' is not a float", name)))
    }

    /// Get an unsigned parameter.
    pub fn get_uint(&self, name: &str) -> FilterResult<u32> {
        self.get_parameter(name)?
            .as_uint()
            .ok_or_else(|| self.fail(format!("parameter '{}' is not unsigned", name)))
    }

    /// Get all components of an unsigned parameter.
    pub fn get_uints(&self, name: &str) -> FilterResult<&[u32]> {
        self.get_parameter(name)?
            .as_uints()
            .ok_or_else(|| self.fail(format!("parameter '{}' is not unsigned", name)))
    }

    /// Get a string parameter.
    pub fn get_string(&self, name: &str) -> FilterResult<&str> {
        self.get_parameter(name)?
            .as_str()
            .ok_or_else(|| self.fail(format!("parameter '{}' is not a string", name)))
    }

    /// Decoded pixels of the image bound to an image parameter.
    pub fn get_image(&self, name: &str) -> FilterResult<&PixelBuffer> {
        let id = self
            .get_parameter(name)?
            .as_image()
            .ok_or_else(|| self.fail(format!("image parameter '{}' is not set", name)))?;
        self.images
            .get(&id)
            .ok_or_else(|| self.fail(format!("image {} for '{}' was not decoded", id, name)))
    }

    /// Decoded pixels of every image in an image-array parameter.
    pub fn get_images(&self, name: &str) -> FilterResult<Vec<&PixelBuffer>> {
        self.get_parameter(name)?
            .images()
            .into_iter()
            .map(|id| {
                self.images.get(&id).ok_or_else(|| {
                    self.fail(format!("image {} for '{}' was not decoded", id, name))
                })
            })
            .collect()
    }
}

fn lookup<'p>(parameters: &'p ParameterTable, name: &str) -> Option<&'p ParameterValue> {
    parameters.get(name).and_then(|v| v.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Status;
    use crate::core::types::ComponentType;

    fn table() -> ParameterTable {
        let mut table = ParameterTable::new();
        table.insert("radius".to_string(), Some(ParameterValue::uint(3)));
        table.insert("sigma".to_string(), Some(ParameterValue::float(2.0)));
        table.insert("operand".to_string(), None);
        table
    }

    #[test]
    fn test_validation_getters() {
        let parameters = table();
        let images = HashMap::new();
        let desc = ImageDescriptor::new(8, 8, 3, ComponentType::Uint8);
        let ctx = ValidationContext::new(
            FilterId::new(),
            FilterType::GaussianBlur,
            desc,
            desc,
            &parameters,
            &images,
        );
        assert_eq!(ctx.get_uint("radius").unwrap(), 3);
        assert_eq!(ctx.get_float("sigma").unwrap(), 2.0);
        assert!(ctx.get_float("radius").is_err());
        assert_eq!(
            ctx.image_descriptor("operand").unwrap_err().status(),
            Status::InvalidParameter
        );
        assert!(ctx.require_same_extent().is_ok());
    }

    #[test]
    fn test_extent_mismatch() {
        let parameters = table();
        let images = HashMap::new();
        let ctx = ValidationContext::new(
            FilterId::new(),
            FilterType::Add,
            ImageDescriptor::new(8, 8, 3, ComponentType::Uint8),
            ImageDescriptor::new(16, 8, 3, ComponentType::Uint8),
            &parameters,
            &images,
        );
        assert!(ctx.require_same_extent().is_err());
    }

    #[test]
    fn test_kernel_getters() {
        let parameters = table();
        let images = HashMap::new();
        let input = PixelBuffer::new(2, 2, 1, 1);
        let desc = ImageDescriptor::new(2, 2, 1, ComponentType::Float32);
        let ctx = KernelContext::new(
            FilterType::GaussianBlur,
            ComputeType::Float32,
            &input,
            desc,
            &parameters,
            &images,
        );
        assert_eq!(ctx.get_uints("radius").unwrap(), &[3]);
        assert_eq!(ctx.input().width, 2);
        assert_eq!(
            ctx.get_image("operand").unwrap_err().status(),
            Status::InternalError
        );
    }
}
