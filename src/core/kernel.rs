//! Kernel trait and filter metadata.
//!
//! A kernel is the host implementation of one filter type. Like the rest of
//! the engine it works in two phases: `validate` runs synchronously inside
//! `execute` on the calling thread, `execute` runs later on the device
//! worker.

use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::FilterResult;
use crate::core::parameter::{ParameterDefinition, ParameterSchema};
use crate::core::pixels::PixelBuffer;
use crate::filters::kind::{Category, FilterType};
use serde::{Deserialize, Serialize};

/// Metadata describing a catalogued filter type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Filter type this entry implements
    pub filter_type: FilterType,
    /// Human-readable name (e.g., "Gaussian Blur")
    pub name: String,
    /// Detailed description, also answered by filter info queries
    pub description: String,
    /// Parameter schema in declaration order
    pub parameters: ParameterSchema,
    /// Searchable tags
    pub tags: Vec<String>,
    /// Whether consecutive attachments of this kernel may be fused
    pub joinable: bool,
}

impl FilterMetadata {
    /// Create a new metadata builder.
    pub fn builder(filter_type: FilterType, name: impl Into<String>) -> FilterMetadataBuilder {
        FilterMetadataBuilder::new(filter_type, name)
    }

    /// Category of the filter type.
    pub fn category(&self) -> Category {
        self.filter_type.category()
    }

    /// Get all parameter names.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Find a parameter by name.
    pub fn get_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.get(name)
    }
}

/// Builder for FilterMetadata.
pub struct FilterMetadataBuilder {
    filter_type: FilterType,
    name: String,
    description: String,
    parameters: ParameterSchema,
    tags: Vec<String>,
    joinable: bool,
}

impl FilterMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(filter_type: FilterType, name: impl Into<String>) -> Self {
        Self {
            filter_type,
            name: name.into(),
            description: String::new(),
            parameters: ParameterSchema::new(),
            tags: Vec::new(),
            joinable: false,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add multiple tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(|t| t.into()));
        self
    }

    /// Mark as joinable (per-pixel, no neighborhood access).
    pub fn joinable(mut self) -> Self {
        self.joinable = true;
        self
    }

    /// Build the metadata.
    pub fn build(self) -> FilterMetadata {
        FilterMetadata {
            filter_type: self.filter_type,
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            tags: self.tags,
            joinable: self.joinable,
        }
    }
}

/// Host implementation of a filter type.
///
/// `execute` receives the decoded input and returns a buffer shaped like the
/// output image's descriptor. The engine encodes it into the output,
/// restricted to the attachment rectangle.
///
/// # Example Implementation
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// struct Invert;
///
/// impl Kernel for Invert {
///     fn metadata(&self) -> FilterMetadata {
///         FilterMetadata::builder(FilterType::UserDefined, "Invert").joinable().build()
///     }
///
///     fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
///         let input = ctx.input();
///         Ok(input.map_pixels(|x, y, z, px| {
///             for c in 0..px.len() {
///                 px[c] = 1.0 - input.get(x, y, z, c as u32);
///             }
///         }))
///     }
///
///     fn clone_box(&self) -> Box<dyn Kernel> {
///         Box::new(self.clone())
///     }
/// }
/// ```
pub trait Kernel: Send + Sync {
    /// Get the metadata for this kernel.
    fn metadata(&self) -> FilterMetadata;

    /// Check parameters and image shapes before dispatch.
    ///
    /// Failures here are reported synchronously by queue execution and leave
    /// every image untouched. The default checks that input and output have
    /// the same extent.
    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()
    }

    /// Compute the output pixels.
    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer>;

    /// Clone this kernel into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Kernel>;
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ParameterValue;

    #[test]
    fn test_metadata_builder() {
        let metadata = FilterMetadata::builder(FilterType::GaussianBlur, "Gaussian Blur")
            .description("Separable gaussian blur")
            .parameter(ParameterDefinition::new("radius", ParameterValue::uint(1)))
            .parameter(ParameterDefinition::new("sigma", ParameterValue::float(1.0)))
            .tags(["blur", "smooth"])
            .build();

        assert_eq!(metadata.filter_type, FilterType::GaussianBlur);
        assert_eq!(metadata.parameter_names(), vec!["radius", "sigma"]);
        assert_eq!(metadata.category(), Category::Blur);
        assert_eq!(metadata.tags.len(), 2);
        assert!(!metadata.joinable);
    }
}
