//! Filters and their parameter stores.

use crate::core::context::ParameterTable;
use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::{FilterId, ImageId};
use crate::core::kernel::FilterMetadata;
use crate::core::parameter::ParameterDefinition;
use crate::core::types::{ComputeType, ParameterType, ParameterValue};
use crate::filters::catalog::CatalogEntry;
use crate::filters::kind::FilterType;

/// A filter instance: its type, schema, bound parameters and precision.
#[derive(Debug, Clone)]
pub struct Filter {
    id: FilterId,
    metadata: FilterMetadata,
    parameters: ParameterTable,
    compute: ComputeType,
}

impl Filter {
    /// Create a filter with every parameter at its default.
    pub(crate) fn new(id: FilterId, entry: &CatalogEntry) -> Self {
        let parameters = entry
            .metadata
            .parameters
            .iter()
            .map(|def| (def.name.clone(), def.default_value.clone()))
            .collect();
        Self {
            id,
            metadata: entry.metadata.clone(),
            parameters,
            compute: ComputeType::default(),
        }
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn filter_type(&self) -> FilterType {
        self.metadata.filter_type
    }

    /// Schema and description from the catalog.
    pub fn metadata(&self) -> &FilterMetadata {
        &self.metadata
    }

    pub fn compute_type(&self) -> ComputeType {
        self.compute
    }

    pub(crate) fn set_compute_type(&mut self, compute: ComputeType) {
        self.compute = compute;
    }

    /// Current parameter values, `None` for unset image parameters.
    pub fn parameters(&self) -> &ParameterTable {
        &self.parameters
    }

    /// Current value of a parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name).and_then(Option::as_ref)
    }

    /// Definition of the parameter at `index` in schema order.
    pub fn definition(&self, index: usize) -> FilterResult<&ParameterDefinition> {
        self.metadata.parameters.get_index(index).ok_or_else(|| {
            FilterError::InvalidParameter(format!(
                "parameter index {} out of range, {} has {} parameter(s)",
                index,
                self.filter_type(),
                self.metadata.parameters.len()
            ))
        })
    }

    fn schema_entry(&self, name: &str) -> FilterResult<&ParameterDefinition> {
        self.metadata
            .parameters
            .get(name)
            .ok_or_else(|| FilterError::UnknownParameter {
                filter_type: self.filter_type(),
                name: name.to_string(),
            })
    }

    /// Replace a parameter value after checking it against the schema.
    ///
    /// `image_exists` tells whether an image handle belongs to the owning
    /// context. Nothing changes on failure.
    pub(crate) fn set_parameter(
        &mut self,
        name: &str,
        value: ParameterValue,
        image_exists: impl Fn(ImageId) -> bool,
    ) -> FilterResult<()> {
        self.schema_entry(name)?.check_assignment(&value)?;
        if let Some(missing) = value.images().into_iter().find(|id| !image_exists(*id)) {
            return Err(FilterError::invalid_image(
                missing,
                "image does not belong to this context",
            ));
        }
        self.parameters.insert(name.to_string(), Some(value));
        Ok(())
    }

    /// Reset an image parameter to unset.
    pub(crate) fn clear_image(&mut self, name: &str) -> FilterResult<()> {
        let ty = self.schema_entry(name)?.ty;
        if !ty.is_image() {
            return Err(FilterError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: ParameterType::Image,
                got: ty,
            });
        }
        self.parameters.insert(name.to_string(), None);
        Ok(())
    }

    /// Every image handle bound to a parameter.
    pub fn image_refs(&self) -> Vec<ImageId> {
        self.parameters
            .values()
            .flatten()
            .flat_map(ParameterValue::images)
            .collect()
    }

    /// Parameter table to run with, after checking every value's constraints.
    pub(crate) fn resolved_parameters(&self) -> FilterResult<ParameterTable> {
        for def in self.metadata.parameters.iter() {
            if let Some(Some(value)) = self.parameters.get(&def.name) {
                def.check_constraints(value)?;
            }
        }
        Ok(self.parameters.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Status;
    use crate::filters::catalog::FilterCatalog;

    fn filter(ty: FilterType) -> Filter {
        let catalog = FilterCatalog::with_builtins();
        Filter::new(FilterId::new(), catalog.entry(ty).unwrap())
    }

    #[test]
    fn test_defaults() {
        let blur = filter(FilterType::GaussianBlur);
        assert_eq!(blur.parameter("radius"), Some(&ParameterValue::uint(1)));
        assert_eq!(blur.compute_type(), ComputeType::Float32);
        assert_eq!(blur.definition(1).unwrap().name, "sigma");
        assert_eq!(blur.definition(2).unwrap_err().status(), Status::InvalidParameter);
    }

    #[test]
    fn test_set_parameter_checks() {
        let mut blur = filter(FilterType::GaussianBlur);
        let yes = |_: ImageId| true;

        let err = blur
            .set_parameter("radiuss", ParameterValue::uint(2), yes)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidFilterArgumentName);

        let err = blur
            .set_parameter("radius", ParameterValue::float(2.0), yes)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameterType);
        assert_eq!(blur.parameter("radius"), Some(&ParameterValue::uint(1)));

        blur.set_parameter("radius", ParameterValue::uint(3), yes).unwrap();
        assert_eq!(blur.parameter("radius"), Some(&ParameterValue::uint(3)));
    }

    #[test]
    fn test_image_parameters() {
        let mut add = filter(FilterType::Add);
        let image = ImageId::new();

        let err = add
            .set_parameter("operand", ParameterValue::image(image), |_| false)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidImage);
        assert!(add.parameter("operand").is_none());

        add.set_parameter("operand", ParameterValue::image(image), |_| true)
            .unwrap();
        assert_eq!(add.image_refs(), vec![image]);

        add.clear_image("operand").unwrap();
        assert!(add.parameter("operand").is_none());
        assert!(add.image_refs().is_empty());

        let mut blur = filter(FilterType::GaussianBlur);
        assert_eq!(
            blur.clear_image("sigma").unwrap_err().status(),
            Status::InvalidParameterType
        );
    }

    #[test]
    fn test_constraints_checked_on_resolve() {
        let mut blur = filter(FilterType::GaussianBlur);
        blur.set_parameter("sigma", ParameterValue::float(-1.0), |_| true)
            .unwrap();
        assert_eq!(
            blur.resolved_parameters().unwrap_err().status(),
            Status::InvalidParameter
        );
    }
}
