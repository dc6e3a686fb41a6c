//! Parameter definitions and per-type schemas.
//!
//! A schema is a data table owned by the catalog: parameter name to declared
//! type, fixed array length, default and constraints. Filters copy the
//! defaults into their parameter store at creation and validate every
//! assignment against the schema.

use crate::core::error::{FilterError, FilterResult};
use crate::core::types::{ParameterType, ParameterValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Definition of one filter parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Unique name within the filter type
    pub name: String,
    /// Human-readable name
    pub display_name: String,
    /// Declared type
    pub ty: ParameterType,
    /// Required element count for array types
    pub array_len: Option<usize>,
    /// Initial value; `None` means unset until assigned
    pub default_value: Option<ParameterValue>,
    /// Description for documentation and info queries
    pub description: String,
    /// Constraints checked before execution
    pub constraints: Vec<Constraint>,
}

/// Value constraints checked when a queue executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum Constraint {
    /// Every numeric component must be within [min, max]
    Range { min: f64, max: f64 },
    /// Every numeric component must be >= min
    MinValue(f64),
    /// Every numeric component must be > 0
    Positive,
    /// Strings and arrays must not be empty
    NotEmpty,
}

impl ParameterDefinition {
    /// Create a parameter with a default value.
    pub fn new(name: impl Into<String>, default_value: ParameterValue) -> Self {
        let ty = default_value
            .parameter_type()
            .unwrap_or(ParameterType::FloatArray);
        Self::declare(name, ty, Some(default_value))
    }

    /// Create an image parameter that starts unset.
    pub fn image(name: impl Into<String>) -> Self {
        Self::declare(name, ParameterType::Image, None)
    }

    /// Create a parameter of any type, optionally without a default.
    pub fn declare(
        name: impl Into<String>,
        ty: ParameterType,
        default_value: Option<ParameterValue>,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name_to_display(&name),
            name,
            ty,
            array_len: None,
            default_value,
            description: String::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Require arrays assigned to this parameter to hold exactly `len` elements.
    pub fn with_array_len(mut self, len: usize) -> Self {
        self.array_len = Some(len);
        self
    }

    /// Add a range constraint.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.constraints.push(Constraint::Range { min, max });
        self
    }

    /// Add a constraint.
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Check the type and element count of a value about to be assigned.
    pub fn check_assignment(&self, value: &ParameterValue) -> FilterResult<()> {
        let got = value.parameter_type().ok_or_else(|| {
            FilterError::InvalidParameter(format!(
                "'{}' expects {}, got a vector of {} components",
                self.name,
                self.ty,
                value.len()
            ))
        })?;
        if got != self.ty {
            return Err(FilterError::ParameterTypeMismatch {
                name: self.name.clone(),
                expected: self.ty,
                got,
            });
        }
        if let Some(len) = self.array_len {
            if value.len() != len {
                return Err(FilterError::InvalidParameter(format!(
                    "'{}' expects {} elements, got {}",
                    self.name,
                    len,
                    value.len()
                )));
            }
        }
        Ok(())
    }

    /// Check a value against the constraints.
    pub fn check_constraints(&self, value: &ParameterValue) -> FilterResult<()> {
        for constraint in &self.constraints {
            constraint
                .validate(value)
                .map_err(|e| FilterError::InvalidParameter(format!("'{}': {}", self.name, e)))?;
        }
        Ok(())
    }
}

impl Constraint {
    /// Validate a value against this constraint.
    pub fn validate(&self, value: &ParameterValue) -> Result<(), String> {
        let numbers = numeric_components(value);
        match self {
            Constraint::Range { min, max } => {
                if let Some(v) = numbers.iter().find(|v| **v < *min || **v > *max) {
                    return Err(format!("value {} is out of range [{}, {}]", v, min, max));
                }
            }
            Constraint::MinValue(min) => {
                if let Some(v) = numbers.iter().find(|v| **v < *min) {
                    return Err(format!("value {} is below minimum {}", v, min));
                }
            }
            Constraint::Positive => {
                if let Some(v) = numbers.iter().find(|v| **v <= 0.0) {
                    return Err(format!("value {} must be positive", v));
                }
            }
            Constraint::NotEmpty => {
                let empty = match value {
                    ParameterValue::String(s) => s.is_empty(),
                    other => other.is_empty(),
                };
                if empty {
                    return Err("value cannot be empty".to_string());
                }
            }
        }
        Ok(())
    }
}

fn numeric_components(value: &ParameterValue) -> Vec<f64> {
    match value {
        ParameterValue::Float(v) | ParameterValue::FloatArray(v) => {
            v.iter().map(|x| *x as f64).collect()
        }
        ParameterValue::UInt(v) | ParameterValue::UIntArray(v) => {
            v.iter().map(|x| *x as f64).collect()
        }
        ParameterValue::Int(v) | ParameterValue::IntArray(v) => {
            v.iter().map(|x| *x as f64).collect()
        }
        _ => Vec::new(),
    }
}

/// Convert snake_case to Title Case.
pub fn name_to_display(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ordered parameter table of one filter type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterSchema {
    entries: IndexMap<String, ParameterDefinition>,
}

impl ParameterSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter; a later definition with the same name replaces it.
    pub fn push(&mut self, definition: ParameterDefinition) {
        self.entries.insert(definition.name.clone(), definition);
    }

    /// Look up a parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.entries.get(name)
    }

    /// Look up a parameter by declaration index.
    pub fn get_index(&self, index: usize) -> Option<&ParameterDefinition> {
        self.entries.get_index(index).map(|(_, d)| d)
    }

    /// Declaration index of a parameter.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schema declares no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.entries.values()
    }
}

impl FromIterator<ParameterDefinition> for ParameterSchema {
    fn from_iter<I: IntoIterator<Item = ParameterDefinition>>(iter: I) -> Self {
        let mut schema = ParameterSchema::new();
        for definition in iter {
            schema.push(definition);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Status;

    #[test]
    fn test_definition_builder() {
        let def = ParameterDefinition::new("blur_radius", ParameterValue::uint(3))
            .with_description("Kernel radius in pixels")
            .with_range(1.0, 64.0);
        assert_eq!(def.ty, ParameterType::UInt1);
        assert_eq!(def.display_name, "Blur Radius");
        assert_eq!(def.constraints.len(), 1);
        assert!(def.default_value.is_some());
    }

    #[test]
    fn test_assignment_checks() {
        let def = ParameterDefinition::new("sigma", ParameterValue::float(2.0));
        assert!(def.check_assignment(&ParameterValue::float(0.5)).is_ok());
        assert_eq!(
            def.check_assignment(&ParameterValue::uint(1))
                .unwrap_err()
                .status(),
            Status::InvalidParameterType
        );
        assert_eq!(
            def.check_assignment(&ParameterValue::Float(vec![1.0; 5]))
                .unwrap_err()
                .status(),
            Status::InvalidParameter
        );
    }

    #[test]
    fn test_fixed_array_len() {
        let def = ParameterDefinition::declare("sigmas", ParameterType::FloatArray, None)
            .with_array_len(2);
        assert!(def
            .check_assignment(&ParameterValue::FloatArray(vec![0.1, 0.2]))
            .is_ok());
        assert_eq!(
            def.check_assignment(&ParameterValue::FloatArray(vec![0.1]))
                .unwrap_err()
                .status(),
            Status::InvalidParameter
        );
    }

    #[test]
    fn test_constraints() {
        let def = ParameterDefinition::new("gamma", ParameterValue::float(2.2))
            .with_constraint(Constraint::Positive);
        assert!(def.check_constraints(&ParameterValue::float(1.0)).is_ok());
        assert!(def.check_constraints(&ParameterValue::float(0.0)).is_err());

        assert!(Constraint::NotEmpty
            .validate(&ParameterValue::String(String::new()))
            .is_err());
        assert!(Constraint::Range { min: 0.0, max: 1.0 }
            .validate(&ParameterValue::Float(vec![0.5, 1.5]))
            .is_err());
    }

    #[test]
    fn test_schema_order() {
        let schema: ParameterSchema = [
            ParameterDefinition::new("radius", ParameterValue::uint(1)),
            ParameterDefinition::new("sigma", ParameterValue::float(1.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.index_of("sigma"), Some(1));
        assert_eq!(schema.get_index(0).unwrap().name, "radius");
        assert!(schema.get("missing").is_none());
    }

    #[test]
    fn test_name_to_display() {
        assert_eq!(name_to_display("apply_tone_map"), "Apply Tone Map");
        assert_eq!(name_to_display("gamma"), "Gamma");
    }
}
