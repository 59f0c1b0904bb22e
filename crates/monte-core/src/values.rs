//! Named scalar and vector values used for conditions and properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MonteError};

/// Mapping from field name to a scalar or a numeric vector.
///
/// Scalar and vector keys live in disjoint namespaces: a name present in one
/// map can never be inserted into the other.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValueMap {
    /// Scalar-valued fields, e.g. `temperature`.
    #[serde(default)]
    pub scalars: BTreeMap<String, f64>,
    /// Vector-valued fields, e.g. `mol_composition`.
    #[serde(default)]
    pub vectors: BTreeMap<String, Vec<f64>>,
}

/// Conditions are the macroscopic control parameters of one state.
pub type Conditions = ValueMap;

impl ValueMap {
    /// Creates an empty value map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style scalar insertion.
    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Result<Self, MonteError> {
        self.insert_scalar(name, value)?;
        Ok(self)
    }

    /// Builder-style vector insertion.
    pub fn with_vector(
        mut self,
        name: impl Into<String>,
        value: Vec<f64>,
    ) -> Result<Self, MonteError> {
        self.insert_vector(name, value)?;
        Ok(self)
    }

    /// Inserts or replaces a scalar field.
    pub fn insert_scalar(&mut self, name: impl Into<String>, value: f64) -> Result<(), MonteError> {
        let name = name.into();
        if self.vectors.contains_key(&name) {
            return Err(namespace_clash(&name, "vector"));
        }
        self.scalars.insert(name, value);
        Ok(())
    }

    /// Inserts or replaces a vector field.
    pub fn insert_vector(
        &mut self,
        name: impl Into<String>,
        value: Vec<f64>,
    ) -> Result<(), MonteError> {
        let name = name.into();
        if self.scalars.contains_key(&name) {
            return Err(namespace_clash(&name, "scalar"));
        }
        self.vectors.insert(name, value);
        Ok(())
    }

    /// Returns a scalar field.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    /// Returns a vector field.
    pub fn vector(&self, name: &str) -> Option<&[f64]> {
        self.vectors.get(name).map(Vec::as_slice)
    }

    /// Returns true when the map holds a field with this name in either namespace.
    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name) || self.vectors.contains_key(name)
    }

    /// Total number of fields.
    pub fn len(&self) -> usize {
        self.scalars.len() + self.vectors.len()
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.vectors.is_empty()
    }

    /// Returns the first field of `other` that cannot be applied to `self`.
    ///
    /// A field mismatches when it is missing here, lives in the other namespace,
    /// or is a vector of a different length.
    pub fn first_mismatch(&self, other: &ValueMap) -> Option<String> {
        for name in other.scalars.keys() {
            if !self.scalars.contains_key(name) {
                return Some(name.clone());
            }
        }
        for (name, values) in &other.vectors {
            match self.vectors.get(name) {
                Some(own) if own.len() == values.len() => {}
                _ => return Some(name.clone()),
            }
        }
        None
    }

    /// True when `other` names any field that does not match this map.
    pub fn is_mismatched(&self, other: &ValueMap) -> bool {
        self.first_mismatch(other).is_some()
    }

    /// Returns `self + n * increment` for every field of `increment`.
    ///
    /// Fields absent from `increment` are copied unchanged.
    pub fn incremented(&self, increment: &ValueMap, n: usize) -> Result<ValueMap, MonteError> {
        if let Some(field) = self.first_mismatch(increment) {
            return Err(MonteError::Generator(
                ErrorInfo::new(
                    "increment-mismatch",
                    "increment names a field absent from (or shaped unlike) the base values",
                )
                .with_context("field", format!("conditions_increment.{field}")),
            ));
        }
        let factor = n as f64;
        let mut next = self.clone();
        for (name, delta) in &increment.scalars {
            if let Some(value) = next.scalars.get_mut(name) {
                *value += factor * delta;
            }
        }
        for (name, deltas) in &increment.vectors {
            if let Some(values) = next.vectors.get_mut(name) {
                for (value, delta) in values.iter_mut().zip(deltas) {
                    *value += factor * delta;
                }
            }
        }
        Ok(next)
    }
}

fn namespace_clash(name: &str, existing: &str) -> MonteError {
    MonteError::Config(
        ErrorInfo::new(
            "value-namespace-clash",
            "scalar and vector value names must be disjoint",
        )
        .with_context("field", name.to_string())
        .with_context("existing", existing.to_string()),
    )
}
