//! Sensitivity modifiers
//!
//! Implementations of [`SensitivityModifier`] that can be stored in a
//! configuration file:
//!
//! ```toml
//! type = "ConstantMultiplier"
//! source = "Lifetime"
//! factor = 1.2
//! groups = ["Lumber"]
//! ```

use rcat_core::errors::{RCATError, RCATResult};
use rcat_core::sensitivity::{SensitivityModifier, VariabilitySource};
use rcat_core::time_table::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn check_factor(factor: FloatValue) -> RCATResult<FloatValue> {
    if factor.is_finite() && factor >= 0.0 {
        Ok(factor)
    } else {
        Err(RCATError::Configuration(format!(
            "sensitivity factor must be a non-negative number, got {}",
            factor
        )))
    }
}

/// The same factor in every realization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantMultiplier {
    pub source: VariabilitySource,
    pub factor: FloatValue,
    /// Species or processor names the factor applies to. Empty means all.
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl ConstantMultiplier {
    pub fn new(source: VariabilitySource, factor: FloatValue) -> RCATResult<Self> {
        Ok(Self {
            source,
            factor: check_factor(factor)?,
            groups: BTreeSet::new(),
        })
    }

    pub fn for_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    fn applies_to(&self, source: VariabilitySource, group: &str) -> bool {
        source == self.source && (self.groups.is_empty() || self.groups.contains(group))
    }
}

#[typetag::serde]
impl SensitivityModifier for ConstantMultiplier {
    fn modifier(&self, source: VariabilitySource, _realization: usize, group: &str) -> FloatValue {
        if self.applies_to(source, group) {
            self.factor
        } else {
            1.0
        }
    }
}

/// A factor drawn beforehand for each realization.
///
/// Realizations beyond the drawn factors wrap around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizationMultipliers {
    pub source: VariabilitySource,
    pub factors: Vec<FloatValue>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl RealizationMultipliers {
    pub fn new(source: VariabilitySource, factors: Vec<FloatValue>) -> RCATResult<Self> {
        if factors.is_empty() {
            return Err(RCATError::Configuration(
                "at least one factor per realization is required".to_string(),
            ));
        }
        for factor in &factors {
            check_factor(*factor)?;
        }
        Ok(Self {
            source,
            factors,
            groups: BTreeSet::new(),
        })
    }

    pub fn for_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }
}

#[typetag::serde]
impl SensitivityModifier for RealizationMultipliers {
    fn modifier(&self, source: VariabilitySource, realization: usize, group: &str) -> FloatValue {
        if source != self.source || !(self.groups.is_empty() || self.groups.contains(group)) {
            return 1.0;
        }
        match self.factors.len() {
            0 => 1.0,
            n => self.factors[realization % n],
        }
    }
}

/// Applies several modifiers, multiplying their factors
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CombinedModifiers {
    pub modifiers: Vec<Box<dyn SensitivityModifier>>,
}

impl CombinedModifiers {
    pub fn with(mut self, modifier: impl SensitivityModifier + 'static) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }
}

#[typetag::serde]
impl SensitivityModifier for CombinedModifiers {
    fn modifier(&self, source: VariabilitySource, realization: usize, group: &str) -> FloatValue {
        self.modifiers
            .iter()
            .map(|m| m.modifier(source, realization, group))
            .product()
    }
}
