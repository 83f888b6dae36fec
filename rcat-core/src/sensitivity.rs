//! Hook for the sensitivity-analysis subsystem.
//!
//! The core multiplies a few quantities by a scalar obtained from a
//! [`SensitivityModifier`] but owns no state about how that scalar is drawn.

use crate::time_table::FloatValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantities that can be perturbed by a sensitivity analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariabilitySource {
    /// Carbon content of the biomass coming out of the biomass converter
    CarbonContent,
    /// Mean lifetime of the units materialised at a terminal processor
    Lifetime,
}

/// Supplies multiplicative factors for a Monte-Carlo realization.
///
/// `group` identifies what is being modified: the species name for
/// [`VariabilitySource::CarbonContent`] and the processor name for
/// [`VariabilitySource::Lifetime`].
#[typetag::serde(tag = "type")]
pub trait SensitivityModifier: fmt::Debug + Send + Sync {
    fn modifier(&self, source: VariabilitySource, realization: usize, group: &str) -> FloatValue;
}

/// Leaves every quantity unchanged
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NoVariability;

#[typetag::serde]
impl SensitivityModifier for NoVariability {
    fn modifier(&self, _source: VariabilitySource, _realization: usize, _group: &str) -> FloatValue {
        1.0
    }
}
