use crate::production::LandfillParameters;
use serde::{Deserialize, Serialize};

/// Options of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Give every calendar year between two observations its own time index
    pub fill_intermediate_years: bool,
    /// Send the carbon released by end-use products to the landfill line
    pub dispose_to_landfill: bool,
    /// Number of extra rotations appended to an eligible trajectory.
    ///
    /// Only single-realization, stand-scale, even-aged trajectories are
    /// extended.
    pub rotations: usize,
    pub landfill: LandfillParameters,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fill_intermediate_years: true,
            dispose_to_landfill: true,
            rotations: 0,
            landfill: LandfillParameters::default(),
        }
    }
}
