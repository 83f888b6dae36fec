//! Stand trajectories
//!
//! [`TrajectoryBuilder`] assembles the ordered observations of a stand and
//! [`StochasticStandProvider`] serves pre-drawn realizations of a trajectory.

use rcat_core::errors::{RCATError, RCATResult};
use rcat_core::stand::{
    ApplicationScale, ManagementType, StandObservation, StandProvider, TreeRecord, TreeStatus,
};
use rcat_core::time_table::Year;
use serde::{Deserialize, Serialize};

/// Builds the observations of a stand in chronological order.
#[derive(Debug, Clone)]
pub struct TrajectoryBuilder {
    management: ManagementType,
    scale: ApplicationScale,
    trajectory: usize,
    stands: Vec<StandObservation>,
}

impl TrajectoryBuilder {
    pub fn new(management: ManagementType, scale: ApplicationScale) -> Self {
        Self {
            management,
            scale,
            trajectory: 0,
            stands: vec![],
        }
    }

    fn stand(&self, year: Year) -> StandObservation {
        StandObservation {
            trajectory: self.trajectory,
            ..StandObservation::new(year, self.management, self.scale)
        }
    }

    /// Standing trees at `year`
    pub fn observe(mut self, year: Year, alive: Vec<TreeRecord>) -> Self {
        let stand = self.stand(year).with_trees(TreeStatus::Alive, alive);
        self.stands.push(stand);
        self
    }

    /// Dead or windthrown trees found at `year` along with the standing ones
    pub fn with_mortality(mut self, status: TreeStatus, trees: Vec<TreeRecord>) -> Self {
        if let Some(stand) = self.stands.last_mut() {
            stand.trees.entry(status).or_default().extend(trees);
        }
        self
    }

    /// An intervention at `year` removing `cut` and leaving `remaining` standing.
    pub fn harvest(mut self, year: Year, cut: Vec<TreeRecord>, remaining: Vec<TreeRecord>) -> Self {
        let mut stand = self
            .stand(year)
            .with_trees(TreeStatus::Cut, cut)
            .with_trees(TreeStatus::Alive, remaining);
        stand.intervention = true;
        self.stands.push(stand);
        self
    }

    /// Following observations belong to a new trajectory, e.g. after a stand replacement.
    pub fn next_trajectory(mut self) -> Self {
        self.trajectory += 1;
        self
    }

    pub fn build(self) -> RCATResult<Vec<StandObservation>> {
        if self.stands.is_empty() {
            return Err(RCATError::TimeTable(
                "a trajectory needs at least one observation".to_string(),
            ));
        }
        if let Some(pair) = self.stands.windows(2).find(|pair| pair[1].year < pair[0].year) {
            return Err(RCATError::TimeTable(format!(
                "observation of {} follows an observation of {}",
                pair[1].year, pair[0].year
            )));
        }
        Ok(self.stands)
    }
}

/// Realizations of a stochastic stand simulation, drawn beforehand.
///
/// Every realization must observe the stand at the same dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticStandProvider {
    realizations: Vec<Vec<StandObservation>>,
}

impl StochasticStandProvider {
    pub fn new(realizations: Vec<Vec<StandObservation>>) -> RCATResult<Self> {
        let reference: Vec<Year> = realizations
            .first()
            .ok_or_else(|| RCATError::Configuration("no realization provided".to_string()))?
            .iter()
            .map(|s| s.year)
            .collect();
        for (realization, stands) in realizations.iter().enumerate() {
            if !stands.iter().map(|s| s.year).eq(reference.iter().copied()) {
                return Err(RCATError::Configuration(format!(
                    "realization {} is not observed at the dates of the first realization",
                    realization
                )));
            }
        }
        Ok(Self { realizations })
    }
}

impl StandProvider for StochasticStandProvider {
    fn realization_count(&self) -> usize {
        self.realizations.len()
    }

    fn stands(&self, realization: usize) -> RCATResult<Vec<StandObservation>> {
        self.realizations.get(realization).cloned().ok_or_else(|| {
            RCATError::State(format!(
                "realization {} requested from a provider of {}",
                realization,
                self.realizations.len()
            ))
        })
    }
}
