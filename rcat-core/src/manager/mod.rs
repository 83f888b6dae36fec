//! Orchestration of a Monte-Carlo simulation.
//!
//! A [`CompartmentManager`] goes through the following states:
//!
//! `Idle -> Initialized -> Summarized`
//!
//! [`CompartmentManager::init`] builds the time table from the first
//! realization of the stand provider. [`CompartmentManager::run`] then executes
//! the [`SimulationTask`]s of every realization in turn and adds each result to
//! the [`SimulationSummary`]. Realizations share nothing but the configuration.

mod handle;
mod registry;
mod settings;
mod tasks;

pub use handle::{SimulationHandle, SimulationOutcome};
pub use registry::{RegisteredTree, TreeKey, TreeRegistry};
pub use settings::SimulationSettings;
pub use tasks::SimulationTask;

use crate::compartment::CompartmentSet;
use crate::errors::{RCATError, RCATResult};
use crate::estimator::SimulationSummary;
use crate::production::{ProductionLineManager, RoutedUnits};
use crate::sensitivity::{NoVariability, SensitivityModifier};
use crate::stand::{
    ApplicationScale, BiomassConverter, ManagementType, StandObservation, StandProvider, TreeStatus,
};
use crate::time_table::TimeTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManagerState {
    Idle,
    Initialized,
    Summarized,
}

/// What [`CompartmentManager::init`] found out about the trajectory.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InitReport {
    pub realizations: usize,
    /// A fully harvested stand was appended to an unfinished even-aged trajectory
    pub synthetic_final_harvest: bool,
    /// The trajectory can be repeated as an infinite sequence of rotations
    pub infinite_sequence_eligible: bool,
    /// Extra rotations actually appended
    pub rotations: usize,
}

#[derive(Debug)]
pub struct CompartmentManager {
    settings: SimulationSettings,
    lines: ProductionLineManager,
    provider: Arc<dyn StandProvider>,
    converter: Arc<dyn BiomassConverter>,
    modifier: Arc<dyn SensitivityModifier>,
    cancel: Arc<AtomicBool>,

    state: ManagerState,
    report: Option<InitReport>,
    time_table: Option<TimeTable>,
    compartments: CompartmentSet,
    trees: TreeRegistry,
    routed: RoutedUnits,
    summary: Option<SimulationSummary>,
}

impl CompartmentManager {
    pub fn new(
        settings: SimulationSettings,
        lines: ProductionLineManager,
        provider: Arc<dyn StandProvider>,
        converter: Arc<dyn BiomassConverter>,
    ) -> RCATResult<Self> {
        Ok(Self {
            settings,
            lines,
            provider,
            converter,
            modifier: Arc::new(NoVariability),
            cancel: Arc::new(AtomicBool::new(false)),
            state: ManagerState::Idle,
            report: None,
            time_table: None,
            compartments: CompartmentSet::standard()?,
            trees: TreeRegistry::default(),
            routed: RoutedUnits::new(),
            summary: None,
        })
    }

    pub fn with_modifier(mut self, modifier: Arc<dyn SensitivityModifier>) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn lines(&self) -> &ProductionLineManager {
        &self.lines
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn report(&self) -> Option<&InitReport> {
        self.report.as_ref()
    }

    pub fn time_table(&self) -> RCATResult<&TimeTable> {
        self.time_table
            .as_ref()
            .ok_or_else(|| RCATError::State("the manager has not been initialized".to_string()))
    }

    pub fn compartments(&self) -> &CompartmentSet {
        &self.compartments
    }

    pub fn summary(&self) -> Option<&SimulationSummary> {
        self.summary.as_ref()
    }

    /// Flag checked between realizations
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Validate the configuration and build the time table.
    pub fn init(&mut self) -> RCATResult<&InitReport> {
        self.lines.validate()?;

        let realizations = self.provider.realization_count();
        if realizations == 0 {
            return Err(RCATError::Configuration(
                "the stand provider has no realization".to_string(),
            ));
        }
        let stands = self.provider.stands(0)?;
        let eligible = infinite_sequence_eligible(&stands, realizations);
        let rotations = match self.settings.rotations {
            0 => 0,
            n if eligible => n,
            _ => {
                warn!("trajectory is not eligible for an infinite sequence, rotations ignored");
                0
            }
        };
        let (stands, synthetic_final_harvest) = self.prepare_stands(stands, rotations)?;
        if synthetic_final_harvest {
            warn!(
                year = stands.last().map(|s| s.year).unwrap_or_default(),
                "even-aged trajectory not harvested, appending a synthetic final harvest"
            );
        }
        let time_table = TimeTable::from_stands(&stands, self.settings.fill_intermediate_years)?;

        info!(
            realizations,
            indices = time_table.len(),
            initial_year = time_table.initial_year(),
            final_year = time_table.final_year(),
            "simulation initialized"
        );

        self.time_table = Some(time_table);
        self.summary = None;
        self.state = ManagerState::Initialized;
        Ok(&*self.report.insert(InitReport {
            realizations,
            synthetic_final_harvest,
            infinite_sequence_eligible: eligible,
            rotations,
        }))
    }

    /// Complete the stands of a realization the same way for every realization.
    ///
    /// `rotations` is the number of extra rotations decided at initialization.
    fn prepare_stands(
        &self,
        mut stands: Vec<StandObservation>,
        rotations: usize,
    ) -> RCATResult<(Vec<StandObservation>, bool)> {
        let last = stands.last().ok_or_else(|| {
            RCATError::TimeTable("the stand provider returned no observation".to_string())
        })?;

        let synthetic = last.management == ManagementType::EvenAged
            && last.has_trees(TreeStatus::Alive);
        if synthetic {
            let harvested = last.harvested();
            stands.push(harvested);
        }

        if rotations > 0 {
            stands = repeat_rotations(stands, rotations)?;
        }
        Ok((stands, synthetic))
    }

    /// Run every realization.
    ///
    /// A failed realization aborts the run and leaves the results of the
    /// previous realizations in the summary. If the run fails before completing
    /// any realization, the summary of the last run is kept. Cancellation is
    /// honoured between realizations only.
    pub fn run(&mut self) -> RCATResult<&SimulationSummary> {
        if self.state == ManagerState::Idle {
            return Err(RCATError::State(
                "the manager must be initialized before running".to_string(),
            ));
        }
        self.lines.validate()?;
        let time_table = self.time_table()?.clone();
        let report = self
            .report
            .ok_or_else(|| RCATError::State("missing initialization report".to_string()))?;
        let mut summary = SimulationSummary::new(time_table.years().to_vec());
        let outcome = self.run_realizations(report.realizations, &time_table, &mut summary);
        // A run that completed nothing leaves the previous results in place
        if summary.realizations() > 0 {
            self.summary = Some(summary);
        }
        outcome?;

        self.state = ManagerState::Summarized;
        self.summary
            .as_ref()
            .ok_or_else(|| RCATError::State("missing summary".to_string()))
    }

    fn run_realizations(
        &mut self,
        realizations: usize,
        time_table: &TimeTable,
        summary: &mut SimulationSummary,
    ) -> RCATResult<()> {
        for realization in 0..realizations {
            if self.cancel.swap(false, Ordering::SeqCst) {
                warn!(completed = realization, "simulation cancelled");
                return Err(RCATError::Cancelled {
                    completed: realization,
                });
            }
            info!(realization, "running realization");
            let result = self.run_realization(realization, time_table);
            // Units of a realization are never kept
            self.trees.clear();
            self.routed.clear();
            summary.add(&result?)?;
        }
        Ok(())
    }

    /// Stands of a realization, checked against the time table.
    fn realization_stands(
        &self,
        realization: usize,
        time_table: &TimeTable,
    ) -> RCATResult<Vec<StandObservation>> {
        let stands = self.provider.stands(realization)?;
        let rotations = self.report.map_or(0, |r| r.rotations);
        let (stands, _) = self.prepare_stands(stands, rotations)?;
        let matches = stands.len() == time_table.stand_count()
            && stands.iter().enumerate().all(|(position, stand)| {
                time_table
                    .index_of_stand(position)
                    .and_then(|index| time_table.year_at(index))
                    == Some(stand.year)
            });
        if !matches {
            return Err(RCATError::State(format!(
                "stands of realization {} do not match the time table",
                realization
            )));
        }
        Ok(stands)
    }

    /// Run the simulation on a background thread.
    pub fn spawn(self) -> SimulationHandle {
        SimulationHandle::spawn(self)
    }
}

/// Single realization, stand scale and even-aged management throughout
fn infinite_sequence_eligible(stands: &[StandObservation], realizations: usize) -> bool {
    realizations == 1
        && !stands.is_empty()
        && stands.iter().all(|s| {
            s.scale == ApplicationScale::Stand && s.management == ManagementType::EvenAged
        })
}

/// Append `rotations` copies of the trajectory, each shifted by the rotation length.
///
/// Every copy gets its own trajectory identifiers so that it forms new
/// time-table segments.
fn repeat_rotations(
    stands: Vec<StandObservation>,
    rotations: usize,
) -> RCATResult<Vec<StandObservation>> {
    let (first, last) = match (stands.first(), stands.last()) {
        (Some(first), Some(last)) => (first.year, last.year),
        _ => return Ok(stands),
    };
    let length = last - first;
    if length <= 0 {
        return Err(RCATError::TimeTable(
            "cannot repeat a trajectory spanning less than a year".to_string(),
        ));
    }
    let trajectories = stands.iter().map(|s| s.trajectory).max().unwrap_or(0) + 1;

    let mut repeated = stands.clone();
    for rotation in 1..=rotations {
        repeated.extend(stands.iter().map(|s| StandObservation {
            year: s.year + length * rotation as i32,
            trajectory: s.trajectory + trajectories * rotation,
            ..s.clone()
        }));
    }
    Ok(repeated)
}

#[cfg(test)]
mod tests;
