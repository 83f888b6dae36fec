//! Stand observations supplied by the stand provider.
//!
//! A stand trajectory is an ordered list of [`StandObservation`]s, one per
//! growth step or intervention. The core only reads the calendar year,
//! management metadata and the trees grouped by status; everything else about
//! a tree is passed through to the [`BiomassConverter`].

use crate::amounts::AmountMap;
use crate::errors::RCATResult;
use crate::time_table::{FloatValue, Year};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Status of a tree within a stand observation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TreeStatus {
    Alive,
    /// Harvested during the intervention that produced the observation
    Cut,
    /// Natural mortality
    Dead,
    Windfall,
}

impl TreeStatus {
    pub const ALL: [TreeStatus; 4] = [
        TreeStatus::Alive,
        TreeStatus::Cut,
        TreeStatus::Dead,
        TreeStatus::Windfall,
    ];
}

impl fmt::Display for TreeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpeciesType {
    Broadleaved,
    Coniferous,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementType {
    EvenAged,
    UnevenAged,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationScale {
    Stand,
    /// Forest management unit
    Fmu,
}

/// A tree (or a group of identical trees) as reported by the stand provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub sampling_unit_id: String,
    pub species_name: String,
    pub species_type: SpeciesType,
    /// Number of trees this record stands for (per hectare or per plot)
    pub number: FloatValue,
    /// Diameter at breast height
    /// unit: cm
    pub dbh_cm: FloatValue,
    /// Commercial volume of a single tree, over bark
    /// unit: m^3
    pub volume_m3: FloatValue,
    /// Production line that receives the harvested part of the tree.
    ///
    /// `None` routes to the default market line configured for the simulation.
    #[serde(default)]
    pub line: Option<String>,
}

/// One observation of a stand trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandObservation {
    pub year: Year,
    #[serde(default)]
    pub age: Option<u32>,
    pub management: ManagementType,
    pub scale: ApplicationScale,
    /// True if this observation is the result of an intervention (harvest)
    #[serde(default)]
    pub intervention: bool,
    /// Identifier of the underlying trajectory.
    ///
    /// Consecutive observations sharing a trajectory form one time-table segment.
    #[serde(default)]
    pub trajectory: usize,
    #[serde(default)]
    pub trees: BTreeMap<TreeStatus, Vec<TreeRecord>>,
}

impl StandObservation {
    pub fn new(year: Year, management: ManagementType, scale: ApplicationScale) -> Self {
        Self {
            year,
            age: None,
            management,
            scale,
            intervention: false,
            trajectory: 0,
            trees: BTreeMap::new(),
        }
    }

    pub fn with_trees(mut self, status: TreeStatus, trees: Vec<TreeRecord>) -> Self {
        self.trees.entry(status).or_default().extend(trees);
        self
    }

    pub fn trees(&self, status: TreeStatus) -> &[TreeRecord] {
        self.trees.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_trees(&self, status: TreeStatus) -> bool {
        !self.trees(status).is_empty()
    }

    /// A copy of this observation in which every living tree has been cut.
    ///
    /// Trees that were already cut, dead or windthrown at this observation
    /// were accounted for by the observation itself and are dropped.
    pub fn harvested(&self) -> Self {
        let mut stand = Self {
            trees: BTreeMap::new(),
            intervention: true,
            ..self.clone()
        };
        stand
            .trees
            .insert(TreeStatus::Cut, self.trees(TreeStatus::Alive).to_vec());
        stand
    }
}

/// Supplies the stand trajectory of every Monte-Carlo realization.
pub trait StandProvider: fmt::Debug + Send + Sync {
    /// Number of realizations; 1 for deterministic input.
    fn realization_count(&self) -> usize;

    /// The ordered stand observations of a realization.
    fn stands(&self, realization: usize) -> RCATResult<Vec<StandObservation>>;

    fn is_stochastic(&self) -> bool {
        self.realization_count() > 1
    }
}

/// Carbon-bearing amounts of a tree split into its above and below ground parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeBiomass {
    /// Stem and branches, bark excluded
    pub above_ground: AmountMap,
    #[serde(default)]
    pub bark: AmountMap,
    pub below_ground: AmountMap,
}

/// Converts a tree record into amounts (tree to wood piece conversion).
///
/// The amounts returned already account for `TreeRecord::number`.
pub trait BiomassConverter: fmt::Debug + Send + Sync {
    fn convert(&self, tree: &TreeRecord, stand: &StandObservation) -> RCATResult<TreeBiomass>;
}

/// Deterministic stand provider holding a single trajectory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticStandProvider {
    stands: Vec<StandObservation>,
}

impl StaticStandProvider {
    pub fn new(stands: Vec<StandObservation>) -> Self {
        Self { stands }
    }
}

impl StandProvider for StaticStandProvider {
    fn realization_count(&self) -> usize {
        1
    }

    fn stands(&self, _realization: usize) -> RCATResult<Vec<StandObservation>> {
        Ok(self.stands.clone())
    }
}
