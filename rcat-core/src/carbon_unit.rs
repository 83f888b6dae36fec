//! Carbon units: discrete parcels of carbon-bearing mass.
//!
//! A [`ProcessUnit`] travels through the processor graph. When it reaches a
//! terminal processor it is materialised as a [`CarbonUnit`], which carries the
//! lifetime of the terminal processor. A carbon unit is actualized against the
//! [`TimeTable`] once per realization, producing the carbon retained at every
//! time index from its creation onward.

use crate::amounts::{AmountMap, Element};
use crate::decay::{DecayFamily, DecayFunction};
use crate::errors::{RCATError, RCATResult};
use crate::stand::{SpeciesType, TreeStatus};
use crate::time_table::{FloatValue, TimeTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Below this mass (Mg C) a unit is considered fully released.
pub const NEGLIGIBLE_MASS: FloatValue = 1e-12;

/// Status acquired by a unit when it reaches a terminal processor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CarbonUnitStatus {
    EndUseWoodProduct,
    /// End-use product made from material that already was an end-use product
    Recycled,
    LandfillDegradable,
    LandfillNonDegradable,
    /// Dead wood left to decay in the forest
    DeadWood,
}

impl CarbonUnitStatus {
    pub fn is_product(&self) -> bool {
        matches!(
            self,
            CarbonUnitStatus::EndUseWoodProduct | CarbonUnitStatus::Recycled
        )
    }

    pub fn is_landfill(&self) -> bool {
        matches!(
            self,
            CarbonUnitStatus::LandfillDegradable | CarbonUnitStatus::LandfillNonDegradable
        )
    }
}

impl fmt::Display for CarbonUnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BiomassType {
    Wood,
    Bark,
    Roots,
}

/// End use of a wood product.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UseClass {
    #[default]
    None,
    Energy,
    Paper,
    Construction,
    Furniture,
    Packaging,
    Industrial,
}

impl fmt::Display for UseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Where a parcel of carbon comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitOrigin {
    /// Time index at which the unit enters the flow network
    pub creation_index: usize,
    pub sampling_unit_id: String,
    pub species_name: String,
    pub species_type: SpeciesType,
    pub tree_status: TreeStatus,
    pub biomass_type: BiomassType,
}

/// A parcel of mass travelling through the processor graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessUnit {
    pub origin: UnitOrigin,
    pub amounts: AmountMap,
    /// Statuses acquired at previous terminal processors (end-of-life links)
    pub status_log: Vec<CarbonUnitStatus>,
}

impl ProcessUnit {
    pub fn new(origin: UnitOrigin, amounts: AmountMap) -> Self {
        Self {
            origin,
            amounts,
            status_log: vec![],
        }
    }

    /// A copy carrying `percentage` % of every amount
    pub fn proportion(&self, percentage: FloatValue) -> Self {
        Self {
            origin: self.origin.clone(),
            amounts: self.amounts.proportion(percentage),
            status_log: self.status_log.clone(),
        }
    }

    pub fn has_been(&self, status: CarbonUnitStatus) -> bool {
        self.status_log.contains(&status)
    }
}

/// Identity of a carbon unit before actualization.
///
/// Units sharing a key are interchangeable and can be merged by summing
/// their amounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CarbonUnitKey {
    origin: UnitOrigin,
    status_log: Vec<CarbonUnitStatus>,
    use_class: UseClass,
    family: DecayFamily,
    lifetime_bits: u64,
}

/// A materialised parcel of carbon with its own lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonUnit {
    origin: UnitOrigin,
    initial: AmountMap,
    status_log: Vec<CarbonUnitStatus>,
    current_status: CarbonUnitStatus,
    decay: DecayFunction,
    use_class: UseClass,
    /// Avoided fossil emissions attributed to this unit
    /// unit: Mg CO2 eq
    substitution: FloatValue,
    /// Retained carbon from the creation index to the end of the time table
    actualized: Option<Vec<FloatValue>>,
}

impl CarbonUnit {
    /// Materialise a process unit at a terminal processor.
    pub fn new(
        unit: ProcessUnit,
        status: CarbonUnitStatus,
        decay: DecayFunction,
        use_class: UseClass,
    ) -> Self {
        let mut status_log = unit.status_log;
        status_log.push(status);
        Self {
            origin: unit.origin,
            initial: unit.amounts,
            status_log,
            current_status: status,
            decay,
            use_class,
            substitution: 0.0,
            actualized: None,
        }
    }

    pub fn with_substitution(mut self, substitution: FloatValue) -> Self {
        self.substitution = substitution;
        self
    }

    pub fn origin(&self) -> &UnitOrigin {
        &self.origin
    }

    pub fn creation_index(&self) -> usize {
        self.origin.creation_index
    }

    pub fn species_name(&self) -> &str {
        &self.origin.species_name
    }

    pub fn initial_amounts(&self) -> &AmountMap {
        &self.initial
    }

    pub fn initial_carbon(&self) -> FloatValue {
        self.initial.carbon()
    }

    pub fn emissions(&self) -> FloatValue {
        self.initial.get(Element::EmissionsCO2Eq)
    }

    pub fn substitution(&self) -> FloatValue {
        self.substitution
    }

    pub fn status_log(&self) -> &[CarbonUnitStatus] {
        &self.status_log
    }

    pub fn current_status(&self) -> CarbonUnitStatus {
        self.current_status
    }

    pub fn decay(&self) -> &DecayFunction {
        &self.decay
    }

    pub fn use_class(&self) -> UseClass {
        self.use_class
    }

    pub fn key(&self) -> CarbonUnitKey {
        CarbonUnitKey {
            origin: self.origin.clone(),
            status_log: self.status_log.clone(),
            use_class: self.use_class,
            family: self.decay.family(),
            lifetime_bits: self.decay.mean_lifetime().to_bits(),
        }
    }

    /// Add the amounts of an equivalent unit to this one.
    pub fn merge(&mut self, other: &CarbonUnit) -> RCATResult<()> {
        if self.is_actualized() || other.is_actualized() {
            return Err(RCATError::State(
                "carbon units cannot be merged once actualized".to_string(),
            ));
        }
        if self.key() != other.key() {
            return Err(RCATError::State(format!(
                "cannot merge carbon units with different identities ({:?} and {:?})",
                self.origin, other.origin
            )));
        }
        self.initial.merge(&other.initial);
        self.substitution += other.substitution;
        Ok(())
    }

    pub fn is_actualized(&self) -> bool {
        self.actualized.is_some()
    }

    /// Compute the retained carbon at every index from creation to the end of the table.
    ///
    /// The decay between two consecutive indices is the ratio of the remaining
    /// fractions at the corresponding calendar ages, so irregular year spacing
    /// is handled exactly. Calling this again once actualized does nothing.
    pub fn actualize(&mut self, time_table: &TimeTable) -> RCATResult<()> {
        if self.is_actualized() {
            return Ok(());
        }
        let creation = self.creation_index();
        if creation >= time_table.len() {
            return Err(RCATError::State(format!(
                "carbon unit created at index {} lies outside a time table of {} indices",
                creation,
                time_table.len()
            )));
        }

        let mut carbon = Vec::with_capacity(time_table.len() - creation);
        carbon.push(self.initial_carbon());
        for i in (creation + 1)..time_table.len() {
            let previous = carbon[carbon.len() - 1];
            if previous.abs() < NEGLIGIBLE_MASS {
                carbon.push(0.0);
                continue;
            }
            let ratio = self.decay.decay_ratio(
                time_table.elapsed(creation, i - 1),
                time_table.elapsed(creation, i),
            );
            carbon.push(previous * ratio);
        }
        self.actualized = Some(carbon);
        Ok(())
    }

    fn actualized_series(&self) -> RCATResult<&[FloatValue]> {
        self.actualized.as_deref().ok_or_else(|| {
            RCATError::State(format!(
                "carbon unit created at index {} has not been actualized",
                self.creation_index()
            ))
        })
    }

    /// Retained carbon for each index from the creation index onward
    pub fn current_carbon_series(&self) -> RCATResult<&[FloatValue]> {
        self.actualized_series()
    }

    /// Carbon retained at a time index (0 before creation).
    pub fn current_carbon(&self, index: usize) -> RCATResult<FloatValue> {
        let series = self.actualized_series()?;
        match index.checked_sub(self.creation_index()) {
            Some(offset) => series.get(offset).copied().ok_or_else(|| {
                RCATError::State(format!("time index {} is out of range", index))
            }),
            None => Ok(0.0),
        }
    }

    /// Carbon released between `index - 1` and `index`.
    pub fn released_carbon(&self, index: usize) -> RCATResult<FloatValue> {
        if index <= self.creation_index() {
            self.actualized_series()?;
            return Ok(0.0);
        }
        Ok(self.current_carbon(index - 1)? - self.current_carbon(index)?)
    }
}

/// A collection of carbon units that merges equivalent units on insertion.
#[derive(Debug, Clone, Default)]
pub struct CarbonUnitList {
    units: Vec<CarbonUnit>,
    positions: HashMap<CarbonUnitKey, usize>,
}

impl CarbonUnitList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: CarbonUnit) -> RCATResult<()> {
        if unit.is_actualized() {
            self.units.push(unit);
            return Ok(());
        }
        let key = unit.key();
        match self.positions.get(&key) {
            Some(&position) => self.units[position].merge(&unit),
            None => {
                self.positions.insert(key, self.units.len());
                self.units.push(unit);
                Ok(())
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = CarbonUnit>>(&mut self, units: I) -> RCATResult<()> {
        for unit in units {
            self.add(unit)?;
        }
        Ok(())
    }

    pub fn actualize(&mut self, time_table: &TimeTable) -> RCATResult<()> {
        self.units
            .iter_mut()
            .try_for_each(|unit| unit.actualize(time_table))?;
        // Actualized units can no longer absorb new ones
        self.positions.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CarbonUnit> {
        self.units.iter()
    }

    pub fn into_vec(self) -> Vec<CarbonUnit> {
        self.units
    }

    pub fn initial_carbon(&self) -> FloatValue {
        self.units.iter().map(|u| u.initial_carbon()).sum()
    }
}
