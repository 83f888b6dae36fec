//! Carbon budget compartments.
//!
//! Leaf compartments are filled anew every realization, either from carbon
//! units or from a series computed elsewhere (standing biomass, cumulative
//! flows). Derived compartments are weighted sums of their fathers and never
//! hold units.

use crate::carbon_unit::{CarbonUnit, CarbonUnitStatus, UseClass};
use crate::errors::{RCATError, RCATResult};
use crate::production::{LandfillParameters, RoutedUnits, C_PER_CO2};
use crate::time_table::{FloatValue, TimeTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag of a compartment of the carbon budget.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompartmentInfo {
    /// Above-ground living biomass
    AbGround,
    /// Below-ground living biomass
    Roots,
    /// Dead wood decaying in the forest
    DeadBiomass,
    /// End-use wood products in use, recycled products included
    Products,
    LandfillDegradable,
    LandfillNonDegradable,
    /// Cumulative fossil emissions avoided by energy products
    EnergySubstitution,
    /// Cumulative emissions of the processing steps
    ProcessEmissions,
    /// Cumulative methane emissions of degradable landfill material
    LandfillEmissions,
    LivingBiomass,
    TotalProducts,
    NetSubstitution,
}

impl CompartmentInfo {
    /// Every compartment, fathers before their children
    pub const ALL: [CompartmentInfo; 12] = [
        CompartmentInfo::AbGround,
        CompartmentInfo::Roots,
        CompartmentInfo::DeadBiomass,
        CompartmentInfo::Products,
        CompartmentInfo::LandfillDegradable,
        CompartmentInfo::LandfillNonDegradable,
        CompartmentInfo::EnergySubstitution,
        CompartmentInfo::ProcessEmissions,
        CompartmentInfo::LandfillEmissions,
        CompartmentInfo::LivingBiomass,
        CompartmentInfo::TotalProducts,
        CompartmentInfo::NetSubstitution,
    ];

    /// Fathers of a derived compartment with the weight applied to each.
    ///
    /// Net substitution is positive when the product chain is a net source.
    pub fn fathers(&self) -> &'static [(CompartmentInfo, FloatValue)] {
        match self {
            CompartmentInfo::LivingBiomass => &[
                (CompartmentInfo::AbGround, 1.0),
                (CompartmentInfo::Roots, 1.0),
            ],
            CompartmentInfo::TotalProducts => &[
                (CompartmentInfo::Products, 1.0),
                (CompartmentInfo::LandfillDegradable, 1.0),
            ],
            CompartmentInfo::NetSubstitution => &[
                (CompartmentInfo::EnergySubstitution, -1.0),
                (CompartmentInfo::ProcessEmissions, 1.0),
                (CompartmentInfo::LandfillEmissions, 1.0),
                (CompartmentInfo::LandfillNonDegradable, -1.0),
            ],
            _ => &[],
        }
    }

    pub fn is_derived(&self) -> bool {
        !self.fathers().is_empty()
    }
}

impl fmt::Display for CompartmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct Compartment {
    info: CompartmentInfo,
    fathers: Vec<(CompartmentInfo, FloatValue)>,
    units: Vec<CarbonUnit>,
    carbon: Option<Vec<FloatValue>>,
}

impl Compartment {
    pub fn info(&self) -> CompartmentInfo {
        self.info
    }

    pub fn fathers(&self) -> &[(CompartmentInfo, FloatValue)] {
        &self.fathers
    }

    pub fn is_derived(&self) -> bool {
        !self.fathers.is_empty()
    }

    pub fn units(&self) -> &[CarbonUnit] {
        &self.units
    }

    pub fn is_compiled(&self) -> bool {
        self.carbon.is_some()
    }

    pub fn carbon(&self) -> RCATResult<&[FloatValue]> {
        self.carbon.as_deref().ok_or_else(|| {
            RCATError::State(format!("compartment {} holds no data", self.info))
        })
    }

    pub fn carbon_at_index(&self, index: usize) -> RCATResult<FloatValue> {
        self.carbon()?.get(index).copied().ok_or_else(|| {
            RCATError::State(format!(
                "time index {} is out of range for compartment {}",
                index, self.info
            ))
        })
    }
}

/// The compartments of a simulation in declaration order.
#[derive(Debug, Clone, Default)]
pub struct CompartmentSet {
    compartments: BTreeMap<CompartmentInfo, Compartment>,
    order: Vec<CompartmentInfo>,
}

impl CompartmentSet {
    /// The standard budget, see [`CompartmentInfo::ALL`].
    pub fn standard() -> RCATResult<Self> {
        let mut set = Self::default();
        for info in CompartmentInfo::ALL {
            set.declare(info, info.fathers().to_vec())?;
        }
        Ok(set)
    }

    /// Declare a compartment. Every father must already be declared.
    pub fn declare(
        &mut self,
        info: CompartmentInfo,
        fathers: Vec<(CompartmentInfo, FloatValue)>,
    ) -> RCATResult<()> {
        if self.compartments.contains_key(&info) {
            return Err(RCATError::Configuration(format!(
                "compartment {} is declared twice",
                info
            )));
        }
        if let Some((father, _)) = fathers
            .iter()
            .find(|(father, _)| !self.compartments.contains_key(father))
        {
            return Err(RCATError::Configuration(format!(
                "compartment {} is declared before its father {}",
                info, father
            )));
        }
        self.compartments.insert(
            info,
            Compartment {
                info,
                fathers,
                units: vec![],
                carbon: None,
            },
        );
        self.order.push(info);
        Ok(())
    }

    pub fn get(&self, info: CompartmentInfo) -> RCATResult<&Compartment> {
        self.compartments
            .get(&info)
            .ok_or_else(|| RCATError::State(format!("compartment {} is not declared", info)))
    }

    fn leaf_mut(&mut self, info: CompartmentInfo) -> RCATResult<&mut Compartment> {
        let compartment = self
            .compartments
            .get_mut(&info)
            .ok_or_else(|| RCATError::State(format!("compartment {} is not declared", info)))?;
        if compartment.is_derived() {
            return Err(RCATError::State(format!(
                "compartment {} is derived from its fathers and cannot be filled",
                info
            )));
        }
        Ok(compartment)
    }

    pub fn order(&self) -> &[CompartmentInfo] {
        &self.order
    }

    /// Drop every unit and series.
    pub fn reset_carbon(&mut self) {
        for compartment in self.compartments.values_mut() {
            compartment.units.clear();
            compartment.carbon = None;
        }
    }

    /// Attach actualized units to a leaf compartment.
    pub fn set_carbon_units(
        &mut self,
        info: CompartmentInfo,
        units: Vec<CarbonUnit>,
    ) -> RCATResult<()> {
        let compartment = self.leaf_mut(info)?;
        compartment.units = units;
        compartment.carbon = None;
        Ok(())
    }

    /// Set the series of a leaf compartment directly.
    pub fn set_carbon(&mut self, info: CompartmentInfo, carbon: Vec<FloatValue>) -> RCATResult<()> {
        let compartment = self.leaf_mut(info)?;
        compartment.units.clear();
        compartment.carbon = Some(carbon);
        Ok(())
    }

    /// Compute the series of every compartment.
    ///
    /// Leaf compartments without a series sum the retained carbon of their
    /// units; derived compartments are computed in declaration order.
    pub fn compile(&mut self, time_table: &TimeTable) -> RCATResult<()> {
        let length = time_table.len();
        for info in self.order.clone() {
            let carbon = match self.compartments.get(&info) {
                Some(compartment) if compartment.is_derived() => {
                    let mut carbon = vec![0.0; length];
                    for (father, weight) in &compartment.fathers {
                        let series = self.get(*father)?.carbon()?;
                        for (value, father_value) in carbon.iter_mut().zip(series) {
                            *value += weight * father_value;
                        }
                    }
                    carbon
                }
                Some(compartment) => match &compartment.carbon {
                    Some(carbon) if carbon.len() == length => continue,
                    Some(carbon) => {
                        return Err(RCATError::State(format!(
                            "compartment {} has {} values for a time table of {} indices",
                            info,
                            carbon.len(),
                            length
                        )))
                    }
                    None => stock(compartment.units.iter(), length)?,
                },
                None => continue,
            };
            if let Some(compartment) = self.compartments.get_mut(&info) {
                compartment.carbon = Some(carbon);
            }
        }
        Ok(())
    }

    pub fn carbon_at_index(&self, info: CompartmentInfo, index: usize) -> RCATResult<FloatValue> {
        self.get(info)?.carbon_at_index(index)
    }

    pub fn carbon(&self, info: CompartmentInfo) -> RCATResult<&[FloatValue]> {
        self.get(info)?.carbon()
    }
}

/// Retained carbon of `units` at every index.
///
/// A unit that has not been actualized yet only counts its initial carbon at
/// its creation index.
pub fn stock<'a>(
    units: impl Iterator<Item = &'a CarbonUnit>,
    length: usize,
) -> RCATResult<Vec<FloatValue>> {
    let mut carbon = vec![0.0; length];
    for unit in units {
        let creation = unit.creation_index();
        if creation >= length {
            return Err(RCATError::State(format!(
                "carbon unit created at index {} lies outside a time table of {} indices",
                creation, length
            )));
        }
        if !unit.is_actualized() {
            carbon[creation] += unit.initial_carbon();
            continue;
        }
        let series = unit.current_carbon_series()?;
        for (value, retained) in carbon[creation..].iter_mut().zip(series) {
            *value += retained;
        }
    }
    Ok(carbon)
}

/// Running sum of a per-index series
pub fn cumulative(mut values: Vec<FloatValue>) -> Vec<FloatValue> {
    let mut total = 0.0;
    for value in values.iter_mut() {
        total += *value;
        *value = total;
    }
    values
}

/// Cumulative flows of a realization, in Mg C equivalent.
#[derive(Debug, Clone, PartialEq)]
pub struct Flows {
    pub energy_substitution: Vec<FloatValue>,
    pub process_emissions: Vec<FloatValue>,
    pub landfill_emissions: Vec<FloatValue>,
}

impl Flows {
    /// Accumulate the flows attached to actualized units.
    pub fn from_units(
        routed: &RoutedUnits,
        length: usize,
        landfill: &LandfillParameters,
    ) -> RCATResult<Self> {
        let mut substitution = vec![0.0; length];
        let mut emissions = vec![0.0; length];
        let mut methane = vec![0.0; length];

        for unit in routed.iter() {
            let creation = unit.creation_index();
            if creation >= length {
                return Err(RCATError::State(format!(
                    "carbon unit created at index {} lies outside a time table of {} indices",
                    creation, length
                )));
            }
            substitution[creation] += unit.substitution() * C_PER_CO2;
            emissions[creation] += unit.emissions() * C_PER_CO2;

            if unit.current_status() == CarbonUnitStatus::LandfillDegradable {
                for (index, value) in methane.iter_mut().enumerate().skip(creation + 1) {
                    *value += landfill.methane_emissions(unit.released_carbon(index)?) * C_PER_CO2;
                }
            }
        }

        Ok(Self {
            energy_substitution: cumulative(substitution),
            process_emissions: cumulative(emissions),
            landfill_emissions: cumulative(methane),
        })
    }
}

/// Retained carbon of end-use products per use class and species.
pub fn product_breakdown(
    routed: &RoutedUnits,
    length: usize,
) -> RCATResult<BTreeMap<(UseClass, String), Vec<FloatValue>>> {
    let mut breakdown: BTreeMap<(UseClass, String), Vec<FloatValue>> = BTreeMap::new();
    for unit in routed.iter().filter(|u| u.current_status().is_product()) {
        let series = breakdown
            .entry((unit.use_class(), unit.species_name().to_string()))
            .or_insert_with(|| vec![0.0; length]);
        let retained = stock(std::iter::once(unit), length)?;
        for (value, unit_value) in series.iter_mut().zip(retained) {
            *value += unit_value;
        }
    }
    Ok(breakdown)
}
