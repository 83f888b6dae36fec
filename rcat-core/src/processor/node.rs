//! Processor nodes.

use crate::amounts::{AmountMap, Element};
use crate::carbon_unit::{BiomassType, CarbonUnitStatus, ProcessUnit, UnitOrigin, UseClass};
use crate::decay::DecayFunction;
use crate::stand::{SpeciesType, TreeStatus};
use crate::time_table::FloatValue;
use serde::{Deserialize, Serialize};

/// Selects the units an extraction processor removes from the normal path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionPredicate {
    SpeciesType(SpeciesType),
    SpeciesName(String),
    TreeStatus(TreeStatus),
    BiomassType(BiomassType),
}

impl ExtractionPredicate {
    pub fn matches(&self, origin: &UnitOrigin) -> bool {
        match self {
            ExtractionPredicate::SpeciesType(species_type) => origin.species_type == *species_type,
            ExtractionPredicate::SpeciesName(name) => origin.species_name == *name,
            ExtractionPredicate::TreeStatus(status) => origin.tree_status == *status,
            ExtractionPredicate::BiomassType(biomass_type) => origin.biomass_type == *biomass_type,
        }
    }
}

/// What a processor does with the units it receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProcessorKind {
    /// Transformation step; as a leaf it yields end-use wood products
    Production {
        #[serde(default)]
        use_class: UseClass,
    },
    /// Landfill site. Always terminal.
    Landfill { degradable: bool },
    /// Material left to decay in the forest. Always terminal.
    LeftInForest,
    /// Side processor intercepting matching units before the normal split
    Extraction { predicate: ExtractionPredicate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub name: String,
    pub kind: ProcessorKind,
    /// Lifetime of the units materialised here when the processor is terminal
    pub decay: Option<DecayFunction>,
    /// Biomass of the reference functional unit
    /// unit: Mg
    pub functional_unit_biomass: FloatValue,
    /// Emissions of processing one functional unit
    /// unit: Mg CO2 eq
    pub emissions_per_functional_unit: FloatValue,
    /// Fossil emissions avoided by one functional unit of end product
    /// unit: Mg CO2 eq
    pub substitution_per_functional_unit: FloatValue,
    /// Location in a flow diagram, unused by the computation
    pub position: Option<(i32, i32)>,
}

impl Processor {
    pub fn new(name: impl Into<String>, kind: ProcessorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            decay: None,
            functional_unit_biomass: 0.0,
            emissions_per_functional_unit: 0.0,
            substitution_per_functional_unit: 0.0,
            position: None,
        }
    }

    pub fn production(name: impl Into<String>, use_class: UseClass) -> Self {
        Self::new(name, ProcessorKind::Production { use_class })
    }

    pub fn landfill(name: impl Into<String>, degradable: bool) -> Self {
        Self::new(name, ProcessorKind::Landfill { degradable })
    }

    pub fn left_in_forest(name: impl Into<String>) -> Self {
        Self::new(name, ProcessorKind::LeftInForest)
    }

    pub fn extraction(name: impl Into<String>, predicate: ExtractionPredicate) -> Self {
        Self::new(name, ProcessorKind::Extraction { predicate })
    }

    pub fn with_decay(mut self, decay: DecayFunction) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn with_emissions(
        mut self,
        functional_unit_biomass: FloatValue,
        emissions_per_functional_unit: FloatValue,
    ) -> Self {
        self.functional_unit_biomass = functional_unit_biomass;
        self.emissions_per_functional_unit = emissions_per_functional_unit;
        self
    }

    pub fn with_substitution(mut self, substitution_per_functional_unit: FloatValue) -> Self {
        self.substitution_per_functional_unit = substitution_per_functional_unit;
        self
    }

    /// Processors that can never acquire children
    pub fn is_terminal_kind(&self) -> bool {
        matches!(
            self.kind,
            ProcessorKind::Landfill { .. } | ProcessorKind::LeftInForest
        )
    }

    pub fn use_class(&self) -> UseClass {
        match self.kind {
            ProcessorKind::Production { use_class } => use_class,
            _ => UseClass::None,
        }
    }

    /// Status given to a unit that terminates at this processor.
    ///
    /// `None` for extraction processors, which can only redirect units.
    pub fn terminal_status_for(&self, unit: &ProcessUnit) -> Option<CarbonUnitStatus> {
        match self.kind {
            ProcessorKind::Production { .. } => {
                if unit.has_been(CarbonUnitStatus::EndUseWoodProduct) {
                    Some(CarbonUnitStatus::Recycled)
                } else {
                    Some(CarbonUnitStatus::EndUseWoodProduct)
                }
            }
            ProcessorKind::Landfill { degradable: true } => Some(CarbonUnitStatus::LandfillDegradable),
            ProcessorKind::Landfill { degradable: false } => {
                Some(CarbonUnitStatus::LandfillNonDegradable)
            }
            ProcessorKind::LeftInForest => Some(CarbonUnitStatus::DeadWood),
            ProcessorKind::Extraction { .. } => None,
        }
    }

    fn functional_units(&self, amounts: &AmountMap) -> Option<FloatValue> {
        if self.functional_unit_biomass <= 0.0 {
            return None;
        }
        Some(amounts.biomass() / self.functional_unit_biomass)
    }

    /// Add the emissions of processing `amounts` to its CO2-equivalent entry.
    pub fn add_processing_emissions(&self, amounts: &mut AmountMap) {
        if self.emissions_per_functional_unit == 0.0 {
            return;
        }
        if let Some(functional_units) = self.functional_units(amounts) {
            amounts.add(
                Element::EmissionsCO2Eq,
                functional_units * self.emissions_per_functional_unit,
            );
        }
    }

    /// Avoided emissions credited to `amounts` of end product
    pub fn substitution_for(&self, amounts: &AmountMap) -> FloatValue {
        self.functional_units(amounts)
            .map(|functional_units| functional_units * self.substitution_per_functional_unit)
            .unwrap_or(0.0)
    }
}
