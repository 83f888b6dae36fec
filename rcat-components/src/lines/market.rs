//! Market production lines
//!
//! The sawlog line debarks the logs and saws them into sawnwood and residues:
//!
//! ```text
//! Sawmill --(bark)--> Debarking --> Fuelwood
//!    |-- Sawnwood --> Construction, Furniture
//!    |            \-> Pallets --(end of life)--> Wood recovery --> Particleboard
//!    \-- Sawmill residues --> Particleboard, Paper, Fuelwood
//! ```
//!
//! The pulpwood line turns logs into paper and black liquor, and the firewood
//! line burns everything it receives.

use rcat_core::carbon_unit::{BiomassType, UseClass};
use rcat_core::decay::{DecayFamily, DecayFunction};
use rcat_core::errors::RCATResult;
use rcat_core::processor::{ExtractionPredicate, Processor, ProcessorGraph, ProcessorId};
use rcat_core::production::ProductionLine;
use rcat_core::time_table::FloatValue;
use serde::{Deserialize, Serialize};

pub const SAWLOGS: &str = "Sawlogs";
pub const PULPWOOD: &str = "Pulpwood";
pub const FIREWOOD: &str = "Firewood";

/// Half-lives of the end-use products
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductLifetimes {
    /// unit: yr
    ///
    /// Default: 35
    pub construction: FloatValue,
    /// unit: yr
    ///
    /// Default: 25
    pub furniture: FloatValue,
    /// Wood-based panels
    /// unit: yr
    ///
    /// Default: 25
    pub particleboard: FloatValue,
    /// unit: yr
    ///
    /// Default: 2
    pub paper: FloatValue,
    pub family: DecayFamily,
}

impl Default for ProductLifetimes {
    fn default() -> Self {
        Self {
            construction: 35.0,
            furniture: 25.0,
            particleboard: 25.0,
            paper: 2.0,
            family: DecayFamily::Exponential,
        }
    }
}

impl ProductLifetimes {
    fn decay(&self, half_life: FloatValue) -> RCATResult<DecayFunction> {
        DecayFunction::from_half_life(self.family, half_life)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParameters {
    pub lifetimes: ProductLifetimes,
    /// Share of the debarked logs ending as sawnwood
    /// unit: %
    ///
    /// Default: 55
    pub sawnwood_yield: FloatValue,
    /// Share of the sawnwood used in construction
    /// unit: %
    ///
    /// Default: 60
    pub construction_share: FloatValue,
    /// Share of the sawnwood used for furniture, the rest is made into pallets
    /// unit: %
    ///
    /// Default: 25
    pub furniture_share: FloatValue,
    /// Share of the pulpwood ending as paper, the rest is burnt as black liquor
    /// unit: %
    ///
    /// Default: 50
    pub pulp_yield: FloatValue,
    /// unit: Mg CO2 eq / Mg
    ///
    /// Default: 0.1
    pub sawing_emissions: FloatValue,
    /// unit: Mg CO2 eq / Mg
    ///
    /// Default: 0.4
    pub pulping_emissions: FloatValue,
    /// Fossil emissions avoided by burning wood instead of heating oil
    /// unit: Mg CO2 eq / Mg
    ///
    /// Default: 1.1
    pub energy_substitution: FloatValue,
}

impl Default for MarketParameters {
    fn default() -> Self {
        Self {
            lifetimes: ProductLifetimes::default(),
            sawnwood_yield: 55.0,
            construction_share: 60.0,
            furniture_share: 25.0,
            pulp_yield: 50.0,
            sawing_emissions: 0.1,
            pulping_emissions: 0.4,
            energy_substitution: 1.1,
        }
    }
}

impl MarketParameters {
    fn fuelwood(&self, name: &str) -> Processor {
        Processor::production(name, UseClass::Energy)
            .with_decay(DecayFunction::immediate(self.lifetimes.family))
            .with_emissions(1.0, 0.0)
            .with_substitution(self.energy_substitution)
    }

    fn product(&self, name: &str, use_class: UseClass, half_life: FloatValue) -> RCATResult<Processor> {
        Ok(Processor::production(name, use_class).with_decay(self.lifetimes.decay(half_life)?))
    }

    /// Attach a debarking step sending bark to `fuelwood`
    fn debark(
        &self,
        graph: &mut ProcessorGraph,
        entry: ProcessorId,
        fuelwood: ProcessorId,
    ) -> RCATResult<()> {
        let debarking = graph.add_processor(Processor::extraction(
            "Debarking",
            ExtractionPredicate::BiomassType(BiomassType::Bark),
        ));
        graph.add_child(debarking, fuelwood, 100.0)?;
        graph.set_extraction(entry, debarking)
    }

    pub fn sawlog_line(&self) -> RCATResult<ProductionLine> {
        let lifetimes = &self.lifetimes;
        let mut graph = ProcessorGraph::new();
        let sawmill = graph.add_processor(
            Processor::production("Sawmill", UseClass::None).with_emissions(1.0, self.sawing_emissions),
        );
        let sawnwood = graph.add_processor(Processor::production("Sawnwood", UseClass::None));
        let residues = graph.add_processor(Processor::production("Sawmill residues", UseClass::None));
        let construction = graph.add_processor(self.product(
            "Construction",
            UseClass::Construction,
            lifetimes.construction,
        )?);
        let furniture =
            graph.add_processor(self.product("Furniture", UseClass::Furniture, lifetimes.furniture)?);
        let particleboard = graph.add_processor(self.product(
            "Particleboard",
            UseClass::Industrial,
            lifetimes.particleboard,
        )?);
        let paper = graph.add_processor(self.product("Paper", UseClass::Paper, lifetimes.paper)?);
        let pallets = graph.add_processor(Processor::production("Pallets", UseClass::Packaging));
        let recovery = graph.add_processor(Processor::production("Wood recovery", UseClass::None));
        let fuelwood = graph.add_processor(self.fuelwood("Fuelwood"));

        self.debark(&mut graph, sawmill, fuelwood)?;
        graph.add_child(sawmill, sawnwood, self.sawnwood_yield)?;
        graph.add_child(sawmill, residues, 100.0 - self.sawnwood_yield)?;
        graph.add_child(sawnwood, construction, self.construction_share)?;
        graph.add_child(sawnwood, furniture, self.furniture_share)?;
        graph.add_child(
            sawnwood,
            pallets,
            100.0 - self.construction_share - self.furniture_share,
        )?;
        graph.add_child(residues, particleboard, 40.0)?;
        graph.add_child(residues, paper, 30.0)?;
        graph.add_child(residues, fuelwood, 30.0)?;
        graph.set_end_of_life(pallets, recovery)?;
        graph.add_child(recovery, particleboard, 100.0)?;

        Ok(ProductionLine::new(SAWLOGS, graph, sawmill))
    }

    pub fn pulpwood_line(&self) -> RCATResult<ProductionLine> {
        let mut graph = ProcessorGraph::new();
        let mill = graph.add_processor(
            Processor::production("Pulp mill", UseClass::None)
                .with_emissions(1.0, self.pulping_emissions),
        );
        let paper = graph.add_processor(self.product("Paper", UseClass::Paper, self.lifetimes.paper)?);
        let liquor = graph.add_processor(self.fuelwood("Black liquor"));
        let fuelwood = graph.add_processor(self.fuelwood("Fuelwood"));

        self.debark(&mut graph, mill, fuelwood)?;
        graph.add_child(mill, paper, self.pulp_yield)?;
        graph.add_child(mill, liquor, 100.0 - self.pulp_yield)?;

        Ok(ProductionLine::new(PULPWOOD, graph, mill))
    }

    pub fn firewood_line(&self) -> ProductionLine {
        let mut graph = ProcessorGraph::new();
        let entry = graph.add_processor(self.fuelwood("Firewood"));
        ProductionLine::new(FIREWOOD, graph, entry)
    }
}
