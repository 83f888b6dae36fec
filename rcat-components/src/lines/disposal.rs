//! Landfill and left-in-forest lines
//!
//! Both lines only hold terminal processors behind a sorting step:
//!
//! ```text
//! Disposal --> Degradable | Inert
//! Forest floor --(roots)--> Root decay
//!      \-> Dead wood sorting --(coniferous)--> Coniferous dead wood
//!                  \-> Broadleaved dead wood
//! ```

use rcat_core::carbon_unit::{BiomassType, UseClass};
use rcat_core::decay::{DecayFamily, DecayFunction};
use rcat_core::errors::RCATResult;
use rcat_core::processor::{ExtractionPredicate, Processor, ProcessorGraph};
use rcat_core::production::ProductionLine;
use rcat_core::stand::SpeciesType;
use rcat_core::time_table::FloatValue;
use serde::{Deserialize, Serialize};

pub const LANDFILL: &str = "Landfill";
pub const LEFT_IN_FOREST: &str = "Left in forest";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandfillSiteParameters {
    /// Share of the disposed wood that decomposes anaerobically
    /// unit: %
    ///
    /// Default: 23
    pub degradable_share: FloatValue,
    /// unit: yr
    ///
    /// Default: 14.5
    pub degradable_half_life: FloatValue,
    /// Wood that does not decompose is kept practically forever
    /// unit: yr
    ///
    /// Default: 10000
    pub inert_half_life: FloatValue,
    pub family: DecayFamily,
}

impl Default for LandfillSiteParameters {
    fn default() -> Self {
        Self {
            degradable_share: 23.0,
            degradable_half_life: 14.5,
            inert_half_life: 10000.0,
            family: DecayFamily::Exponential,
        }
    }
}

impl LandfillSiteParameters {
    pub fn line(&self) -> RCATResult<ProductionLine> {
        let mut graph = ProcessorGraph::new();
        let disposal = graph.add_processor(Processor::production("Disposal", UseClass::None));
        let degradable = graph.add_processor(
            Processor::landfill("Degradable", true)
                .with_decay(DecayFunction::from_half_life(self.family, self.degradable_half_life)?),
        );
        let inert = graph.add_processor(
            Processor::landfill("Inert", false)
                .with_decay(DecayFunction::from_half_life(self.family, self.inert_half_life)?),
        );
        graph.add_child(disposal, degradable, self.degradable_share)?;
        graph.add_child(disposal, inert, 100.0 - self.degradable_share)?;
        Ok(ProductionLine::new(LANDFILL, graph, disposal))
    }
}

/// Decay of the material left in the forest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestFloorParameters {
    /// unit: yr
    ///
    /// Default: 20
    pub coniferous_half_life: FloatValue,
    /// unit: yr
    ///
    /// Default: 12
    pub broadleaved_half_life: FloatValue,
    /// unit: yr
    ///
    /// Default: 10
    pub roots_half_life: FloatValue,
    pub family: DecayFamily,
}

impl Default for ForestFloorParameters {
    fn default() -> Self {
        Self {
            coniferous_half_life: 20.0,
            broadleaved_half_life: 12.0,
            roots_half_life: 10.0,
            family: DecayFamily::Exponential,
        }
    }
}

impl ForestFloorParameters {
    fn dead_wood(&self, name: &str, half_life: FloatValue) -> RCATResult<Processor> {
        Ok(Processor::left_in_forest(name)
            .with_decay(DecayFunction::from_half_life(self.family, half_life)?))
    }

    pub fn line(&self) -> RCATResult<ProductionLine> {
        let mut graph = ProcessorGraph::new();
        let floor = graph.add_processor(Processor::production("Forest floor", UseClass::None));
        let roots = graph.add_processor(Processor::extraction(
            "Roots",
            ExtractionPredicate::BiomassType(BiomassType::Roots),
        ));
        let root_decay = graph.add_processor(self.dead_wood("Root decay", self.roots_half_life)?);
        let sorting = graph.add_processor(Processor::production("Dead wood sorting", UseClass::None));
        let coniferous = graph.add_processor(Processor::extraction(
            "Coniferous",
            ExtractionPredicate::SpeciesType(SpeciesType::Coniferous),
        ));
        let coniferous_wood =
            graph.add_processor(self.dead_wood("Coniferous dead wood", self.coniferous_half_life)?);
        let broadleaved_wood = graph
            .add_processor(self.dead_wood("Broadleaved dead wood", self.broadleaved_half_life)?);

        graph.set_extraction(floor, roots)?;
        graph.add_child(roots, root_decay, 100.0)?;
        graph.add_child(floor, sorting, 100.0)?;
        graph.set_extraction(sorting, coniferous)?;
        graph.add_child(coniferous, coniferous_wood, 100.0)?;
        graph.add_child(sorting, broadleaved_wood, 100.0)?;

        Ok(ProductionLine::new(LEFT_IN_FOREST, graph, floor))
    }
}
