//! Reference tree to wood-piece conversion
//!
//! Converts the commercial volume of a tree into amounts using a basic density
//! and expansion factors per species type:
//!
//! $$ V_{above} = V_{stem} \cdot BEF $$
//! $$ B_{above} = V_{above} \cdot \rho, \quad B_{below} = B_{above} \cdot R $$
//! $$ C = B \cdot CF $$
//!
//! Where:
//! - $BEF$ is the branch expansion factor
//! - $\rho$ is the basic density of the wood
//! - $R$ is the root-to-shoot ratio
//! - $CF$ is the carbon content of the dry biomass

use rcat_core::amounts::{AmountMap, Element};
use rcat_core::errors::{RCATError, RCATResult};
use rcat_core::stand::{BiomassConverter, SpeciesType, StandObservation, TreeBiomass, TreeRecord};
use rcat_core::time_table::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Conversion factors of a group of species
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParameters {
    /// Dry mass per unit of green volume
    /// unit: Mg / m^3
    pub basic_density: FloatValue,
    /// Ratio of the above-ground volume to the commercial volume
    /// unit: dimensionless
    pub branch_expansion: FloatValue,
    /// Share of the above-ground volume that is bark
    /// unit: dimensionless
    pub bark_fraction: FloatValue,
    /// Ratio of the below-ground to the above-ground biomass
    /// unit: dimensionless
    pub root_to_shoot: FloatValue,
    /// unit: Mg C / Mg
    pub carbon_content: FloatValue,
    /// unit: Mg N / Mg
    pub nitrogen_content: FloatValue,
}

impl SpeciesParameters {
    pub const BROADLEAVED: SpeciesParameters = SpeciesParameters {
        basic_density: 0.56,
        branch_expansion: 1.4,
        bark_fraction: 0.1,
        root_to_shoot: 0.24,
        carbon_content: 0.488,
        nitrogen_content: 0.002,
    };

    pub const CONIFEROUS: SpeciesParameters = SpeciesParameters {
        basic_density: 0.4,
        branch_expansion: 1.3,
        bark_fraction: 0.12,
        root_to_shoot: 0.22,
        carbon_content: 0.508,
        nitrogen_content: 0.0015,
    };

    fn validate(&self, group: &str) -> RCATResult<()> {
        let values = [
            self.basic_density,
            self.branch_expansion,
            self.bark_fraction,
            self.root_to_shoot,
            self.carbon_content,
            self.nitrogen_content,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) || self.bark_fraction > 1.0 {
            return Err(RCATError::Configuration(format!(
                "invalid biomass parameters for {}",
                group
            )));
        }
        Ok(())
    }

    fn amounts(&self, volume: FloatValue) -> AmountMap {
        if volume <= 0.0 {
            return AmountMap::new();
        }
        let biomass = volume * self.basic_density;
        AmountMap::new()
            .with(Element::Volume, volume)
            .with(Element::Biomass, biomass)
            .with(Element::Carbon, biomass * self.carbon_content)
            .with(Element::Nitrogen, biomass * self.nitrogen_content)
    }
}

/// Parameters of the [`BasicDensityConverter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomassParameters {
    pub broadleaved: SpeciesParameters,
    pub coniferous: SpeciesParameters,
    /// Overrides for individual species, keyed by species name
    pub species: BTreeMap<String, SpeciesParameters>,
}

impl Default for BiomassParameters {
    fn default() -> Self {
        Self {
            broadleaved: SpeciesParameters::BROADLEAVED,
            coniferous: SpeciesParameters::CONIFEROUS,
            species: BTreeMap::new(),
        }
    }
}

impl BiomassParameters {
    pub fn for_tree(&self, tree: &TreeRecord) -> &SpeciesParameters {
        self.species
            .get(&tree.species_name)
            .unwrap_or(match tree.species_type {
                SpeciesType::Broadleaved => &self.broadleaved,
                SpeciesType::Coniferous => &self.coniferous,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicDensityConverter {
    parameters: BiomassParameters,
}

impl BasicDensityConverter {
    pub fn from_parameters(parameters: BiomassParameters) -> RCATResult<Self> {
        parameters.broadleaved.validate("broadleaved species")?;
        parameters.coniferous.validate("coniferous species")?;
        for (name, species) in &parameters.species {
            species.validate(name)?;
        }
        Ok(Self { parameters })
    }

    pub fn parameters(&self) -> &BiomassParameters {
        &self.parameters
    }
}

impl Default for BasicDensityConverter {
    fn default() -> Self {
        Self {
            parameters: BiomassParameters::default(),
        }
    }
}

impl BiomassConverter for BasicDensityConverter {
    fn convert(&self, tree: &TreeRecord, _stand: &StandObservation) -> RCATResult<TreeBiomass> {
        if !(tree.volume_m3 >= 0.0 && tree.number >= 0.0) {
            return Err(RCATError::Configuration(format!(
                "tree of species {} in sampling unit {} has a negative volume or number",
                tree.species_name, tree.sampling_unit_id
            )));
        }
        let parameters = self.parameters.for_tree(tree);
        let above_ground = tree.volume_m3 * tree.number * parameters.branch_expansion;
        let bark = above_ground * parameters.bark_fraction;
        // Roots are assumed to share the density of the stem
        let below_ground = above_ground * parameters.root_to_shoot;

        Ok(TreeBiomass {
            above_ground: parameters.amounts(above_ground - bark),
            bark: parameters.amounts(bark),
            below_ground: parameters.amounts(below_ground),
        })
    }
}
