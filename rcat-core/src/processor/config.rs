//! Serialisable description of a processor graph.
//!
//! Processors reference each other by name. For example, in TOML:
//!
//! ```toml
//! [[processors]]
//! name = "Sawmill"
//! kind = { type = "Production" }
//! functional_unit_biomass = 1.0
//! emissions_per_functional_unit = 0.05
//! children = [
//!     { name = "Lumber", percentage = 60.0 },
//!     { name = "Residues", percentage = 40.0 },
//! ]
//!
//! [[processors]]
//! name = "Lumber"
//! kind = { type = "Production", use_class = "Construction" }
//! decay = { mode = "HalfLife", value = 35.0 }
//! ```

use super::graph::{ProcessorGraph, ProcessorId};
use super::node::{Processor, ProcessorKind};
use crate::decay::DecayFunction;
use crate::errors::{RCATError, RCATResult};
use crate::time_table::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildConfig {
    pub name: String,
    pub percentage: FloatValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    pub name: String,
    pub kind: ProcessorKind,
    #[serde(default)]
    pub decay: Option<DecayFunction>,
    #[serde(default)]
    pub functional_unit_biomass: FloatValue,
    #[serde(default)]
    pub emissions_per_functional_unit: FloatValue,
    #[serde(default)]
    pub substitution_per_functional_unit: FloatValue,
    #[serde(default)]
    pub children: Vec<ChildConfig>,
    #[serde(default)]
    pub end_of_life: Option<String>,
    #[serde(default)]
    pub extraction: Option<String>,
    #[serde(default)]
    pub position: Option<(i32, i32)>,
}

impl ProcessorConfig {
    fn processor(&self) -> Processor {
        Processor {
            name: self.name.clone(),
            kind: self.kind.clone(),
            decay: self.decay,
            functional_unit_biomass: self.functional_unit_biomass,
            emissions_per_functional_unit: self.emissions_per_functional_unit,
            substitution_per_functional_unit: self.substitution_per_functional_unit,
            position: self.position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorGraphConfig {
    pub processors: Vec<ProcessorConfig>,
}

impl ProcessorGraphConfig {
    pub fn from_toml(content: &str) -> RCATResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build and validate the graph.
    pub fn build(&self) -> RCATResult<ProcessorGraph> {
        let mut graph = ProcessorGraph::new();
        let mut ids: HashMap<&str, ProcessorId> = HashMap::new();

        for config in &self.processors {
            if ids.contains_key(config.name.as_str()) {
                return Err(RCATError::Configuration(format!(
                    "processor '{}' is declared more than once",
                    config.name
                )));
            }
            let id = graph.add_processor(config.processor());
            ids.insert(config.name.as_str(), id);
        }

        let lookup = |name: &str, referrer: &str| {
            ids.get(name).copied().ok_or_else(|| {
                RCATError::Configuration(format!(
                    "processor '{}' refers to unknown processor '{}'",
                    referrer, name
                ))
            })
        };

        for config in &self.processors {
            let id = lookup(&config.name, &config.name)?;
            for child in &config.children {
                graph.add_child(id, lookup(&child.name, &config.name)?, child.percentage)?;
            }
            if let Some(target) = &config.end_of_life {
                graph.set_end_of_life(id, lookup(target, &config.name)?)?;
            }
            if let Some(extractor) = &config.extraction {
                graph.set_extraction(id, lookup(extractor, &config.name)?)?;
            }
        }

        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbon_unit::UseClass;
    use is_close::is_close;

    const SAWMILL: &str = r#"
[[processors]]
name = "Sawmill"
kind = { type = "Production" }
functional_unit_biomass = 1.0
emissions_per_functional_unit = 0.05
children = [
    { name = "Lumber", percentage = 60.0 },
    { name = "Residues", percentage = 40.0 },
]
extraction = "Bark"

[[processors]]
name = "Lumber"
kind = { type = "Production", use_class = "Construction" }
decay = { mode = "HalfLife", value = 35.0 }
end_of_life = "Landfill"

[[processors]]
name = "Residues"
kind = { type = "Production", use_class = "Energy" }
decay = { mode = "Average", value = 0.0 }
functional_unit_biomass = 1.0
substitution_per_functional_unit = 0.5

[[processors]]
name = "Bark"
kind = { type = "Extraction", predicate = { BiomassType = "Bark" } }
children = [{ name = "Residues", percentage = 100.0 }]

[[processors]]
name = "Landfill"
kind = { type = "Landfill", degradable = true }
decay = { mode = "HalfLife", value = 20.0, family = "Exponential" }
"#;

    #[test]
    fn loads_from_toml() {
        let graph = ProcessorGraphConfig::from_toml(SAWMILL)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(graph.len(), 5);

        let sawmill = graph.find("Sawmill").unwrap();
        let children = graph.children(sawmill);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], (graph.find("Lumber").unwrap(), 60.0));

        let lumber = graph.processor(graph.find("Lumber").unwrap());
        assert_eq!(lumber.use_class(), UseClass::Construction);
        assert!(is_close!(lumber.decay.unwrap().half_life(), 35.0));

        assert_eq!(
            graph.end_of_life(graph.find("Lumber").unwrap()),
            graph.find("Landfill")
        );
        assert_eq!(graph.extraction(sawmill), graph.find("Bark"));
    }

    #[test]
    fn unknown_reference() {
        let config = ProcessorGraphConfig {
            processors: vec![ProcessorConfig {
                name: "Sawmill".to_string(),
                kind: ProcessorKind::Production {
                    use_class: UseClass::None,
                },
                decay: None,
                functional_unit_biomass: 0.0,
                emissions_per_functional_unit: 0.0,
                substitution_per_functional_unit: 0.0,
                children: vec![ChildConfig {
                    name: "Missing".to_string(),
                    percentage: 100.0,
                }],
                end_of_life: None,
                extraction: None,
                position: None,
            }],
        };
        assert!(matches!(config.build(), Err(RCATError::Configuration(_))));
    }

    #[test]
    fn negative_lifetime_fails_to_load() {
        let content = r#"
[[processors]]
name = "Lumber"
kind = { type = "Production" }
decay = { mode = "Average", value = -4.0 }
"#;
        assert!(matches!(
            ProcessorGraphConfig::from_toml(content),
            Err(RCATError::Serialization(_))
        ));
    }

    #[test]
    fn duplicate_names() {
        let content = r#"
[[processors]]
name = "Lumber"
kind = { type = "LeftInForest" }
decay = { mode = "Average", value = 4.0 }

[[processors]]
name = "Lumber"
kind = { type = "LeftInForest" }
decay = { mode = "Average", value = 4.0 }
"#;
        let config = ProcessorGraphConfig::from_toml(content).unwrap();
        assert!(matches!(config.build(), Err(RCATError::Configuration(_))));
    }
}
