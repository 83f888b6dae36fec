use rcat_components::biomass::{BasicDensityConverter, BiomassParameters};
use rcat_components::lines::DefaultLineParameters;
use rcat_core::errors::RCATResult;
use rcat_core::manager::{CompartmentManager, SimulationSettings};
use rcat_core::production::{ProductionLineManager, ProductionLineManagerConfig};
use rcat_core::sensitivity::SensitivityModifier;
use rcat_core::stand::StandProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where the production lines come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinesConfig {
    /// The reference lines, possibly with other parameters
    Default(DefaultLineParameters),
    /// Lines described processor by processor
    Custom(ProductionLineManagerConfig),
}

impl Default for LinesConfig {
    fn default() -> Self {
        LinesConfig::Default(DefaultLineParameters::default())
    }
}

impl LinesConfig {
    pub fn build(&self) -> RCATResult<ProductionLineManager> {
        match self {
            LinesConfig::Default(parameters) => parameters.build(),
            LinesConfig::Custom(config) => config.build(),
        }
    }
}

/// Everything needed to run a simulation except the stands.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub settings: SimulationSettings,
    pub lines: LinesConfig,
    pub biomass: BiomassParameters,
    pub modifier: Option<Box<dyn SensitivityModifier>>,
}

impl SimulationConfig {
    pub fn from_toml(content: &str) -> RCATResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// A manager ready to be initialized with the stands of `provider`
    pub fn build(self, provider: Arc<dyn StandProvider>) -> RCATResult<CompartmentManager> {
        let lines = self.lines.build()?;
        let converter = BasicDensityConverter::from_parameters(self.biomass)?;
        let manager = CompartmentManager::new(self.settings, lines, provider, Arc::new(converter))?;
        Ok(match self.modifier {
            Some(modifier) => manager.with_modifier(Arc::from(modifier)),
            None => manager,
        })
    }
}
