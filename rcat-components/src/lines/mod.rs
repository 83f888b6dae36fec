//! Reference production lines
//!
//! [`DefaultLineParameters::build`] assembles a [`ProductionLineManager`] with
//! the [`SAWLOGS`], [`PULPWOOD`] and [`FIREWOOD`] market lines plus the
//! landfill and left-in-forest lines. Sawlogs is the default market line.

mod disposal;
mod market;

pub use disposal::{ForestFloorParameters, LandfillSiteParameters, LANDFILL, LEFT_IN_FOREST};
pub use market::{MarketParameters, ProductLifetimes, FIREWOOD, PULPWOOD, SAWLOGS};

use rcat_core::errors::RCATResult;
use rcat_core::production::ProductionLineManager;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultLineParameters {
    pub market: MarketParameters,
    pub landfill: LandfillSiteParameters,
    pub forest: ForestFloorParameters,
}

impl DefaultLineParameters {
    pub fn build(&self) -> RCATResult<ProductionLineManager> {
        let mut manager = ProductionLineManager::new(self.landfill.line()?, self.forest.line()?)
            .with_line(self.market.sawlog_line()?)
            .with_line(self.market.pulpwood_line()?)
            .with_line(self.market.firewood_line());
        manager.set_default_line(SAWLOGS)?;
        manager.validate()?;
        debug!(
            lines = manager.line_names().count(),
            "default production lines built"
        );
        Ok(manager)
    }
}

/// The reference lines with their default parameters
pub fn default_lines() -> RCATResult<ProductionLineManager> {
    DefaultLineParameters::default().build()
}
