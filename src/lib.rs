//! Carbon accounting for harvested wood.
//!
//! Re-exports the core engine and the reference components, and ties them
//! together in a [`SimulationConfig`] that can be read from a TOML file:
//!
//! ```toml
//! [settings]
//! rotations = 2
//!
//! [lines.default.market]
//! sawnwood_yield = 60.0
//!
//! [biomass.coniferous]
//! basic_density = 0.42
//! # ...
//!
//! [modifier]
//! type = "ConstantMultiplier"
//! source = "Lifetime"
//! factor = 1.2
//! ```

mod config;

pub use config::{LinesConfig, SimulationConfig};
pub use rcat_components as components;
pub use rcat_core;
