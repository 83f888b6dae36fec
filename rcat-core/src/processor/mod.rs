//! Processor graph: the network of processing steps units are routed through.
//!
//! Units enter a graph at a named processor and are split among children by
//! intake percentage until they reach a terminal processor, where they are
//! materialised as [`CarbonUnit`](crate::carbon_unit::CarbonUnit)s.

mod config;
mod graph;
mod node;
mod validation;

pub use config::{ChildConfig, ProcessorConfig, ProcessorGraphConfig};
pub use graph::{ProcessingContext, ProcessorGraph, ProcessorId, ProcessorLink};
pub use node::{ExtractionPredicate, Processor, ProcessorKind};
pub use validation::INTAKE_TOLERANCE;
