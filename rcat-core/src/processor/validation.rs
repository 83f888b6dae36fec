//! Checks run once on a processor graph before any realization.

use super::graph::ProcessorGraph;
use super::node::ProcessorKind;
use crate::errors::{RCATError, RCATResult};
use petgraph::algo::tarjan_scc;

/// Absolute tolerance on the sum of child intake percentages
pub const INTAKE_TOLERANCE: f64 = 1e-12;

impl ProcessorGraph {
    /// Check the graph can be used to route units.
    ///
    /// Fails on the first problem found:
    /// - a loop over child, end-of-life and extraction links
    /// - a processor whose child intakes do not sum to 100%
    /// - a terminal processor without a lifetime
    /// - an extraction processor with nowhere to send its units
    pub fn validate(&self) -> RCATResult<()> {
        self.check_loops()?;

        for id in self.processor_ids() {
            let processor = self.processor(id);
            let children = self.children(id);

            if !children.is_empty() {
                let total: f64 = children.iter().map(|(_, p)| p).sum();
                if (total - 100.0).abs() > INTAKE_TOLERANCE {
                    return Err(RCATError::InvalidIntakeSum {
                        processor: processor.name.clone(),
                        total,
                    });
                }
                continue;
            }

            if let ProcessorKind::Extraction { .. } = processor.kind {
                return Err(RCATError::Configuration(format!(
                    "extraction processor '{}' has no children",
                    processor.name
                )));
            }
            if self.end_of_life(id).is_none() && processor.decay.is_none() {
                return Err(RCATError::Configuration(format!(
                    "terminal processor '{}' has no lifetime",
                    processor.name
                )));
            }
        }
        Ok(())
    }

    /// Report the processors involved in a loop, sorted by name.
    fn check_loops(&self) -> RCATResult<()> {
        let graph = self.inner();
        for component in tarjan_scc(graph) {
            let looping = component.len() > 1
                || component
                    .first()
                    .is_some_and(|n| graph.find_edge(*n, *n).is_some());
            if looping {
                let mut nodes: Vec<String> =
                    component.iter().map(|n| graph[*n].name.clone()).collect();
                nodes.sort();
                return Err(RCATError::GraphIntegrity { nodes });
            }
        }
        Ok(())
    }
}
