//! The processor graph and the routing of process units through it.

use super::node::{Processor, ProcessorKind};
use crate::carbon_unit::{CarbonUnit, CarbonUnitStatus, ProcessUnit};
use crate::errors::{RCATError, RCATResult};
use crate::sensitivity::{SensitivityModifier, VariabilitySource};
use crate::time_table::FloatValue;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub type ProcessorId = NodeIndex;

/// Edges of the processor graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProcessorLink {
    /// The child receives this percentage of every incoming unit
    Child { percentage: FloatValue },
    /// Terminal output is redirected to the target processor
    EndOfLife,
    /// The target intercepts matching units before the split
    Extraction,
}

/// Per-realization information needed while routing units.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingContext<'a> {
    pub realization: usize,
    pub modifier: &'a dyn SensitivityModifier,
}

/// A directed graph of processors.
///
/// Child edges split units by percentage, end-of-life edges redirect the
/// output of a leaf and extraction edges attach a side processor.
/// Call [`ProcessorGraph::validate`] before routing units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorGraph {
    graph: Graph<Processor, ProcessorLink>,
}

impl ProcessorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_processor(&mut self, processor: Processor) -> ProcessorId {
        self.graph.add_node(processor)
    }

    pub fn processor(&self, id: ProcessorId) -> &Processor {
        &self.graph[id]
    }

    pub fn processor_mut(&mut self, id: ProcessorId) -> &mut Processor {
        &mut self.graph[id]
    }

    pub fn find(&self, name: &str) -> Option<ProcessorId> {
        self.graph
            .node_indices()
            .find(|id| self.graph[*id].name == name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn processor_ids(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.graph.node_indices()
    }

    pub(crate) fn inner(&self) -> &Graph<Processor, ProcessorLink> {
        &self.graph
    }

    /// Outgoing links of a processor in insertion order
    fn links(&self, id: ProcessorId) -> Vec<(EdgeIndex, ProcessorId, ProcessorLink)> {
        let mut links: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), *e.weight()))
            .collect();
        links.sort_by_key(|(edge, _, _)| *edge);
        links
    }

    /// Children of a processor with their intake percentages
    pub fn children(&self, id: ProcessorId) -> Vec<(ProcessorId, FloatValue)> {
        self.links(id)
            .into_iter()
            .filter_map(|(_, target, link)| match link {
                ProcessorLink::Child { percentage } => Some((target, percentage)),
                _ => None,
            })
            .collect()
    }

    pub fn has_children(&self, id: ProcessorId) -> bool {
        !self.children(id).is_empty()
    }

    pub fn end_of_life(&self, id: ProcessorId) -> Option<ProcessorId> {
        self.link_target(id, |link| matches!(link, ProcessorLink::EndOfLife))
    }

    pub fn extraction(&self, id: ProcessorId) -> Option<ProcessorId> {
        self.link_target(id, |link| matches!(link, ProcessorLink::Extraction))
    }

    fn link_target(
        &self,
        id: ProcessorId,
        predicate: impl Fn(&ProcessorLink) -> bool,
    ) -> Option<ProcessorId> {
        self.links(id)
            .into_iter()
            .find(|(_, _, link)| predicate(link))
            .map(|(_, target, _)| target)
    }

    fn remove_links(&mut self, id: ProcessorId, predicate: impl Fn(&ProcessorLink) -> bool) {
        let edges: Vec<EdgeIndex> = self
            .links(id)
            .into_iter()
            .filter(|(_, _, link)| predicate(link))
            .map(|(edge, _, _)| edge)
            .collect();
        // Removing in reverse keeps the remaining indices valid
        for edge in edges.into_iter().rev() {
            self.graph.remove_edge(edge);
        }
    }

    /// Attach `child` to `parent` with an intake percentage.
    pub fn add_child(
        &mut self,
        parent: ProcessorId,
        child: ProcessorId,
        percentage: FloatValue,
    ) -> RCATResult<()> {
        let processor = &self.graph[parent];
        if processor.is_terminal_kind() {
            return Err(RCATError::Configuration(format!(
                "processor '{}' is terminal and cannot have children",
                processor.name
            )));
        }
        if !percentage.is_finite() || percentage < 0.0 {
            return Err(RCATError::Configuration(format!(
                "invalid intake percentage {} from '{}' to '{}'",
                percentage, processor.name, self.graph[child].name
            )));
        }
        if self.end_of_life(parent).is_some() {
            return Err(RCATError::Configuration(format!(
                "processor '{}' has an end-of-life link and cannot have children",
                processor.name
            )));
        }
        self.graph
            .add_edge(parent, child, ProcessorLink::Child { percentage });
        Ok(())
    }

    /// Redirect the terminal output of `id` to `target`, replacing any previous link.
    pub fn set_end_of_life(&mut self, id: ProcessorId, target: ProcessorId) -> RCATResult<()> {
        if self.has_children(id) {
            return Err(RCATError::Configuration(format!(
                "processor '{}' has children and cannot have an end-of-life link",
                self.graph[id].name
            )));
        }
        if self.graph[id].is_terminal_kind() {
            return Err(RCATError::Configuration(format!(
                "processor '{}' is terminal and cannot have an end-of-life link",
                self.graph[id].name
            )));
        }
        self.remove_links(id, |link| matches!(link, ProcessorLink::EndOfLife));
        self.graph.add_edge(id, target, ProcessorLink::EndOfLife);
        Ok(())
    }

    /// Attach an extraction side processor to `id`, replacing any previous one.
    pub fn set_extraction(&mut self, id: ProcessorId, extractor: ProcessorId) -> RCATResult<()> {
        if !matches!(self.graph[extractor].kind, ProcessorKind::Extraction { .. }) {
            return Err(RCATError::Configuration(format!(
                "processor '{}' is not an extraction processor",
                self.graph[extractor].name
            )));
        }
        self.remove_links(id, |link| matches!(link, ProcessorLink::Extraction));
        self.graph.add_edge(id, extractor, ProcessorLink::Extraction);
        Ok(())
    }

    /// Route units entering at `entry` and return the materialised carbon units.
    pub fn process(
        &self,
        entry: ProcessorId,
        units: Vec<ProcessUnit>,
        context: &ProcessingContext,
    ) -> RCATResult<Vec<CarbonUnit>> {
        let mut output = vec![];
        let mut path = vec![];
        self.process_node(entry, units, context, &mut path, &mut output)?;
        Ok(output)
    }

    fn process_node(
        &self,
        id: ProcessorId,
        mut units: Vec<ProcessUnit>,
        context: &ProcessingContext,
        path: &mut Vec<ProcessorId>,
        output: &mut Vec<CarbonUnit>,
    ) -> RCATResult<()> {
        if let Some(position) = path.iter().position(|visited| *visited == id) {
            return Err(RCATError::GraphIntegrity {
                nodes: path[position..]
                    .iter()
                    .map(|n| self.graph[*n].name.clone())
                    .collect(),
            });
        }
        path.push(id);
        let processor = &self.graph[id];
        trace!(processor = %processor.name, units = units.len(), "processing");

        if let Some(extractor) = self.extraction(id) {
            let ProcessorKind::Extraction { predicate } = &self.graph[extractor].kind else {
                return Err(RCATError::Configuration(format!(
                    "processor '{}' is not an extraction processor",
                    self.graph[extractor].name
                )));
            };
            let (extracted, remaining): (Vec<_>, Vec<_>) = units
                .into_iter()
                .partition(|unit| predicate.matches(&unit.origin));
            if !extracted.is_empty() {
                self.process_node(extractor, extracted, context, path, output)?;
            }
            units = remaining;
        }

        let children = self.children(id);
        if units.is_empty() {
            // Nothing left after extraction
        } else if !children.is_empty() {
            for unit in units.iter_mut() {
                processor.add_processing_emissions(&mut unit.amounts);
            }
            for (child, percentage) in children {
                let portion = units.iter().map(|u| u.proportion(percentage)).collect();
                self.process_node(child, portion, context, path, output)?;
            }
        } else if let Some(target) = self.end_of_life(id) {
            for unit in units.iter_mut() {
                let status = self.terminal_status(processor, unit)?;
                unit.status_log.push(status);
            }
            self.process_node(target, units, context, path, output)?;
        } else {
            for unit in units {
                output.push(self.materialise(processor, unit, context)?);
            }
        }

        path.pop();
        Ok(())
    }

    fn terminal_status(
        &self,
        processor: &Processor,
        unit: &ProcessUnit,
    ) -> RCATResult<CarbonUnitStatus> {
        processor.terminal_status_for(unit).ok_or_else(|| {
            RCATError::Configuration(format!(
                "processor '{}' cannot be terminal",
                processor.name
            ))
        })
    }

    fn materialise(
        &self,
        processor: &Processor,
        unit: ProcessUnit,
        context: &ProcessingContext,
    ) -> RCATResult<CarbonUnit> {
        let status = self.terminal_status(processor, &unit)?;
        let decay = processor.decay.ok_or_else(|| {
            RCATError::Configuration(format!(
                "terminal processor '{}' has no lifetime",
                processor.name
            ))
        })?;
        let factor = context.modifier.modifier(
            VariabilitySource::Lifetime,
            context.realization,
            &processor.name,
        );
        let decay = if factor == 1.0 {
            decay
        } else {
            decay.scaled(factor)?
        };
        let substitution = processor.substitution_for(&unit.amounts);
        Ok(CarbonUnit::new(unit, status, decay, processor.use_class()).with_substitution(substitution))
    }
}
