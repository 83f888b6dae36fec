//! The ordered steps of a realization.

use super::registry::{RegisteredTree, TreeKey};
use super::CompartmentManager;
use crate::amounts::{AmountMap, Element};
use crate::carbon_unit::{BiomassType, CarbonUnitStatus, UnitOrigin};
use crate::compartment::{product_breakdown, CompartmentInfo, Flows};
use crate::errors::RCATResult;
use crate::estimator::SimulationResult;
use crate::interpolate::fill_segment_gaps;
use crate::processor::ProcessingContext;
use crate::production::{LineTarget, WoodPiece};
use crate::sensitivity::VariabilitySource;
use crate::stand::{StandObservation, TreeBiomass, TreeStatus};
use crate::time_table::{FloatValue, TimeTable};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimulationTask {
    ResetCompartments,
    RegisterTrees,
    RouteAndGenerateUnits,
    ActualizeCarbon,
    CompileCompartments,
}

impl SimulationTask {
    /// Tasks in execution order
    pub const ALL: [SimulationTask; 5] = [
        SimulationTask::ResetCompartments,
        SimulationTask::RegisterTrees,
        SimulationTask::RouteAndGenerateUnits,
        SimulationTask::ActualizeCarbon,
        SimulationTask::CompileCompartments,
    ];
}

impl CompartmentManager {
    pub(super) fn run_realization(
        &mut self,
        realization: usize,
        time_table: &TimeTable,
    ) -> RCATResult<SimulationResult> {
        let stands = self.realization_stands(realization, time_table)?;
        for task in SimulationTask::ALL {
            debug!(realization, ?task, "starting task");
            match task {
                SimulationTask::ResetCompartments => self.reset_compartments(),
                SimulationTask::RegisterTrees => {
                    self.register_trees(realization, &stands, time_table)?
                }
                SimulationTask::RouteAndGenerateUnits => self.route_trees(realization)?,
                SimulationTask::ActualizeCarbon => self.actualize_carbon(realization, time_table)?,
                SimulationTask::CompileCompartments => self.compile_compartments(time_table)?,
            }
        }
        self.collect_result(time_table)
    }

    fn reset_compartments(&mut self) {
        self.compartments.reset_carbon();
        self.trees.clear();
        self.routed.clear();
    }

    fn register_trees(
        &mut self,
        realization: usize,
        stands: &[StandObservation],
        time_table: &TimeTable,
    ) -> RCATResult<()> {
        for (position, stand) in stands.iter().enumerate() {
            let Some(index) = time_table.index_of_stand(position) else {
                continue;
            };
            for (status, records) in &stand.trees {
                for record in records {
                    let mut biomass = self.converter.convert(record, stand)?;
                    let factor = self.modifier.modifier(
                        VariabilitySource::CarbonContent,
                        realization,
                        &record.species_name,
                    );
                    if factor != 1.0 {
                        scale_carbon(&mut biomass, factor);
                    }
                    self.trees.register(
                        TreeKey {
                            status: *status,
                            index,
                            sampling_unit_id: record.sampling_unit_id.clone(),
                            species_name: record.species_name.clone(),
                        },
                        RegisteredTree {
                            record: record.clone(),
                            biomass,
                        },
                    );
                }
            }
        }
        debug!(trees = self.trees.len(), "trees registered");
        Ok(())
    }

    fn route_trees(&mut self, realization: usize) -> RCATResult<()> {
        let mut pieces = vec![];
        for (key, trees) in self.trees.sorted() {
            if key.status == TreeStatus::Alive {
                continue;
            }
            for tree in trees {
                let above_ground_target = match key.status {
                    TreeStatus::Cut => self.lines.market_target(tree.record.line.as_deref())?,
                    _ => LineTarget::LeftInForest,
                };
                let origin = |biomass_type| UnitOrigin {
                    creation_index: key.index,
                    sampling_unit_id: key.sampling_unit_id.clone(),
                    species_name: key.species_name.clone(),
                    species_type: tree.record.species_type,
                    tree_status: key.status,
                    biomass_type,
                };
                let parts = [
                    (BiomassType::Wood, &tree.biomass.above_ground, above_ground_target.clone()),
                    (BiomassType::Bark, &tree.biomass.bark, above_ground_target),
                    (BiomassType::Roots, &tree.biomass.below_ground, LineTarget::LeftInForest),
                ];
                for (biomass_type, amounts, target) in parts {
                    if amounts.is_empty() {
                        continue;
                    }
                    pieces.push(WoodPiece {
                        origin: origin(biomass_type),
                        amounts: amounts.clone(),
                        target,
                    });
                }
            }
        }

        let context = ProcessingContext {
            realization,
            modifier: self.modifier.as_ref(),
        };
        self.lines.route(pieces, &context, &mut self.routed)?;
        debug!(units = self.routed.len(), "carbon units generated");
        Ok(())
    }

    fn actualize_carbon(&mut self, realization: usize, time_table: &TimeTable) -> RCATResult<()> {
        self.routed.actualize(time_table)?;
        if self.settings.dispose_to_landfill {
            let context = ProcessingContext {
                realization,
                modifier: self.modifier.as_ref(),
            };
            self.lines
                .dispose_to_landfill(&mut self.routed, time_table, &context)?;
        }
        Ok(())
    }

    /// Carbon of living trees at observed indices, interpolated in between
    fn living_biomass(
        &self,
        time_table: &TimeTable,
        part: impl Fn(&TreeBiomass) -> FloatValue,
    ) -> Vec<FloatValue> {
        let mut known: BTreeMap<usize, FloatValue> =
            time_table.observed_indices().map(|i| (i, 0.0)).collect();
        for (key, trees) in self.trees.sorted() {
            if key.status != TreeStatus::Alive {
                continue;
            }
            let carbon: FloatValue = trees.iter().map(|t| part(&t.biomass)).sum();
            *known.entry(key.index).or_insert(0.0) += carbon;
        }
        fill_segment_gaps(time_table, &known)
    }

    fn compile_compartments(&mut self, time_table: &TimeTable) -> RCATResult<()> {
        let above_ground =
            self.living_biomass(time_table, |b| b.above_ground.carbon() + b.bark.carbon());
        let roots = self.living_biomass(time_table, |b| b.below_ground.carbon());
        self.compartments
            .set_carbon(CompartmentInfo::AbGround, above_ground)?;
        self.compartments.set_carbon(CompartmentInfo::Roots, roots)?;

        let stocks = [
            (CompartmentInfo::DeadBiomass, vec![CarbonUnitStatus::DeadWood]),
            (
                CompartmentInfo::Products,
                vec![CarbonUnitStatus::EndUseWoodProduct, CarbonUnitStatus::Recycled],
            ),
            (
                CompartmentInfo::LandfillDegradable,
                vec![CarbonUnitStatus::LandfillDegradable],
            ),
            (
                CompartmentInfo::LandfillNonDegradable,
                vec![CarbonUnitStatus::LandfillNonDegradable],
            ),
        ];
        for (info, statuses) in stocks {
            let units = statuses
                .iter()
                .flat_map(|status| self.routed.units(*status))
                .cloned()
                .collect();
            self.compartments.set_carbon_units(info, units)?;
        }

        let flows = Flows::from_units(&self.routed, time_table.len(), &self.settings.landfill)?;
        self.compartments
            .set_carbon(CompartmentInfo::EnergySubstitution, flows.energy_substitution)?;
        self.compartments
            .set_carbon(CompartmentInfo::ProcessEmissions, flows.process_emissions)?;
        self.compartments
            .set_carbon(CompartmentInfo::LandfillEmissions, flows.landfill_emissions)?;

        self.compartments.compile(time_table)
    }

    fn collect_result(&self, time_table: &TimeTable) -> RCATResult<SimulationResult> {
        let mut compartments = BTreeMap::new();
        for info in self.compartments.order() {
            compartments.insert(*info, self.compartments.carbon(*info)?.to_vec());
        }
        Ok(SimulationResult {
            compartments,
            products: product_breakdown(&self.routed, time_table.len())?,
        })
    }
}

fn scale_carbon(biomass: &mut TreeBiomass, factor: FloatValue) {
    for amounts in [
        &mut biomass.above_ground,
        &mut biomass.bark,
        &mut biomass.below_ground,
    ] {
        scale_element(amounts, Element::Carbon, factor);
    }
}

fn scale_element(amounts: &mut AmountMap, element: Element, factor: FloatValue) {
    let value = amounts.get(element);
    if value != 0.0 {
        amounts.set(element, value * factor);
    }
}
