use super::*;
use crate::amounts::{AmountMap, Element};
use crate::carbon_unit::UseClass;
use crate::compartment::CompartmentInfo;
use crate::decay::{DecayFamily, DecayFunction};
use crate::processor::{Processor, ProcessorGraph};
use crate::production::ProductionLine;
use crate::stand::{SpeciesType, StaticStandProvider, TreeBiomass, TreeRecord};
use approx::assert_relative_eq;
use std::sync::atomic::AtomicUsize;
use std::sync::OnceLock;

/// Carbon is a quarter of the volume, roots a fifth of the above-ground part
#[derive(Debug)]
struct QuarterCarbon;

impl BiomassConverter for QuarterCarbon {
    fn convert(&self, tree: &TreeRecord, _stand: &StandObservation) -> RCATResult<TreeBiomass> {
        let volume = tree.volume_m3 * tree.number;
        let above_ground = AmountMap::new()
            .with(Element::Volume, volume)
            .with(Element::Biomass, volume * 0.5)
            .with(Element::Carbon, volume * 0.25);
        Ok(TreeBiomass {
            below_ground: above_ground.scaled(0.2),
            above_ground,
            bark: AmountMap::new(),
        })
    }
}

fn decay(mean_lifetime: f64) -> DecayFunction {
    DecayFunction::from_mean_lifetime(DecayFamily::Exponential, mean_lifetime).unwrap()
}

fn lines() -> ProductionLineManager {
    let mut sawmill = ProcessorGraph::new();
    let entry = sawmill.add_processor(Processor::production("Sawmill", UseClass::None));
    let lumber = sawmill
        .add_processor(Processor::production("Lumber", UseClass::Construction).with_decay(decay(10.0)));
    let fuel = sawmill.add_processor(
        Processor::production("Fuel", UseClass::Energy)
            .with_decay(decay(0.0))
            .with_emissions(1.0, 0.0)
            .with_substitution(0.1),
    );
    sawmill.add_child(entry, lumber, 60.0).unwrap();
    sawmill.add_child(entry, fuel, 40.0).unwrap();

    let mut landfill = ProcessorGraph::new();
    let site =
        landfill.add_processor(Processor::landfill("Site", true).with_decay(decay(20.0)));
    let mut forest = ProcessorGraph::new();
    let floor =
        forest.add_processor(Processor::left_in_forest("Floor").with_decay(decay(5.0)));

    let mut manager = ProductionLineManager::new(
        ProductionLine::new("Landfill", landfill, site),
        ProductionLine::new("Forest", forest, floor),
    )
    .with_line(ProductionLine::new("Sawmill", sawmill, entry));
    manager.set_default_line("Sawmill").unwrap();
    manager
}

fn trees(volume_m3: f64, number: f64) -> Vec<TreeRecord> {
    vec![TreeRecord {
        sampling_unit_id: "plot".to_string(),
        species_name: "Picea abies".to_string(),
        species_type: SpeciesType::Coniferous,
        number,
        dbh_cm: 30.0,
        volume_m3,
        line: None,
    }]
}

fn stand(year: i32) -> StandObservation {
    StandObservation::new(year, ManagementType::EvenAged, ApplicationScale::Stand)
}

fn trajectory(scale: f64) -> Vec<StandObservation> {
    let mut thinned = stand(2010)
        .with_trees(TreeStatus::Alive, trees(2.0 * scale, 50.0))
        .with_trees(TreeStatus::Cut, trees(2.0 * scale, 30.0));
    thinned.intervention = true;
    vec![
        stand(2000).with_trees(TreeStatus::Alive, trees(1.0 * scale, 100.0)),
        stand(2010).with_trees(TreeStatus::Alive, trees(2.0 * scale, 80.0)),
        thinned,
        stand(2020).with_trees(TreeStatus::Alive, trees(3.0 * scale, 50.0)),
    ]
}

fn manager(provider: Arc<dyn StandProvider>, settings: SimulationSettings) -> CompartmentManager {
    CompartmentManager::new(settings, lines(), provider, Arc::new(QuarterCarbon)).unwrap()
}

fn deterministic() -> CompartmentManager {
    manager(
        Arc::new(StaticStandProvider::new(trajectory(1.0))),
        SimulationSettings::default(),
    )
}

#[derive(Debug)]
struct ScaledProvider {
    realizations: usize,
    failing: Option<usize>,
}

impl StandProvider for ScaledProvider {
    fn realization_count(&self) -> usize {
        self.realizations
    }

    fn stands(&self, realization: usize) -> RCATResult<Vec<StandObservation>> {
        if self.failing == Some(realization) {
            return Err(RCATError::Error("stand generation failed".to_string()));
        }
        Ok(trajectory(1.0 + realization as f64))
    }
}

/// Requests cancellation of its manager while serving its `cancel_on`-th
/// trajectory. The first trajectory is served to `init`.
#[derive(Debug)]
struct CancellingProvider {
    realizations: usize,
    cancel_on: usize,
    served: AtomicUsize,
    token: OnceLock<Arc<AtomicBool>>,
}

impl CancellingProvider {
    fn new(realizations: usize, cancel_on: usize) -> Self {
        Self {
            realizations,
            cancel_on,
            served: AtomicUsize::new(0),
            token: OnceLock::new(),
        }
    }
}

impl StandProvider for CancellingProvider {
    fn realization_count(&self) -> usize {
        self.realizations
    }

    fn stands(&self, realization: usize) -> RCATResult<Vec<StandObservation>> {
        let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        if served == self.cancel_on {
            if let Some(token) = self.token.get() {
                token.store(true, Ordering::SeqCst);
            }
        }
        Ok(trajectory(1.0 + realization as f64))
    }
}

#[test]
fn init_appends_synthetic_harvest() {
    let mut manager = deterministic();
    assert_eq!(manager.state(), ManagerState::Idle);

    let report = *manager.init().unwrap();
    assert!(report.synthetic_final_harvest);
    assert!(report.infinite_sequence_eligible);
    assert_eq!(report.realizations, 1);
    assert_eq!(report.rotations, 0);

    let time_table = manager.time_table().unwrap();
    assert_eq!(time_table.len(), 23);
    assert_eq!(time_table.stand_count(), 5);
    assert_eq!(time_table.year_at(11), Some(2010));
    assert_eq!(time_table.year_at(22), Some(2020));
    assert_eq!(manager.state(), ManagerState::Initialized);
}

#[test]
fn run_requires_init() {
    let mut manager = deterministic();
    assert!(matches!(manager.run(), Err(RCATError::State(_))));
}

#[test]
fn deterministic_run() {
    let mut manager = deterministic();
    manager.init().unwrap();
    let summary = manager.run().unwrap().clone();
    assert_eq!(manager.state(), ManagerState::Summarized);
    assert_eq!(summary.realizations(), 1);

    // Standing biomass interpolated between 2000 and the first 2010 observation
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 25.0);
    assert_relative_eq!(
        summary.mean(CompartmentInfo::AbGround, 5).unwrap(),
        32.5,
        max_relative = 1e-12
    );
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 11).unwrap(), 25.0);
    assert_eq!(summary.mean(CompartmentInfo::AbGround, 22).unwrap(), 0.0);
    assert_relative_eq!(
        summary.mean(CompartmentInfo::Roots, 5).unwrap(),
        6.5,
        max_relative = 1e-12
    );

    for index in 0..summary.years().len() {
        assert_relative_eq!(
            summary.mean(CompartmentInfo::LivingBiomass, index).unwrap(),
            summary.mean(CompartmentInfo::AbGround, index).unwrap()
                + summary.mean(CompartmentInfo::Roots, index).unwrap(),
            max_relative = 1e-12
        );
    }

    // Thinning: 15 Mg C harvested, 60% lumber and 40% fuel
    assert_eq!(summary.mean(CompartmentInfo::Products, 10).unwrap(), 0.0);
    assert_relative_eq!(
        summary.mean(CompartmentInfo::Products, 11).unwrap(),
        15.0,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        summary
            .product_mean(UseClass::Construction, "Picea abies", 11)
            .unwrap(),
        9.0,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        summary.mean(CompartmentInfo::DeadBiomass, 11).unwrap(),
        3.0,
        max_relative = 1e-12
    );
    assert!(summary.mean(CompartmentInfo::EnergySubstitution, 22).unwrap() > 0.0);
    assert!(summary.mean(CompartmentInfo::LandfillDegradable, 22).unwrap() > 0.0);
}

#[test]
fn products_decay_into_landfill() {
    let mut manager = deterministic();
    manager.init().unwrap();
    let summary = manager.run().unwrap();

    // Lumber from the thinning is still in use a year later
    let lumber = 9.0 * (-0.1f64).exp();
    assert_relative_eq!(
        summary.mean(CompartmentInfo::Products, 12).unwrap(),
        lumber,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        summary.mean(CompartmentInfo::LandfillDegradable, 12).unwrap(),
        9.0 - lumber,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        summary.mean(CompartmentInfo::TotalProducts, 12).unwrap(),
        9.0,
        max_relative = 1e-12
    );
}

#[test]
fn monte_carlo_mean_and_variance() {
    let mut manager = manager(
        Arc::new(ScaledProvider {
            realizations: 3,
            failing: None,
        }),
        SimulationSettings::default(),
    );
    let report = *manager.init().unwrap();
    assert!(!report.infinite_sequence_eligible);

    let summary = manager.run().unwrap();
    assert_eq!(summary.realizations(), 3);
    // 25, 50 and 75 Mg C
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 50.0);
    assert_relative_eq!(
        summary.variance(CompartmentInfo::AbGround, 0).unwrap(),
        625.0,
        max_relative = 1e-12
    );
}

#[test]
fn failed_realization_keeps_previous_results() {
    let mut manager = manager(
        Arc::new(ScaledProvider {
            realizations: 3,
            failing: Some(1),
        }),
        SimulationSettings::default(),
    );
    manager.init().unwrap();
    assert!(manager.run().is_err());

    let summary = manager.summary().unwrap();
    assert_eq!(summary.realizations(), 1);
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 25.0);
    assert_eq!(manager.state(), ManagerState::Initialized);
}

#[test]
fn cancellation_between_realizations() {
    let mut manager = deterministic();
    manager.init().unwrap();
    manager.cancel_token().store(true, Ordering::SeqCst);
    assert_eq!(
        manager.run().map(|_| ()),
        Err(RCATError::Cancelled { completed: 0 })
    );

    // The request is consumed by the cancelled run
    assert!(manager.run().is_ok());
}

#[test]
fn cancellation_keeps_completed_realizations() {
    // Served to init, then to realization 0, which still completes
    let provider = Arc::new(CancellingProvider::new(3, 2));
    let mut manager = manager(provider.clone(), SimulationSettings::default());
    provider.token.set(manager.cancel_token()).unwrap();
    manager.init().unwrap();

    assert_eq!(
        manager.run().map(|_| ()),
        Err(RCATError::Cancelled { completed: 1 })
    );
    let summary = manager.summary().unwrap();
    assert_eq!(summary.realizations(), 1);
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 25.0);
    assert_eq!(manager.state(), ManagerState::Initialized);
}

#[test]
fn rerun_failing_early_keeps_previous_summary() {
    let mut manager = deterministic();
    manager.init().unwrap();
    manager.run().unwrap();

    manager.cancel_token().store(true, Ordering::SeqCst);
    assert_eq!(
        manager.run().map(|_| ()),
        Err(RCATError::Cancelled { completed: 0 })
    );
    let summary = manager.summary().unwrap();
    assert_eq!(summary.realizations(), 1);
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 25.0);
    assert_eq!(manager.state(), ManagerState::Summarized);
}

#[test]
fn rotations_extend_eligible_trajectories() {
    let stands = vec![
        stand(2000).with_trees(TreeStatus::Alive, trees(1.0, 100.0)),
        stand(2020).with_trees(TreeStatus::Alive, trees(3.0, 50.0)),
    ];
    let mut manager = manager(
        Arc::new(StaticStandProvider::new(stands)),
        SimulationSettings {
            rotations: 1,
            ..Default::default()
        },
    );
    let report = *manager.init().unwrap();
    assert_eq!(report.rotations, 1);

    let time_table = manager.time_table().unwrap();
    assert_eq!(time_table.len(), 44);
    assert_eq!(time_table.segments().len(), 2);
    assert_eq!(time_table.year_at(43), Some(2040));

    let summary = manager.run().unwrap();
    assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 22).unwrap(), 25.0);
}

#[test]
fn rotations_ignored_for_uneven_aged_management() {
    let stands = vec![
        StandObservation::new(2000, ManagementType::UnevenAged, ApplicationScale::Stand)
            .with_trees(TreeStatus::Alive, trees(1.0, 100.0)),
        StandObservation::new(2010, ManagementType::UnevenAged, ApplicationScale::Stand)
            .with_trees(TreeStatus::Alive, trees(1.5, 100.0)),
    ];
    let mut manager = manager(
        Arc::new(StaticStandProvider::new(stands)),
        SimulationSettings {
            rotations: 3,
            ..Default::default()
        },
    );
    let report = *manager.init().unwrap();
    assert!(!report.infinite_sequence_eligible);
    assert!(!report.synthetic_final_harvest);
    assert_eq!(report.rotations, 0);
    assert_eq!(manager.time_table().unwrap().len(), 11);

    // Realizations follow the rotation count decided by init
    let summary = manager.run().unwrap();
    assert_eq!(summary.years().len(), 11);
    assert_eq!(summary.realizations(), 1);
}

#[test]
fn background_run() {
    let handle = deterministic().spawn();
    let outcome = handle.join().unwrap();
    assert!(outcome.result.is_ok());
    assert_eq!(outcome.manager.summary().unwrap().realizations(), 1);
}

#[test]
fn invalid_lines_fail_before_any_realization() {
    let mut sawmill = ProcessorGraph::new();
    let entry = sawmill.add_processor(Processor::production("Sawmill", UseClass::None));
    let lumber = sawmill
        .add_processor(Processor::production("Lumber", UseClass::Construction).with_decay(decay(10.0)));
    sawmill.add_child(entry, lumber, 90.0).unwrap();

    let mut lines = lines();
    lines.add_line(ProductionLine::new("Broken", sawmill, entry));
    let mut manager = CompartmentManager::new(
        SimulationSettings::default(),
        lines,
        Arc::new(StaticStandProvider::new(trajectory(1.0))),
        Arc::new(QuarterCarbon),
    )
    .unwrap();

    assert!(matches!(
        manager.init(),
        Err(RCATError::InvalidIntakeSum { .. })
    ));
    assert!(manager.summary().is_none());
}
