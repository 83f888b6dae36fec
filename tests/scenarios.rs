//! End-to-end simulations.
//!
//! These tests run the whole chain from stand observations to the Monte-Carlo
//! summary:
//! - Stock and flow identities of the derived compartments
//! - Decay of a short-lived product
//! - Stochastic trajectories, failures and cancellation

use approx::assert_relative_eq;
use rcat::components::biomass::BasicDensityConverter;
use rcat::components::sensitivity::RealizationMultipliers;
use rcat::components::trajectory::{StochasticStandProvider, TrajectoryBuilder};
use rcat::rcat_core::amounts::{AmountMap, Element};
use rcat::rcat_core::carbon_unit::UseClass;
use rcat::rcat_core::compartment::CompartmentInfo;
use rcat::rcat_core::errors::{RCATError, RCATResult};
use rcat::rcat_core::manager::{CompartmentManager, ManagerState, SimulationSettings};
use rcat::rcat_core::production::ProductionLineManagerConfig;
use rcat::rcat_core::sensitivity::VariabilitySource;
use rcat::rcat_core::stand::{
    ApplicationScale, BiomassConverter, ManagementType, SpeciesType, StandObservation,
    StandProvider, StaticStandProvider, TreeBiomass, TreeRecord, TreeStatus,
};
use rcat::SimulationConfig;
use std::sync::Arc;

/// Carbon equal to the total volume, nothing below ground
#[derive(Debug)]
struct VolumeAsCarbon;

impl BiomassConverter for VolumeAsCarbon {
    fn convert(&self, tree: &TreeRecord, _stand: &StandObservation) -> RCATResult<TreeBiomass> {
        let carbon = tree.volume_m3 * tree.number;
        Ok(TreeBiomass {
            above_ground: AmountMap::new()
                .with(Element::Biomass, carbon * 2.0)
                .with(Element::Carbon, carbon),
            ..Default::default()
        })
    }
}

fn trees(species_name: &str, volume_m3: f64, number: f64) -> Vec<TreeRecord> {
    vec![TreeRecord {
        sampling_unit_id: "12".to_string(),
        species_name: species_name.to_string(),
        species_type: if species_name == "Fagus sylvatica" {
            SpeciesType::Broadleaved
        } else {
            SpeciesType::Coniferous
        },
        number,
        dbh_cm: 28.0,
        volume_m3,
        line: None,
    }]
}

fn lines(mean_lifetime: f64) -> ProductionLineManagerConfig {
    ProductionLineManagerConfig::from_toml(&format!(
        r#"
default_line = "Market"

[[lines]]
name = "Market"
entry = "ShortLived"

[[lines.processors]]
name = "ShortLived"
kind = {{ type = "Production", use_class = "Paper" }}
decay = {{ mode = "Average", value = {:.1} }}

[landfill]
name = "Landfill"
entry = "Site"

[[landfill.processors]]
name = "Site"
kind = {{ type = "Landfill", degradable = true }}
decay = {{ mode = "HalfLife", value = 20.0 }}

[left_in_forest]
name = "Forest"
entry = "Floor"

[[left_in_forest.processors]]
name = "Floor"
kind = {{ type = "LeftInForest" }}
decay = {{ mode = "HalfLife", value = 10.0 }}
"#,
        mean_lifetime
    ))
    .unwrap()
}

fn simple_manager(provider: Arc<dyn StandProvider>) -> CompartmentManager {
    let settings = SimulationSettings {
        dispose_to_landfill: false,
        ..Default::default()
    };
    CompartmentManager::new(
        settings,
        lines(2.0).build().unwrap(),
        provider,
        Arc::new(VolumeAsCarbon),
    )
    .unwrap()
}

fn uneven_aged(year: i32) -> StandObservation {
    StandObservation::new(year, ManagementType::UnevenAged, ApplicationScale::Stand)
}

mod budgets {
    use super::*;

    /// Thinning then an unfinished rotation, completed by a synthetic harvest
    fn even_aged_stand() -> Vec<StandObservation> {
        TrajectoryBuilder::new(ManagementType::EvenAged, ApplicationScale::Stand)
            .observe(2000, trees("Picea abies", 0.4, 600.0))
            .observe(2010, trees("Picea abies", 0.7, 600.0))
            .harvest(
                2010,
                trees("Picea abies", 0.7, 200.0),
                trees("Picea abies", 0.7, 400.0),
            )
            .observe(2030, trees("Picea abies", 1.2, 400.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_derived_compartments_are_weighted_sums() {
        let mut manager = SimulationConfig::default()
            .build(Arc::new(StaticStandProvider::new(even_aged_stand())))
            .unwrap();
        let report = *manager.init().unwrap();
        assert!(report.synthetic_final_harvest);
        let summary = manager.run().unwrap();

        let value = |info, index| summary.mean(info, index).unwrap();
        for index in 0..summary.years().len() {
            assert_relative_eq!(
                value(CompartmentInfo::LivingBiomass, index),
                value(CompartmentInfo::AbGround, index) + value(CompartmentInfo::Roots, index),
                max_relative = 1e-12
            );
            assert_relative_eq!(
                value(CompartmentInfo::TotalProducts, index),
                value(CompartmentInfo::Products, index)
                    + value(CompartmentInfo::LandfillDegradable, index),
                max_relative = 1e-12
            );
            assert_relative_eq!(
                value(CompartmentInfo::NetSubstitution, index),
                -value(CompartmentInfo::EnergySubstitution, index)
                    + value(CompartmentInfo::ProcessEmissions, index)
                    + value(CompartmentInfo::LandfillEmissions, index)
                    - value(CompartmentInfo::LandfillNonDegradable, index),
                epsilon = 1e-9
            );
        }

        let last = summary.years().len() - 1;
        assert_eq!(value(CompartmentInfo::AbGround, last), 0.0);
        assert!(value(CompartmentInfo::Products, last) > 0.0);
        assert!(value(CompartmentInfo::LandfillDegradable, last) > 0.0);
        assert!(value(CompartmentInfo::EnergySubstitution, last) > 0.0);
        assert!(value(CompartmentInfo::ProcessEmissions, last) > 0.0);
    }

    #[test]
    fn test_harvested_carbon_is_conserved_at_creation() {
        let stands = even_aged_stand();
        let cut = stands[2].trees(TreeStatus::Cut)[0].clone();
        let biomass = BasicDensityConverter::default()
            .convert(&cut, &stands[2])
            .unwrap();
        let harvested =
            biomass.above_ground.carbon() + biomass.bark.carbon() + biomass.below_ground.carbon();

        let mut manager = SimulationConfig::default()
            .build(Arc::new(StaticStandProvider::new(stands)))
            .unwrap();
        manager.init().unwrap();
        let summary = manager.run().unwrap();

        let thinning = summary.years().iter().rposition(|&y| y == 2010).unwrap();
        assert_eq!(summary.mean(CompartmentInfo::Products, thinning - 1).unwrap(), 0.0);
        assert_relative_eq!(
            summary.mean(CompartmentInfo::Products, thinning).unwrap()
                + summary.mean(CompartmentInfo::DeadBiomass, thinning).unwrap(),
            harvested,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_short_lived_product() {
        let stands = vec![
            uneven_aged(0).with_trees(
                TreeStatus::Cut,
                trees("Picea abies", 1.0, 10.0),
            ),
            uneven_aged(4),
        ];
        let mut manager = simple_manager(Arc::new(StaticStandProvider::new(stands)));
        manager.init().unwrap();
        let summary = manager.run().unwrap();

        assert_eq!(summary.years(), &[0, 1, 2, 3, 4]);
        let expected = [10.0, 6.065, 3.679, 2.231, 1.353];
        for (index, expected) in expected.iter().enumerate() {
            assert_relative_eq!(
                summary.mean(CompartmentInfo::Products, index).unwrap(),
                expected,
                max_relative = 1e-3
            );
        }
        assert_relative_eq!(
            summary
                .product_mean(UseClass::Paper, "Picea abies", 1)
                .unwrap(),
            6.065,
            max_relative = 1e-3
        );
    }
}

mod monte_carlo {
    use super::*;

    fn realization(number: f64) -> Vec<StandObservation> {
        vec![
            uneven_aged(2000).with_trees(TreeStatus::Alive, trees("Fagus sylvatica", 1.0, number)),
            uneven_aged(2010).with_trees(TreeStatus::Alive, trees("Fagus sylvatica", 1.5, number)),
        ]
    }

    fn provider() -> Arc<StochasticStandProvider> {
        Arc::new(StochasticStandProvider::new(vec![realization(10.0), realization(20.0)]).unwrap())
    }

    #[test]
    fn test_mean_and_variance_over_realizations() {
        let mut manager = simple_manager(provider());
        assert_eq!(manager.init().unwrap().realizations, 2);
        let summary = manager.run().unwrap();

        assert_eq!(summary.realizations(), 2);
        assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 15.0);
        assert_relative_eq!(summary.variance(CompartmentInfo::AbGround, 0).unwrap(), 50.0);
        assert_relative_eq!(
            summary.mean(CompartmentInfo::AbGround, 5).unwrap(),
            18.75,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_carbon_content_modifier() {
        let modifier =
            RealizationMultipliers::new(VariabilitySource::CarbonContent, vec![1.0, 2.0]).unwrap();
        let mut manager = simple_manager(provider()).with_modifier(Arc::new(modifier));
        manager.init().unwrap();
        let summary = manager.run().unwrap();

        assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 25.0);
        assert_relative_eq!(summary.variance(CompartmentInfo::AbGround, 0).unwrap(), 450.0);
    }

    #[derive(Debug)]
    struct FailingProvider;

    impl StandProvider for FailingProvider {
        fn realization_count(&self) -> usize {
            3
        }

        fn stands(&self, index: usize) -> RCATResult<Vec<StandObservation>> {
            match index {
                1 => Err(RCATError::Error("growth model diverged".to_string())),
                _ => Ok(realization(10.0)),
            }
        }
    }

    #[test]
    fn test_failed_realization_keeps_previous_results() {
        let mut manager = simple_manager(Arc::new(FailingProvider));
        manager.init().unwrap();
        let result = manager.run().map(|_| ());
        assert_eq!(
            result,
            Err(RCATError::Error("growth model diverged".to_string()))
        );
        assert_ne!(manager.state(), ManagerState::Summarized);

        let summary = manager.summary().unwrap();
        assert_eq!(summary.realizations(), 1);
        assert_relative_eq!(summary.mean(CompartmentInfo::AbGround, 0).unwrap(), 10.0);
    }

    #[test]
    fn test_background_run() {
        let handle = simple_manager(provider()).spawn();
        let outcome = handle.join().unwrap();
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.manager.state(), ManagerState::Summarized);
        assert_eq!(outcome.manager.summary().unwrap().realizations(), 2);
    }

    #[test]
    fn test_cancelled_before_first_realization() {
        let manager = simple_manager(provider());
        manager
            .cancel_token()
            .store(true, std::sync::atomic::Ordering::SeqCst);
        let outcome = manager.spawn().join().unwrap();

        assert_eq!(outcome.result, Err(RCATError::Cancelled { completed: 0 }));
        assert_eq!(outcome.manager.state(), ManagerState::Initialized);
        assert_eq!(outcome.manager.summary().unwrap().realizations(), 0);
    }
}
