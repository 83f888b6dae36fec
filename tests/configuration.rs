//! Simulations configured from TOML.

use approx::assert_relative_eq;
use rcat::components::lines::SAWLOGS;
use rcat::rcat_core::compartment::CompartmentInfo;
use rcat::rcat_core::errors::RCATError;
use rcat::rcat_core::sensitivity::VariabilitySource;
use rcat::rcat_core::stand::{
    ApplicationScale, ManagementType, SpeciesType, StandObservation, StaticStandProvider,
    TreeRecord, TreeStatus,
};
use rcat::{LinesConfig, SimulationConfig};
use std::sync::Arc;

const CUSTOM: &str = r#"
[settings]
dispose_to_landfill = false
fill_intermediate_years = true

[lines.custom]
default_line = "Mill"

[[lines.custom.lines]]
name = "Mill"
entry = "Mill"

[[lines.custom.lines.processors]]
name = "Mill"
kind = { type = "Production", use_class = "Construction" }
decay = { mode = "HalfLife", value = 30.0 }

[lines.custom.landfill]
name = "Landfill"
entry = "Site"

[[lines.custom.landfill.processors]]
name = "Site"
kind = { type = "Landfill", degradable = true }
decay = { mode = "HalfLife", value = 20.0 }

[lines.custom.left_in_forest]
name = "Forest"
entry = "Floor"

[[lines.custom.left_in_forest.processors]]
name = "Floor"
kind = { type = "LeftInForest" }
decay = { mode = "Average", value = 5.0 }

[biomass.broadleaved]
basic_density = 0.5
branch_expansion = 1.0
bark_fraction = 0.0
root_to_shoot = 0.0
carbon_content = 0.5
nitrogen_content = 0.0

[modifier]
type = "ConstantMultiplier"
source = "Lifetime"
factor = 2.0
groups = ["Mill"]
"#;

fn stands() -> Vec<StandObservation> {
    let beech = TreeRecord {
        sampling_unit_id: "3".to_string(),
        species_name: "Fagus sylvatica".to_string(),
        species_type: SpeciesType::Broadleaved,
        number: 10.0,
        dbh_cm: 40.0,
        volume_m3: 4.0,
        line: None,
    };
    vec![
        StandObservation::new(2000, ManagementType::UnevenAged, ApplicationScale::Stand)
            .with_trees(TreeStatus::Cut, vec![beech]),
        StandObservation::new(2010, ManagementType::UnevenAged, ApplicationScale::Stand),
    ]
}

#[test]
fn test_default_configuration() {
    let config = SimulationConfig::from_toml("").unwrap();
    assert!(config.settings.dispose_to_landfill);
    assert!(config.modifier.is_none());
    let lines = config.lines.build().unwrap();
    assert_eq!(lines.default_line(), Some(SAWLOGS));
}

#[test]
fn test_custom_configuration() {
    let config = SimulationConfig::from_toml(CUSTOM).unwrap();
    assert!(!config.settings.dispose_to_landfill);
    assert!(matches!(config.lines, LinesConfig::Custom(_)));
    let modifier = config.modifier.as_ref().unwrap();
    assert_eq!(modifier.modifier(VariabilitySource::Lifetime, 0, "Mill"), 2.0);

    let mut manager = config
        .build(Arc::new(StaticStandProvider::new(stands())))
        .unwrap();
    manager.init().unwrap();
    let summary = manager.run().unwrap();

    // 40 m3 at 0.5 Mg/m3 and 50% carbon, half-life doubled to 60 years
    assert_relative_eq!(
        summary.mean(CompartmentInfo::Products, 0).unwrap(),
        10.0,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        summary.mean(CompartmentInfo::Products, 10).unwrap(),
        10.0 * 0.5f64.powf(10.0 / 60.0),
        max_relative = 1e-9
    );
    assert_eq!(summary.mean(CompartmentInfo::DeadBiomass, 10).unwrap(), 0.0);
}

#[test]
fn test_default_line_parameters() {
    let config = SimulationConfig::from_toml(
        r#"
[lines.default.market]
sawnwood_yield = 70.0

[lines.default.landfill]
degradable_share = 50.0
"#,
    )
    .unwrap();
    match &config.lines {
        LinesConfig::Default(parameters) => {
            assert_eq!(parameters.market.sawnwood_yield, 70.0);
            assert_eq!(parameters.landfill.degradable_share, 50.0);
            assert_eq!(parameters.market.pulp_yield, 50.0);
        }
        LinesConfig::Custom(_) => panic!("expected the default lines"),
    }
    config.lines.build().unwrap();
}

#[test]
fn test_invalid_lines_are_reported() {
    let config = SimulationConfig::from_toml(
        r#"
[lines.default.market]
sawnwood_yield = 150.0
"#,
    )
    .unwrap();
    let result = config.build(Arc::new(StaticStandProvider::new(stands())));
    assert!(matches!(result, Err(RCATError::Configuration(_))));
}

#[test]
fn test_unknown_modifier() {
    let result = SimulationConfig::from_toml(
        r#"
[modifier]
type = "Unknown"
"#,
    );
    assert!(matches!(result, Err(RCATError::Serialization(_))));
}
