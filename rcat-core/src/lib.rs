pub mod amounts;
pub mod carbon_unit;
pub mod compartment;
pub mod decay;
pub mod estimator;
pub mod interpolate;
pub mod manager;
pub mod processor;
pub mod production;
pub mod sensitivity;
pub mod stand;
pub mod time_table;
pub mod utils;

pub mod errors;
