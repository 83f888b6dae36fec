//! Reference implementations plugging into `rcat-core`: a biomass converter,
//! production lines, sensitivity modifiers and stand trajectories.

pub mod biomass;
pub mod lines;
pub mod sensitivity;
pub mod trajectory;
