//! Rigid-body flight model for a thruster-driven ship.
//!
//! Body frame is +X right, +Y up, +Z forward; orientations map BODY -> WORLD.

extern crate nalgebra as na;

pub mod attitude;
pub mod body;
pub mod quat;

pub use attitude::AttitudeState;
pub use body::{ControlInput, ShipConfig, ShipConstants, ShipState, advance};
