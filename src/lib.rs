//! Gate racing through an asteroid field, on top of `flight-physics`.
//!
//! Notably, we use Y-up right handed, with the ship's nose along +Z.

extern crate nalgebra as na;

pub mod autopilot;
pub mod config;
pub mod course;
pub mod editor;
pub mod encounter;
pub mod ship;
