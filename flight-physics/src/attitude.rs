//! Rotational half of the flight model.

use bevy::prelude::*;
use na::{Quaternion, Vector3};

use crate::quat;

/// Attitude (rotation) state advanced with first-order quaternion kinematics.
///
/// This ignores the gyroscopic `ω × Iω` term, so the three body axes spin up
/// and down independently of each other.
#[derive(Debug, Clone, PartialEq, Component)]
pub struct AttitudeState {
    /// Orientation BODY -> WORLD. Unit norm after every `step`.
    pub q_bw: Quaternion<f64>,

    /// Angular velocity in BODY frame, rad/s.
    pub omega_b: Vector3<f64>,
}

impl Default for AttitudeState {
    fn default() -> Self {
        Self {
            q_bw: Quaternion::identity(),
            omega_b: Vector3::zeros(),
        }
    }
}

impl AttitudeState {
    pub fn new(q_bw: Quaternion<f64>, omega_b: Vector3<f64>) -> Self {
        Self { q_bw, omega_b }
    }

    /// Apply a body-frame angular acceleration for `dt` seconds.
    ///
    /// ω is kicked first, then the orientation drifts with the new ω:
    ///   q += ½ q ⊗ (0, ω) dt
    /// and is renormalized. This is only accurate while ω·dt stays small.
    pub fn step(&mut self, alpha_b: &Vector3<f64>, dt: f64) {
        self.omega_b += alpha_b * dt;

        let omega_q = Quaternion::from_imag(self.omega_b);
        let q_dot = quat::multiply(&self.q_bw, &omega_q) * 0.5;
        self.q_bw = quat::normalize(&(self.q_bw + q_dot * dt));
    }

    /// Fly-by-wire stabilizer: bleed off spin by `factor` per second.
    ///
    /// The scale is floored at zero so a long hitch stops the spin instead of
    /// reversing it.
    pub fn damp(&mut self, factor: f64, dt: f64) {
        self.omega_b *= (1.0 - factor * dt).max(0.0);
    }
}
