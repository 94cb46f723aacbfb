//! The player ship as a rigid body: hull constants, control inputs and the
//! per-tick `advance`.

use bevy::prelude::*;
use na::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::attitude::AttitudeState;
use crate::quat;

/// Tunable description of the hull and its thrusters.
///
/// Body frame: +X right, +Y up, +Z forward. Dimensions are full extents of a
/// solid cuboid, in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipConfig {
    /// kg
    pub mass: f64,
    pub width: f64,
    pub height: f64,
    pub length: f64,
    /// Main thruster force at the lowest non-zero throttle, N.
    pub main_min_force: f64,
    /// Main thruster force at full throttle, N.
    pub main_max_force: f64,
    /// Force of each steering thruster, N.
    pub steering_force: f64,
    /// Spin bled off per second when no rotational input is given.
    pub damping_factor: f64,
    /// Sphere used for obstacle collision, m.
    pub bounding_radius: f64,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            mass: 20_000.0,
            width: 15.0,
            height: 15.0,
            length: 40.0,
            main_min_force: 1000.0,
            main_max_force: 3000.0,
            steering_force: 200.0,
            damping_factor: 1.5,
            bounding_radius: 20.0,
        }
    }
}

/// Physical constants derived once from a `ShipConfig`.
#[derive(Debug, Clone, PartialEq, Resource)]
pub struct ShipConstants {
    pub mass: f64,
    /// Principal moments of inertia in BODY frame (diagonal): (I_x, I_y, I_z).
    pub i_body: Vector3<f64>,
    /// Component-wise inverse of `i_body`.
    pub i_body_inv: Vector3<f64>,
    pub arm_pitch: f64,
    pub arm_yaw: f64,
    pub arm_roll: f64,
    pub main_min_force: f64,
    pub main_max_force: f64,
    pub steering_force: f64,
    pub damping_factor: f64,
    pub bounding_radius: f64,
}

impl ShipConstants {
    pub fn from_config(config: &ShipConfig) -> Self {
        let m = config.mass;
        let (w, h, l) = (config.width, config.height, config.length);

        // Solid cuboid.
        let i_body = Vector3::new(
            m / 12.0 * (h * h + l * l),
            m / 12.0 * (w * w + l * l),
            m / 12.0 * (w * w + h * h),
        );

        Self {
            mass: m,
            i_body,
            i_body_inv: i_body.map(|i| 1.0 / i),
            // Pitch thrusters sit at nose and tail, yaw at the wingtips, roll
            // at the corners of the cross-section.
            arm_pitch: l / 2.0,
            arm_yaw: w / 2.0,
            arm_roll: ((w / 2.0).powi(2) + (h / 2.0).powi(2)).sqrt(),
            main_min_force: config.main_min_force,
            main_max_force: config.main_max_force,
            steering_force: config.steering_force,
            damping_factor: config.damping_factor,
            bounding_radius: config.bounding_radius,
        }
    }

    /// Main thruster force magnitude for a throttle setting. Zero throttle is
    /// an idle thruster, not `main_min_force`.
    pub fn main_thrust(&self, throttle: f64) -> f64 {
        if throttle > 0.0 {
            self.main_min_force + (self.main_max_force - self.main_min_force) * throttle
        } else {
            0.0
        }
    }

    /// Body-frame torque from the steering thrusters.
    pub fn steering_torque(&self, input: &ControlInput) -> Vector3<f64> {
        Vector3::new(
            input.pitch * self.arm_pitch,
            input.yaw * self.arm_yaw,
            input.roll * self.arm_roll,
        ) * self.steering_force
    }
}

impl Default for ShipConstants {
    fn default() -> Self {
        Self::from_config(&ShipConfig::default())
    }
}

/// Normalized pilot inputs for one tick.
///
/// `thrust` is in [0, 1], the rotational axes in [-1, 1]. The flight model
/// trusts these ranges; use `clamped` when mixing several input sources.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInput {
    pub thrust: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl ControlInput {
    pub const IDLE: ControlInput = ControlInput {
        thrust: 0.0,
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn clamped(self) -> Self {
        Self {
            thrust: self.thrust.clamp(0.0, 1.0),
            pitch: self.pitch.clamp(-1.0, 1.0),
            yaw: self.yaw.clamp(-1.0, 1.0),
            roll: self.roll.clamp(-1.0, 1.0),
        }
    }

    pub fn has_rotation(&self) -> bool {
        self.pitch != 0.0 || self.yaw != 0.0 || self.roll != 0.0
    }
}

/// Full rigid-body state of the ship.
#[derive(Debug, Clone, Default, PartialEq, Component)]
pub struct ShipState {
    /// World-space position, m.
    pub position: Vector3<f64>,
    /// World-space velocity, m/s.
    pub velocity: Vector3<f64>,
    pub attitude: AttitudeState,
}

impl ShipState {
    /// At the origin, at rest, nose along world +Z.
    pub fn at_rest() -> Self {
        Self::default()
    }

    pub fn orientation(&self) -> &Quaternion<f64> {
        &self.attitude.q_bw
    }

    pub fn angular_velocity(&self) -> &Vector3<f64> {
        &self.attitude.omega_b
    }

    pub fn forward(&self) -> Vector3<f64> {
        quat::forward(&self.attitude.q_bw)
    }

    pub fn up(&self) -> Vector3<f64> {
        quat::up(&self.attitude.q_bw)
    }

    pub fn right(&self) -> Vector3<f64> {
        quat::right(&self.attitude.q_bw)
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Advance the state in place by `dt` seconds.
    pub fn step(&mut self, k: &ShipConstants, dt: f64, input: &ControlInput) {
        // Forces are taken from the orientation at the start of the step.
        let force_w = self.forward() * k.main_thrust(input.thrust);
        let alpha_b = k.i_body_inv.component_mul(&k.steering_torque(input));

        // Semi-implicit Euler.
        self.velocity += force_w / k.mass * dt;
        self.position += self.velocity * dt;

        self.attitude.step(&alpha_b, dt);

        if !input.has_rotation() {
            self.attitude.damp(k.damping_factor, dt);
        }
    }

    /// Return the state `dt` seconds later, leaving `self` untouched.
    pub fn advanced(&self, k: &ShipConstants, dt: f64, input: &ControlInput) -> Self {
        let mut next = self.clone();
        next.step(k, dt, input);
        next
    }
}

/// Free-function form of `ShipState::advanced`.
pub fn advance(state: &ShipState, k: &ShipConstants, dt: f64, input: &ControlInput) -> ShipState {
    state.advanced(k, dt, input)
}
