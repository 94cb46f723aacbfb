//! Gate-to-gate autopilot.
//!
//! The hull needs a minute or more to swing its nose around, far too slow to
//! chase a gate at speed. Each gate is therefore flown in two legs: come to
//! rest at a staging point on the gate's axis, then burn straight through the
//! center. While still short of the plane the nose is already turned towards
//! the next leg.

use bevy::prelude::Component;
use flight_physics::{ControlInput, ShipConstants, ShipState};
use na::Vector3;

use crate::course::Gate;

/// Speed of the run through a gate, and the cap on every other leg, m/s.
const CRUISE_SPEED: f64 = 5.0;
/// How far in front of a gate the staging point sits, m.
const STAGING_DISTANCE: f64 = 150.0;
/// Deceleration the approach to a staging point plans for, m/s². Well below
/// the main thruster, which leaves time to flip the hull before braking.
const PLANNED_BRAKING: f64 = 0.02;
/// Wanted closing speed per meter still to go, 1/s.
const CLOSING_GAIN: f64 = 0.015;
/// Staged means within this distance of the staging point, or of the gate
/// axis, m.
const STAGED_RADIUS: f64 = 30.0;
/// and slower than this, m/s.
const STAGED_SPEED: f64 = 0.8;
/// Velocity error the pilot lets stand, m/s.
const VELOCITY_DEADBAND: f64 = 0.05;
/// Widest angle between nose and wanted burn at which the main thruster
/// fires, rad.
const STAGING_CONE: f64 = 0.3;
const RUN_CONE: f64 = 0.2;
/// Seconds before the gate plane at which the nose turns to the next leg.
const TURN_AHEAD: f64 = 12.0;
/// Share of the steering authority a turn plans to brake with.
const TURN_MARGIN: f64 = 0.6;
/// rad/s
const MAX_TURN_RATE: f64 = 0.08;
/// Steering input per rad/s of turn rate error.
const RATE_GAIN: f64 = 1000.0;

/// What the autopilot is doing about the active gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leg {
    /// Coming to rest at `waypoint`, on the gate's axis.
    Staging { waypoint: Vector3<f64> },
    /// Burning through the gate, travelling along `direction`.
    Run { direction: Vector3<f64> },
}

/// Per-ship autopilot memory.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Autopilot {
    /// Active gate index and the leg being flown for it.
    leg: Option<(usize, Leg)>,
}

impl Autopilot {
    /// Forget the current leg; the next call to `steer` plans afresh.
    pub fn reset(&mut self) {
        self.leg = None;
    }

    pub fn leg(&self) -> Option<Leg> {
        self.leg.map(|(_, leg)| leg)
    }

    /// Controls for the next tick, flying towards `gates[active]`. Idle once
    /// there is no such gate.
    pub fn steer(
        &mut self,
        state: &ShipState,
        k: &ShipConstants,
        gates: &[Gate],
        active: usize,
    ) -> ControlInput {
        let Some(gate) = gates.get(active) else {
            self.leg = None;
            return ControlInput::IDLE;
        };

        let mut leg = match self.leg {
            Some((index, leg)) if index == active => leg,
            _ => Leg::staging(&state.position, gate),
        };
        // Across the plane without credit: go round again from this side.
        if let Leg::Run { direction } = leg
            && (state.position - gate.position).dot(&direction) > 0.0
        {
            leg = Leg::staging(&state.position, gate);
        }
        if let Leg::Staging { waypoint } = leg
            && state.speed() < STAGED_SPEED
            && ((waypoint - state.position).norm() < STAGED_RADIUS
                || on_final_axis(&state.position, gate))
        {
            leg = Leg::Run {
                direction: approach_direction(&state.position, gate),
            };
        }
        self.leg = Some((active, leg));

        let (aim, burn, cone) = match leg {
            Leg::Staging { waypoint } => {
                let error = staging_velocity(&state.position, &waypoint) - state.velocity;
                let aim = if error.norm() > VELOCITY_DEADBAND {
                    error
                } else if (waypoint - state.position).norm() < 2.0 * STAGED_RADIUS {
                    gate.position - state.position
                } else if state.speed() > 0.0 {
                    // Ready to brake.
                    -state.velocity
                } else {
                    gate.position - state.position
                };
                let burn = (error.norm() > VELOCITY_DEADBAND).then_some(error);
                (aim, burn, STAGING_CONE)
            }
            Leg::Run { .. } => {
                let wanted = unit(&(gate.position - state.position)) * CRUISE_SPEED;
                let error = wanted - state.velocity;
                match (seconds_to_plane(state, gate), gates.get(active + 1)) {
                    (Some(t), Some(next)) if t < TURN_AHEAD => {
                        let waypoint = Leg::staging_point(&gate.position, next);
                        (staging_velocity(&gate.position, &waypoint) - state.velocity, None, RUN_CONE)
                    }
                    _ if error.norm() > VELOCITY_DEADBAND => (error, Some(error), RUN_CONE),
                    _ => (wanted, None, RUN_CONE),
                }
            }
        };

        let forward = state.forward();
        let aim = if aim.norm() < 1e-9 { forward } else { aim };
        let mut input = turn_towards(state, k, &aim);
        if burn.is_some_and(|b| forward.dot(&unit(&b)) > cone.cos()) {
            input.thrust = 1.0;
        }
        input.clamped()
    }
}

impl Leg {
    fn staging(position: &Vector3<f64>, gate: &Gate) -> Self {
        Leg::Staging {
            waypoint: Self::staging_point(position, gate),
        }
    }

    /// Point on the gate's axis, on the side of `from`.
    fn staging_point(from: &Vector3<f64>, gate: &Gate) -> Vector3<f64> {
        gate.position - approach_direction(from, gate) * STAGING_DISTANCE
    }
}

/// Direction of travel through the gate for a ship at `from`.
fn approach_direction(from: &Vector3<f64>, gate: &Gate) -> Vector3<f64> {
    let normal = gate.normal();
    if gate.signed_distance(from) >= 0.0 {
        -normal
    } else {
        normal
    }
}

/// Whether `position` lies in front of the gate, no farther than the staging
/// point and close to its axis.
fn on_final_axis(position: &Vector3<f64>, gate: &Gate) -> bool {
    let direction = approach_direction(position, gate);
    let rel = position - gate.position;
    let along = rel.dot(&direction);
    let lateral = (rel - direction * along).norm();
    lateral < STAGED_RADIUS && -along <= STAGING_DISTANCE
}

/// Velocity that brings the ship to rest at `waypoint`.
fn staging_velocity(position: &Vector3<f64>, waypoint: &Vector3<f64>) -> Vector3<f64> {
    let to_go = waypoint - position;
    let distance = to_go.norm();
    let speed = CRUISE_SPEED
        .min((2.0 * PLANNED_BRAKING * distance).sqrt())
        .min(CLOSING_GAIN * distance);
    unit(&to_go) * speed
}

/// Time until the current velocity carries the ship through the gate plane.
fn seconds_to_plane(state: &ShipState, gate: &Gate) -> Option<f64> {
    let closing = state.velocity.dot(&gate.normal());
    if closing == 0.0 {
        return None;
    }
    let t = -gate.signed_distance(&state.position) / closing;
    (t > 0.0).then_some(t)
}

fn unit(v: &Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(0.0).unwrap_or_else(Vector3::zeros)
}

/// Rotation inputs that swing the nose onto `aim` about a single axis.
///
/// The turn rate is limited so the turn can still be stopped with part of the
/// steering authority; roll is only ever damped.
fn turn_towards(state: &ShipState, k: &ShipConstants, aim: &Vector3<f64>) -> ControlInput {
    let aim = unit(aim);
    let body = Vector3::new(
        aim.dot(&state.right()),
        aim.dot(&state.up()),
        aim.dot(&state.forward()),
    );
    let angle = body.z.clamp(-1.0, 1.0).acos();

    // +pitch turns the nose towards -Y, +yaw towards +X.
    let (mut axis_x, mut axis_y) = (-body.y, body.x);
    let len = axis_x.hypot(axis_y);
    if len < 1e-9 {
        // Dead ahead, or dead astern: pick pitch to start the turn.
        (axis_x, axis_y) = if angle > 1.0 { (1.0, 0.0) } else { (0.0, 0.0) };
    } else {
        axis_x /= len;
        axis_y /= len;
    }

    let alpha_pitch = k.arm_pitch * k.steering_force * k.i_body_inv.x;
    let alpha_yaw = k.arm_yaw * k.steering_force * k.i_body_inv.y;
    let limit = (axis_x.abs() / alpha_pitch).max(axis_y.abs() / alpha_yaw);
    let alpha = if limit > 0.0 { 1.0 / limit } else { 0.0 };
    let rate = (2.0 * alpha * TURN_MARGIN * angle).sqrt().min(MAX_TURN_RATE);

    let omega = state.angular_velocity();
    ControlInput {
        thrust: 0.0,
        pitch: RATE_GAIN * (axis_x * rate - omega.x),
        yaw: RATE_GAIN * (axis_y * rate - omega.y),
        roll: -RATE_GAIN * omega.z,
    }
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::course::Course;
    use crate::encounter::{Encounter, RaceStatus};
    use na::UnitQuaternion;

    fn gate_ahead(z: f64) -> Gate {
        Gate::new(Vector3::new(0.0, 0.0, z), UnitQuaternion::identity(), 40.0)
    }

    #[test]
    fn first_leg_stages_on_the_near_side() {
        let k = ShipConstants::default();
        let gates = [gate_ahead(500.0)];

        let mut pilot = Autopilot::default();
        let input = pilot.steer(&ShipState::at_rest(), &k, &gates, 0);
        assert_eq!(
            pilot.leg(),
            Some(Leg::Staging {
                waypoint: Vector3::new(0.0, 0.0, 350.0)
            })
        );
        // Already facing the staging point.
        assert_eq!(input.thrust, 1.0);
        assert!(!input.has_rotation());

        let mut beyond = ShipState::at_rest();
        beyond.position = Vector3::new(0.0, 0.0, 900.0);
        let mut pilot = Autopilot::default();
        let input = pilot.steer(&beyond, &k, &gates, 0);
        assert_eq!(
            pilot.leg(),
            Some(Leg::Staging {
                waypoint: Vector3::new(0.0, 0.0, 650.0)
            })
        );
        // Staging point is astern: turn first.
        assert_eq!(input.thrust, 0.0);
        assert!(input.has_rotation());
    }

    #[test]
    fn resting_on_the_axis_runs_straight_through() {
        let k = ShipConstants::default();
        let mut pilot = Autopilot::default();
        let input = pilot.steer(&ShipState::at_rest(), &k, &[gate_ahead(30.0)], 0);
        assert_eq!(
            pilot.leg(),
            Some(Leg::Run {
                direction: Vector3::z()
            })
        );
        assert_eq!(input.thrust, 1.0);
    }

    #[test]
    fn crossing_without_credit_stages_again_from_the_far_side() {
        let k = ShipConstants::default();
        let gates = [gate_ahead(0.0)];
        let mut pilot = Autopilot {
            leg: Some((
                0,
                Leg::Run {
                    direction: Vector3::z(),
                },
            )),
        };
        let mut state = ShipState::at_rest();
        state.position = Vector3::new(60.0, 0.0, 10.0);
        state.velocity = Vector3::new(0.0, 0.0, 5.0);

        pilot.steer(&state, &k, &gates, 0);
        assert_eq!(
            pilot.leg(),
            Some(Leg::Staging {
                waypoint: Vector3::new(0.0, 0.0, 150.0)
            })
        );
    }

    #[test]
    fn turns_towards_a_target_off_the_nose() {
        let k = ShipConstants::default();
        let aim = Vector3::new(300.0, 300.0, 100.0);
        let mut state = ShipState::at_rest();

        let first = turn_towards(&state, &k, &aim);
        assert!(first.pitch < 0.0);
        assert!(first.yaw > 0.0);

        for _ in 0..600 {
            let input = turn_towards(&state, &k, &aim);
            state.step(&k, 1.0 / 60.0, &input);
        }
        let fwd = state.forward();
        assert!(fwd.x > 0.0, "{fwd:?}");
        assert!(fwd.y > 0.0, "{fwd:?}");
    }

    #[test]
    fn no_gates_means_no_input() {
        let mut pilot = Autopilot::default();
        let input = pilot.steer(&ShipState::at_rest(), &ShipConstants::default(), &[], 0);
        assert_eq!(input, ControlInput::IDLE);
        assert_eq!(pilot.leg(), None);
    }

    #[test]
    fn flies_the_builtin_course() {
        let config = SimConfig::default();
        let k = ShipConstants::from_config(&config.ship);
        let dt = 1.0 / config.tick_hz;
        let mut encounter = Encounter::new(Course::builtin(), k.bounding_radius);
        let mut pilot = Autopilot::default();
        let mut state = ShipState::at_rest();

        let mut t = 0.0;
        while t < config.max_seconds && !encounter.status().is_finished() {
            let input = pilot.steer(&state, &k, encounter.gates(), encounter.active_gate_index());
            state.step(&k, dt, &input);
            encounter.tick(&state.position, &state.velocity);
            t += dt;
        }
        assert_eq!(
            encounter.status(),
            RaceStatus::CourseComplete,
            "stopped at gate {} after {t:.0} s",
            encounter.active_gate_index()
        );
    }
}
