//! Simulation of the player's craft.
//!
//! The flight model itself lives in `flight-physics`; this module wires it
//! into Bevy: the ship entity, who is flying it, the fixed-step update and
//! the encounter checks that follow every step.

use std::fmt;

use bevy::prelude::*;
use flight_physics::{ControlInput, ShipConstants, ShipState};
use na::Vector3;

use crate::autopilot::Autopilot;
use crate::encounter::{Encounter, EncounterEvent, RaceStatus};

/// Seconds between telemetry lines.
const TELEMETRY_INTERVAL: f64 = 0.5;

#[derive(Component)]
pub struct PlayerShip;

/// Inputs the ship will fly with on the next fixed step.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct Controls {
    pub input: ControlInput,
}

#[derive(Resource, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PilotMode {
    #[default]
    Manual,
    Autopilot,
}

/// Plugin to fly the player ship through the `Encounter` resource's course.
///
/// Expects `Encounter` to be inserted by the app; `ShipConstants` falls back
/// to the default hull.
#[derive(Default)]
pub struct ShipPlugin;

impl Plugin for ShipPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PilotMode>();
        app.init_resource::<ShipConstants>();
        app.add_systems(Startup, setup_ship);
        app.add_systems(
            FixedUpdate,
            (pilot_controls, advance_ship, track_encounter).chain(),
        );
        app.add_systems(Update, (pilot_keys, report_telemetry));
    }
}

fn setup_ship(mut commands: Commands) {
    commands.spawn((
        Name::new("PlayerShip"),
        ShipState::at_rest(),
        Controls::default(),
        Autopilot::default(),
        PlayerShip,
    ));
}

/// Mode toggle and reset. These are edge-triggered, so they run every frame
/// rather than on the fixed step.
fn pilot_keys(
    kb: Option<Res<ButtonInput<KeyCode>>>,
    mut mode: ResMut<PilotMode>,
    mut encounter: ResMut<Encounter>,
    mut query: Query<(&mut ShipState, &mut Autopilot), With<PlayerShip>>,
) {
    let Some(kb) = kb else {
        return;
    };

    if kb.just_pressed(KeyCode::KeyR) {
        *mode = match *mode {
            PilotMode::Manual => PilotMode::Autopilot,
            PilotMode::Autopilot => PilotMode::Manual,
        };
        for (_, mut pilot) in query.iter_mut() {
            pilot.reset();
        }
        info!("Pilot mode: {:?}", *mode);
    }

    if kb.just_pressed(KeyCode::Backspace) {
        for (mut state, mut pilot) in query.iter_mut() {
            *state = ShipState::at_rest();
            pilot.reset();
        }
        encounter.reset();
        info!("Course reset");
    }
}

fn pilot_controls(
    kb: Option<Res<ButtonInput<KeyCode>>>,
    mode: Res<PilotMode>,
    constants: Res<ShipConstants>,
    encounter: Res<Encounter>,
    mut query: Query<(&mut Controls, &mut Autopilot, &ShipState), With<PlayerShip>>,
) {
    for (mut controls, mut pilot, state) in query.iter_mut() {
        controls.input = match *mode {
            PilotMode::Manual => kb
                .as_deref()
                .map(keyboard_input)
                .unwrap_or(ControlInput::IDLE),
            PilotMode::Autopilot => pilot.steer(
                state,
                &constants,
                encounter.gates(),
                encounter.active_gate_index(),
            ),
        };
    }
}

/// W/S pitch, A/D yaw, Q/E roll, Space main thruster.
pub fn keyboard_input(kb: &ButtonInput<KeyCode>) -> ControlInput {
    let axis = |pos: KeyCode, neg: KeyCode| {
        f64::from(u8::from(kb.pressed(pos))) - f64::from(u8::from(kb.pressed(neg)))
    };
    ControlInput {
        thrust: if kb.pressed(KeyCode::Space) { 1.0 } else { 0.0 },
        pitch: axis(KeyCode::KeyW, KeyCode::KeyS),
        yaw: axis(KeyCode::KeyA, KeyCode::KeyD),
        roll: axis(KeyCode::KeyQ, KeyCode::KeyE),
    }
    .clamped()
}

fn advance_ship(
    time: Res<Time>,
    constants: Res<ShipConstants>,
    mut query: Query<(&mut ShipState, &Controls), With<PlayerShip>>,
) {
    let dt = time.delta_secs_f64();
    if dt <= 0.0 {
        return;
    }
    for (mut state, controls) in query.iter_mut() {
        state.step(&constants, dt, &controls.input);
    }
}

fn track_encounter(mut encounter: ResMut<Encounter>, query: Query<&ShipState, With<PlayerShip>>) {
    let Ok(state) = query.single() else {
        return;
    };

    let tick = encounter.tick(&state.position, &state.velocity);
    match tick.event {
        Some(EncounterEvent::GatePassed { gate }) => {
            info!("Gate {}/{} passed", gate + 1, encounter.gates().len());
            if tick.status == RaceStatus::CourseComplete {
                info!("Course complete");
            }
        }
        Some(EncounterEvent::GateMissed { gate, offset }) => {
            debug!("Crossed gate {} plane {:.1} m off center", gate + 1, offset);
        }
        Some(EncounterEvent::Collision { obstacle }) => {
            warn!(
                "Collided with asteroid {} at {}",
                obstacle,
                fmt_vec(&state.position, 1)
            );
        }
        None => {}
    }
}

/// Snapshot of what the HUD shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub position: Vector3<f64>,
    pub speed_kmh: f64,
    pub forward: Vector3<f64>,
    pub up: Vector3<f64>,
    /// w, x, y, z
    pub orientation: [f64; 4],
}

impl Telemetry {
    pub fn from_state(state: &ShipState) -> Self {
        let q = state.orientation();
        Self {
            position: state.position,
            speed_kmh: state.speed() * 3.6,
            forward: state.forward(),
            up: state.up(),
            orientation: [q.w, q.i, q.j, q.k],
        }
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [w, x, y, z] = self.orientation;
        write!(
            f,
            "pos {} speed {:8.1} km/h fwd {} up {} q ({w:.2}, {x:.2}, {y:.2}, {z:.2})",
            fmt_vec(&self.position, 1),
            self.speed_kmh,
            fmt_vec(&self.forward, 2),
            fmt_vec(&self.up, 2),
        )
    }
}

fn fmt_vec(v: &Vector3<f64>, precision: usize) -> String {
    format!(
        "({:.p$}, {:.p$}, {:.p$})",
        v.x,
        v.y,
        v.z,
        p = precision
    )
}

fn report_telemetry(
    time: Res<Time>,
    mut next_report: Local<f64>,
    encounter: Res<Encounter>,
    query: Query<&ShipState, With<PlayerShip>>,
) {
    let now = time.elapsed_secs_f64();
    if now < *next_report {
        return;
    }
    *next_report = now + TELEMETRY_INTERVAL;

    let Ok(state) = query.single() else {
        return;
    };
    info!(
        "t {:7.1} s {} | gate {}/{}",
        now,
        Telemetry::from_state(state),
        encounter.active_gate_index(),
        encounter.gates().len()
    );
}
