//! Race progress: obstacle collisions and ordered gate crossings.

use std::cmp::Ordering;

use bevy::prelude::Resource;
use na::Vector3;

use crate::course::{Course, Gate, Obstacle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RaceStatus {
    #[default]
    Playing,
    GameOver,
    CourseComplete,
}

impl RaceStatus {
    pub fn is_finished(self) -> bool {
        self != RaceStatus::Playing
    }
}

/// Something noteworthy that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EncounterEvent {
    Collision { obstacle: usize },
    GatePassed { gate: usize },
    /// The gate plane was crossed `offset` meters from its center, outside
    /// the opening.
    GateMissed { gate: usize, offset: f64 },
}

/// Result of one tracker tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub status: RaceStatus,
    pub active_gate: usize,
    pub event: Option<EncounterEvent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct EncounterState {
    active_gate: usize,
    /// Signed distance to the active gate plane at the previous tick. `None`
    /// means there is no baseline and no crossing can be detected this tick.
    last_distance: Option<f64>,
    status: RaceStatus,
}

/// Tracks the ship against one course.
#[derive(Debug, Clone, Resource)]
pub struct Encounter {
    course: Course,
    ship_radius: f64,
    state: EncounterState,
}

impl Encounter {
    pub fn new(mut course: Course, ship_radius: f64) -> Self {
        for gate in &mut course.gates {
            gate.passed = false;
        }
        Self {
            course,
            ship_radius,
            state: EncounterState::default(),
        }
    }

    /// Start the course over: every gate unpassed, fresh state.
    pub fn reset(&mut self) {
        for gate in &mut self.course.gates {
            gate.passed = false;
        }
        self.state = EncounterState::default();
    }

    pub fn status(&self) -> RaceStatus {
        self.state.status
    }

    pub fn active_gate_index(&self) -> usize {
        self.state.active_gate
    }

    pub fn active_gate(&self) -> Option<&Gate> {
        self.course.gates.get(self.state.active_gate)
    }

    pub fn gates(&self) -> &[Gate] {
        &self.course.gates
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.course.obstacles
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn ship_radius(&self) -> f64 {
        self.ship_radius
    }

    /// Run the per-tick checks against the ship's current position.
    ///
    /// Crossings are found from the change of side between ticks, so the
    /// velocity is not consulted.
    pub fn tick(&mut self, ship_position: &Vector3<f64>, _ship_velocity: &Vector3<f64>) -> Tick {
        let event = if self.state.status.is_finished() {
            None
        } else if let Some(obstacle) = self.first_collision(ship_position) {
            self.state.status = RaceStatus::GameOver;
            Some(EncounterEvent::Collision { obstacle })
        } else {
            self.check_active_gate(ship_position)
        };

        Tick {
            status: self.state.status,
            active_gate: self.state.active_gate,
            event,
        }
    }

    fn first_collision(&self, ship_position: &Vector3<f64>) -> Option<usize> {
        self.course
            .obstacles
            .iter()
            .position(|o| (ship_position - o.position).norm() < self.ship_radius + o.radius)
    }

    fn check_active_gate(&mut self, ship_position: &Vector3<f64>) -> Option<EncounterEvent> {
        let index = self.state.active_gate;
        let gate = self.course.gates.get_mut(index)?;

        let d = gate.signed_distance(ship_position);

        let crossed = self
            .state
            .last_distance
            .is_some_and(|prev| side(prev) != side(d));

        if !crossed {
            self.state.last_distance = Some(d);
            return None;
        }

        // Any crossing uses up the baseline, in or out of the opening.
        self.state.last_distance = None;

        let offset = gate.plane_offset(ship_position);
        if offset >= gate.radius {
            return Some(EncounterEvent::GateMissed {
                gate: index,
                offset,
            });
        }

        gate.passed = true;
        self.state.active_gate += 1;
        if self.state.active_gate == self.course.gates.len() {
            self.state.status = RaceStatus::CourseComplete;
        }
        Some(EncounterEvent::GatePassed { gate: index })
    }
}

/// Which side of a plane a signed distance lies on; exactly on the plane is
/// its own side.
fn side(d: f64) -> Ordering {
    d.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::UnitQuaternion;

    fn gate_at_origin() -> Gate {
        Gate::new(Vector3::zeros(), UnitQuaternion::identity(), 10.0)
    }

    fn course_with(gates: Vec<Gate>, obstacles: Vec<Obstacle>) -> Course {
        Course {
            gates,
            obstacles,
            ..Course::default()
        }
    }

    fn fly(encounter: &mut Encounter, points: &[[f64; 3]]) -> Tick {
        let mut last = None;
        for p in points {
            last = Some(encounter.tick(&Vector3::from(*p), &Vector3::zeros()));
        }
        last.expect("at least one point")
    }

    #[test]
    fn crossing_inside_the_opening_passes_the_gate() {
        let course = course_with(
            vec![
                gate_at_origin(),
                Gate::new(Vector3::new(0.0, 0.0, 100.0), UnitQuaternion::identity(), 10.0),
            ],
            vec![],
        );
        let mut enc = Encounter::new(course, 20.0);

        let first = enc.tick(&Vector3::new(0.0, 0.0, -1.0), &Vector3::zeros());
        assert_eq!(first.event, None);
        assert_eq!(enc.state.last_distance, Some(-1.0));

        let tick = enc.tick(&Vector3::new(0.0, 0.0, 1.0), &Vector3::zeros());
        assert_eq!(tick.event, Some(EncounterEvent::GatePassed { gate: 0 }));
        assert_eq!(tick.active_gate, 1);
        assert_eq!(tick.status, RaceStatus::Playing);
        assert!(enc.gates()[0].passed);
        assert_eq!(enc.state.last_distance, None);
    }

    #[test]
    fn crossing_outside_the_opening_is_ignored_and_clears_baseline() {
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![]), 20.0);

        let tick = fly(&mut enc, &[[20.0, 0.0, -1.0], [20.0, 0.0, 1.0]]);
        assert_eq!(
            tick.event,
            Some(EncounterEvent::GateMissed {
                gate: 0,
                offset: 20.0
            })
        );
        assert_eq!(tick.active_gate, 0);
        assert!(!enc.gates()[0].passed);
        assert_eq!(enc.state.last_distance, None);
    }

    #[test]
    fn near_miss_needs_a_fresh_crossing() {
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![]), 20.0);

        // Miss wide, then swing into the opening while still on the far side:
        // no credit until the plane is crossed again.
        fly(&mut enc, &[[20.0, 0.0, -1.0], [20.0, 0.0, 1.0], [0.0, 0.0, 2.0]]);
        assert_eq!(enc.active_gate_index(), 0);

        let tick = fly(&mut enc, &[[0.0, 0.0, -2.0]]);
        assert_eq!(tick.event, Some(EncounterEvent::GatePassed { gate: 0 }));
    }

    #[test]
    fn single_gate_course_completes() {
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![]), 20.0);
        let tick = fly(&mut enc, &[[0.0, 0.0, -1.0], [0.0, 0.0, 1.0]]);
        assert_eq!(tick.status, RaceStatus::CourseComplete);
        assert_eq!(tick.active_gate, 1);
        assert!(enc.active_gate().is_none());
    }

    #[test]
    fn obstacle_collision_uses_summed_radii() {
        let rock = Obstacle::new(Vector3::zeros(), 5.0);

        let mut enc = Encounter::new(course_with(vec![], vec![rock.clone()]), 20.0);
        let tick = enc.tick(&Vector3::new(26.0, 0.0, 0.0), &Vector3::zeros());
        assert_eq!(tick.status, RaceStatus::Playing);

        let tick = enc.tick(&Vector3::new(19.0, 0.0, 0.0), &Vector3::zeros());
        assert_eq!(tick.status, RaceStatus::GameOver);
        assert_eq!(tick.event, Some(EncounterEvent::Collision { obstacle: 0 }));
    }

    #[test]
    fn collision_wins_over_gate_crossing() {
        let rock = Obstacle::new(Vector3::new(0.0, 0.0, 10.0), 5.0);
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![rock]), 20.0);
        let tick = fly(&mut enc, &[[0.0, 0.0, -100.0], [0.0, 0.0, 1.0]]);
        assert_eq!(tick.status, RaceStatus::GameOver);
        assert!(!enc.gates()[0].passed);
    }

    #[test]
    fn finished_states_are_sticky_until_reset() {
        let rock = Obstacle::new(Vector3::new(0.0, 0.0, -50.0), 5.0);
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![rock]), 20.0);
        fly(&mut enc, &[[0.0, 0.0, -50.0]]);
        assert_eq!(enc.status(), RaceStatus::GameOver);

        // Flying through the gate afterwards changes nothing.
        let tick = fly(&mut enc, &[[0.0, 0.0, -1.0], [0.0, 0.0, 1.0]]);
        assert_eq!(tick.status, RaceStatus::GameOver);
        assert_eq!(tick.event, None);
        assert_eq!(tick.active_gate, 0);

        enc.reset();
        assert_eq!(enc.status(), RaceStatus::Playing);
        let tick = fly(&mut enc, &[[0.0, 0.0, -1.0], [0.0, 0.0, 1.0]]);
        assert_eq!(tick.status, RaceStatus::CourseComplete);
    }

    #[test]
    fn reset_clears_passed_flags() {
        let mut enc = Encounter::new(course_with(vec![gate_at_origin()], vec![]), 20.0);
        fly(&mut enc, &[[0.0, 0.0, -1.0], [0.0, 0.0, 1.0]]);
        assert!(enc.gates()[0].passed);

        enc.reset();
        assert!(!enc.gates()[0].passed);
        assert_eq!(enc.active_gate_index(), 0);
    }

    #[test]
    fn tilted_gate_uses_its_own_normal() {
        // Gate turned a quarter about +Y faces +X; flying along +Z beside it
        // never crosses it, flying along +X does.
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let gate = Gate::new(Vector3::new(0.0, 0.0, 0.0), q, 10.0);

        let mut enc = Encounter::new(course_with(vec![gate.clone()], vec![]), 20.0);
        let tick = fly(&mut enc, &[[5.0, 0.0, -1.0], [5.0, 0.0, 1.0]]);
        assert_eq!(tick.event, None);

        let mut enc = Encounter::new(course_with(vec![gate], vec![]), 20.0);
        let tick = fly(&mut enc, &[[-1.0, 2.0, 0.0], [1.0, 2.0, 0.0]]);
        assert_eq!(tick.event, Some(EncounterEvent::GatePassed { gate: 0 }));
    }

    #[test]
    fn empty_course_keeps_playing() {
        let mut enc = Encounter::new(Course::default(), 20.0);
        let tick = fly(&mut enc, &[[0.0, 0.0, -1.0], [0.0, 0.0, 1.0]]);
        assert_eq!(tick.status, RaceStatus::Playing);
        assert_eq!(tick.event, None);
    }
}
