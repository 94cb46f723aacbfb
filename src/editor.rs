//! Course editing model: selection and placement of gates and asteroids.
//!
//! This holds no camera or window state; a front end feeds it world-space
//! picks and edit commands.

use flight_physics::quat;
use na::{UnitQuaternion, Vector3};

use crate::course::{Course, Gate, Obstacle};

/// Size of a freshly placed gate, m.
pub const NEW_GATE_SIZE: f64 = 800.0;
/// Size of a freshly placed asteroid, m.
pub const NEW_ASTEROID_SIZE: f64 = 200.0;
/// Asteroids can't be shrunk below this, m.
pub const MIN_ASTEROID_SIZE: f64 = 10.0;

/// What the editor currently has selected, by index into the course lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Gate(usize),
    Obstacle(usize),
}

#[derive(Debug, Clone, Default)]
pub struct CourseEditor {
    course: Course,
    selection: Option<Selection>,
}

impl CourseEditor {
    pub fn new(course: Course) -> Self {
        Self {
            course,
            selection: None,
        }
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn into_course(self) -> Course {
        self.course
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// Select `sel` if it refers to an existing object. Returns whether the
    /// selection changed to it.
    pub fn select(&mut self, sel: Selection) -> bool {
        let exists = match sel {
            Selection::Gate(i) => i < self.course.gates.len(),
            Selection::Obstacle(i) => i < self.course.obstacles.len(),
        };
        if exists {
            self.selection = Some(sel);
        }
        exists
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Select the object closest to `point`, if any lies within `max_dist`.
    /// Gates win ties.
    pub fn select_nearest(&mut self, point: &Vector3<f64>, max_dist: f64) -> Option<Selection> {
        let gates = self
            .course
            .gates
            .iter()
            .enumerate()
            .map(|(i, g)| (Selection::Gate(i), (g.position - point).norm()));
        let obstacles = self
            .course
            .obstacles
            .iter()
            .enumerate()
            .map(|(i, o)| (Selection::Obstacle(i), (o.position - point).norm()));

        let mut best: Option<(Selection, f64)> = None;
        for (sel, dist) in gates.chain(obstacles) {
            if dist < max_dist && best.is_none_or(|(_, d)| dist < d) {
                best = Some((sel, dist));
            }
        }
        self.selection = best.map(|(sel, _)| sel);
        self.selection
    }

    /// Append a gate at the origin and select it.
    pub fn add_gate(&mut self) -> Selection {
        self.course.gates.push(Gate::new(
            Vector3::zeros(),
            UnitQuaternion::identity(),
            NEW_GATE_SIZE,
        ));
        let sel = Selection::Gate(self.course.gates.len() - 1);
        self.selection = Some(sel);
        sel
    }

    /// Append an asteroid at the origin and select it.
    pub fn add_obstacle(&mut self) -> Selection {
        self.course
            .obstacles
            .push(Obstacle::new(Vector3::zeros(), NEW_ASTEROID_SIZE));
        let sel = Selection::Obstacle(self.course.obstacles.len() - 1);
        self.selection = Some(sel);
        sel
    }

    /// Remove the selected object. Later gates move up one place in the race
    /// order.
    pub fn delete_selected(&mut self) -> bool {
        let Some(sel) = self.selection.take() else {
            return false;
        };
        match sel {
            Selection::Gate(i) if i < self.course.gates.len() => {
                self.course.gates.remove(i);
                true
            }
            Selection::Obstacle(i) if i < self.course.obstacles.len() => {
                self.course.obstacles.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Position and orientation of the selected object, whatever its kind.
    pub fn placement_mut(&mut self) -> Option<(&mut Vector3<f64>, &mut UnitQuaternion<f64>)> {
        match self.selection? {
            Selection::Gate(i) => self
                .course
                .gates
                .get_mut(i)
                .map(|g| (&mut g.position, &mut g.orientation)),
            Selection::Obstacle(i) => self
                .course
                .obstacles
                .get_mut(i)
                .map(|o| (&mut o.position, &mut o.orientation)),
        }
    }

    pub fn translate_selected(&mut self, delta: &Vector3<f64>) -> bool {
        match self.placement_mut() {
            Some((position, _)) => {
                *position += delta;
                true
            }
            None => false,
        }
    }

    /// Turn the selection about a world axis. The rotation is applied on top
    /// of the current orientation.
    pub fn rotate_selected(&mut self, axis: &Vector3<f64>, angle: f64) -> bool {
        let turn = quat::from_axis_angle(axis, angle);
        match self.placement_mut() {
            Some((_, orientation)) => {
                *orientation = quat::to_unit(&quat::multiply(&turn, orientation.quaternion()));
                true
            }
            None => false,
        }
    }

    /// Grow or shrink the selected asteroid. Gates keep their size.
    pub fn resize_selected(&mut self, delta: f64) -> bool {
        match self.selected_obstacle_mut() {
            Some(obstacle) => {
                obstacle.radius = (obstacle.radius + delta).max(MIN_ASTEROID_SIZE);
                true
            }
            None => false,
        }
    }

    pub fn set_model(&mut self, model_id: &str) -> bool {
        match self.selected_obstacle_mut() {
            Some(obstacle) => {
                obstacle.model_id = model_id.to_string();
                true
            }
            None => false,
        }
    }

    fn selected_obstacle_mut(&mut self) -> Option<&mut Obstacle> {
        match self.selection? {
            Selection::Obstacle(i) => self.course.obstacles.get_mut(i),
            Selection::Gate(_) => None,
        }
    }
}
