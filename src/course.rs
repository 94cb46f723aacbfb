//! Race courses: gates, asteroids and the JSON course file.
//!
//! Gate order in the file is the race order. Orientations are stored as
//! `[w, x, y, z]`.

use std::{
    f64::consts::PI,
    fs, io,
    path::{Path, PathBuf},
};

use flight_physics::quat;
use na::{Quaternion, UnitQuaternion, Vector3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Course file format version written by `save`.
pub const COURSE_VERSION: u32 = 1;

/// Default edge length of the playable cube, m.
pub const DEFAULT_BOUNDARY: f64 = 20_000.0;

pub const DEFAULT_MODEL_ID: &str = "asteroid_jagged_1";

/// Validate the edge length of an asteroid field, m.
pub fn check_field_size(size: f64) -> Result<f64, String> {
    if size.is_finite() && size >= 0.0 {
        Ok(size)
    } else {
        Err(format!("field size must be finite and non-negative, got {size}"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error("course file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to access course file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed course file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported course file version {0}")]
    UnsupportedVersion(u32),

    #[error("{kind} {index} has a zero-length orientation")]
    DegenerateOrientation { kind: &'static str, index: usize },

    #[error("{kind} {index} has non-positive size {size}")]
    InvalidSize {
        kind: &'static str,
        index: usize,
        size: f64,
    },
}

impl CourseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CourseError::NotFound(_))
    }
}

/// Size of the playable volume, as written by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries {
    #[serde(default = "default_boundary")]
    pub width: f64,
    #[serde(default = "default_boundary")]
    pub height: f64,
    #[serde(default = "default_boundary")]
    pub depth: f64,
}

fn default_boundary() -> f64 {
    DEFAULT_BOUNDARY
}

impl Default for Boundaries {
    fn default() -> Self {
        Self {
            width: DEFAULT_BOUNDARY,
            height: DEFAULT_BOUNDARY,
            depth: DEFAULT_BOUNDARY,
        }
    }
}

/// An oriented square gate. The ship must cross the plane whose normal is the
/// gate's rotated +Z, within `radius` of its center.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Half-size of the opening, m.
    pub radius: f64,
    pub passed: bool,
}

impl Gate {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>, radius: f64) -> Self {
        Self {
            position,
            orientation,
            radius,
            passed: false,
        }
    }

    /// Unit normal of the gate plane in world space.
    pub fn normal(&self) -> Vector3<f64> {
        quat::forward(self.orientation.quaternion())
    }

    /// Signed distance from `point` to the gate plane, positive on the side
    /// the normal points to.
    pub fn signed_distance(&self, point: &Vector3<f64>) -> f64 {
        (point - self.position).dot(&self.normal())
    }

    /// Distance from the gate center to `point` projected onto the gate
    /// plane.
    pub fn plane_offset(&self, point: &Vector3<f64>) -> f64 {
        let normal = self.normal();
        let rel = point - self.position;
        (rel - normal * rel.dot(&normal)).norm()
    }
}

/// A static asteroid. Collision treats it as a sphere of `radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub model_id: String,
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub radius: f64,
    /// Carried through the course file; obstacles do not move in flight.
    pub angular_velocity: Vector3<f64>,
}

impl Obstacle {
    pub fn new(position: Vector3<f64>, radius: f64) -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            position,
            orientation: UnitQuaternion::identity(),
            radius,
            angular_velocity: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub name: String,
    pub boundaries: Boundaries,
    pub gates: Vec<Gate>,
    pub obstacles: Vec<Obstacle>,
}

impl Default for Course {
    fn default() -> Self {
        Self {
            name: "Designer Course".to_string(),
            boundaries: Boundaries::default(),
            gates: Vec::new(),
            obstacles: Vec::new(),
        }
    }
}

impl Course {
    /// The eight-gate winding course, without asteroids.
    pub fn builtin() -> Self {
        const GATE_SIZE: f64 = 40.0;
        let path: [([f64; 3], Vector3<f64>, f64); 8] = [
            ([0.0, 0.0, 500.0], Vector3::x(), 0.0),
            ([400.0, 200.0, 1000.0], Vector3::y(), PI / 4.0),
            ([400.0, 200.0, 1500.0], Vector3::y(), PI / 2.0),
            ([0.0, 400.0, 2000.0], Vector3::x(), -PI / 4.0),
            ([-400.0, 0.0, 2500.0], Vector3::y(), -PI / 2.0),
            ([-400.0, -200.0, 3000.0], Vector3::y(), -PI / 4.0),
            ([0.0, -400.0, 3500.0], Vector3::x(), PI / 4.0),
            ([0.0, 0.0, 4000.0], Vector3::x(), 0.0),
        ];

        let gates = path
            .iter()
            .map(|(pos, axis, angle)| {
                Gate::new(
                    Vector3::from(*pos),
                    quat::to_unit(&quat::from_axis_angle(axis, *angle)),
                    GATE_SIZE,
                )
            })
            .collect();

        Self {
            name: "Built-in Course".to_string(),
            gates,
            ..Self::default()
        }
    }

    /// Scatter `count` asteroids through a cube of edge `field_size` centered
    /// on the origin, keeping `clearance` meters free around the start.
    ///
    /// # Panics
    ///
    /// If `field_size` is negative or not finite. Values from users go
    /// through `check_field_size` first.
    pub fn scatter_asteroids<R: Rng>(
        &mut self,
        rng: &mut R,
        count: usize,
        field_size: f64,
        clearance: f64,
    ) {
        let half = field_size / 2.0;
        for _ in 0..count {
            let mut pos = Vector3::from_fn(|_, _| rng.random_range(-half..=half));
            let size = rng.random_range(10.0..60.0);

            let dist = pos.norm();
            if dist < clearance {
                pos = if dist > 0.0 {
                    pos / dist * clearance
                } else {
                    Vector3::x() * clearance
                };
            }
            self.obstacles.push(Obstacle::new(pos, size));
        }
    }

    pub fn load(path: &Path) -> Result<Self, CourseError> {
        let text = fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CourseError::NotFound(path.to_path_buf())
            } else {
                CourseError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::from_json(&text)
    }

    /// Load `path`, or hand back `current` along with the reason the file was
    /// rejected.
    pub fn load_or_keep(path: &Path, current: Course) -> (Course, Option<CourseError>) {
        match Self::load(path) {
            Ok(course) => (course, None),
            Err(err) => (current, Some(err)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CourseError> {
        let text = self.to_json()?;
        fs::write(path, text).map_err(|source| CourseError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, CourseError> {
        let file: CourseFile = serde_json::from_str(text)?;
        file.try_into()
    }

    pub fn to_json(&self) -> Result<String, CourseError> {
        Ok(serde_json::to_string_pretty(&CourseFile::from(self))?)
    }
}

/// On-disk layout of a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CourseFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    course_name: String,
    #[serde(default)]
    boundaries: Boundaries,
    #[serde(default)]
    race_gates: Vec<GateRecord>,
    #[serde(default)]
    asteroids: Vec<AsteroidRecord>,
}

fn default_version() -> u32 {
    COURSE_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GateRecord {
    gate_number: usize,
    position: [f64; 3],
    orientation: [f64; 4],
    size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AsteroidRecord {
    #[serde(default = "default_model_id")]
    model_id: String,
    position: [f64; 3],
    #[serde(default = "identity_wxyz")]
    orientation: [f64; 4],
    size: f64,
    #[serde(default)]
    angular_velocity: [f64; 3],
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn identity_wxyz() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn orientation_from_wxyz(
    wxyz: [f64; 4],
    kind: &'static str,
    index: usize,
) -> Result<UnitQuaternion<f64>, CourseError> {
    let [w, x, y, z] = wxyz;
    let q = Quaternion::new(w, x, y, z);
    if q.norm() == 0.0 || !q.norm().is_finite() {
        return Err(CourseError::DegenerateOrientation { kind, index });
    }
    Ok(quat::to_unit(&q))
}

fn wxyz(q: &UnitQuaternion<f64>) -> [f64; 4] {
    [q.w, q.i, q.j, q.k]
}

fn check_size(size: f64, kind: &'static str, index: usize) -> Result<f64, CourseError> {
    if size > 0.0 && size.is_finite() {
        Ok(size)
    } else {
        Err(CourseError::InvalidSize { kind, index, size })
    }
}

impl TryFrom<CourseFile> for Course {
    type Error = CourseError;

    fn try_from(file: CourseFile) -> Result<Self, Self::Error> {
        if file.version > COURSE_VERSION {
            return Err(CourseError::UnsupportedVersion(file.version));
        }

        let gates = file
            .race_gates
            .into_iter()
            .enumerate()
            .map(|(i, g)| {
                Ok(Gate::new(
                    Vector3::from(g.position),
                    orientation_from_wxyz(g.orientation, "gate", i)?,
                    check_size(g.size, "gate", i)?,
                ))
            })
            .collect::<Result<Vec<_>, CourseError>>()?;

        let obstacles = file
            .asteroids
            .into_iter()
            .enumerate()
            .map(|(i, a)| {
                Ok(Obstacle {
                    orientation: orientation_from_wxyz(a.orientation, "asteroid", i)?,
                    radius: check_size(a.size, "asteroid", i)?,
                    model_id: a.model_id,
                    position: Vector3::from(a.position),
                    angular_velocity: Vector3::from(a.angular_velocity),
                })
            })
            .collect::<Result<Vec<_>, CourseError>>()?;

        Ok(Course {
            name: file.course_name,
            boundaries: file.boundaries,
            gates,
            obstacles,
        })
    }
}

impl From<&Course> for CourseFile {
    fn from(course: &Course) -> Self {
        CourseFile {
            version: COURSE_VERSION,
            course_name: course.name.clone(),
            boundaries: course.boundaries,
            race_gates: course
                .gates
                .iter()
                .enumerate()
                .map(|(i, g)| GateRecord {
                    gate_number: i + 1,
                    position: g.position.into(),
                    orientation: wxyz(&g.orientation),
                    size: g.radius,
                })
                .collect(),
            asteroids: course
                .obstacles
                .iter()
                .map(|a| AsteroidRecord {
                    model_id: a.model_id.clone(),
                    position: a.position.into(),
                    orientation: wxyz(&a.orientation),
                    size: a.radius,
                    angular_velocity: a.angular_velocity.into(),
                })
                .collect(),
        }
    }
}
