//! Quaternion helpers used by the flight model and the course tracker.
//!
//! Orientation is carried as a plain `Quaternion` rather than a
//! `UnitQuaternion`: the first-order integrator in `attitude` leaves it
//! slightly off the unit sphere until it is renormalized at the end of the
//! step. Everything here is a pure function.

use na::{Quaternion, Unit, UnitQuaternion, Vector3};

/// Hamilton product `a * b`. Not commutative.
#[inline]
pub fn multiply(a: &Quaternion<f64>, b: &Quaternion<f64>) -> Quaternion<f64> {
    a * b
}

/// Negate the vector part.
#[inline]
pub fn conjugate(q: &Quaternion<f64>) -> Quaternion<f64> {
    q.conjugate()
}

/// Rotate `v` by `q`, as the vector part of `q * (0, v) * conj(q)`.
///
/// Only a pure rotation when `q` is unit; a non-unit `q` also scales the
/// result by `|q|²`.
pub fn rotate(q: &Quaternion<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    let p = Quaternion::from_imag(*v);
    multiply(&multiply(q, &p), &conjugate(q)).imag()
}

/// Rotation of `angle` radians about `axis`.
///
/// The axis is normalized here. A zero axis has no direction, so the identity
/// rotation is returned instead of a quaternion full of NaNs.
pub fn from_axis_angle(axis: &Vector3<f64>, angle: f64) -> Quaternion<f64> {
    match Unit::try_new(*axis, 0.0) {
        Some(axis) => {
            let half = 0.5 * angle;
            Quaternion::from_parts(half.cos(), axis.into_inner() * half.sin())
        }
        None => Quaternion::identity(),
    }
}

/// Scale `q` to unit norm. A zero quaternion is returned unchanged.
pub fn normalize(q: &Quaternion<f64>) -> Quaternion<f64> {
    let norm = q.norm();
    if norm == 0.0 { *q } else { *q / norm }
}

/// Normalize into a `UnitQuaternion`, falling back to identity for zero.
pub fn to_unit(q: &Quaternion<f64>) -> UnitQuaternion<f64> {
    if q.norm() == 0.0 {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::new_unchecked(normalize(q))
    }
}

/// Body +Z (nose) in world space.
pub fn forward(q: &Quaternion<f64>) -> Vector3<f64> {
    rotate(q, &Vector3::z())
}

/// Body +Y in world space.
pub fn up(q: &Quaternion<f64>) -> Vector3<f64> {
    rotate(q, &Vector3::y())
}

/// Body +X in world space.
pub fn right(q: &Quaternion<f64>) -> Vector3<f64> {
    rotate(q, &Vector3::x())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn normalize_is_idempotent_and_unit() {
        let q = Quaternion::new(3.0, -1.0, 0.5, 2.0);
        let once = normalize(&q);
        let twice = normalize(&once);
        assert_relative_eq!(once.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(once, twice, epsilon = 1e-12);
    }

    #[test]
    fn normalize_leaves_zero_alone() {
        let zero = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(normalize(&zero), zero);
        assert_eq!(to_unit(&zero), UnitQuaternion::identity());
    }

    #[test]
    fn rotation_preserves_length() {
        let q = from_axis_angle(&Vector3::new(1.0, 2.0, -0.5), 1.234);
        for v in [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-3.0, 4.0, 12.0),
            Vector3::new(0.01, -0.02, 0.03),
        ] {
            assert_relative_eq!(rotate(&q, &v).norm(), v.norm(), epsilon = 1e-9);
        }
    }

    #[test]
    fn quarter_turn_about_y_takes_nose_to_right() {
        let q = from_axis_angle(&Vector3::new(0.0, 5.0, 0.0), FRAC_PI_2);
        assert_relative_eq!(forward(&q), Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(up(&q), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(right(&q), -Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn zero_axis_falls_back_to_identity() {
        let q = from_axis_angle(&Vector3::zeros(), 1.0);
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn multiply_is_not_commutative() {
        let a = from_axis_angle(&Vector3::x(), 0.7);
        let b = from_axis_angle(&Vector3::y(), 0.3);
        let ab = multiply(&a, &b);
        let ba = multiply(&b, &a);
        assert!((ab - ba).norm() > 1e-3);
        // Composition matches rotating twice.
        let v = Vector3::new(0.2, -1.0, 0.4);
        assert_relative_eq!(rotate(&ab, &v), rotate(&a, &rotate(&b, &v)), epsilon = 1e-12);
    }

    #[test]
    fn conjugate_undoes_rotation() {
        let q = from_axis_angle(&Vector3::new(0.3, 0.3, 1.0), -2.0);
        let v = Vector3::new(5.0, 6.0, 7.0);
        assert_relative_eq!(rotate(&conjugate(&q), &rotate(&q, &v)), v, epsilon = 1e-9);
    }
}
