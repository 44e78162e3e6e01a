//! Mapping from sweep progress on a meridian to a world position and to the
//! normalized result point.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix3, Point3, Rotation3, Vector3};
use perimetry_core::PolarPoint;

const DEGENERATE_NORM_SQ: f64 = 1e-6;

/// Orthonormal frame whose z axis points along `direction`.
fn orientation_frame(direction: &Vector3<f64>, world_up: &Vector3<f64>) -> Matrix3<f64> {
    let z = direction
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(|| -Vector3::z());
    let mut x = world_up.cross(&z);
    if x.norm_squared() < DEGENERATE_NORM_SQ {
        x = Vector3::z().cross(&z);
        if x.norm_squared() < DEGENERATE_NORM_SQ {
            x = Vector3::x().cross(&z);
        }
    }
    let x = x.normalize();
    let y = z.cross(&x);
    Matrix3::from_columns(&[x, y, z])
}

/// Rotation taking direction `a` onto direction `b`: R = B·Aᵀ for the two
/// orientation frames built around the world up axis.
pub fn rotation_between(a: &Vector3<f64>, b: &Vector3<f64>) -> Rotation3<f64> {
    let up = Vector3::y();
    let frame_a = orientation_frame(a, &up);
    let frame_b = orientation_frame(b, &up);
    Rotation3::from_matrix_unchecked(frame_b * frame_a.transpose())
}

/// Stimulus sphere of fixed radius around the viewer. The Thales point
/// `(0, 0, -radius)` is straight ahead and marks the centre of the field.
#[derive(Debug, Clone)]
pub struct SphereProjection {
    radius: f64,
    rotation: Rotation3<f64>,
}

impl SphereProjection {
    pub fn new(radius: f64) -> Self {
        let straight_ahead = Vector3::new(0.0, 0.0, -radius);
        Self {
            radius,
            rotation: rotation_between(&straight_ahead, &straight_ahead),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn thales_point(&self) -> Point3<f64> {
        Point3::new(0.0, 0.0, -self.radius)
    }

    pub fn rotation(&self) -> &Rotation3<f64> {
        &self.rotation
    }

    /// Re-aims the field at a moved fixation target.
    pub fn set_fixation_target(&mut self, target: &Point3<f64>) {
        self.rotation = rotation_between(&self.thales_point().coords, &target.coords);
    }

    /// Polar angle of the sphere point for a sweep fraction in [0, 1].
    pub fn theta_from_fraction(fraction: f64) -> f64 {
        fraction * FRAC_PI_2 + FRAC_PI_2
    }

    fn min_max_normalize(&self, value: f64) -> f64 {
        let (lo, hi) = (-self.radius, self.radius);
        2.0 * ((value - lo) / (hi - lo)) - 1.0
    }

    /// Render position and result point for a meridian and sweep fraction
    /// (0 = rim, 1 = Thales point).
    pub fn coordinates(&self, longitude_deg: f64, fraction: f64) -> (Point3<f64>, PolarPoint) {
        let theta = Self::theta_from_fraction(fraction);
        let phi = longitude_deg.to_radians();

        let raw = Point3::new(
            theta.sin() * phi.cos() * self.radius,
            theta.sin() * phi.sin() * self.radius,
            theta.cos() * self.radius,
        );
        let offset = raw - self.thales_point();
        let point = PolarPoint {
            theta: self.min_max_normalize(offset.y) * 90.0,
            phi: self.min_max_normalize(offset.x) * 90.0,
        };

        (self.rotation * raw, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rim_on_horizontal_meridian() {
        let projection = SphereProjection::new(50.0);
        let (position, point) = projection.coordinates(0.0, 0.0);
        assert_abs_diff_eq!(position, Point3::new(50.0, 0.0, 0.0), epsilon = 1e-9);
        assert_abs_diff_eq!(point.phi, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.theta, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rim_on_vertical_meridian() {
        let projection = SphereProjection::new(50.0);
        let (_, point) = projection.coordinates(90.0, 0.0);
        assert_abs_diff_eq!(point.theta, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.phi, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_full_sweep_reaches_thales_point() {
        let projection = SphereProjection::new(50.0);
        let (position, point) = projection.coordinates(210.0, 1.0);
        assert_abs_diff_eq!(position, projection.thales_point(), epsilon = 1e-9);
        assert_abs_diff_eq!(point.theta, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(point.phi, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_points_stay_on_sphere() {
        let projection = SphereProjection::new(50.0);
        for longitude in [0.0, 45.0, 135.0, 300.0] {
            for fraction in [0.0, 0.25, 0.5, 0.9] {
                let (position, point) = projection.coordinates(longitude, fraction);
                assert_abs_diff_eq!(position.coords.norm(), 50.0, epsilon = 1e-9);
                assert!(point.theta.abs() <= 90.0 + 1e-9);
                assert!(point.phi.abs() <= 90.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_initial_rotation_is_identity() {
        let projection = SphereProjection::new(50.0);
        assert_abs_diff_eq!(
            *projection.rotation().matrix(),
            Matrix3::identity(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_moved_fixation_target_rotates_field() {
        let mut projection = SphereProjection::new(50.0);
        projection.set_fixation_target(&Point3::new(0.0, 50.0, 0.0));
        let (position, point) = projection.coordinates(0.0, 1.0);
        assert_abs_diff_eq!(position, Point3::new(0.0, 50.0, 0.0), epsilon = 1e-9);
        // The result point is independent of where the field is drawn.
        assert_abs_diff_eq!(point.theta, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_is_orthonormal_for_arbitrary_targets() {
        let r = rotation_between(&Vector3::new(0.0, 0.0, -1.0), &Vector3::new(0.3, -0.2, -0.9));
        let m = r.matrix();
        assert_abs_diff_eq!(m * m.transpose(), Matrix3::identity(), epsilon = 1e-9);
        assert_abs_diff_eq!(m.determinant(), 1.0, epsilon = 1e-9);
    }
}
