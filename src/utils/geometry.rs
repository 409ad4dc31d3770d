use nalgebra::{Unit, UnitQuaternion, Vector3};

/// Below this length a vector has no usable direction.
pub const EPSILON: f64 = 1e-9;

/// Normalized copy of `v`, or `None` for a (near) zero vector.
#[inline]
pub fn safe_normalize(v: &Vector3<f64>) -> Option<Vector3<f64>> {
    let n = v.norm();
    if n > EPSILON {
        Some(v / n)
    } else {
        None
    }
}

/// Rotation taking direction `from` onto direction `to`.
///
/// Identity when either vector is degenerate. Opposite vectors get a half
/// turn around an arbitrary axis perpendicular to `from`.
pub fn from_to_rotation(from: &Vector3<f64>, to: &Vector3<f64>) -> UnitQuaternion<f64> {
    let (Some(a), Some(b)) = (safe_normalize(from), safe_normalize(to)) else {
        return UnitQuaternion::identity();
    };
    match UnitQuaternion::rotation_between(&a, &b) {
        Some(rot) => rot,
        None => {
            // antiparallel
            let helper = if a.x.abs() < 0.9 {
                Vector3::x()
            } else {
                Vector3::y()
            };
            match safe_normalize(&a.cross(&helper)) {
                Some(axis) => {
                    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(axis), std::f64::consts::PI)
                }
                None => UnitQuaternion::identity(),
            }
        }
    }
}

/// Unsigned angle in radians between two vectors, zero if either is degenerate.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    match (safe_normalize(a), safe_normalize(b)) {
        (Some(a), Some(b)) => a.dot(&b).clamp(-1.0, 1.0).acos(),
        _ => 0.0,
    }
}

/// Angle in radians from `from` to `to`, signed by the side of `axis`.
pub fn signed_angle(from: &Vector3<f64>, to: &Vector3<f64>, axis: &Vector3<f64>) -> f64 {
    let angle = angle_between(from, to);
    if axis.dot(&from.cross(to)) < 0.0 {
        -angle
    } else {
        angle
    }
}

/// Projection of `point` onto the plane through `origin` with unit `normal`.
#[inline]
pub fn closest_point_on_plane(
    normal: &Vector3<f64>,
    origin: &Vector3<f64>,
    point: &Vector3<f64>,
) -> Vector3<f64> {
    point - normal * normal.dot(&(point - origin))
}

/// Wraps an angle in degrees into (-180, 180].
pub fn normalize_angle_deg(angle: f64) -> f64 {
    let mut a = angle % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Euler angles (roll, pitch, yaw) in degrees to a rotation.
#[inline]
pub fn euler_deg_to_quat(angles: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(
        angles.x.to_radians(),
        angles.y.to_radians(),
        angles.z.to_radians(),
    )
}

/// Rotation to Euler angles (roll, pitch, yaw) in degrees.
#[inline]
pub fn quat_to_euler_deg(rot: &UnitQuaternion<f64>) -> Vector3<f64> {
    let (roll, pitch, yaw) = rot.euler_angles();
    Vector3::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
}
