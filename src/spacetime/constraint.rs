use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::utils::geometry::normalize_angle_deg;
use crate::Error;

/// One of the three orthogonal rotation axes of a joint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxis {
    X,
    Y,
    Z,
}

impl RotationAxis {
    /// Every rotation axis
    pub const ALL: [RotationAxis; 3] = [RotationAxis::X, RotationAxis::Y, RotationAxis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            RotationAxis::X => 0,
            RotationAxis::Y => 1,
            RotationAxis::Z => 2,
        }
    }

    #[inline]
    pub fn unit(self) -> Vector3<f64> {
        match self {
            RotationAxis::X => Vector3::x(),
            RotationAxis::Y => Vector3::y(),
            RotationAxis::Z => Vector3::z(),
        }
    }
}

/// Limits of a single axis, angles in degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AxisLimit {
    /// axis excluded from solving
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_min_angle")]
    pub min_angle: f64,
    #[serde(default = "default_max_angle")]
    pub max_angle: f64,
}

fn default_min_angle() -> f64 {
    -360.0
}

fn default_max_angle() -> f64 {
    360.0
}

impl Default for AxisLimit {
    fn default() -> Self {
        Self {
            locked: false,
            min_angle: default_min_angle(),
            max_angle: default_max_angle(),
        }
    }
}

impl AxisLimit {
    pub fn locked() -> Self {
        Self {
            locked: true,
            ..Self::default()
        }
    }

    pub fn bounded(min_angle: f64, max_angle: f64) -> Self {
        Self {
            locked: false,
            min_angle,
            max_angle,
        }
    }
}

/// Per-axis rotation limits of one joint.
///
/// Created once at setup and read-only while solving.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct JointConstraint {
    #[serde(default)]
    pub x: AxisLimit,
    #[serde(default)]
    pub y: AxisLimit,
    #[serde(default)]
    pub z: AxisLimit,
}

impl JointConstraint {
    pub fn new(x: AxisLimit, y: AxisLimit, z: AxisLimit) -> Self {
        Self { x, y, z }
    }

    /// Single hinge around `axis` limited to [min, max], other axes locked.
    pub fn hinge(axis: RotationAxis, min_angle: f64, max_angle: f64) -> Self {
        let mut c = Self::new(AxisLimit::locked(), AxisLimit::locked(), AxisLimit::locked());
        *c.limit_mut(axis) = AxisLimit::bounded(min_angle, max_angle);
        c
    }

    #[inline]
    pub fn limit(&self, axis: RotationAxis) -> &AxisLimit {
        match axis {
            RotationAxis::X => &self.x,
            RotationAxis::Y => &self.y,
            RotationAxis::Z => &self.z,
        }
    }

    fn limit_mut(&mut self, axis: RotationAxis) -> &mut AxisLimit {
        match axis {
            RotationAxis::X => &mut self.x,
            RotationAxis::Y => &mut self.y,
            RotationAxis::Z => &mut self.z,
        }
    }

    /// Axes that are not locked, in X, Y, Z order.
    pub fn rotation_axes(&self) -> Vec<RotationAxis> {
        RotationAxis::ALL
            .into_iter()
            .filter(|axis| !self.limit(*axis).locked)
            .collect()
    }

    #[inline]
    pub fn min_angle(&self, axis: RotationAxis) -> f64 {
        self.limit(axis).min_angle
    }

    #[inline]
    pub fn max_angle(&self, axis: RotationAxis) -> f64 {
        self.limit(axis).max_angle
    }

    /// Wraps `angle` into (-180, 180] and clamps it to the axis bounds.
    pub fn clamp(&self, axis: RotationAxis, angle: f64) -> f64 {
        normalize_angle_deg(angle).clamp(self.min_angle(axis), self.max_angle(axis))
    }

    /// `joint` is only used to report which joint is misconfigured.
    pub fn validate(&self, joint: usize) -> Result<(), Error> {
        for axis in RotationAxis::ALL {
            let limit = self.limit(axis);
            if !(limit.min_angle <= limit.max_angle) {
                return Err(Error::InvalidConstraint {
                    joint,
                    axis,
                    min: limit.min_angle,
                    max: limit.max_angle,
                });
            }
        }
        Ok(())
    }
}
