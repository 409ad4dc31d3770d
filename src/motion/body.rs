use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

/// Terrain sampling capability: first contact along a ray, if any.
pub trait GroundQuery {
    fn cast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<Vector3<f64>>;
}

impl<F> GroundQuery for F
where
    F: Fn(&Vector3<f64>, &Unit<Vector3<f64>>, f64) -> Option<Vector3<f64>>,
{
    fn cast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<Vector3<f64>> {
        self(origin, direction, max_distance)
    }
}

/// Physical body of the creature. Applies a delta and reports the pose
/// actually reached.
pub trait BodyMotion {
    /// `rotation` is applied in the body frame, `translation` in world space.
    fn apply_body_delta(
        &mut self,
        rotation: &UnitQuaternion<f64>,
        translation: &Vector3<f64>,
    ) -> Isometry3<f64>;

    fn pose(&self) -> Isometry3<f64>;
}

/// Horizontal ground plane (world +Y up).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlatGround {
    pub height: f64,
}

impl FlatGround {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

impl GroundQuery for FlatGround {
    fn cast(
        &self,
        origin: &Vector3<f64>,
        direction: &Unit<Vector3<f64>>,
        max_distance: f64,
    ) -> Option<Vector3<f64>> {
        if direction.y.abs() < f64::EPSILON {
            return None;
        }
        let distance = (self.height - origin.y) / direction.y;
        if (0.0..=max_distance).contains(&distance) {
            Some(origin + direction.into_inner() * distance)
        } else {
            None
        }
    }
}

/// Body moved directly without physics: rotation composes on the right,
/// translation adds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KinematicBody {
    pose: Isometry3<f64>,
}

impl KinematicBody {
    pub fn new(pose: Isometry3<f64>) -> Self {
        Self { pose }
    }
}

impl Default for KinematicBody {
    fn default() -> Self {
        Self::new(Isometry3::identity())
    }
}

impl BodyMotion for KinematicBody {
    fn apply_body_delta(
        &mut self,
        rotation: &UnitQuaternion<f64>,
        translation: &Vector3<f64>,
    ) -> Isometry3<f64> {
        self.pose = Isometry3::from_parts(
            Translation3::from(self.pose.translation.vector + translation),
            self.pose.rotation * rotation,
        );
        self.pose
    }

    fn pose(&self) -> Isometry3<f64> {
        self.pose
    }
}
