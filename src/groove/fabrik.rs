use nalgebra::{Isometry3, Point3, Unit, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::groove::solver::{IkSolver, Target};
use crate::spacetime::chain::JointChain;
use crate::spacetime::constraint::RotationAxis;
use crate::utils::geometry::{
    closest_point_on_plane, euler_deg_to_quat, from_to_rotation, quat_to_euler_deg, safe_normalize,
    signed_angle,
};
use crate::Error;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FabrikParams {
    /// Number of IK iterations per resolve
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Strength of going back to the start pose before iterating (0..1)
    #[serde(default = "default_snap_back_strength")]
    pub snap_back_strength: f64,
}

fn default_iterations() -> usize {
    10
}

fn default_snap_back_strength() -> f64 {
    1.0
}

impl Default for FabrikParams {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            snap_back_strength: default_snap_back_strength(),
        }
    }
}

impl FabrikParams {
    pub fn validate(&self) -> Result<(), Error> {
        if self.iterations == 0 {
            return Err(Error::InvalidConfig("FABRIK iterations must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.snap_back_strength) {
            return Err(Error::InvalidConfig(format!(
                "FABRIK snap_back_strength must be within [0, 1], got {}",
                self.snap_back_strength
            )));
        }
        Ok(())
    }
}

/// Forward And Backward Reaching IK.
///
/// Works on joint positions in root space, then rebuilds every joint
/// orientation from how its bone direction moved away from the rest pose.
pub struct FabrikSolver {
    chain: JointChain,
    target: Target,
    max_error: f64,
    params: FabrikParams,
    /// Bend direction hint, in the body frame
    pole: Option<Vector3<f64>>,

    /// Position of all the joints (root space)
    positions: Vec<Vector3<f64>>,
    bone_lengths: Vec<f64>,
    /// Rest bone vectors (root space)
    init_offsets: Vec<Vector3<f64>>,
    /// Rest joint rotations (root space)
    init_rotations: Vec<UnitQuaternion<f64>>,
    /// Rest target rotation (root space)
    init_target_rotation: UnitQuaternion<f64>,
    /// Rest rotation of every bone joint relative to its parent, euler degrees
    init_local_angles: Vec<Vector3<f64>>,
}

impl FabrikSolver {
    pub fn new(chain: JointChain, max_error: f64, params: FabrikParams, target: Option<Target>) -> Self {
        let target = target.unwrap_or_else(|| Target::from_joint(chain.end_effector()));
        let mut solver = Self {
            chain,
            target,
            max_error,
            params,
            pole: None,
            positions: Vec::new(),
            bone_lengths: Vec::new(),
            init_offsets: Vec::new(),
            init_rotations: Vec::new(),
            init_target_rotation: UnitQuaternion::identity(),
            init_local_angles: Vec::new(),
        };
        solver.reinitialize();
        solver
    }

    pub fn set_pole(&mut self, pole: Option<Vector3<f64>>) {
        self.pole = pole;
    }

    pub fn pole(&self) -> Option<Vector3<f64>> {
        self.pole
    }

    /// Bone direction from `v`, falling back to `rest` when `v` is degenerate.
    #[inline]
    fn direction(v: &Vector3<f64>, rest: &Vector3<f64>) -> Vector3<f64> {
        safe_normalize(v)
            .or_else(|| safe_normalize(rest))
            .unwrap_or_else(Vector3::zeros)
    }

    fn stretch_towards(&mut self, target: &Vector3<f64>) {
        let direction = Self::direction(&(target - self.positions[0]), &self.init_offsets[0]);
        for i in 1..self.positions.len() {
            self.positions[i] = self.positions[i - 1] + direction * self.bone_lengths[i - 1];
        }
    }

    fn snap_back(&mut self) {
        let strength = self.params.snap_back_strength;
        for i in 0..self.positions.len() - 1 {
            let rest = self.positions[i] + self.init_offsets[i];
            self.positions[i + 1] = self.positions[i + 1].lerp(&rest, strength);
        }
    }

    fn iterate(&mut self, target: &Vector3<f64>) {
        let last = self.positions.len() - 1;
        let max_error_sq = self.max_error * self.max_error;
        for _ in 0..self.params.iterations {
            // back
            self.positions[last] = *target;
            for i in (1..last).rev() {
                let dir = Self::direction(
                    &(self.positions[i] - self.positions[i + 1]),
                    &(-self.init_offsets[i]),
                );
                self.positions[i] = self.positions[i + 1] + dir * self.bone_lengths[i];
            }

            // forward
            for i in 1..=last {
                let dir = Self::direction(
                    &(self.positions[i] - self.positions[i - 1]),
                    &self.init_offsets[i - 1],
                );
                self.positions[i] = self.positions[i - 1] + dir * self.bone_lengths[i - 1];
            }

            // close enough?
            if (self.positions[last] - target).norm_squared() < max_error_sq {
                break;
            }
        }
    }

    /// Rotates every interior joint around the line joining its neighbours
    /// so it bends towards the pole.
    fn bend_towards_pole(&mut self, pole: &Vector3<f64>) {
        for i in 1..self.positions.len() - 1 {
            let Some(normal) = safe_normalize(&(self.positions[i + 1] - self.positions[i - 1])) else {
                continue;
            };
            let origin = self.positions[i - 1];
            let projected_pole = closest_point_on_plane(&normal, &origin, pole);
            let projected_bone = closest_point_on_plane(&normal, &origin, &self.positions[i]);
            let angle = signed_angle(&(projected_bone - origin), &(projected_pole - origin), &normal);
            let rot = UnitQuaternion::from_axis_angle(&Unit::new_unchecked(normal), angle);
            self.positions[i] = rot * (self.positions[i] - origin) + origin;
        }
    }

    /// Bone joint rotation (root space) after applying the joint's
    /// constraint. Locked axes stay at their rest angle.
    fn constrained_rotation(
        &self,
        i: usize,
        parent_rotation: &UnitQuaternion<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> UnitQuaternion<f64> {
        let Some(constraint) = self.chain.constraint(i) else {
            return rotation;
        };
        let mut angles = quat_to_euler_deg(&(parent_rotation.inverse() * rotation));
        for axis in RotationAxis::ALL {
            let idx = axis.index();
            angles[idx] = if constraint.limit(axis).locked {
                self.init_local_angles[i][idx]
            } else {
                constraint.clamp(axis, angles[idx])
            };
        }
        parent_rotation * euler_deg_to_quat(&angles)
    }

    /// Rebuilds orientations from the solved positions, then positions again
    /// from the (possibly constrained) orientations so bone lengths hold.
    fn write_pose(&mut self, root: &Isometry3<f64>, target_rotation: &UnitQuaternion<f64>) {
        let last = self.positions.len() - 1;
        let mut parent_rotation = UnitQuaternion::identity();
        for i in 0..last {
            let solved = from_to_rotation(&self.init_offsets[i], &(self.positions[i + 1] - self.positions[i]))
                * self.init_rotations[i];
            let rotation = self.constrained_rotation(i, &parent_rotation, solved);
            let bone = rotation * (self.init_rotations[i].inverse() * self.init_offsets[i]);
            self.positions[i + 1] = self.positions[i] + bone;

            let position = (root * Point3::from(self.positions[i])).coords;
            self.chain.set_joint_pose(i, position, root.rotation * rotation);
            parent_rotation = rotation;
        }

        let rotation = target_rotation * self.init_target_rotation.inverse() * self.init_rotations[last];
        let position = (root * Point3::from(self.positions[last])).coords;
        self.chain.set_joint_pose(last, position, root.rotation * rotation);
    }
}

impl IkSolver for FabrikSolver {
    fn name(&self) -> &'static str {
        "FABRIK"
    }

    fn chain(&self) -> &JointChain {
        &self.chain
    }

    fn reinitialize(&mut self) {
        let num_joints = self.chain.chain_length() + 1;
        let to_root = self.chain.root_frame().inverse();

        self.positions = vec![Vector3::zeros(); num_joints];
        self.bone_lengths = self.chain.bone_lengths();
        self.init_target_rotation = to_root.rotation * self.target.rotation;
        self.init_rotations = self
            .chain
            .joints()
            .iter()
            .map(|joint| to_root.rotation * joint.rotation)
            .collect();
        self.init_offsets = self
            .chain
            .joints()
            .windows(2)
            .map(|pair| to_root.rotation * (pair[1].position - pair[0].position))
            .collect();
        self.init_local_angles = self.chain.local_rotations().iter().map(quat_to_euler_deg).collect();
    }

    fn resolve(&mut self) {
        let root = self.chain.root_frame();
        let to_root = root.inverse();

        //get position
        for (i, joint) in self.chain.joints().iter().enumerate() {
            self.positions[i] = (to_root * Point3::from(joint.position)).coords;
        }
        let target_position = (to_root * Point3::from(self.target.position)).coords;
        let target_rotation = to_root.rotation * self.target.rotation;

        let total_length = self.chain.total_length();
        if (target_position - self.positions[0]).norm_squared() >= total_length * total_length {
            log::trace!(
                "Target out of reach of \"{}\" ({:.3} > {:.3}), stretching",
                self.chain.root().name,
                (target_position - self.positions[0]).norm(),
                total_length
            );
            self.stretch_towards(&target_position);
        } else {
            self.snap_back();
            self.iterate(&target_position);
        }

        if let Some(pole) = self.pole {
            let pole_world = self.chain.body() * Point3::from(pole);
            let pole_root = (to_root * pole_world).coords;
            self.bend_towards_pole(&pole_root);
        }

        self.write_pose(&root, &target_rotation);
    }

    fn set_body_pose(&mut self, body: Isometry3<f64>) {
        self.chain.set_body_pose(body);
    }

    fn target(&self) -> &Target {
        &self.target
    }

    fn set_target(&mut self, target: Target) {
        self.target = target;
    }

    fn max_error(&self) -> f64 {
        self.max_error
    }
}
