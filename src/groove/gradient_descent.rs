use nalgebra::{Isometry3, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::groove::solver::{IkSolver, Target};
use crate::spacetime::chain::JointChain;
use crate::spacetime::constraint::RotationAxis;
use crate::utils::geometry::{euler_deg_to_quat, quat_to_euler_deg};
use crate::Error;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GradientDescentParams {
    /// Angle step (degrees) used to sample the partial derivatives
    #[serde(default = "default_sampling_distance")]
    pub sampling_distance: f64,
    /// Decides how fast the end effector approaches the target
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_sampling_distance() -> f64 {
    0.1
}

fn default_learning_rate() -> f64 {
    30.0
}

impl Default for GradientDescentParams {
    fn default() -> Self {
        Self {
            sampling_distance: default_sampling_distance(),
            learning_rate: default_learning_rate(),
        }
    }
}

impl GradientDescentParams {
    pub fn validate(&self) -> Result<(), Error> {
        if !self.sampling_distance.is_finite() || self.sampling_distance == 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sampling_distance must be finite and non-zero, got {}",
                self.sampling_distance
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be finite and positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// End effector position for the given root pose and joint rotations.
///
/// `offsets[i]` is the rest offset of joint `i + 1` in the frame of joint `i`,
/// `rotations[i]` the rotation of joint `i` relative to its parent.
pub fn forward_kinematics(
    root: &Isometry3<f64>,
    offsets: &[Vector3<f64>],
    rotations: &[UnitQuaternion<f64>],
) -> Vector3<f64> {
    let mut position = root.translation.vector;
    let mut rotation = root.rotation;
    for (offset, local) in offsets.iter().zip(rotations) {
        rotation *= local;
        position += rotation * offset;
    }
    position
}

/// Gradient descent IK over per-joint Euler angles.
///
/// Each resolve walks once from the tip joint to the root, taking one
/// descent step per joint against the partially updated pose.
pub struct GradientDescentSolver {
    chain: JointChain,
    target: Target,
    max_error: f64,
    params: GradientDescentParams,
    /// Euler angles (degrees) of every bone joint relative to its parent
    angles: Vec<Vector3<f64>>,
    /// Rest offsets of joints 1..=n in their parent frame
    offsets: Vec<Vector3<f64>>,
}

impl GradientDescentSolver {
    pub fn new(
        chain: JointChain,
        max_error: f64,
        params: GradientDescentParams,
        target: Option<Target>,
    ) -> Self {
        let target = target.unwrap_or_else(|| Target::from_joint(chain.end_effector()));
        let mut solver = Self {
            chain,
            target,
            max_error,
            params,
            angles: Vec::new(),
            offsets: Vec::new(),
        };
        solver.reinitialize();
        solver
    }

    /// Current Euler angles (degrees) of every bone joint.
    pub fn joint_angles(&self) -> &[Vector3<f64>] {
        &self.angles
    }

    /// Distance between the target and the end effector for `rotations`.
    fn error(&self, root: &Isometry3<f64>, rotations: &[UnitQuaternion<f64>]) -> f64 {
        (forward_kinematics(root, &self.offsets, rotations) - self.target.position).norm()
    }

    /// Forward difference of the error along one Euler axis of joint `i`.
    fn partial_gradient(
        &self,
        root: &Isometry3<f64>,
        rotations: &mut [UnitQuaternion<f64>],
        i: usize,
        axis: RotationAxis,
        f_x: f64,
    ) -> f64 {
        let delta = self.params.sampling_distance;
        let previous = rotations[i];
        let mut sampled = self.angles[i];
        sampled[axis.index()] += delta;
        rotations[i] = euler_deg_to_quat(&sampled);
        let f_x_plus_delta = self.error(root, rotations);
        rotations[i] = previous;
        (f_x_plus_delta - f_x) / delta
    }
}

impl IkSolver for GradientDescentSolver {
    fn name(&self) -> &'static str {
        "Gradient descent"
    }

    fn chain(&self) -> &JointChain {
        &self.chain
    }

    fn reinitialize(&mut self) {
        self.offsets = self.chain.joints()[1..]
            .iter()
            .map(|joint| joint.local_offset)
            .collect();
        self.angles = self
            .chain
            .local_rotations()
            .iter()
            .map(quat_to_euler_deg)
            .collect();

        let mut clamped = false;
        for (i, angles) in self.angles.iter_mut().enumerate() {
            if let Some(constraint) = self.chain.constraint(i) {
                for axis in constraint.rotation_axes() {
                    let value = constraint.clamp(axis, angles[axis.index()]);
                    clamped |= value != angles[axis.index()];
                    angles[axis.index()] = value;
                }
            }
        }
        if clamped {
            log::debug!(
                "Rest pose of \"{}\" outside its constraints, clamped",
                self.chain.root().name
            );
            let rotations: Vec<UnitQuaternion<f64>> = self.angles.iter().map(euler_deg_to_quat).collect();
            self.chain.pose_from_local_rotations(&rotations);
        }
    }

    fn resolve(&mut self) {
        let root = self.chain.root_frame();
        let mut rotations: Vec<UnitQuaternion<f64>> = self.angles.iter().map(euler_deg_to_quat).collect();
        if self.error(&root, &rotations) < self.max_error {
            return;
        }

        // starting at the last joint
        for i in (0..self.angles.len()).rev() {
            let constraint = self.chain.constraint(i).copied();
            let axes = match &constraint {
                Some(c) => c.rotation_axes(),
                None => RotationAxis::ALL.to_vec(),
            };

            let f_x = self.error(&root, &rotations);
            let mut descent = Vector3::zeros();
            for axis in &axes {
                descent[axis.index()] = self.partial_gradient(&root, &mut rotations, i, *axis, f_x);
            }

            let mut new_angles = self.angles[i] - self.params.learning_rate * descent;
            if let Some(c) = &constraint {
                for axis in &axes {
                    new_angles[axis.index()] = c.clamp(*axis, new_angles[axis.index()]);
                }
            }

            self.angles[i] = new_angles;
            rotations[i] = euler_deg_to_quat(&new_angles);
            self.chain.pose_from_local_rotations(&rotations);

            // early termination
            if self.error(&root, &rotations) < self.max_error {
                return;
            }
        }
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
