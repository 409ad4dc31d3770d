use std::collections::BTreeMap;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::spacetime::constraint::JointConstraint;
use crate::Error;

/// Static description of one joint of a limb skeleton, relative to its parent.
#[derive(Clone, Debug)]
pub struct JointDescriptor {
    pub name: String,
    /// offset from the parent joint, in the parent frame
    pub offset: Vector3<f64>,
    /// rest rotation relative to the parent
    pub rotation: UnitQuaternion<f64>,
    pub constraint: Option<JointConstraint>,
}

impl JointDescriptor {
    pub fn new(name: impl Into<String>, offset: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            offset,
            rotation: UnitQuaternion::identity(),
            constraint: None,
        }
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_constraint(mut self, constraint: JointConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }
}

/// A joint of a built chain. Poses are in world space.
#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    /// offset from the parent joint, in the parent frame
    pub local_offset: Vector3<f64>,
    /// rest rotation relative to the parent
    pub local_rotation: UnitQuaternion<f64>,
    /// length of the bone to the next joint, 0 for the end effector
    pub bone_length: f64,
}

/// Ordered joints from root (index 0) to end effector (index `chain_length`).
///
/// The chain hangs from a body through a fixed mount. Moving the body
/// carries every joint along rigidly; only solvers change joint poses
/// relative to the body.
#[derive(Clone, Debug)]
pub struct JointChain {
    body: Isometry3<f64>,
    mount: Isometry3<f64>,
    joints: Vec<Joint>,
    constraints: BTreeMap<usize, JointConstraint>,
    total_length: f64,
}

impl JointChain {
    /// Builds the chain by walking up `chain_length` ancestors from the last
    /// descriptor of `skeleton` (ordered from the body outwards).
    ///
    /// Descriptors above the chain root are folded into the mount.
    pub fn new(
        body: Isometry3<f64>,
        mount: Isometry3<f64>,
        skeleton: &[JointDescriptor],
        chain_length: usize,
    ) -> Result<Self, Error> {
        if chain_length == 0 {
            return Err(Error::EmptyChain);
        }
        if skeleton.len() < chain_length + 1 {
            return Err(Error::ChainTooLong {
                requested: chain_length,
                available: skeleton.len().saturating_sub(1),
            });
        }
        let start = skeleton.len() - (chain_length + 1);

        let mut mount = mount;
        for ancestor in &skeleton[..start] {
            mount = mount * Isometry3::from_parts(Translation3::from(ancestor.offset), ancestor.rotation);
        }

        let mut frame = body * mount;
        let mut joints: Vec<Joint> = Vec::with_capacity(chain_length + 1);
        let mut constraints = BTreeMap::new();
        for (i, descriptor) in skeleton[start..].iter().enumerate() {
            let position = (frame * Point3::from(descriptor.offset)).coords;
            let rotation = frame.rotation * descriptor.rotation;
            frame = Isometry3::from_parts(Translation3::from(position), rotation);
            if let Some(constraint) = descriptor.constraint {
                constraint.validate(i)?;
                if i == chain_length {
                    log::warn!(
                        "Constraint on end effector \"{}\" is ignored by the solvers",
                        descriptor.name
                    );
                }
                constraints.insert(i, constraint);
            }
            joints.push(Joint {
                name: descriptor.name.clone(),
                position,
                rotation,
                local_offset: descriptor.offset,
                local_rotation: descriptor.rotation,
                bone_length: 0.0,
            });
        }

        let mut total_length = 0.0;
        for i in 0..chain_length {
            let length = (joints[i + 1].position - joints[i].position).norm();
            joints[i].bone_length = length;
            total_length += length;
        }

        log::debug!(
            "Chain \"{}\" -> \"{}\" built: {} bones, total length {:.3}",
            joints[0].name,
            joints[chain_length].name,
            chain_length,
            total_length
        );

        Ok(Self {
            body,
            mount,
            joints,
            constraints,
            total_length,
        })
    }

    /// Number of bones (joints minus the end effector).
    #[inline]
    pub fn chain_length(&self) -> usize {
        self.joints.len() - 1
    }

    #[inline]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    #[inline]
    pub fn joint(&self, i: usize) -> &Joint {
        &self.joints[i]
    }

    #[inline]
    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    #[inline]
    pub fn end_effector(&self) -> &Joint {
        &self.joints[self.joints.len() - 1]
    }

    /// Sum of all bone lengths, cached at construction.
    #[inline]
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    pub fn bone_lengths(&self) -> Vec<f64> {
        self.joints[..self.chain_length()]
            .iter()
            .map(|j| j.bone_length)
            .collect()
    }

    #[inline]
    pub fn constraint(&self, i: usize) -> Option<&JointConstraint> {
        self.constraints.get(&i)
    }

    #[inline]
    pub fn body(&self) -> &Isometry3<f64> {
        &self.body
    }

    /// World frame of the root joint's parent.
    #[inline]
    pub fn parent_frame(&self) -> Isometry3<f64> {
        self.body * self.mount
    }

    /// Origin at the root joint, axes of the root's parent.
    pub fn root_frame(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.joints[0].position),
            self.parent_frame().rotation,
        )
    }

    /// Rigidly carries every joint along with the body.
    pub fn set_body_pose(&mut self, body: Isometry3<f64>) {
        let delta = body * self.body.inverse();
        for joint in self.joints.iter_mut() {
            joint.position = (delta * Point3::from(joint.position)).coords;
            joint.rotation = delta.rotation * joint.rotation;
        }
        self.body = body;
    }

    /// Writes the world pose of joint `i`.
    #[inline]
    pub fn set_joint_pose(&mut self, i: usize, position: Vector3<f64>, rotation: UnitQuaternion<f64>) {
        self.joints[i].position = position;
        self.joints[i].rotation = rotation;
    }

    /// Current rotation of every bone joint relative to its parent.
    pub fn local_rotations(&self) -> Vec<UnitQuaternion<f64>> {
        let mut parent_rot = self.parent_frame().rotation;
        let mut out = Vec::with_capacity(self.chain_length());
        for joint in &self.joints[..self.chain_length()] {
            out.push(parent_rot.inverse() * joint.rotation);
            parent_rot = joint.rotation;
        }
        out
    }

    /// Recomputes every world pose from the root position, the given local
    /// rotations of the bone joints and the rest offsets. The end effector
    /// keeps its rest rotation relative to its parent.
    pub fn pose_from_local_rotations(&mut self, locals: &[UnitQuaternion<f64>]) {
        let mut parent_rot = self.parent_frame().rotation;
        let mut position = self.joints[0].position;
        for i in 0..self.joints.len() {
            if i > 0 {
                position += parent_rot * self.joints[i].local_offset;
            }
            let local = locals.get(i).copied().unwrap_or(self.joints[i].local_rotation);
            let rotation = parent_rot * local;
            self.joints[i].position = position;
            self.joints[i].rotation = rotation;
            parent_rot = rotation;
        }
    }
}
