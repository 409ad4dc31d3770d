use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::groove::fabrik::{FabrikParams, FabrikSolver};
use crate::groove::gradient_descent::{GradientDescentParams, GradientDescentSolver};
use crate::spacetime::chain::{Joint, JointChain};
use crate::Error;

/// World-space pose the end effector is driven towards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Target {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vector3<f64>) -> Self {
        Self::new(position, UnitQuaternion::identity())
    }

    /// Resting pose of a joint, used when no target is given.
    pub fn from_joint(joint: &Joint) -> Self {
        Self::new(joint.position, joint.rotation)
    }
}

/// Contract shared by every chain solving algorithm.
///
/// A solver exclusively owns its chain: it is the only writer of joint poses,
/// the caller is the only writer of the target.
pub trait IkSolver {
    fn name(&self) -> &'static str;

    fn chain(&self) -> &JointChain;

    /// Recaptures the rest data (offsets, rotations) from the current chain pose.
    fn reinitialize(&mut self);

    /// Moves the chain one step towards the target.
    ///
    /// Called every tick; converges instead of overshooting.
    fn resolve(&mut self);

    /// Carries the chain along with its body. The target stays in world space.
    fn set_body_pose(&mut self, body: nalgebra::Isometry3<f64>);

    fn target(&self) -> &Target;

    fn set_target(&mut self, target: Target);

    /// Convergence threshold
    fn max_error(&self) -> f64;

    fn target_position(&self) -> Vector3<f64> {
        self.target().position
    }

    fn set_target_position(&mut self, position: Vector3<f64>) {
        let mut target = *self.target();
        target.position = position;
        self.set_target(target);
    }

    /// Distance between the end effector and the target.
    fn current_error(&self) -> f64 {
        (self.target().position - self.chain().end_effector().position).norm()
    }
}

/// Which algorithm a chain is solved with, picked at construction.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    #[default]
    Fabrik,
    GradientDescent,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    #[serde(default)]
    pub kind: SolverKind,
    #[serde(default = "default_max_error")]
    pub max_error: f64,
    #[serde(default)]
    pub fabrik: FabrikParams,
    #[serde(default)]
    pub gradient_descent: GradientDescentParams,
}

fn default_max_error() -> f64 {
    0.09
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            kind: SolverKind::default(),
            max_error: default_max_error(),
            fabrik: FabrikParams::default(),
            gradient_descent: GradientDescentParams::default(),
        }
    }
}

impl SolverConfig {
    pub fn fabrik() -> Self {
        Self::default()
    }

    pub fn gradient_descent() -> Self {
        Self {
            kind: SolverKind::GradientDescent,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.max_error.is_finite() && self.max_error >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_error must be a finite non-negative value, got {}",
                self.max_error
            )));
        }
        self.fabrik.validate()?;
        self.gradient_descent.validate()
    }
}

/// Builds the configured solver around `chain`.
///
/// `pole` (body frame) only affects FABRIK.
pub fn build_solver(
    chain: JointChain,
    config: &SolverConfig,
    target: Option<Target>,
    pole: Option<Vector3<f64>>,
) -> Result<Box<dyn IkSolver + Send>, Error> {
    config.validate()?;
    let solver: Box<dyn IkSolver + Send> = match config.kind {
        SolverKind::Fabrik => {
            let mut solver = FabrikSolver::new(chain, config.max_error, config.fabrik, target);
            if let Some(pole) = pole {
                solver.set_pole(Some(pole));
            }
            Box::new(solver)
        }
        SolverKind::GradientDescent => {
            if pole.is_some() {
                log::warn!("Pole is ignored by the gradient descent solver");
            }
            Box::new(GradientDescentSolver::new(
                chain,
                config.max_error,
                config.gradient_descent,
                target,
            ))
        }
    };
    log::info!(
        "{} solver ready for chain \"{}\" ({} bones, reach {:.3})",
        solver.name(),
        solver.chain().root().name,
        solver.chain().chain_length(),
        solver.chain().total_length()
    );
    Ok(solver)
}
