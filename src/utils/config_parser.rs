use std::fs;
use std::path::Path;

use nalgebra::{Isometry3, Translation3, Vector3};
use serde::Deserialize;

use crate::groove::solver::{build_solver, SolverConfig};
use crate::motion::controller::MovementConfig;
use crate::motion::gait::{GaitConfig, Leg, LegPair};
use crate::spacetime::chain::{JointChain, JointDescriptor};
use crate::spacetime::constraint::JointConstraint;
use crate::utils::geometry::euler_deg_to_quat;
use crate::Error;

/// Position plus euler rotation in degrees.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseConfig {
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub rotation: [f64; 3],
}

impl PoseConfig {
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(Vector3::from(self.position)),
            euler_deg_to_quat(&Vector3::from(self.rotation)),
        )
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct JointConfig {
    pub name: String,
    /// offset from the parent joint
    #[serde(default)]
    pub offset: [f64; 3],
    /// rest rotation relative to the parent, euler degrees
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default)]
    pub constraint: Option<JointConstraint>,
}

impl JointConfig {
    pub fn descriptor(&self) -> JointDescriptor {
        let mut descriptor = JointDescriptor::new(self.name.clone(), Vector3::from(self.offset))
            .with_rotation(euler_deg_to_quat(&Vector3::from(self.rotation)));
        descriptor.constraint = self.constraint;
        descriptor
    }
}

/// One limb: skeleton from the body outwards, the last joint is the foot.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LegConfig {
    #[serde(default)]
    pub mount: PoseConfig,
    pub joints: Vec<JointConfig>,
    /// bones solved, counted up from the foot. Defaults to every bone.
    #[serde(default)]
    pub chain_length: Option<usize>,
    /// knee hint in the body frame (FABRIK only)
    #[serde(default)]
    pub pole: Option<[f64; 3]>,
    /// overrides the top level `[solver]`
    #[serde(default)]
    pub solver: Option<SolverConfig>,
}

impl LegConfig {
    pub fn name(&self) -> &str {
        self.joints.first().map(|j| j.name.as_str()).unwrap_or("<empty>")
    }

    pub fn chain_length(&self) -> usize {
        self.chain_length
            .unwrap_or_else(|| self.joints.len().saturating_sub(1))
    }

    pub fn skeleton(&self) -> Vec<JointDescriptor> {
        self.joints.iter().map(JointConfig::descriptor).collect()
    }

    pub fn build_chain(&self, body: Isometry3<f64>) -> Result<JointChain, Error> {
        JointChain::new(body, self.mount.isometry(), &self.skeleton(), self.chain_length())
    }

    pub fn build_leg(&self, body: Isometry3<f64>, default_solver: &SolverConfig) -> Result<Leg, Error> {
        let chain = self.build_chain(body)?;
        let solver_config = self.solver.as_ref().unwrap_or(default_solver);
        let solver = build_solver(chain, solver_config, None, self.pole.map(Vector3::from))?;
        Ok(Leg::new(solver))
    }

    fn validate(&self) -> Result<(), Error> {
        if self.joints.is_empty() {
            return Err(Error::InvalidConfig("leg without joints".to_string()));
        }
        let chain_length = self.chain_length();
        if chain_length == 0 {
            return Err(Error::EmptyChain);
        }
        if chain_length >= self.joints.len() {
            return Err(Error::ChainTooLong {
                requested: chain_length,
                available: self.joints.len() - 1,
            });
        }
        let finite = |v: &[f64; 3]| v.iter().all(|x| x.is_finite());
        if !(finite(&self.mount.position) && finite(&self.mount.rotation)) {
            return Err(Error::InvalidConfig(format!("leg \"{}\" has a non-finite mount", self.name())));
        }
        if let Some(pole) = &self.pole {
            if !finite(pole) {
                return Err(Error::InvalidConfig(format!("leg \"{}\" has a non-finite pole", self.name())));
            }
        }
        for (i, joint) in self.joints.iter().enumerate() {
            if !(finite(&joint.offset) && finite(&joint.rotation)) {
                return Err(Error::InvalidConfig(format!("joint \"{}\" has a non-finite pose", joint.name)));
            }
            if let Some(constraint) = &joint.constraint {
                constraint.validate(i)?;
            }
        }
        if let Some(solver) = &self.solver {
            solver.validate()?;
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LegPairConfig {
    pub primary: LegConfig,
    pub opposite: LegConfig,
}

/// Everything needed to build a walking creature.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// starting pose of the body
    #[serde(default)]
    pub body: PoseConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub gait: GaitConfig,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub leg_pairs: Vec<LegPairConfig>,
}

impl Config {
    pub fn from_settings_file<P: AsRef<Path>>(path_to_setting: P) -> Result<Self, Error> {
        let path = path_to_setting.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| Error::SettingsFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!(
            "Settings file {} loaded: {} leg pairs",
            path.display(),
            config.leg_pairs.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.solver.validate()?;
        self.gait.validate()?;
        self.movement.validate()?;
        if self.leg_pairs.is_empty() {
            return Err(Error::InvalidConfig("at least one leg pair is required".to_string()));
        }
        for pair in &self.leg_pairs {
            pair.primary.validate()?;
            pair.opposite.validate()?;
        }
        Ok(())
    }

    /// Builds every leg pair around the body pose.
    pub fn build_leg_pairs(&self, body: Isometry3<f64>) -> Result<Vec<LegPair>, Error> {
        self.leg_pairs
            .iter()
            .map(|pair| {
                Ok(LegPair::new(
                    pair.primary.build_leg(body, &self.solver)?,
                    pair.opposite.build_leg(body, &self.solver)?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groove::solver::SolverKind;
    use approx::assert_relative_eq;

    const SETTINGS: &str = r#"
        [body]
        position = [0.0, 1.0, 0.0]

        [solver]
        kind = "fabrik"
        max_error = 0.05

        [gait]
        step_distance = 0.8

        [movement.translation]
        max_velocity = 3.0

        [[leg_pairs]]
        [leg_pairs.primary]
        mount = { position = [-0.5, 0.0, 0.5] }
        pole = [-1.0, 1.0, 0.5]
        joints = [
            { name = "l_hip" },
            { name = "l_knee", offset = [-0.6, 0.3, 0.0] },
            { name = "l_foot", offset = [-0.4, -1.3, 0.0] },
        ]
        [leg_pairs.opposite]
        mount = { position = [0.5, 0.0, -0.5] }
        solver = { kind = "gradient_descent" }
        joints = [
            { name = "r_hip", constraint = { x = { locked = true }, y = { min_angle = -45.0, max_angle = 45.0 } } },
            { name = "r_knee", offset = [0.6, 0.3, 0.0] },
            { name = "r_foot", offset = [0.4, -1.3, 0.0] },
        ]
    "#;

    #[test]
    fn test_parse_settings() {
        let config = Config::from_toml_str(SETTINGS).unwrap();
        assert_eq!(config.leg_pairs.len(), 1);
        assert_relative_eq!(config.solver.max_error, 0.05);
        assert_relative_eq!(config.gait.step_distance, 0.8);
        assert_relative_eq!(config.gait.step_angle, 30.0);
        assert_relative_eq!(config.movement.translation.max_velocity, 3.0);
        assert_relative_eq!(config.movement.fixed_delta_time, 0.02);

        let pair = &config.leg_pairs[0];
        assert_eq!(pair.primary.chain_length(), 2);
        assert_eq!(pair.primary.name(), "l_hip");
        assert_eq!(pair.opposite.solver.map(|s| s.kind), Some(SolverKind::GradientDescent));
        let constraint = pair.opposite.joints[0].constraint.unwrap();
        assert!(constraint.x.locked);
        assert_relative_eq!(constraint.y.max_angle, 45.0);
        assert_relative_eq!(constraint.z.min_angle, -360.0);
    }

    #[test]
    fn test_build_leg_pairs() {
        let config = Config::from_toml_str(SETTINGS).unwrap();
        let body = config.body.isometry();
        let pairs = config.build_leg_pairs(body).unwrap();
        let primary = pairs[0].primary.solver();
        assert_eq!(primary.name(), "FABRIK");
        assert_relative_eq!(primary.max_error(), 0.05);
        assert_relative_eq!(
            primary.chain().end_effector().position,
            Vector3::new(-1.5, 0.0, 0.5),
            epsilon = 1e-12
        );
        let opposite = pairs[0].opposite.solver();
        assert_eq!(opposite.name(), "Gradient descent");
        assert_relative_eq!(opposite.max_error(), 0.09);
    }

    #[test]
    fn test_chain_too_long() {
        let settings = r#"
            [[leg_pairs]]
            [leg_pairs.primary]
            chain_length = 3
            joints = [{ name = "a" }, { name = "b", offset = [0.0, 1.0, 0.0] }]
            [leg_pairs.opposite]
            joints = [{ name = "c" }, { name = "d", offset = [0.0, 1.0, 0.0] }]
        "#;
        assert!(matches!(
            Config::from_toml_str(settings),
            Err(Error::ChainTooLong { requested: 3, available: 1 })
        ));
    }

    #[test]
    fn test_invalid_constraint_rejected() {
        let settings = r#"
            [[leg_pairs]]
            [leg_pairs.primary]
            joints = [
                { name = "a", constraint = { z = { min_angle = 30.0, max_angle = -30.0 } } },
                { name = "b", offset = [0.0, 1.0, 0.0] },
            ]
            [leg_pairs.opposite]
            joints = [{ name = "c" }, { name = "d", offset = [0.0, 1.0, 0.0] }]
        "#;
        assert!(matches!(
            Config::from_toml_str(settings),
            Err(Error::InvalidConstraint { joint: 0, .. })
        ));
    }

    #[test]
    fn test_parse_error_and_missing_file() {
        assert!(matches!(Config::from_toml_str("leg_pairs = 3"), Err(Error::Parse(_))));
        assert!(matches!(Config::from_toml_str(""), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            Config::from_settings_file("does/not/exist.toml"),
            Err(Error::SettingsFile { .. })
        ));
    }

    #[test]
    fn test_shipped_settings_load() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/spider.toml");
        let config = Config::from_settings_file(path).unwrap();
        assert_eq!(config.leg_pairs.len(), 4);
        assert!(config.build_leg_pairs(config.body.isometry()).is_ok());
    }
}
