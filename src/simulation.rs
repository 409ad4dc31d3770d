use std::path::Path;
use std::time::Instant;

use nalgebra::Isometry3;

use crate::motion::body::{BodyMotion, GroundQuery, KinematicBody};
use crate::motion::controller::{MovementController, MovementInput};
use crate::motion::gait::{GaitCoordinator, SteppedLeg};
use crate::utils::config_parser::Config;
use crate::Error;

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub stepped: Vec<SteppedLeg>,
    pub phase_flipped: bool,
    /// (primary, opposite) error of every pair after solving
    pub leg_errors: Vec<(f64, f64)>,
    pub body: Isometry3<f64>,
}

/// A legged creature on some ground, advanced in fixed ticks.
pub struct Simulation<G: GroundQuery, B: BodyMotion = KinematicBody> {
    pub config: Config,
    controller: MovementController,
    gait: GaitCoordinator,
    ground: G,
    body: B,
    tick: u64,
}

impl<G: GroundQuery> Simulation<G, KinematicBody> {
    /// Loads a settings file and starts a kinematic body at its configured pose.
    pub fn from_settings_file<P: AsRef<Path>>(path_to_setting: P, ground: G) -> Result<Self, Error> {
        log::info!("Using settings file {}", path_to_setting.as_ref().display());
        let config = Config::from_settings_file(path_to_setting)?;
        let body = KinematicBody::new(config.body.isometry());
        Self::new(config, ground, body)
    }
}

impl<G: GroundQuery, B: BodyMotion> Simulation<G, B> {
    pub fn new(config: Config, ground: G, body: B) -> Result<Self, Error> {
        let t1 = Instant::now();
        config.validate()?;
        let pose = body.pose();
        let pairs = config.build_leg_pairs(pose)?;
        log::debug!("{} leg pairs created", pairs.len());
        let gait = GaitCoordinator::new(pose, pairs, config.gait)?;
        let controller = MovementController::new(config.movement)?;
        let dur = Instant::now() - t1;
        log::debug!("Simulation fully initialized in {dur:.3?}");
        Ok(Self {
            config,
            controller,
            gait,
            ground,
            body,
            tick: 0,
        })
    }

    #[inline]
    pub fn gait(&self) -> &GaitCoordinator {
        &self.gait
    }

    #[inline]
    pub fn controller(&self) -> &MovementController {
        &self.controller
    }

    #[inline]
    pub fn body(&self) -> &B {
        &self.body
    }

    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// One fixed step: movement controller, body rotation, body translation,
    /// ground step, then every leg solves once.
    pub fn tick(&mut self, input: &MovementInput) -> TickReport {
        let command = self.controller.update(input);
        let heading = self.body.pose().rotation;

        let mut steps = self.gait.rotate(&command.rotation, &mut self.body);
        let translation = command.world_translation(&heading);
        steps.merge(self.gait.translate(&translation, &mut self.body));
        steps.merge(self.gait.step(&self.ground));
        self.gait.resolve();
        self.tick += 1;

        if !steps.stepped.is_empty() {
            log::debug!("Tick {}: {} legs stepped", self.tick, steps.stepped.len());
        }
        let report = TickReport {
            tick: self.tick,
            stepped: steps.stepped,
            phase_flipped: steps.phase_flipped,
            leg_errors: self.gait.leg_errors(),
            body: *self.gait.body(),
        };
        log::trace!("{report:?}");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::body::FlatGround;
    use crate::motion::gait::Side;
    use approx::assert_relative_eq;

    const SETTINGS: &str = r#"
        [body]
        position = [0.0, 1.0, 0.0]

        [[leg_pairs]]
        [leg_pairs.primary]
        mount = { position = [-0.5, 0.0, 0.5] }
        joints = [
            { name = "l_hip" },
            { name = "l_knee", offset = [-0.6, 0.3, 0.0] },
            { name = "l_foot", offset = [-0.4, -1.3, 0.0] },
        ]
        [leg_pairs.opposite]
        mount = { position = [0.5, 0.0, 0.5] }
        joints = [
            { name = "r_hip" },
            { name = "r_knee", offset = [0.6, 0.3, 0.0] },
            { name = "r_foot", offset = [0.4, -1.3, 0.0] },
        ]
    "#;

    fn simulation() -> Simulation<FlatGround> {
        let config = Config::from_toml_str(SETTINGS).unwrap();
        let body = KinematicBody::new(config.body.isometry());
        Simulation::new(config, FlatGround::new(0.0), body).unwrap()
    }

    #[test]
    fn test_idle_ticks() {
        let mut sim = simulation();
        for i in 0..50 {
            let report = sim.tick(&MovementInput::default());
            assert_eq!(report.tick, i + 1);
            assert!(report.stepped.is_empty());
            assert!(!report.phase_flipped);
            for (primary, opposite) in report.leg_errors {
                assert!(primary < 1e-9 && opposite < 1e-9);
            }
        }
        assert!(sim.gait().primary_active());
        assert_relative_eq!(sim.body().pose().translation.vector.y, 1.0);
    }

    #[test]
    fn test_walk_forward_alternates() {
        let mut sim = simulation();
        let mut last_side: Option<Side> = None;
        let mut events = 0;
        for _ in 0..300 {
            let report = sim.tick(&MovementInput::forward());
            assert_eq!(report.phase_flipped, !report.stepped.is_empty());
            if let Some(first) = report.stepped.first() {
                assert!(report.stepped.iter().all(|s| s.side == first.side));
                if let Some(last) = last_side {
                    assert_ne!(last, first.side);
                }
                last_side = Some(first.side);
                events += 1;
            }
            for (primary, opposite) in &report.leg_errors {
                assert!(primary.is_finite() && opposite.is_finite());
            }
        }
        assert!(events >= 4);
        assert!(sim.body().pose().translation.vector.z > 5.0);

        // stop and let the feet settle
        for _ in 0..5 {
            sim.tick(&MovementInput::default());
        }
        for (primary, opposite) in sim.gait().leg_errors() {
            assert!(primary < 0.09 && opposite < 0.09);
        }
    }

    #[test]
    fn test_turn_in_place() {
        let mut sim = simulation();
        let mut stepped = 0;
        for _ in 0..200 {
            stepped += sim.tick(&MovementInput::new(0.0, 1.0)).stepped.len();
        }
        assert!(stepped > 0);
        assert_relative_eq!(
            sim.body().pose().translation.vector,
            nalgebra::Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }
}
