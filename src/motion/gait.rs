use nalgebra::{Isometry3, Point3, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::groove::solver::IkSolver;
use crate::motion::body::{BodyMotion, GroundQuery};
use crate::utils::geometry::angle_between;
use crate::Error;

/// Stepping thresholds and ground probing, distances in world units and
/// angles in degrees.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GaitConfig {
    /// Anchor to target distance that makes a step due
    #[serde(default = "default_step_distance")]
    pub step_distance: f64,
    /// Anchor to target angle, seen from the body origin, that makes a step due
    #[serde(default = "default_step_angle")]
    pub step_angle: f64,
    /// Ground casts start this far above the anchor
    #[serde(default = "default_ground_cast_height")]
    pub ground_cast_height: f64,
    #[serde(default = "default_ground_cast_distance")]
    pub ground_cast_distance: f64,
}

fn default_step_distance() -> f64 {
    1.0
}

fn default_step_angle() -> f64 {
    30.0
}

fn default_ground_cast_height() -> f64 {
    1.0
}

fn default_ground_cast_distance() -> f64 {
    2.0
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            step_distance: default_step_distance(),
            step_angle: default_step_angle(),
            ground_cast_height: default_ground_cast_height(),
            ground_cast_distance: default_ground_cast_distance(),
        }
    }
}

impl GaitConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let values = [
            ("step_distance", self.step_distance),
            ("step_angle", self.step_angle),
            ("ground_cast_height", self.ground_cast_height),
            ("ground_cast_distance", self.ground_cast_distance),
        ];
        for (name, value) in values {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "gait {name} must be a finite non-negative value, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Half of a leg pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Primary,
    Opposite,
}

impl Side {
    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::Primary => Side::Opposite,
            Side::Opposite => Side::Primary,
        }
    }
}

/// Which displacement measure may make a step due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMetric {
    /// anchor to target distance (body translation)
    Linear,
    /// anchor to target angle around the body origin (body rotation)
    Angular,
    /// either one
    Any,
}

/// Ground point a foot would like to stand on. Lives in the body frame so it
/// is dragged along when the body moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootAnchor {
    local: Vector3<f64>,
    grounded: bool,
}

impl FootAnchor {
    pub fn new(local: Vector3<f64>) -> Self {
        Self {
            local,
            grounded: true,
        }
    }

    #[inline]
    pub fn local_position(&self) -> Vector3<f64> {
        self.local
    }

    #[inline]
    pub fn world_position(&self, body: &Isometry3<f64>) -> Vector3<f64> {
        (body * Point3::from(self.local)).coords
    }

    pub fn set_world_position(&mut self, body: &Isometry3<f64>, position: &Vector3<f64>) {
        self.local = (body.inverse() * Point3::from(*position)).coords;
    }

    /// Whether the last ground query found ground.
    #[inline]
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }
}

pub struct Leg {
    solver: Box<dyn IkSolver + Send>,
    anchor: FootAnchor,
}

impl Leg {
    /// The anchor starts where the foot rests.
    pub fn new(solver: Box<dyn IkSolver + Send>) -> Self {
        let chain = solver.chain();
        let rest = chain.end_effector().position;
        let local = (chain.body().inverse() * Point3::from(rest)).coords;
        Self {
            solver,
            anchor: FootAnchor::new(local),
        }
    }

    #[inline]
    pub fn solver(&self) -> &(dyn IkSolver + Send) {
        self.solver.as_ref()
    }

    #[inline]
    pub fn anchor(&self) -> &FootAnchor {
        &self.anchor
    }

    /// Within its own convergence threshold.
    #[inline]
    fn is_settled(&self) -> bool {
        self.solver.current_error() < self.solver.max_error()
    }
}

/// Two legs that never step together.
pub struct LegPair {
    pub primary: Leg,
    pub opposite: Leg,
}

impl LegPair {
    pub fn new(primary: Leg, opposite: Leg) -> Self {
        Self { primary, opposite }
    }

    #[inline]
    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::Primary => &self.primary,
            Side::Opposite => &self.opposite,
        }
    }

    #[inline]
    fn leg_mut(&mut self, side: Side) -> &mut Leg {
        match side {
            Side::Primary => &mut self.primary,
            Side::Opposite => &mut self.opposite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteppedLeg {
    pub pair: usize,
    pub side: Side,
}

/// Outcome of one eligibility round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub stepped: Vec<SteppedLeg>,
    pub phase_flipped: bool,
}

impl StepReport {
    pub fn merge(&mut self, other: StepReport) {
        self.stepped.extend(other.stepped);
        self.phase_flipped |= other.phase_flipped;
    }
}

/// Decides which feet may move to a new ground target.
///
/// One phase flag is shared by every pair: all pairs step with the same side,
/// then hand over to the other side.
pub struct GaitCoordinator {
    pairs: Vec<LegPair>,
    config: GaitConfig,
    body: Isometry3<f64>,
    primary_active: bool,
    flipped_this_tick: bool,
}

impl GaitCoordinator {
    pub fn new(body: Isometry3<f64>, pairs: Vec<LegPair>, config: GaitConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut coordinator = Self {
            pairs,
            config,
            body,
            primary_active: true,
            flipped_this_tick: false,
        };
        coordinator.set_body_pose(body);
        log::info!("Gait coordinator ready with {} leg pairs", coordinator.pairs.len());
        Ok(coordinator)
    }

    #[inline]
    pub fn pairs(&self) -> &[LegPair] {
        &self.pairs
    }

    #[inline]
    pub fn body(&self) -> &Isometry3<f64> {
        &self.body
    }

    #[inline]
    pub fn config(&self) -> &GaitConfig {
        &self.config
    }

    #[inline]
    pub fn primary_active(&self) -> bool {
        self.primary_active
    }

    #[inline]
    pub fn active_side(&self) -> Side {
        if self.primary_active {
            Side::Primary
        } else {
            Side::Opposite
        }
    }

    /// Current (primary, opposite) error of every pair.
    pub fn leg_errors(&self) -> Vec<(f64, f64)> {
        self.pairs
            .iter()
            .map(|pair| (pair.primary.solver.current_error(), pair.opposite.solver.current_error()))
            .collect()
    }

    /// Moves every chain along with the body. Anchors follow implicitly.
    pub fn set_body_pose(&mut self, body: Isometry3<f64>) {
        self.body = body;
        for pair in self.pairs.iter_mut() {
            pair.primary.solver.set_body_pose(body);
            pair.opposite.solver.set_body_pose(body);
        }
    }

    /// Drops every anchor onto the ground below it. Anchors without ground
    /// keep their position and cannot step.
    pub fn update_ground(&mut self, ground: &dyn GroundQuery) {
        let up = self.body.rotation * Vector3::y_axis();
        let down = -up;
        let cast_height = self.config.ground_cast_height;
        let cast_distance = self.config.ground_cast_distance;
        let body = self.body;
        for (idx, pair) in self.pairs.iter_mut().enumerate() {
            for (side, leg) in [(Side::Primary, &mut pair.primary), (Side::Opposite, &mut pair.opposite)] {
                let origin = leg.anchor.world_position(&body) + up.into_inner() * cast_height;
                match ground.cast(&origin, &down, cast_distance) {
                    Some(contact) => {
                        leg.anchor.set_world_position(&body, &contact);
                        leg.anchor.grounded = true;
                    }
                    None => {
                        log::trace!("No ground under pair {idx} {side:?} anchor");
                        leg.anchor.grounded = false;
                    }
                }
            }
        }
    }

    fn step_due(&self, leg: &Leg, metric: StepMetric) -> bool {
        if !leg.anchor.grounded {
            return false;
        }
        let anchor = leg.anchor.world_position(&self.body);
        let target = leg.solver.target_position();
        let linear = || (anchor - target).norm() > self.config.step_distance;
        let angular = || {
            let center = self.body.translation.vector;
            angle_between(&(target - center), &(anchor - center)) > self.config.step_angle.to_radians()
        };
        match metric {
            StepMetric::Linear => linear(),
            StepMetric::Angular => angular(),
            StepMetric::Any => linear() || angular(),
        }
    }

    /// One eligibility round: every pair may move its active leg's target
    /// onto its anchor, if the other leg of the pair can hold the body.
    /// Flips the phase when at least one leg stepped.
    ///
    /// Skipped once the phase already flipped during the current tick.
    pub fn evaluate(&mut self, metric: StepMetric) -> StepReport {
        let mut report = StepReport::default();
        if self.flipped_this_tick {
            return report;
        }
        let active = self.active_side();

        let mut due: Vec<usize> = Vec::new();
        for (idx, pair) in self.pairs.iter().enumerate() {
            let active_leg = pair.leg(active);
            let inactive_leg = pair.leg(active.other());
            if !self.step_due(active_leg, metric) {
                continue;
            }
            if inactive_leg.is_settled() || self.step_due(inactive_leg, metric) {
                due.push(idx);
            }
        }

        let body = self.body;
        for idx in due {
            let leg = self.pairs[idx].leg_mut(active);
            let anchor = leg.anchor.world_position(&body);
            leg.solver.set_target_position(anchor);
            log::debug!("Pair {idx} {active:?} leg steps to {:?}", anchor.as_slice());
            report.stepped.push(SteppedLeg { pair: idx, side: active });
        }

        if !report.stepped.is_empty() {
            self.primary_active = !self.primary_active;
            self.flipped_this_tick = true;
            report.phase_flipped = true;
            log::debug!("Gait phase flipped, {:?} side active", self.active_side());
        }
        report
    }

    /// Closes the current tick; the phase may flip again afterwards.
    #[inline]
    pub fn end_tick(&mut self) {
        self.flipped_this_tick = false;
    }

    /// Per-tick protocol: ground queries, one eligibility round, end of tick.
    pub fn step(&mut self, ground: &dyn GroundQuery) -> StepReport {
        self.update_ground(ground);
        let report = self.evaluate(StepMetric::Any);
        self.end_tick();
        report
    }

    /// Rotates the body (body frame delta) and checks the angular metric.
    ///
    /// Part of a tick: once a round has flipped the phase, later rounds do
    /// nothing until [`end_tick`](Self::end_tick). Callers that never call
    /// [`step`](Self::step) must call `end_tick` themselves.
    pub fn rotate(&mut self, rotation: &UnitQuaternion<f64>, body: &mut dyn BodyMotion) -> StepReport {
        let pose = body.apply_body_delta(rotation, &Vector3::zeros());
        self.set_body_pose(pose);
        self.evaluate(StepMetric::Angular)
    }

    /// Translates the body (world delta) and checks the linear metric.
    ///
    /// Same tick latch as [`rotate`](Self::rotate).
    pub fn translate(&mut self, translation: &Vector3<f64>, body: &mut dyn BodyMotion) -> StepReport {
        let pose = body.apply_body_delta(&UnitQuaternion::identity(), translation);
        self.set_body_pose(pose);
        self.evaluate(StepMetric::Linear)
    }

    /// Solves every leg towards its current target.
    pub fn resolve(&mut self) {
        for pair in self.pairs.iter_mut() {
            pair.primary.solver.resolve();
            pair.opposite.solver.resolve();
        }
    }
}
