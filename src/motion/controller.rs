use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::Error;

/// Velocity ramp of one movement axis. Velocity is in units (or radians)
/// per second, acceleration is added once per tick.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TransformationControl {
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
}

fn default_max_velocity() -> f64 {
    2.0
}

fn default_acceleration() -> f64 {
    0.05
}

impl Default for TransformationControl {
    fn default() -> Self {
        Self {
            max_velocity: default_max_velocity(),
            acceleration: default_acceleration(),
        }
    }
}

impl TransformationControl {
    pub fn new(max_velocity: f64, acceleration: f64) -> Self {
        Self {
            max_velocity,
            acceleration,
        }
    }

    pub fn validate(&self, axis: &str) -> Result<(), Error> {
        if !(self.max_velocity.is_finite() && self.max_velocity >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{axis} max_velocity must be a finite non-negative value, got {}",
                self.max_velocity
            )));
        }
        if !(self.acceleration.is_finite() && self.acceleration >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "{axis} acceleration must be a finite non-negative value, got {}",
                self.acceleration
            )));
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct MovementConfig {
    #[serde(default)]
    pub translation: TransformationControl,
    #[serde(default = "default_rotation_control")]
    pub rotation: TransformationControl,
    /// Length of one tick in seconds
    #[serde(default = "default_fixed_delta_time")]
    pub fixed_delta_time: f64,
}

fn default_rotation_control() -> TransformationControl {
    TransformationControl::new(1.5, 0.05)
}

fn default_fixed_delta_time() -> f64 {
    0.02
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            translation: TransformationControl::default(),
            rotation: default_rotation_control(),
            fixed_delta_time: default_fixed_delta_time(),
        }
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.translation.validate("translation")?;
        self.rotation.validate("rotation")?;
        if !(self.fixed_delta_time.is_finite() && self.fixed_delta_time > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "fixed_delta_time must be positive, got {}",
                self.fixed_delta_time
            )));
        }
        Ok(())
    }
}

/// Normalized axis values in [-1, 1]. Positive translation is forward,
/// positive rotation turns left around the body's up axis.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementInput {
    pub translation: f64,
    pub rotation: f64,
}

impl MovementInput {
    pub fn new(translation: f64, rotation: f64) -> Self {
        Self {
            translation: translation.clamp(-1.0, 1.0),
            rotation: rotation.clamp(-1.0, 1.0),
        }
    }

    pub fn forward() -> Self {
        Self::new(1.0, 0.0)
    }
}

/// Body deltas for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementCommand {
    /// yaw in the body frame
    pub rotation: UnitQuaternion<f64>,
    /// distance along the body's forward (+Z) axis
    pub translation: f64,
}

impl MovementCommand {
    /// Translation as a world-space vector for a body with `body_rotation`,
    /// applied after `self.rotation`.
    pub fn world_translation(&self, body_rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
        (body_rotation * self.rotation) * Vector3::z() * self.translation
    }
}

/// Turns held axis input into accelerating body motion.
#[derive(Debug, Clone)]
pub struct MovementController {
    config: MovementConfig,
    linear_velocity: f64,
    angular_velocity: f64,
}

impl MovementController {
    pub fn new(config: MovementConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            linear_velocity: 0.0,
            angular_velocity: 0.0,
        })
    }

    #[inline]
    pub fn linear_velocity(&self) -> f64 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> f64 {
        self.angular_velocity
    }

    /// Advances one tick. Released axes stop immediately.
    pub fn update(&mut self, input: &MovementInput) -> MovementCommand {
        let dt = self.config.fixed_delta_time;

        let mut yaw = 0.0;
        if input.rotation != 0.0 {
            yaw = input.rotation * self.angular_velocity * dt;
            if self.angular_velocity < self.config.rotation.max_velocity {
                self.angular_velocity += self.config.rotation.acceleration;
            }
        } else {
            self.angular_velocity = 0.0;
        }

        let mut translation = 0.0;
        if input.translation != 0.0 {
            translation = input.translation * dt;
            // backwards stays at unit speed
            if translation > 0.0 {
                translation *= self.linear_velocity;
            }
            if self.linear_velocity < self.config.translation.max_velocity {
                self.linear_velocity += self.config.translation.acceleration;
            }
        } else {
            self.linear_velocity = 0.0;
        }

        MovementCommand {
            rotation: UnitQuaternion::from_euler_angles(0.0, yaw, 0.0),
            translation,
        }
    }
}
