//! Ball state and the full simulation state carried between steps
//!
//! Everything a prediction needs to continue from "now" lives in `SimState`,
//! so a query can copy it once and integrate without touching the live engine.

use glam::Vec3A;
use serde::{Deserialize, Serialize};

use super::arena::TileState;
use super::mode::{ModeConfig, Possession};
use crate::consts::COLLISION_MARGIN;
use crate::is_finite_vec;

/// The ball's physical state at an instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    /// Game time in seconds
    pub time: f32,
    pub location: Vec3A,
    pub velocity: Vec3A,
    /// Radians per second
    pub angular_velocity: Vec3A,
    pub radius: f32,
    /// Radius used for contact tests (slightly larger than the visual radius)
    pub collision_radius: f32,
}

impl BallState {
    /// Ball at the mode's starting position
    pub fn rest(config: &ModeConfig) -> Self {
        Self {
            time: 0.0,
            location: config.rest_location,
            velocity: config.rest_velocity,
            angular_velocity: Vec3A::ZERO,
            radius: config.radius,
            collision_radius: config.collision_radius,
        }
    }

    /// Apply a radius override, keeping the contact margin
    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.collision_radius = radius + COLLISION_MARGIN;
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && is_finite_vec(self.location)
            && is_finite_vec(self.velocity)
            && is_finite_vec(self.angular_velocity)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }
}

/// Ball plus the mode state that evolves with it
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub ball: BallState,
    pub possession: Possession,
    pub tiles: TileState,
}

impl SimState {
    pub fn new(config: &ModeConfig, tiles: TileState) -> Self {
        Self {
            ball: BallState::rest(config),
            possession: Possession::for_velocity(config.rest_velocity),
            tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::mode::GameMode;

    #[test]
    fn test_rest_ball_sits_on_floor() {
        let config = ModeConfig::for_mode(GameMode::Standard, 1000.0);
        let ball = BallState::rest(&config);
        assert_eq!(ball.location.z, config.collision_radius);
        assert_eq!(ball.velocity, Vec3A::ZERO);
        assert!(ball.is_finite());
    }

    #[test]
    fn test_heatseeker_kickoff_favors_velocity_side() {
        let config = ModeConfig::for_mode(GameMode::Heatseeker, 1000.0);
        let state = SimState::new(&config, TileState::default());
        assert!(state.ball.velocity.z > 0.0);
        assert_eq!(state.possession.favored_side, -1.0);
    }

    #[test]
    fn test_radius_override_keeps_margin() {
        let config = ModeConfig::for_mode(GameMode::Standard, 1000.0);
        let mut ball = BallState::rest(&config);
        ball.set_radius(150.0);
        assert!((ball.collision_radius - (150.0 + COLLISION_MARGIN)).abs() < 1e-6);

        ball.velocity.x = f32::NAN;
        assert!(!ball.is_finite());
    }
}
