//! Per-mode physical rules
//!
//! Each game mode is a `ModeConfig`: plain constants plus a `ModeRules` tag
//! selecting which special behaviour, if any, the integrator's two hook
//! points (post-gravity and post-collision) apply.

use std::str::FromStr;

use glam::Vec3A;
use serde::{Deserialize, Serialize};

use super::arena::{Arena, TileState};
use super::bvh::SurfaceHit;
use crate::consts::COLLISION_MARGIN;
use crate::error::EngineError;

/// Supported arena variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    Standard,
    Dropshot,
    Hoops,
    Throwback,
    Heatseeker,
}

impl GameMode {
    pub const ALL: [GameMode; 5] = [
        GameMode::Standard,
        GameMode::Dropshot,
        GameMode::Hoops,
        GameMode::Throwback,
        GameMode::Heatseeker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GameMode::Standard => "standard",
            GameMode::Dropshot => "dropshot",
            GameMode::Hoops => "hoops",
            GameMode::Throwback => "throwback",
            GameMode::Heatseeker => "heatseeker",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "soccar" | "soccer" => Some(GameMode::Standard),
            "dropshot" => Some(GameMode::Dropshot),
            "hoops" => Some(GameMode::Hoops),
            "throwback" | "standard_throwback" | "soccar_throwback" => Some(GameMode::Throwback),
            "heatseeker" | "standard_heatseeker" => Some(GameMode::Heatseeker),
            _ => None,
        }
    }
}

impl FromStr for GameMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| EngineError::UnknownMode(s.to_string()))
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Standard gravity (uu/s²)
pub const GRAVITY_Z: f32 = -650.0;
/// Linear drag coefficient (per second)
pub const DRAG: f32 = -0.0305;
/// Fraction of normal velocity kept after a bounce
pub const RESTITUTION: f32 = 0.6;
/// Surface friction coefficient
pub const FRICTION: f32 = 0.285;
/// Scales how strongly the normal impulse limits friction
pub const FRICTION_RATIO_SCALE: f32 = 2.0;
/// Converts tangential impulse into spin
pub const SPIN_COEFFICIENT: f32 = 0.0003;
pub const MAX_SPEED: f32 = 6000.0;
pub const MAX_ANGULAR_SPEED: f32 = 6.0;

pub const BALL_RADIUS_SOCCAR: f32 = 91.25;
pub const BALL_RADIUS_HOOPS: f32 = 96.3831;
pub const BALL_RADIUS_DROPSHOT: f32 = 100.2565;

/// Heatseeker goal target height
pub const HEATSEEKER_TARGET_Y: f32 = 5120.0;
pub const HEATSEEKER_TARGET_Z: f32 = 320.0;
/// Speed the ball is steered toward
pub const HEATSEEKER_TARGET_SPEED: f32 = 2900.0;
/// Steering gain for the x/y components (per second)
pub const HEATSEEKER_HORIZONTAL_BLEND: f32 = 1.45;
/// Steering gain for the z component (per second)
pub const HEATSEEKER_VERTICAL_BLEND: f32 = 0.78;
/// Hang time after which steering reaches full strength
pub const HEATSEEKER_RAMP_TIME: f32 = 1.5;
/// |velocity.y| needed to decide which goal the ball is heading for
pub const POSSESSION_SPEED: f32 = 1.0;

/// Parameters of the heatseeker steering force
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatseekerParams {
    pub target_y: f32,
    pub target_z: f32,
    pub target_speed: f32,
    pub horizontal_blend: f32,
    pub vertical_blend: f32,
    pub ramp_time: f32,
}

impl Default for HeatseekerParams {
    fn default() -> Self {
        Self {
            target_y: HEATSEEKER_TARGET_Y,
            target_z: HEATSEEKER_TARGET_Z,
            target_speed: HEATSEEKER_TARGET_SPEED,
            horizontal_blend: HEATSEEKER_HORIZONTAL_BLEND,
            vertical_blend: HEATSEEKER_VERTICAL_BLEND,
            ramp_time: HEATSEEKER_RAMP_TIME,
        }
    }
}

/// Special behaviour layered on top of gravity + bounce
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ModeRules {
    /// Gravity and bounce only
    Plain,
    /// Impacts faster than `break_speed` (along the normal) break floor tiles
    TileBreaking { break_speed: f32 },
    /// Steers the ball toward the favoured goal
    Heatseeker(HeatseekerParams),
}

/// Time since the ball last changed direction between goals.
///
/// Only the heatseeker rules read it, but it is carried for every mode so
/// switching modes never has to reshape the ball state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Possession {
    /// Seconds since the last possession change
    pub hang_time: f32,
    /// Goal the ball is heading for (+1 or -1 along y)
    pub favored_side: f32,
}

impl Default for Possession {
    fn default() -> Self {
        Self {
            hang_time: 0.0,
            favored_side: 1.0,
        }
    }
}

impl Possession {
    pub fn for_velocity(velocity: Vec3A) -> Self {
        let mut possession = Self::default();
        if velocity.y.abs() > POSSESSION_SPEED {
            possession.favored_side = velocity.y.signum();
        }
        possession
    }

    /// Update from a fresh authoritative snapshot.
    ///
    /// Time running backwards (a game reset) clears the accumulator; a flip in
    /// direction along y counts as a possession change.
    pub fn observe(&mut self, prev_time: f32, time: f32, velocity: Vec3A) {
        if time < prev_time {
            log::debug!("Game time went backwards ({prev_time} -> {time}); resetting hang time");
            *self = Self::for_velocity(velocity);
            return;
        }

        if velocity.y.abs() > POSSESSION_SPEED && velocity.y.signum() != self.favored_side {
            log::debug!("Possession change toward side {}", velocity.y.signum());
            self.favored_side = velocity.y.signum();
            self.hang_time = 0.0;
        } else {
            self.hang_time += time - prev_time;
        }
    }
}

/// Constants for the active mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub mode: GameMode,
    pub radius: f32,
    pub collision_radius: f32,
    pub gravity: Vec3A,
    pub restitution: f32,
    pub friction: f32,
    pub drag: f32,
    pub max_speed: f32,
    pub max_angular_speed: f32,
    pub rules: ModeRules,
    /// Where the ball sits right after the mode loads
    pub rest_location: Vec3A,
    pub rest_velocity: Vec3A,
}

impl ModeConfig {
    pub fn for_mode(mode: GameMode, tile_break_speed: f32) -> Self {
        let radius = match mode {
            GameMode::Hoops => BALL_RADIUS_HOOPS,
            GameMode::Dropshot => BALL_RADIUS_DROPSHOT,
            _ => BALL_RADIUS_SOCCAR,
        };
        let collision_radius = radius + COLLISION_MARGIN;

        let rules = match mode {
            GameMode::Dropshot => ModeRules::TileBreaking {
                break_speed: tile_break_speed,
            },
            GameMode::Heatseeker => ModeRules::Heatseeker(HeatseekerParams::default()),
            _ => ModeRules::Plain,
        };

        let (rest_location, rest_velocity) = match mode {
            GameMode::Heatseeker => (Vec3A::new(-1000.0, -2220.0, 92.75), Vec3A::new(0.0, -65.0, 650.0)),
            _ => (Vec3A::new(0.0, 0.0, collision_radius), Vec3A::ZERO),
        };

        Self {
            mode,
            radius,
            collision_radius,
            gravity: Vec3A::new(0.0, 0.0, GRAVITY_Z),
            restitution: RESTITUTION,
            friction: FRICTION,
            drag: DRAG,
            max_speed: MAX_SPEED,
            max_angular_speed: MAX_ANGULAR_SPEED,
            rules,
            rest_location,
            rest_velocity,
        }
    }
}

impl ModeRules {
    /// Velocity change applied right after gravity and drag
    pub fn post_gravity(
        &self,
        location: Vec3A,
        velocity: Vec3A,
        possession: &Possession,
        dt: f32,
    ) -> Vec3A {
        let ModeRules::Heatseeker(params) = self else {
            return Vec3A::ZERO;
        };

        let ramp = if params.ramp_time > 0.0 {
            (possession.hang_time / params.ramp_time).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if ramp == 0.0 {
            return Vec3A::ZERO;
        }

        let target = Vec3A::new(0.0, possession.favored_side * params.target_y, params.target_z);
        let desired = (target - location).normalize_or_zero() * params.target_speed;
        let gain = Vec3A::new(
            params.horizontal_blend,
            params.horizontal_blend,
            params.vertical_blend,
        ) * ramp;

        // Never overshoot the desired velocity in a single step
        (desired - velocity) * (gain * dt).min(Vec3A::ONE)
    }

    /// Side effects of a surface impact with normal speed `impact_speed`.
    ///
    /// Returns true if a tile broke.
    pub fn post_collision(
        &self,
        arena: &Arena,
        hit: &SurfaceHit,
        impact_speed: f32,
        tiles: &mut TileState,
    ) -> bool {
        let ModeRules::TileBreaking { break_speed } = *self else {
            return false;
        };
        if impact_speed <= break_speed {
            return false;
        }
        match arena.tile_of(hit.surface_id) {
            Some(tile) => tiles.break_tile(tile),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in GameMode::ALL {
            assert_eq!(GameMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(GameMode::from_name(" Soccer "), Some(GameMode::Standard));
        assert_eq!(
            "rumble".parse::<GameMode>(),
            Err(EngineError::UnknownMode("rumble".into()))
        );
    }

    #[test]
    fn test_mode_configs() {
        let standard = ModeConfig::for_mode(GameMode::Standard, 1000.0);
        assert_eq!(standard.rules, ModeRules::Plain);
        assert!((standard.collision_radius - 93.15).abs() < 1e-3);
        assert!(standard.restitution < 1.0);

        let dropshot = ModeConfig::for_mode(GameMode::Dropshot, 750.0);
        assert_eq!(dropshot.rules, ModeRules::TileBreaking { break_speed: 750.0 });
        assert!(dropshot.radius > standard.radius);

        let heatseeker = ModeConfig::for_mode(GameMode::Heatseeker, 1000.0);
        assert!(matches!(heatseeker.rules, ModeRules::Heatseeker(_)));
        assert!(heatseeker.rest_velocity.z > 0.0);
    }

    #[test]
    fn test_heatseeker_steers_toward_favored_goal() {
        let rules = ModeRules::Heatseeker(HeatseekerParams::default());
        let possession = Possession {
            hang_time: 10.0,
            favored_side: 1.0,
        };
        let dv = rules.post_gravity(Vec3A::new(0.0, 0.0, 320.0), Vec3A::ZERO, &possession, 1.0 / 120.0);
        assert!(dv.y > 0.0);
        assert!(dv.x.abs() < 1e-3);

        let fresh = Possession {
            hang_time: 0.0,
            favored_side: 1.0,
        };
        let none = rules.post_gravity(Vec3A::ZERO, Vec3A::ZERO, &fresh, 1.0 / 120.0);
        assert_eq!(none, Vec3A::ZERO);
    }

    #[test]
    fn test_steering_grows_with_hang_time() {
        let rules = ModeRules::Heatseeker(HeatseekerParams::default());
        let at = |hang_time: f32| {
            let possession = Possession {
                hang_time,
                favored_side: -1.0,
            };
            rules
                .post_gravity(Vec3A::new(0.0, 0.0, 320.0), Vec3A::ZERO, &possession, 1.0 / 120.0)
                .length()
        };
        assert!(at(0.3) < at(0.9));
        assert!((at(HEATSEEKER_RAMP_TIME) - at(5.0)).abs() < 1e-3);
    }

    #[test]
    fn test_plain_rules_have_no_force() {
        let dv = ModeRules::Plain.post_gravity(
            Vec3A::ZERO,
            Vec3A::new(100.0, 0.0, 0.0),
            &Possession::default(),
            1.0,
        );
        assert_eq!(dv, Vec3A::ZERO);
    }

    #[test]
    fn test_possession_observe() {
        let mut possession = Possession::for_velocity(Vec3A::new(0.0, -500.0, 0.0));
        assert_eq!(possession.favored_side, -1.0);

        possession.observe(0.0, 0.5, Vec3A::new(0.0, -400.0, 0.0));
        assert!((possession.hang_time - 0.5).abs() < 1e-6);

        possession.observe(0.5, 0.6, Vec3A::new(0.0, 800.0, 0.0));
        assert_eq!(possession.favored_side, 1.0);
        assert_eq!(possession.hang_time, 0.0);

        possession.observe(0.6, 1.6, Vec3A::new(0.0, 800.0, 0.0));
        possession.observe(1.6, 0.2, Vec3A::new(0.0, 800.0, 0.0));
        assert_eq!(possession.hang_time, 0.0);
    }
}
