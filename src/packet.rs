//! Telemetry snapshots consumed by the engine
//!
//! `GamePacket` mirrors the structured per-frame packet a game client hands
//! to a bot. `BallUpdate` is the legacy loose form: a JSON-style field map
//! where every key is optional.

use glam::Vec3A;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};

/// Telemetry vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameVec {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<GameVec> for Vec3A {
    fn from(v: GameVec) -> Self {
        Vec3A::new(v.x, v.y, v.z)
    }
}

impl From<Vec3A> for GameVec {
    fn from(v: Vec3A) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// Collision shape reported for the ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CollisionShape {
    Box { length: f32, width: f32, height: f32 },
    Sphere { diameter: f32 },
    Cylinder { diameter: f32, height: f32 },
}

impl CollisionShape {
    /// Equivalent ball radius
    pub fn radius(&self) -> f32 {
        match *self {
            CollisionShape::Box {
                length,
                width,
                height,
            } => (length + width + height) / 6.0,
            CollisionShape::Sphere { diameter } => diameter / 2.0,
            CollisionShape::Cylinder { diameter, .. } => diameter / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GamePhysics {
    pub location: GameVec,
    pub velocity: GameVec,
    pub angular_velocity: GameVec,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameBall {
    pub physics: GamePhysics,
    #[serde(default)]
    pub collision_shape: Option<CollisionShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameInfo {
    pub seconds_elapsed: f32,
    #[serde(default)]
    pub world_gravity_z: Option<f32>,
}

/// One frame of game telemetry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GamePacket {
    pub game_info: GameInfo,
    pub game_ball: GameBall,
}

impl GamePacket {
    /// The ball part of the packet as a sync snapshot
    pub fn ball_snapshot(&self) -> BallSnapshot {
        let physics = &self.game_ball.physics;
        BallSnapshot {
            time: self.game_info.seconds_elapsed,
            location: physics.location.into(),
            velocity: physics.velocity.into(),
            angular_velocity: physics.angular_velocity.into(),
            radius: self.game_ball.collision_shape.map(|shape| shape.radius()),
            collision_radius: None,
        }
    }
}

/// An authoritative ball state to sync the engine to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub time: f32,
    pub location: Vec3A,
    pub velocity: Vec3A,
    pub angular_velocity: Vec3A,
    /// Overrides the mode's ball radius
    #[serde(default)]
    pub radius: Option<f32>,
    /// Overrides the collision radius (otherwise radius + contact margin)
    #[serde(default)]
    pub collision_radius: Option<f32>,
}

impl BallSnapshot {
    pub fn new(time: f32, location: Vec3A, velocity: Vec3A, angular_velocity: Vec3A) -> Self {
        Self {
            time,
            location,
            velocity,
            angular_velocity,
            radius: None,
            collision_radius: None,
        }
    }
}

/// Partial ball update from a loose field map
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BallUpdate {
    pub time: Option<f32>,
    pub location: Option<Vec3A>,
    pub velocity: Option<Vec3A>,
    pub angular_velocity: Option<Vec3A>,
    pub radius: Option<f32>,
    pub collision_radius: Option<f32>,
}

impl BallUpdate {
    /// Parse `time`, `location`, `velocity`, `angular_velocity`, `radius` and
    /// `collision_radius`. Vectors may be `[x, y, z]` or `{"x", "y", "z"}`.
    /// Other keys are ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut update = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "time" => update.time = Some(scalar(key, value)?),
                "location" => update.location = Some(vector(key, value)?),
                "velocity" => update.velocity = Some(vector(key, value)?),
                "angular_velocity" => update.angular_velocity = Some(vector(key, value)?),
                "radius" => update.radius = Some(scalar(key, value)?),
                "collision_radius" => update.collision_radius = Some(scalar(key, value)?),
                other => log::debug!("Ignoring unknown ball field '{other}'"),
            }
        }
        Ok(update)
    }

    /// Fill in the fields this update leaves out from `base`
    pub fn apply_to(&self, base: &BallSnapshot) -> BallSnapshot {
        BallSnapshot {
            time: self.time.unwrap_or(base.time),
            location: self.location.unwrap_or(base.location),
            velocity: self.velocity.unwrap_or(base.velocity),
            angular_velocity: self.angular_velocity.unwrap_or(base.angular_velocity),
            radius: self.radius.or(base.radius),
            collision_radius: self.collision_radius.or(base.collision_radius),
        }
    }
}

fn scalar(key: &str, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| EngineError::InvalidState(format!("'{key}' must be a number, got {value}")))
}

fn vector(key: &str, value: &Value) -> Result<Vec3A> {
    let component = |v: Option<&Value>| v.and_then(Value::as_f64).map(|v| v as f32);
    let parsed = match value {
        Value::Array(items) if items.len() == 3 => {
            match (component(items.first()), component(items.get(1)), component(items.get(2))) {
                (Some(x), Some(y), Some(z)) => Some(Vec3A::new(x, y, z)),
                _ => None,
            }
        }
        Value::Object(map) => match (component(map.get("x")), component(map.get("y")), component(map.get("z"))) {
            (Some(x), Some(y), Some(z)) => Some(Vec3A::new(x, y, z)),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| {
        EngineError::InvalidState(format!("'{key}' must be a 3-component vector, got {value}"))
    })
}
