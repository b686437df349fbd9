//! Ball Sym - ball trajectory prediction for car-soccer arenas
//!
//! Core modules:
//! - `sim`: Deterministic simulation (arena meshes, collision index, integrator, predictions)
//! - `engine`: Engine handle tying a loaded mode to the live ball state
//! - `packet`: Telemetry snapshots consumed by the engine
//! - `settings`: Data-driven engine limits

pub mod engine;
pub mod error;
pub mod packet;
pub mod settings;
pub mod sim;

pub use engine::{Engine, SharedEngine};
pub use error::{EngineError, Result, SettingsError};
pub use packet::GamePacket;
pub use settings::EngineSettings;
pub use sim::{GameMode, PredictionBuffer, PredictionSlice, SliceDetail};

pub use glam::Vec3A;

/// Simulation configuration constants
pub mod consts {
    /// Physics tick rate of the game (Hz)
    pub const TICK_RATE: f32 = 120.0;
    /// Fixed simulation timestep
    pub const SIM_DT: f32 = 1.0 / TICK_RATE;
    /// Maximum substeps per tick to prevent tunneling through thin geometry
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Horizon used by the default prediction queries (seconds)
    pub const DEFAULT_HORIZON: f32 = 6.0;
    /// Longest horizon a duration-bounded query accepts (seconds)
    pub const MAX_HORIZON: f32 = 12.0;

    /// Extra radius between the visual ball and its collision sphere
    pub const COLLISION_MARGIN: f32 = 1.9;
}

/// Number of fixed steps needed to cover `seconds` of game time.
#[inline]
pub fn steps_for(seconds: f32) -> usize {
    (seconds * consts::TICK_RATE).round().max(0.0) as usize
}

/// True if every component of the vector is finite
#[inline]
pub fn is_finite_vec(v: Vec3A) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}
