//! Deterministic ball simulation
//!
//! Arena meshes and their collision index, the per-mode rules, the fixed
//! step integrator and forward prediction. Nothing here touches global state:
//! the same inputs always produce the same trajectory.

pub mod arena;
pub mod bvh;
pub mod geometry;
pub mod layout;
pub mod mode;
pub mod predict;
pub mod state;
pub mod tick;

pub use arena::{Arena, TileState, TileStatus};
pub use bvh::{Bvh, SurfaceHit, SurfaceId};
pub use geometry::{Aabb, Triangle};
pub use layout::{TileId, TileInfo};
pub use mode::{GameMode, ModeConfig, ModeRules, Possession};
pub use predict::{PredictionBuffer, PredictionSeed, PredictionSlice, SliceDetail, SliceMotion};
pub use state::{BallState, SimState};
pub use tick::{StepReport, step};
