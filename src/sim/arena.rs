//! Arena geometry store
//!
//! An `Arena` is the immutable collision mesh for one game mode together with
//! its BVH. It is built once per mode load and shared (behind an `Arc`) by the
//! live engine and every prediction run. The only mutable arena state, the
//! dropshot tile map, lives outside it in `TileState` so predictions can work
//! on their own copy.

use glam::Vec3A;
use serde::{Deserialize, Serialize};

use super::bvh::{Bvh, SurfaceHit, SurfaceId};
use super::geometry::{Aabb, Triangle};
use super::layout::{self, ArenaMesh, TileId, TileInfo};
use super::mode::GameMode;

/// Collision mesh and spatial index for one game mode
#[derive(Debug, Clone)]
pub struct Arena {
    mode: GameMode,
    triangles: Vec<Triangle>,
    surface_tiles: Vec<Option<TileId>>,
    tiles: Vec<TileInfo>,
    bvh: Bvh,
}

impl Arena {
    /// Generate the mode's mesh and build its BVH
    pub fn build(mode: GameMode) -> Self {
        let mesh = match mode {
            GameMode::Standard | GameMode::Heatseeker => layout::soccar(),
            GameMode::Throwback => layout::throwback(),
            GameMode::Hoops => layout::hoops(),
            GameMode::Dropshot => layout::dropshot(),
        };
        Self::from_mesh(mode, mesh)
    }

    pub fn from_mesh(mode: GameMode, mesh: ArenaMesh) -> Self {
        let bvh = Bvh::build(&mesh.triangles);
        log::info!(
            "Built {} arena: {} triangles, {} tiles, {} BVH nodes (depth {})",
            mode.name(),
            mesh.triangles.len(),
            mesh.tiles.len(),
            bvh.node_count(),
            bvh.depth()
        );
        Self {
            mode,
            triangles: mesh.triangles,
            surface_tiles: mesh.surface_tiles,
            tiles: mesh.tiles,
            bvh,
        }
    }

    #[inline]
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn tiles(&self) -> &[TileInfo] {
        &self.tiles
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bvh.bounds()
    }

    /// Fresh tile map for this arena (all intact)
    pub fn new_tile_state(&self) -> TileState {
        TileState::new(self.tiles.len())
    }

    /// Tile a surface belongs to, if it is a breakable floor tile
    #[inline]
    pub fn tile_of(&self, surface: SurfaceId) -> Option<TileId> {
        self.surface_tiles.get(surface as usize).copied().flatten()
    }

    /// Closest surface within `search_radius` of `point`
    pub fn nearest_surface(&self, point: Vec3A, search_radius: f32) -> Option<SurfaceHit> {
        self.bvh.nearest(&self.triangles, point, search_radius)
    }

    /// Closest surface within `search_radius`, ignoring broken tiles
    pub fn nearest_open_surface(
        &self,
        point: Vec3A,
        search_radius: f32,
        tiles: &TileState,
    ) -> Option<SurfaceHit> {
        if tiles.broken_count() == 0 {
            return self.nearest_surface(point, search_radius);
        }
        self.bvh
            .nearest_where(&self.triangles, point, search_radius, |id| {
                self.tile_of(id).is_some_and(|tile| tiles.is_broken(tile))
            })
    }
}

/// Condition of a single dropshot tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileStatus {
    #[default]
    Intact,
    Broken,
}

/// Mutable tile map for the dropshot arena
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TileState {
    tiles: Vec<TileStatus>,
    broken: usize,
}

impl TileState {
    pub fn new(count: usize) -> Self {
        Self {
            tiles: vec![TileStatus::Intact; count],
            broken: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn status(&self, tile: TileId) -> Option<TileStatus> {
        self.tiles.get(tile as usize).copied()
    }

    #[inline]
    pub fn is_broken(&self, tile: TileId) -> bool {
        self.status(tile) == Some(TileStatus::Broken)
    }

    pub fn broken_count(&self) -> usize {
        self.broken
    }

    /// Mark a tile broken. Returns true if it was intact before.
    pub fn break_tile(&mut self, tile: TileId) -> bool {
        match self.tiles.get_mut(tile as usize) {
            Some(status @ TileStatus::Intact) => {
                *status = TileStatus::Broken;
                self.broken += 1;
                true
            }
            _ => false,
        }
    }

    /// Restore every tile
    pub fn reset(&mut self) {
        self.tiles.fill(TileStatus::Intact);
        self.broken = 0;
    }
}
