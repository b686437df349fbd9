//! Engine handle
//!
//! An `Engine` owns the active mode, its arena and the authoritative ball
//! state. Independent engines share no state; each caches its own arenas.
//! `SharedEngine` wraps one in a mutex for multi-threaded callers and holds
//! the lock only while copying the prediction seed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::Vec3A;
use serde_json::{Map, Value};

use crate::consts::SIM_DT;
use crate::error::{EngineError, Result};
use crate::is_finite_vec;
use crate::packet::{BallSnapshot, BallUpdate, GamePacket};
use crate::settings::EngineSettings;
use crate::sim::{
    Arena, BallState, GameMode, ModeConfig, PredictionBuffer, PredictionSeed, PredictionSlice,
    SimState, SliceDetail, SliceMotion, SurfaceHit, TileState, step,
};

/// Largest ball radius a snapshot may override to
const MAX_BALL_RADIUS: f32 = 1000.0;

/// State that only exists once a mode is loaded
#[derive(Debug, Clone)]
struct Live {
    arena: Arc<Arena>,
    config: ModeConfig,
    state: SimState,
}

/// Ball prediction engine for one caller
#[derive(Debug, Default)]
pub struct Engine {
    settings: EngineSettings,
    arenas: HashMap<GameMode, Arc<Arena>>,
    live: Option<Live>,
}

impl Engine {
    /// An engine with default settings and no mode loaded
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..Default::default()
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // === Mode selection ===

    /// Make `mode` active and reset the ball to the mode's rest state.
    ///
    /// Arenas are built on first use and kept for later loads.
    pub fn load(&mut self, mode: GameMode) -> Result<()> {
        let arena = self
            .arenas
            .entry(mode)
            .or_insert_with(|| Arc::new(Arena::build(mode)))
            .clone();
        let config = ModeConfig::for_mode(mode, self.settings.tile_break_speed);
        let state = SimState::new(&config, arena.new_tile_state());

        self.live = Some(Live {
            arena,
            config,
            state,
        });
        log::info!("Loaded {mode} mode");
        Ok(())
    }

    /// Load a mode by its name, e.g. "standard" or "dropshot"
    pub fn load_by_name(&mut self, name: &str) -> Result<GameMode> {
        let mode: GameMode = name.parse()?;
        self.load(mode)?;
        Ok(mode)
    }

    pub fn load_standard(&mut self) -> Result<()> {
        self.load(GameMode::Standard)
    }

    pub fn load_dropshot(&mut self) -> Result<()> {
        self.load(GameMode::Dropshot)
    }

    pub fn load_hoops(&mut self) -> Result<()> {
        self.load(GameMode::Hoops)
    }

    pub fn load_standard_throwback(&mut self) -> Result<()> {
        self.load(GameMode::Throwback)
    }

    pub fn load_standard_heatseeker(&mut self) -> Result<()> {
        self.load(GameMode::Heatseeker)
    }

    // === Inspection ===

    fn live(&self) -> Result<&Live> {
        self.live.as_ref().ok_or(EngineError::EngineNotLoaded)
    }

    fn live_mut(&mut self) -> Result<&mut Live> {
        self.live.as_mut().ok_or(EngineError::EngineNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.live.is_some()
    }

    pub fn mode(&self) -> Option<GameMode> {
        self.live.as_ref().map(|live| live.config.mode)
    }

    pub fn arena(&self) -> Result<&Arc<Arena>> {
        Ok(&self.live()?.arena)
    }

    pub fn ball(&self) -> Result<BallState> {
        Ok(self.live()?.state.ball)
    }

    pub fn gravity(&self) -> Result<Vec3A> {
        Ok(self.live()?.config.gravity)
    }

    pub fn tile_state(&self) -> Result<&TileState> {
        Ok(&self.live()?.state.tiles)
    }

    /// Restore every dropshot tile in the live map
    pub fn reset_tiles(&mut self) -> Result<()> {
        self.live_mut()?.state.tiles.reset();
        Ok(())
    }

    /// Nearest surface of the active arena, ignoring tiles broken in the live map
    pub fn nearest_surface(&self, point: Vec3A, search_radius: f32) -> Result<Option<SurfaceHit>> {
        let live = self.live()?;
        Ok(live
            .arena
            .nearest_open_surface(point, search_radius, &live.state.tiles))
    }

    // === Live state sync ===

    fn validate_snapshot(&self, snapshot: &BallSnapshot) -> Result<()> {
        let limits = &self.settings;
        let invalid = |msg: String| {
            log::warn!("Rejected ball snapshot: {msg}");
            Err(EngineError::InvalidState(msg))
        };

        if !snapshot.time.is_finite() {
            return invalid(format!("time is not finite ({})", snapshot.time));
        }
        for (name, v) in [
            ("location", snapshot.location),
            ("velocity", snapshot.velocity),
            ("angular_velocity", snapshot.angular_velocity),
        ] {
            if !is_finite_vec(v) {
                return invalid(format!("{name} is not finite ({v})"));
            }
        }
        if snapshot.location.abs().max_element() > limits.max_position {
            return invalid(format!("location {} is out of bounds", snapshot.location));
        }
        if snapshot.velocity.length() > limits.max_speed {
            return invalid(format!("speed {} exceeds {}", snapshot.velocity.length(), limits.max_speed));
        }
        if snapshot.angular_velocity.length() > limits.max_angular_speed {
            return invalid(format!(
                "angular speed {} exceeds {}",
                snapshot.angular_velocity.length(),
                limits.max_angular_speed
            ));
        }
        for (name, r) in [("radius", snapshot.radius), ("collision_radius", snapshot.collision_radius)] {
            if let Some(r) = r
                && !(r.is_finite() && r > 0.0 && r <= MAX_BALL_RADIUS)
            {
                return invalid(format!("{name} {r} is out of range"));
            }
        }
        Ok(())
    }

    /// Overwrite the ball with an authoritative snapshot.
    ///
    /// On error the engine is left unchanged.
    pub fn sync(&mut self, snapshot: &BallSnapshot) -> Result<()> {
        self.live()?;
        self.validate_snapshot(snapshot)?;

        let live = self.live_mut()?;
        let ball = &mut live.state.ball;
        live.state
            .possession
            .observe(ball.time, snapshot.time, snapshot.velocity);

        ball.time = snapshot.time;
        ball.location = snapshot.location;
        ball.velocity = snapshot.velocity;
        ball.angular_velocity = snapshot.angular_velocity;
        if let Some(radius) = snapshot.radius {
            ball.set_radius(radius);
        }
        if let Some(collision_radius) = snapshot.collision_radius {
            ball.collision_radius = collision_radius;
        }
        Ok(())
    }

    /// Sync from a structured telemetry packet, including its gravity
    pub fn tick(&mut self, packet: &GamePacket) -> Result<()> {
        let gravity_z = packet.game_info.world_gravity_z;
        if let Some(z) = gravity_z
            && !z.is_finite()
        {
            return Err(EngineError::InvalidState(format!("world gravity {z} is not finite")));
        }

        self.sync(&packet.ball_snapshot())?;
        if let Some(z) = gravity_z {
            self.live_mut()?.config.gravity = Vec3A::new(0.0, 0.0, z);
        }
        Ok(())
    }

    /// Sync from a loose field map; missing fields keep their current values
    pub fn set_ball(&mut self, fields: &Map<String, Value>) -> Result<()> {
        let ball = self.ball()?;
        let update = BallUpdate::from_fields(fields)?;
        let current = BallSnapshot::new(ball.time, ball.location, ball.velocity, ball.angular_velocity);
        self.sync(&update.apply_to(&current))
    }

    /// Replace the active gravity vector until the next mode load
    pub fn set_gravity(&mut self, gravity: Vec3A) -> Result<()> {
        self.live()?;
        if !is_finite_vec(gravity) {
            return Err(EngineError::InvalidState(format!("gravity {gravity} is not finite")));
        }
        self.live_mut()?.config.gravity = gravity;
        Ok(())
    }

    /// Advance the live ball one tick. Tiles broken here stay broken.
    pub fn step_ball(&mut self) -> Result<PredictionSlice> {
        let live = self.live_mut()?;
        let report = step(&mut live.state, &live.arena, &live.config, SIM_DT);
        if report.tiles_broken > 0 {
            log::info!(
                "{} tile(s) broken; {} of {} down",
                report.tiles_broken,
                live.state.tiles.broken_count(),
                live.state.tiles.len()
            );
        }

        let ball = &live.state.ball;
        Ok(PredictionSlice {
            time: ball.time,
            location: ball.location,
            motion: Some(SliceMotion {
                velocity: ball.velocity,
                angular_velocity: ball.angular_velocity,
            }),
        })
    }

    // === Prediction ===

    /// Copy of everything a prediction needs
    pub fn seed(&self) -> Result<PredictionSeed> {
        let live = self.live()?;
        Ok(PredictionSeed {
            arena: Arc::clone(&live.arena),
            config: live.config,
            state: live.state.clone(),
        })
    }

    fn check_duration(&self, seconds: f32) -> Result<f32> {
        if seconds > 0.0 && seconds <= self.settings.max_horizon {
            Ok(seconds)
        } else {
            Err(EngineError::InvalidDuration(seconds))
        }
    }

    /// Positions over the default horizon
    pub fn predict_default(&self) -> Result<PredictionBuffer> {
        Ok(self
            .seed()?
            .predict(self.settings.default_horizon, SliceDetail::Position))
    }

    /// Full slices over the default horizon
    pub fn predict_default_full(&self) -> Result<PredictionBuffer> {
        Ok(self
            .seed()?
            .predict(self.settings.default_horizon, SliceDetail::Full))
    }

    pub fn predict_for_duration(&self, seconds: f32) -> Result<PredictionBuffer> {
        let seed = self.seed()?;
        Ok(seed.predict(self.check_duration(seconds)?, SliceDetail::Position))
    }

    pub fn predict_for_duration_full(&self, seconds: f32) -> Result<PredictionBuffer> {
        let seed = self.seed()?;
        Ok(seed.predict(self.check_duration(seconds)?, SliceDetail::Full))
    }
}

/// An engine usable from several threads.
///
/// Prediction calls lock only to copy the seed, so they run in parallel.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Engine> {
        // Engine calls leave state untouched when they fail, so a poisoned lock is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the engine
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn load(&self, mode: GameMode) -> Result<()> {
        self.lock().load(mode)
    }

    pub fn sync(&self, snapshot: &BallSnapshot) -> Result<()> {
        self.lock().sync(snapshot)
    }

    pub fn tick(&self, packet: &GamePacket) -> Result<()> {
        self.lock().tick(packet)
    }

    pub fn set_ball(&self, fields: &Map<String, Value>) -> Result<()> {
        self.lock().set_ball(fields)
    }

    pub fn step_ball(&self) -> Result<PredictionSlice> {
        self.lock().step_ball()
    }

    fn seed_for(&self, seconds: Option<f32>) -> Result<(PredictionSeed, f32)> {
        let engine = self.lock();
        let horizon = match seconds {
            Some(s) => engine.check_duration(s)?,
            None => engine.settings.default_horizon,
        };
        Ok((engine.seed()?, horizon))
    }

    pub fn predict_default(&self) -> Result<PredictionBuffer> {
        let (seed, horizon) = self.seed_for(None)?;
        Ok(seed.predict(horizon, SliceDetail::Position))
    }

    pub fn predict_default_full(&self) -> Result<PredictionBuffer> {
        let (seed, horizon) = self.seed_for(None)?;
        Ok(seed.predict(horizon, SliceDetail::Full))
    }

    pub fn predict_for_duration(&self, seconds: f32) -> Result<PredictionBuffer> {
        let (seed, horizon) = self.seed_for(Some(seconds))?;
        Ok(seed.predict(horizon, SliceDetail::Position))
    }

    pub fn predict_for_duration_full(&self, seconds: f32) -> Result<PredictionBuffer> {
        let (seed, horizon) = self.seed_for(Some(seconds))?;
        Ok(seed.predict(horizon, SliceDetail::Full))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(location: Vec3A, velocity: Vec3A) -> BallSnapshot {
        BallSnapshot::new(1.0, location, velocity, Vec3A::ZERO)
    }

    #[test]
    fn test_calls_before_load_fail() {
        let mut engine = Engine::new();
        assert_eq!(engine.predict_default(), Err(EngineError::EngineNotLoaded));
        assert_eq!(
            engine.sync(&snapshot(Vec3A::ZERO, Vec3A::ZERO)),
            Err(EngineError::EngineNotLoaded)
        );
        assert_eq!(engine.step_ball(), Err(EngineError::EngineNotLoaded));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_unknown_mode_keeps_prior_state() {
        let mut engine = Engine::new();
        engine.load_hoops().unwrap();
        assert_eq!(
            engine.load_by_name("rumble"),
            Err(EngineError::UnknownMode("rumble".into()))
        );
        assert_eq!(engine.mode(), Some(GameMode::Hoops));
        assert_eq!(engine.load_by_name("soccar"), Ok(GameMode::Standard));
    }

    #[test]
    fn test_invalid_sync_keeps_prior_state() {
        let mut engine = Engine::new();
        engine.load_standard().unwrap();
        engine
            .sync(&snapshot(Vec3A::new(0.0, 0.0, 500.0), Vec3A::ZERO))
            .unwrap();
        let before = engine.ball().unwrap();

        let bad = [
            snapshot(Vec3A::new(f32::NAN, 0.0, 0.0), Vec3A::ZERO),
            snapshot(Vec3A::new(0.0, 0.0, 1e6), Vec3A::ZERO),
            snapshot(Vec3A::ZERO, Vec3A::new(0.0, 0.0, f32::INFINITY)),
            snapshot(Vec3A::ZERO, Vec3A::new(50_000.0, 0.0, 0.0)),
        ];
        for s in &bad {
            assert!(matches!(engine.sync(s), Err(EngineError::InvalidState(_))));
            assert_eq!(engine.ball().unwrap(), before);
        }
    }

    #[test]
    fn test_duration_bounds() {
        let mut engine = Engine::new();
        engine.load_standard().unwrap();
        assert_eq!(engine.predict_for_duration(0.0), Err(EngineError::InvalidDuration(0.0)));
        assert_eq!(engine.predict_for_duration(-1.0), Err(EngineError::InvalidDuration(-1.0)));
        assert!(engine.predict_for_duration(12.5).is_err());
        assert!(engine.predict_for_duration(f32::NAN).is_err());
        assert_eq!(engine.predict_for_duration(12.0).unwrap().num_slices(), 1440);
        assert_eq!(engine.predict_for_duration_full(0.25).unwrap().num_slices(), 30);
    }

    #[test]
    fn test_set_ball_partial_update() {
        let mut engine = Engine::new();
        engine.load_standard().unwrap();
        let fields = json!({ "time": 2.0, "location": [100.0, 200.0, 300.0] });
        engine.set_ball(fields.as_object().unwrap()).unwrap();

        let ball = engine.ball().unwrap();
        assert_eq!(ball.time, 2.0);
        assert_eq!(ball.location, Vec3A::new(100.0, 200.0, 300.0));
        assert_eq!(ball.velocity, Vec3A::ZERO);

        let radius = json!({ "radius": 120.0 });
        engine.set_ball(radius.as_object().unwrap()).unwrap();
        assert!((engine.ball().unwrap().collision_radius - 121.9).abs() < 1e-3);
    }

    #[test]
    fn test_tick_applies_gravity_and_radius() {
        let mut engine = Engine::new();
        engine.load_standard().unwrap();
        let packet: GamePacket = serde_json::from_value(json!({
            "game_info": { "seconds_elapsed": 5.0, "world_gravity_z": -325.0 },
            "game_ball": {
                "physics": {
                    "location": { "x": 0.0, "y": 0.0, "z": 800.0 },
                    "velocity": { "x": 0.0, "y": 0.0, "z": 0.0 },
                    "angular_velocity": { "x": 0.0, "y": 0.0, "z": 0.0 }
                },
                "collision_shape": { "type": "sphere", "diameter": 200.0 }
            }
        }))
        .unwrap();
        engine.tick(&packet).unwrap();
        assert_eq!(engine.gravity().unwrap().z, -325.0);
        assert_eq!(engine.ball().unwrap().radius, 100.0);

        engine.load_standard().unwrap();
        assert_eq!(engine.gravity().unwrap().z, -650.0);
    }

    #[test]
    fn test_set_gravity_rejects_nan() {
        let mut engine = Engine::new();
        engine.load_standard().unwrap();
        assert!(engine.set_gravity(Vec3A::new(0.0, f32::NAN, 0.0)).is_err());
        engine.set_gravity(Vec3A::ZERO).unwrap();
        engine
            .sync(&snapshot(Vec3A::new(0.0, 0.0, 800.0), Vec3A::ZERO))
            .unwrap();
        let buffer = engine.predict_for_duration(1.0).unwrap();
        assert!(buffer.slices.iter().all(|s| s.location.z == 800.0));
    }

    #[test]
    fn test_step_ball_breaks_live_tiles() {
        let mut engine = Engine::new();
        engine.load_dropshot().unwrap();
        let radius = engine.ball().unwrap().collision_radius;
        engine
            .sync(&snapshot(Vec3A::new(0.0, 300.0, radius + 5.0), Vec3A::new(0.0, 0.0, -2000.0)))
            .unwrap();

        // Predictions never touch the live map
        engine.predict_default().unwrap();
        assert_eq!(engine.tile_state().unwrap().broken_count(), 0);

        let slice = engine.step_ball().unwrap();
        assert!(slice.velocity().is_some());
        assert_eq!(engine.tile_state().unwrap().broken_count(), 1);

        engine.reset_tiles().unwrap();
        assert_eq!(engine.tile_state().unwrap().broken_count(), 0);
    }

    #[test]
    fn test_with_settings_validates() {
        let bad = EngineSettings {
            max_horizon: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            Engine::with_settings(bad),
            Err(EngineError::InvalidSettings(_))
        ));

        let short = EngineSettings {
            default_horizon: 2.0,
            ..Default::default()
        };
        let mut engine = Engine::with_settings(short).unwrap();
        engine.load_hoops().unwrap();
        assert_eq!(engine.predict_default().unwrap().num_slices(), 240);
    }

    #[test]
    fn test_shared_engine_predicts_across_threads() {
        let shared = SharedEngine::new(Engine::new());
        shared.load(GameMode::Standard).unwrap();
        shared
            .sync(&snapshot(Vec3A::new(0.0, 0.0, 600.0), Vec3A::new(500.0, 0.0, 0.0)))
            .unwrap();

        let expected = shared.predict_default().unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.predict_default().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
        assert_eq!(shared.with(|e| e.mode()), Some(GameMode::Standard));
    }
}
