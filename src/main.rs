//! Ball Sym benchmark driver
//!
//! Loads every mode, syncs a stream of random telemetry packets and times
//! each prediction query variant.
//!
//! Usage: `ball-sym-bench [iterations] [settings.json]`

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use ball_sym::consts::{MAX_HORIZON, SIM_DT};
use ball_sym::packet::{CollisionShape, GameBall, GameInfo, GamePhysics, GameVec};
use ball_sym::{Engine, EngineSettings, GameMode, GamePacket, PredictionBuffer};

const DEFAULT_ITERATIONS: usize = 2000;
const SEED: u64 = 0x0ba1_1517;

type Query = fn(&Engine) -> ball_sym::Result<PredictionBuffer>;

const QUERIES: [(&str, Query); 4] = [
    ("predict_default", Engine::predict_default),
    ("predict_default_full", Engine::predict_default_full),
    ("predict_for_duration", |e| e.predict_for_duration(MAX_HORIZON)),
    ("predict_for_duration_full", |e| {
        e.predict_for_duration_full(MAX_HORIZON)
    }),
];

fn random_vec(rng: &mut Pcg32, x: f32, y: f32, z: (f32, f32)) -> GameVec {
    GameVec {
        x: rng.random_range(-x..=x),
        y: rng.random_range(-y..=y),
        z: rng.random_range(z.0..=z.1),
    }
}

fn random_packet(rng: &mut Pcg32, time: f32) -> GamePacket {
    GamePacket {
        game_info: GameInfo {
            seconds_elapsed: time,
            world_gravity_z: Some(-650.0),
        },
        game_ball: GameBall {
            physics: GamePhysics {
                location: random_vec(rng, 4000.0, 5020.0, (100.0, 1944.0)),
                velocity: random_vec(rng, 2000.0, 2000.0, (-2000.0, 2000.0)),
                angular_velocity: random_vec(rng, 1.0, 1.0, (-1.0, 1.0)),
            },
            collision_shape: Some(CollisionShape::Sphere { diameter: 182.5 }),
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let iterations = match args.next() {
        Some(arg) => arg.parse()?,
        None => DEFAULT_ITERATIONS,
    };
    let settings = match args.next() {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };

    let mut engine = Engine::with_settings(settings)?;
    let mut rng = Pcg32::seed_from_u64(SEED);

    // Sample output, as a bot author would see it
    engine.load_standard()?;
    engine.tick(&random_packet(&mut rng, 0.0))?;
    for (name, query) in QUERIES {
        let prediction = query(&engine)?;
        log::info!("{name}: {prediction}");
        if let Some(slice) = prediction.get(50) {
            log::info!("  slice 50: {slice}");
        }
        log::debug!("  path: {:?}", prediction.polyline(4));
    }

    for mode in GameMode::ALL {
        engine.load(mode)?;

        for (name, query) in QUERIES {
            let mut total = Duration::ZERO;
            let mut time = 0.0;

            for _ in 0..iterations {
                engine.tick(&random_packet(&mut rng, time))?;

                let start = Instant::now();
                query(&engine)?;
                total += start.elapsed();
                time += SIM_DT;
            }

            log::info!(
                "{name} in {mode}: total {:.4}s, avg {:.3}ms",
                total.as_secs_f64(),
                total.as_secs_f64() * 1000.0 / iterations.max(1) as f64
            );
        }
    }

    Ok(())
}
