//! Fixed timestep ball integrator
//!
//! Semi-implicit Euler: forces update velocity first, then the new velocity
//! moves the ball. Contacts are resolved against the single nearest arena
//! surface after each move. Fast balls are split into substeps so no move is
//! longer than half the collision radius.

use glam::Vec3A;

use super::arena::Arena;
use super::mode::{FRICTION_RATIO_SCALE, ModeConfig, SPIN_COEFFICIENT};
use super::state::SimState;
use crate::consts::MAX_SUBSTEPS;
use crate::is_finite_vec;

/// Normal speeds below this are absorbed instead of bounced (resting contact)
const RESTING_SPEED: f32 = 10.0;

/// What happened during one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub substeps: u32,
    pub contacts: u32,
    pub tiles_broken: u32,
}

/// Number of substeps needed to keep each move under half the collision radius
pub fn substeps_for(speed: f32, gravity: f32, collision_radius: f32, dt: f32) -> u32 {
    let travel = (speed + gravity.abs() * dt) * dt;
    let limit = collision_radius * 0.5;
    if !(travel > limit) {
        return 1;
    }
    ((travel / limit).ceil() as u32).clamp(1, MAX_SUBSTEPS)
}

/// Advance the simulation by `dt` seconds
pub fn step(state: &mut SimState, arena: &Arena, config: &ModeConfig, dt: f32) -> StepReport {
    let substeps = substeps_for(
        state.ball.speed().min(config.max_speed),
        config.gravity.length(),
        state.ball.collision_radius,
        dt,
    );
    let h = dt / substeps as f32;

    let mut report = StepReport {
        substeps,
        ..Default::default()
    };
    for _ in 0..substeps {
        substep(state, arena, config, h, &mut report);
    }
    state.ball.time += dt;
    report
}

fn substep(state: &mut SimState, arena: &Arena, config: &ModeConfig, h: f32, report: &mut StepReport) {
    let ball = &mut state.ball;
    let start = *ball;

    // Gravity, drag and the mode's steering force
    let mut v = ball.velocity + (config.gravity + config.drag * ball.velocity) * h;
    v += config
        .rules
        .post_gravity(ball.location, v, &state.possession, h);

    let mut p = ball.location + v * h;
    let mut w = ball.angular_velocity;

    let search_radius = ball.collision_radius + (v * h).length();
    if let Some(hit) = arena.nearest_open_surface(p, search_radius, &state.tiles)
        && hit.distance < ball.collision_radius
    {
        let n = hit.normal;
        let v_n = v.dot(n);

        if v_n < 0.0 {
            report.contacts += 1;
            let v_perp = n * v_n;
            let v_para = v - v_perp;
            let v_spin = ball.radius * n.cross(w);
            let slip = v_para + v_spin;

            let ratio = v_perp.length() / slip.length().max(1e-4);
            let bounce = if -v_n > RESTING_SPEED {
                1.0 + config.restitution
            } else {
                1.0
            };
            let dv_perp = -bounce * v_perp;
            let dv_para = -(FRICTION_RATIO_SCALE * ratio).min(1.0) * config.friction * slip;

            w += SPIN_COEFFICIENT * ball.radius * dv_para.cross(n);
            v += dv_perp + dv_para;

            if config.rules.post_collision(arena, &hit, -v_n, &mut state.tiles) {
                report.tiles_broken += 1;
                log::debug!(
                    "Tile broken at t={:.3} (impact speed {:.0})",
                    ball.time,
                    -v_n
                );
            }
        }

        // Push out of the surface
        p += n * (ball.collision_radius - hit.distance);
    }

    v = v.clamp_length_max(config.max_speed);
    w = w.clamp_length_max(config.max_angular_speed);

    if is_finite_vec(p) && is_finite_vec(v) && is_finite_vec(w) {
        ball.location = p;
        ball.velocity = v;
        ball.angular_velocity = w;
    } else {
        log::warn!("Non-finite ball state after substep; holding position");
        ball.location = start.location;
        ball.velocity = Vec3A::ZERO;
        ball.angular_velocity = Vec3A::ZERO;
    }

    state.possession.hang_time += h;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::sim::mode::GameMode;

    fn setup(mode: GameMode) -> (Arena, ModeConfig, SimState) {
        let arena = Arena::build(mode);
        let config = ModeConfig::for_mode(mode, 1000.0);
        let state = SimState::new(&config, arena.new_tile_state());
        (arena, config, state)
    }

    #[test]
    fn test_free_fall_follows_gravity() {
        let (arena, config, mut state) = setup(GameMode::Standard);
        state.ball.location = Vec3A::new(0.0, 0.0, 1500.0);
        step(&mut state, &arena, &config, SIM_DT);
        assert!((state.ball.velocity.z - config.gravity.z * SIM_DT).abs() < 1e-3);
        assert!(state.ball.location.z < 1500.0);
        assert!((state.ball.time - SIM_DT).abs() < 1e-6);
    }

    #[test]
    fn test_drag_slows_ball() {
        let (arena, mut config, mut state) = setup(GameMode::Standard);
        config.gravity = Vec3A::ZERO;
        state.ball.location = Vec3A::new(0.0, 0.0, 1000.0);
        state.ball.velocity = Vec3A::new(1000.0, 0.0, 0.0);
        step(&mut state, &arena, &config, SIM_DT);
        assert!(state.ball.velocity.x < 1000.0);
        assert!(state.ball.velocity.x > 999.0);
    }

    #[test]
    fn test_floor_bounce_reverses_and_loses_speed() {
        let (arena, config, mut state) = setup(GameMode::Standard);
        state.ball.location = Vec3A::new(0.0, 0.0, config.collision_radius + 1.0);
        state.ball.velocity = Vec3A::new(0.0, 0.0, -1000.0);
        let report = step(&mut state, &arena, &config, SIM_DT);
        assert_eq!(report.contacts, 1);
        assert!(state.ball.velocity.z > 0.0);
        assert!(state.ball.velocity.z < 1000.0);
        assert!(state.ball.location.z >= config.collision_radius - 1e-3);
    }

    #[test]
    fn test_resting_ball_stays_put() {
        let (arena, config, mut state) = setup(GameMode::Standard);
        for _ in 0..240 {
            step(&mut state, &arena, &config, SIM_DT);
        }
        assert!((state.ball.location.z - config.collision_radius).abs() < 1.0);
        assert!(state.ball.velocity.length() < 20.0);
    }

    #[test]
    fn test_rolling_picks_up_spin() {
        let (arena, config, mut state) = setup(GameMode::Standard);
        state.ball.velocity = Vec3A::new(1000.0, 0.0, 0.0);
        for _ in 0..30 {
            step(&mut state, &arena, &config, SIM_DT);
        }
        assert!(state.ball.angular_velocity.length() > 0.0);
        assert!(state.ball.velocity.x < 1000.0);
    }

    #[test]
    fn test_fast_ball_substeps() {
        assert_eq!(substeps_for(0.0, 650.0, 93.15, SIM_DT), 1);
        assert_eq!(substeps_for(6000.0, 650.0, 93.15, SIM_DT), 2);
        assert_eq!(substeps_for(1e9, 650.0, 93.15, SIM_DT), MAX_SUBSTEPS);
        assert_eq!(substeps_for(f32::NAN, 650.0, 93.15, SIM_DT), 1);
    }

    #[test]
    fn test_fast_ball_never_leaves_arena() {
        let (arena, config, mut state) = setup(GameMode::Standard);
        state.ball.location = Vec3A::new(0.0, 0.0, 500.0);
        state.ball.velocity = Vec3A::new(6000.0, 0.0, 0.0);
        for _ in 0..240 {
            step(&mut state, &arena, &config, SIM_DT);
            assert!(state.ball.location.x.abs() < 4096.0);
        }
    }

    #[test]
    fn test_hard_dropshot_impact_breaks_tile() {
        let (arena, config, mut state) = setup(GameMode::Dropshot);
        state.ball.location = Vec3A::new(0.0, 300.0, config.collision_radius + 5.0);
        state.ball.velocity = Vec3A::new(0.0, 0.0, -2000.0);
        let report = step(&mut state, &arena, &config, SIM_DT);
        assert_eq!(report.tiles_broken, 1);
        assert_eq!(state.tiles.broken_count(), 1);
    }

    #[test]
    fn test_soft_dropshot_impact_keeps_tiles() {
        let (arena, config, mut state) = setup(GameMode::Dropshot);
        state.ball.location = Vec3A::new(0.0, 300.0, config.collision_radius + 1.0);
        state.ball.velocity = Vec3A::new(0.0, 0.0, -300.0);
        step(&mut state, &arena, &config, SIM_DT);
        assert_eq!(state.tiles.broken_count(), 0);
        assert!(state.ball.velocity.z > 0.0);
    }
}
