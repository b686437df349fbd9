//! Forward prediction over a private copy of the simulation state

use std::fmt;
use std::sync::Arc;

use glam::Vec3A;
use serde::{Deserialize, Serialize};

use super::arena::Arena;
use super::mode::ModeConfig;
use super::state::SimState;
use super::tick::step;
use crate::consts::SIM_DT;
use crate::steps_for;

/// How much of each simulated step a prediction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SliceDetail {
    /// Time and location only
    #[default]
    Position,
    /// Time, location, velocity and angular velocity
    Full,
}

/// Velocity data recorded for full-detail slices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliceMotion {
    pub velocity: Vec3A,
    pub angular_velocity: Vec3A,
}

/// The predicted ball state after one fixed step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionSlice {
    pub time: f32,
    pub location: Vec3A,
    #[serde(flatten)]
    pub motion: Option<SliceMotion>,
}

impl PredictionSlice {
    pub fn velocity(&self) -> Option<Vec3A> {
        self.motion.map(|m| m.velocity)
    }

    pub fn angular_velocity(&self) -> Option<Vec3A> {
        self.motion.map(|m| m.angular_velocity)
    }
}

impl fmt::Display for PredictionSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ball @{:.2}s - location: [{:.2}, {:.2}, {:.2}]",
            self.time, self.location.x, self.location.y, self.location.z
        )?;
        if let Some(motion) = self.motion {
            write!(
                f,
                ", velocity: [{:.2}, {:.2}, {:.2}], angular velocity: [{:.4}, {:.4}, {:.4}]",
                motion.velocity.x,
                motion.velocity.y,
                motion.velocity.z,
                motion.angular_velocity.x,
                motion.angular_velocity.y,
                motion.angular_velocity.z
            )?;
        }
        Ok(())
    }
}

/// Time-ordered predicted ball states, one per 1/120 s step
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionBuffer {
    pub slices: Vec<PredictionSlice>,
}

impl PredictionBuffer {
    pub fn num_slices(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PredictionSlice> {
        self.slices.get(index)
    }

    pub fn last(&self) -> Option<&PredictionSlice> {
        self.slices.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PredictionSlice> {
        self.slices.iter()
    }

    /// Every `stride`-th location plus the final one, for drawing a path
    pub fn polyline(&self, stride: usize) -> Vec<Vec3A> {
        let stride = stride.max(1);
        let mut points: Vec<Vec3A> = self
            .slices
            .iter()
            .step_by(stride)
            .map(|s| s.location)
            .collect();
        if let Some(last) = self.slices.last()
            && (self.slices.len() - 1) % stride != 0
        {
            points.push(last.location);
        }
        points
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for PredictionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ball prediction - {} slices", self.slices.len())
    }
}

impl<'a> IntoIterator for &'a PredictionBuffer {
    type Item = &'a PredictionSlice;
    type IntoIter = std::slice::Iter<'a, PredictionSlice>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.iter()
    }
}

/// Everything a prediction needs, copied out of the live engine.
///
/// Holding a seed never blocks the engine: the arena is shared read-only and
/// the state is owned.
#[derive(Debug, Clone)]
pub struct PredictionSeed {
    pub arena: Arc<Arena>,
    pub config: ModeConfig,
    pub state: SimState,
}

impl PredictionSeed {
    /// Integrate `seconds` of game time and record one slice per step.
    ///
    /// Slice `i` is stamped `start + (i + 1) / 120` regardless of float drift
    /// in the integrator's own clock.
    pub fn predict(mut self, seconds: f32, detail: SliceDetail) -> PredictionBuffer {
        let steps = steps_for(seconds);
        let start = self.state.ball.time;
        log::trace!("Predicting {steps} steps ({detail:?}) from t={start:.3}");
        let mut slices = Vec::with_capacity(steps);

        for i in 0..steps {
            step(&mut self.state, &self.arena, &self.config, SIM_DT);
            let time = start + (i + 1) as f32 * SIM_DT;
            self.state.ball.time = time;

            let ball = &self.state.ball;
            slices.push(PredictionSlice {
                time,
                location: ball.location,
                motion: match detail {
                    SliceDetail::Position => None,
                    SliceDetail::Full => Some(SliceMotion {
                        velocity: ball.velocity,
                        angular_velocity: ball.angular_velocity,
                    }),
                },
            });
        }

        PredictionBuffer { slices }
    }
}
