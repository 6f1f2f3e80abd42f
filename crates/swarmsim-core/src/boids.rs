//! Reynolds flocking kernel: separation, alignment, cohesion.

use crate::config::SwarmConfig;
use crate::entity::ActorState;
use crate::geometry::Vec2;
use tracing::warn;

/// Compute the steering force for one flocker from the friends it can see.
///
/// Single pass over `friends`, accumulating in parallel:
/// - friends closer than `protected_range` contribute `self - friend` to the
///   separation accumulator;
/// - friends within `visual_range` contribute to the velocity and position
///   means for alignment and cohesion.
///
/// With no neighbor in visual range only the separation term applies, and
/// with no friend inside `protected_range` the separation term is zero; the
/// kernel never brakes an agent whose flock is merely far away. A
/// non-finite result is clamped to zero.
#[must_use]
pub fn flocking_force(pos: Vec2, vel: Vec2, friends: &[ActorState], config: &SwarmConfig) -> Vec2 {
    let protected_sq = config.protected_range * config.protected_range;
    let visual_sq = config.visual_range * config.visual_range;

    let mut separation = Vec2::ZERO;
    let mut vel_sum = Vec2::ZERO;
    let mut pos_sum = Vec2::ZERO;
    let mut neighbors = 0usize;

    for friend in friends {
        let offset = pos - friend.pos;
        let dist_sq = offset.length_squared();
        if dist_sq < protected_sq {
            separation += offset;
        }
        if dist_sq < visual_sq {
            vel_sum += friend.vel;
            pos_sum += friend.pos;
            neighbors += 1;
        }
    }

    let mut force = separation * config.avoid_factor;
    if neighbors > 0 {
        let inv = 1.0 / neighbors as f64;
        let mean_vel = vel_sum * inv;
        let mean_pos = pos_sum * inv;
        force += (mean_vel - vel) * config.matching_factor;
        force += (mean_pos - pos) * config.centering_factor;
    }

    if !force.is_finite() {
        warn!(%pos, neighbors, "flocking force degenerated to NaN/Inf, clamping to zero");
        return Vec2::ZERO;
    }
    force
}
