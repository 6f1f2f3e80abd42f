//! Per-agent simulation state and kinematic helpers.

use crate::geometry::{EPSILON, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance from a wall at which the soft-boundary steer starts acting.
pub const BOUNDARY_MARGIN: f64 = 100.0;

/// Replacement for a velocity component that lands on exactly zero after a
/// wall bounce, so the heading angle stays well-defined downstream.
const VELOCITY_FLOOR: f64 = 1e-3;

/// The two factions in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Aggressive pursuers.
    Red,
    /// Flocking prey.
    Blue,
}

impl Faction {
    /// The opposing faction.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Red => Self::Blue,
            Self::Blue => Self::Red,
        }
    }

    /// Short display label used in entity names and log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::Blue => "Blue",
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable identifier assigned at spawn (e.g. `"Red-007"`). Identity is
/// permanent across faction changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Build the canonical spawn name for the `index`-th member of `faction`.
    #[must_use]
    pub fn spawned(faction: Faction, index: usize) -> Self {
        Self(format!("{}-{index:03}", faction.label()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutable per-agent simulation state, owned by the world controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Immutable point-in-time copy of an entity, used in perception payloads,
/// agent state reports, and world snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    pub id: EntityId,
    pub faction: Faction,
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Entity {
    /// Construct a new entity record.
    #[must_use]
    pub const fn new(id: EntityId, faction: Faction, pos: Vec2, vel: Vec2) -> Self {
        Self {
            id,
            faction,
            pos,
            vel,
        }
    }

    /// Value snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ActorState {
        ActorState {
            id: self.id.clone(),
            faction: self.faction,
            pos: self.pos,
            vel: self.vel,
        }
    }

    /// Squared distance to another entity.
    #[must_use]
    pub fn distance_squared_to(&self, other: &Self) -> f64 {
        self.pos.distance_squared(other.pos)
    }

    /// Apply one step of kinematic integration: `pos += vel`.
    pub fn integrate(&mut self) {
        self.pos += self.vel;
    }

    /// Steer toward `target` by adding a normalized pursuit vector scaled by
    /// `gain`. A target at the current position contributes nothing.
    pub fn seek(&mut self, target: Vec2, gain: f64) {
        self.vel += (target - self.pos).normalized() * gain;
    }

    /// Cap the speed at `max` without enforcing a lower bound.
    pub fn cap_speed(&mut self, max: f64) {
        let speed = self.vel.length();
        if speed > max && speed >= EPSILON {
            self.vel = self.vel * (max / speed);
        }
    }

    /// Clamp the speed into `[min, max]`. A sub-epsilon velocity is left
    /// untouched: scaling it up would fabricate a direction out of noise.
    pub fn clamp_speed(&mut self, min: f64, max: f64) {
        let speed = self.vel.length();
        if speed < EPSILON {
            return;
        }
        if speed > max {
            self.vel = self.vel * (max / speed);
        } else if speed < min {
            self.vel = self.vel * (min / speed);
        }
    }

    /// Hard wall interaction: clamp the position back into
    /// `[0, width] x [0, height]` and negate the offending velocity
    /// component. Velocity components that end up exactly zero are nudged to
    /// a tiny non-zero value so the heading angle stays defined.
    pub fn bounce_off_walls(&mut self, width: f64, height: f64) {
        if self.pos.x < 0.0 {
            self.pos.x = 0.0;
            self.vel.x = -self.vel.x;
        } else if self.pos.x > width {
            self.pos.x = width;
            self.vel.x = -self.vel.x;
        }
        if self.pos.y < 0.0 {
            self.pos.y = 0.0;
            self.vel.y = -self.vel.y;
        } else if self.pos.y > height {
            self.pos.y = height;
            self.vel.y = -self.vel.y;
        }
        if self.vel.x == 0.0 {
            self.vel.x = VELOCITY_FLOOR;
        }
        if self.vel.y == 0.0 {
            self.vel.y = VELOCITY_FLOOR;
        }
    }

    /// Soft wall interaction: inside [`BOUNDARY_MARGIN`] of any wall, steer
    /// away by `turn_factor` per tick.
    pub fn soft_boundary_steer(&mut self, width: f64, height: f64, turn_factor: f64) {
        if self.pos.x < BOUNDARY_MARGIN {
            self.vel.x += turn_factor;
        }
        if self.pos.x > width - BOUNDARY_MARGIN {
            self.vel.x -= turn_factor;
        }
        if self.pos.y < BOUNDARY_MARGIN {
            self.vel.y += turn_factor;
        }
        if self.pos.y > height - BOUNDARY_MARGIN {
            self.vel.y -= turn_factor;
        }
    }
}

impl From<ActorState> for Entity {
    fn from(state: ActorState) -> Self {
        Self {
            id: state.id,
            faction: state.faction,
            pos: state.pos,
            vel: state.vel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(pos: Vec2, vel: Vec2) -> Entity {
        Entity::new(EntityId::from("Red-000"), Faction::Red, pos, vel)
    }

    #[test]
    fn spawn_names_are_zero_padded() {
        assert_eq!(EntityId::spawned(Faction::Red, 7).as_str(), "Red-007");
        assert_eq!(EntityId::spawned(Faction::Blue, 123).as_str(), "Blue-123");
    }

    #[test]
    fn integrate_applies_velocity() {
        let mut e = entity(Vec2::new(1.0, 2.0), Vec2::new(0.5, -1.0));
        e.integrate();
        assert!(e.pos.approx_eq(Vec2::new(1.5, 1.0)));
    }

    #[test]
    fn seek_steers_toward_target() {
        let mut e = entity(Vec2::ZERO, Vec2::ZERO);
        e.seek(Vec2::new(10.0, 0.0), 0.8);
        assert!(e.vel.approx_eq(Vec2::new(0.8, 0.0)));

        // A coincident target contributes nothing.
        let mut stuck = entity(Vec2::new(3.0, 3.0), Vec2::new(1.0, 0.0));
        stuck.seek(Vec2::new(3.0, 3.0), 0.8);
        assert!(stuck.vel.approx_eq(Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn clamp_speed_enforces_both_bounds() {
        let mut fast = entity(Vec2::ZERO, Vec2::new(6.0, 8.0));
        fast.clamp_speed(2.0, 5.0);
        assert!((fast.vel.length() - 5.0).abs() <= EPSILON);
        assert!(fast.vel.approx_eq(Vec2::new(3.0, 4.0)));

        let mut slow = entity(Vec2::ZERO, Vec2::new(0.3, 0.4));
        slow.clamp_speed(2.0, 5.0);
        assert!((slow.vel.length() - 2.0).abs() <= EPSILON);

        let mut stalled = entity(Vec2::ZERO, Vec2::ZERO);
        stalled.clamp_speed(2.0, 5.0);
        assert_eq!(stalled.vel, Vec2::ZERO);
    }

    #[test]
    fn cap_speed_leaves_slow_entities_alone() {
        let mut e = entity(Vec2::ZERO, Vec2::new(1.0, 0.0));
        e.cap_speed(4.0);
        assert!(e.vel.approx_eq(Vec2::new(1.0, 0.0)));
        e.vel = Vec2::new(10.0, 0.0);
        e.cap_speed(4.0);
        assert!(e.vel.approx_eq(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn bounce_clamps_position_and_reflects_velocity() {
        let mut e = entity(Vec2::new(-3.0, 120.0), Vec2::new(-2.0, 1.0));
        e.bounce_off_walls(100.0, 100.0);
        assert_eq!(e.pos, Vec2::new(0.0, 100.0));
        assert_eq!(e.vel.x, 2.0);
        assert_eq!(e.vel.y, -1.0);
    }

    #[test]
    fn bounce_floors_zeroed_velocity_components() {
        let mut e = entity(Vec2::new(50.0, 50.0), Vec2::ZERO);
        e.bounce_off_walls(100.0, 100.0);
        assert!(e.vel.x != 0.0);
        assert!(e.vel.y != 0.0);
    }

    #[test]
    fn soft_boundary_steers_away_from_walls() {
        let mut near_left = entity(Vec2::new(10.0, 500.0), Vec2::ZERO);
        near_left.soft_boundary_steer(1000.0, 1000.0, 0.2);
        assert!(near_left.vel.approx_eq(Vec2::new(0.2, 0.0)));

        let mut near_corner = entity(Vec2::new(990.0, 995.0), Vec2::ZERO);
        near_corner.soft_boundary_steer(1000.0, 1000.0, 0.2);
        assert!(near_corner.vel.approx_eq(Vec2::new(-0.2, -0.2)));

        let mut central = entity(Vec2::new(500.0, 500.0), Vec2::ZERO);
        central.soft_boundary_steer(1000.0, 1000.0, 0.2);
        assert_eq!(central.vel, Vec2::ZERO);
    }
}
