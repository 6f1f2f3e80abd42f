//! Per-agent actor: a two-mode behavior state machine behind a FIFO mailbox.
//!
//! Every agent owns its entity state, its cached perception, and a private
//! RNG. The world enqueues messages during its tick scan; agents then drain
//! their mailboxes one message at a time (in parallel across agents, never
//! within one). Replies surface as [`AgentEvent`]s collected by the caller.

use crate::boids::flocking_force;
use crate::config::SwarmConfig;
use crate::entity::{ActorState, Entity, EntityId, Faction};
use crate::geometry::Vec2;
use crate::message::{AgentEvent, AgentMsg, Perception};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Upper bound on queued messages per agent. The world enqueues one tick plus
/// an occasional conversion per frame, so the bound is generous.
pub const MAILBOX_CAPACITY: usize = 16;

/// Per-axis wander jitter applied by a pursuer with nothing in sight.
pub const WANDER_JITTER: f64 = 0.075;

/// Velocity multiplier applied on conversion: direction inverted, magnitude
/// amplified so the flip reads as a visible recoil.
const RECOIL_FACTOR: f64 = -1.5;

/// A single autonomous agent. Behavior dispatches on the current faction:
/// RED pursues and wanders with hard wall bounces, BLUE flocks with soft
/// boundary steering and speed clamps.
#[derive(Debug)]
pub struct AgentActor {
    state: Entity,
    perception: Perception,
    rng: SmallRng,
    mailbox: VecDeque<AgentMsg>,
}

impl AgentActor {
    /// Create an agent owning `entity`, with a deterministic RNG stream.
    #[must_use]
    pub fn new(entity: Entity, seed: u64) -> Self {
        Self {
            state: entity,
            perception: Perception::default(),
            rng: SmallRng::seed_from_u64(seed),
            mailbox: VecDeque::new(),
        }
    }

    /// The agent's permanent identifier.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        &self.state.id
    }

    /// Current entity state (test surface; the world reads reports instead).
    #[must_use]
    pub fn state(&self) -> &Entity {
        &self.state
    }

    /// Number of queued messages.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.mailbox.len()
    }

    /// Append a message to the mailbox. Returns false (dropping the message)
    /// when the mailbox is full.
    pub fn enqueue(&mut self, msg: AgentMsg) -> bool {
        if self.mailbox.len() >= MAILBOX_CAPACITY {
            warn!(id = %self.state.id, "agent mailbox full, dropping message");
            return false;
        }
        self.mailbox.push_back(msg);
        true
    }

    /// Process every queued message in FIFO order, pushing replies into
    /// `events`.
    pub fn drain(&mut self, config: &SwarmConfig, events: &mut Vec<AgentEvent>) {
        while let Some(msg) = self.mailbox.pop_front() {
            self.handle(msg, config, events);
        }
    }

    fn handle(&mut self, msg: AgentMsg, config: &SwarmConfig, events: &mut Vec<AgentEvent>) {
        match self.state.faction {
            Faction::Red => self.behave_as_red(msg, config, events),
            Faction::Blue => self.behave_as_blue(msg, config, events),
        }
    }

    /// RED: aggressive hunter. Pursues the nearest visible enemy, wanders
    /// when nothing is in sight, and bounces hard off the arena walls.
    fn behave_as_red(&mut self, msg: AgentMsg, config: &SwarmConfig, events: &mut Vec<AgentEvent>) {
        match msg {
            AgentMsg::Tick {
                delta_time: _,
                perception,
            } => {
                self.perception = perception;
                if self.perception.enemies.is_empty() {
                    self.wander();
                } else {
                    self.chase_closest(config);
                }
                self.state.integrate();
                self.state
                    .bounce_off_walls(config.world_width, config.world_height);
                events.push(AgentEvent::Report(self.state.snapshot()));
            }
            AgentMsg::Convert { to } => self.convert(to),
            AgentMsg::GetState => events.push(AgentEvent::State(self.state.snapshot())),
        }
    }

    /// BLUE: flocking prey. Steers by the boids kernel, turns softly away
    /// from walls, and keeps its speed inside the configured band.
    fn behave_as_blue(&mut self, msg: AgentMsg, config: &SwarmConfig, events: &mut Vec<AgentEvent>) {
        match msg {
            AgentMsg::Tick {
                delta_time: _,
                perception,
            } => {
                self.perception = perception;
                let force = flocking_force(
                    self.state.pos,
                    self.state.vel,
                    &self.perception.friends,
                    config,
                );
                self.state.vel += force;
                self.state
                    .soft_boundary_steer(config.world_width, config.world_height, config.turn_factor);
                self.state.clamp_speed(config.min_speed, config.max_speed);
                self.state.integrate();
                events.push(AgentEvent::Report(self.state.snapshot()));
            }
            AgentMsg::Convert { to } => self.convert(to),
            AgentMsg::GetState => events.push(AgentEvent::State(self.state.snapshot())),
        }
    }

    fn wander(&mut self) {
        let jx = (self.rng.random::<f64>() - 0.5) * 2.0 * WANDER_JITTER;
        let jy = (self.rng.random::<f64>() - 0.5) * 2.0 * WANDER_JITTER;
        self.state.vel += Vec2::new(jx, jy);
    }

    fn chase_closest(&mut self, config: &SwarmConfig) {
        let closest = self
            .perception
            .enemies
            .iter()
            .min_by(|a, b| {
                let da = self.state.pos.distance_squared(a.pos);
                let db = self.state.pos.distance_squared(b.pos);
                da.total_cmp(&db)
            })
            .map(|target| target.pos);
        if let Some(target) = closest {
            self.state.seek(target, config.aggression);
            self.state.cap_speed(config.max_speed);
        }
    }

    fn convert(&mut self, to: Faction) {
        if to == self.state.faction {
            return;
        }
        debug!(
            id = %self.state.id,
            from = %self.state.faction,
            to = %to,
            "conversion"
        );
        self.state.faction = to;
        self.state.vel = self.state.vel * RECOIL_FACTOR;
        self.perception = Perception::default();
    }
}
