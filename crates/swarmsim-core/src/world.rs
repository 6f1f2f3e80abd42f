//! World controller actor: owns every entity, drives the per-tick pipeline,
//! and publishes frames to the snapshot bridge.
//!
//! Per tick: flush telemetry, rebuild the spatial grid, run a single
//! neighborhood scan per entity (assembling perception and resolving combat
//! inline), dispatch enriched ticks to the agent mailboxes, publish a
//! snapshot, then drain every agent mailbox and ingest the resulting state
//! reports. Reports ingested for tick N feed the grid rebuild of tick N+1,
//! so the scan always works from the previous frame's reconciled state.

use crate::agent::AgentActor;
use crate::bridge::SnapshotSender;
use crate::config::{ConfigError, SwarmConfig};
use crate::entity::{ActorState, Entity, EntityId, Faction};
use crate::geometry::Vec2;
use crate::message::{AgentEvent, AgentMsg, Perception, WorldSnapshot};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use swarmsim_index::{NeighborhoodIndex, UniformGrid};
use tracing::{info, warn};

/// Number of nearby defenders that turns an attack around. Fixed rule of the
/// conversion protocol, deliberately not configurable.
pub const DEFENSE_SUCCESS_THRESHOLD: usize = 3;

/// Margin used when a seeded spawn position overshoots the arena.
const SPAWN_EDGE_MARGIN: f64 = 50.0;

const TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Simulation clock: ticks processed since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// A conversion order issued during combat resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOrder {
    pub target: EntityId,
    pub to: Faction,
}

/// Events emitted after processing one world tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    pub tick: Tick,
    pub conversions: Vec<ConversionOrder>,
    pub snapshot_published: bool,
}

/// Summary of one processed tick, retained in the in-memory history ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: Tick,
    pub red_count: usize,
    pub blue_count: usize,
    pub conversions: usize,
}

/// The authoritative world state and its child agents.
pub struct WorldActor {
    config: SwarmConfig,
    tick: Tick,
    entities: HashMap<EntityId, Entity>,
    /// Spawn-ordered ids for deterministic iteration; index positions double
    /// as grid slots.
    roster: Vec<EntityId>,
    agents: HashMap<EntityId, AgentActor>,
    grid: UniformGrid,
    positions: Vec<(f64, f64)>,
    snapshots: SnapshotSender,
    rng: SmallRng,
    red_spawned: usize,
    blue_spawned: usize,
    /// Latched once a faction dies out; never cleared.
    outcome: Option<Faction>,
    history: VecDeque<TickSummary>,
    messages_sent: u64,
    messages_received: u64,
    last_telemetry: Instant,
}

impl WorldActor {
    /// Build a world from a validated configuration. The entity map starts
    /// empty; call [`Self::seed_population`] (or spawn entities directly)
    /// before the first tick.
    pub fn new(config: SwarmConfig, snapshots: SnapshotSender) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        };
        let history = VecDeque::with_capacity(config.history_capacity);
        Ok(Self {
            config,
            tick: Tick::zero(),
            entities: HashMap::new(),
            roster: Vec::new(),
            agents: HashMap::new(),
            grid: UniformGrid::new(),
            positions: Vec::new(),
            snapshots,
            rng,
            red_spawned: 0,
            blue_spawned: 0,
            outcome: None,
            history,
            messages_sent: 0,
            messages_received: 0,
            last_telemetry: Instant::now(),
        })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Borrow an entity by id.
    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Spawn one entity and its backing agent actor, returning the assigned
    /// id. Names are `Faction-NNN` in spawn order.
    pub fn spawn_entity(&mut self, faction: Faction, pos: Vec2, vel: Vec2) -> EntityId {
        let index = match faction {
            Faction::Red => {
                self.red_spawned += 1;
                self.red_spawned - 1
            }
            Faction::Blue => {
                self.blue_spawned += 1;
                self.blue_spawned - 1
            }
        };
        let id = EntityId::spawned(faction, index);
        let entity = Entity::new(id.clone(), faction, pos, vel);
        self.entities.insert(id.clone(), entity.clone());
        self.roster.push(id.clone());
        let seed = self.rng.random::<u64>();
        self.agents.insert(id.clone(), AgentActor::new(entity, seed));
        id
    }

    /// Seed the configured starting populations. RED spreads out from the
    /// upper-left sixth of the arena, BLUE from the center with staggered
    /// rows, each with a randomized stride bounded by its relevant radius so
    /// the first scan already finds neighbors. Initial velocities are uniform
    /// in [-1, 1] per axis.
    pub fn seed_population(&mut self) {
        let width = self.config.world_width;
        let height = self.config.world_height;

        let red_count = self.config.num_red_at_start;
        let red_stride = (height / red_count as f64).min(self.config.detection_radius);
        for i in 0..red_count {
            let step = i as f64;
            let mut x = width / 6.0 + step * red_stride * self.rng.random::<f64>() * 2.0;
            let mut y = height / 6.0 + step * red_stride * self.rng.random::<f64>() * 2.0;
            if x > width - SPAWN_EDGE_MARGIN {
                x = SPAWN_EDGE_MARGIN + step * 5.0;
            }
            if y > height - SPAWN_EDGE_MARGIN {
                y = SPAWN_EDGE_MARGIN + step * 5.0;
            }
            let vel = self.random_unit_velocity();
            self.spawn_entity(Faction::Red, Vec2::new(x, y), vel);
        }

        let blue_count = self.config.num_blue_at_start;
        let blue_stride = (height / blue_count as f64).min(self.config.defense_radius);
        for i in 0..blue_count {
            let step = i as f64;
            // Stagger rows modulo 5 so the flock starts as a block, not a line.
            let row = (i % 5) as f64;
            let mut x = width / 2.0 + step * blue_stride * self.rng.random::<f64>() * 2.0;
            let mut y = height / 2.0 + row * blue_stride * self.rng.random::<f64>() * 2.0;
            if x > width - SPAWN_EDGE_MARGIN {
                x = SPAWN_EDGE_MARGIN + step * 5.0;
            }
            if y > height - SPAWN_EDGE_MARGIN {
                y = SPAWN_EDGE_MARGIN + step * 5.0;
            }
            let vel = self.random_unit_velocity();
            self.spawn_entity(Faction::Blue, Vec2::new(x, y), vel);
        }
        info!(red = red_count, blue = blue_count, "seeded swarm population");
    }

    fn random_unit_velocity(&mut self) -> Vec2 {
        Vec2::new(
            self.rng.random_range(-1.0..1.0),
            self.rng.random_range(-1.0..1.0),
        )
    }

    /// Replace the live configuration after re-validating its invariants. An
    /// invalid update is rejected and the previous configuration stays in
    /// effect. Population fields are stored but only read at seeding time.
    pub fn apply_config(&mut self, next: SwarmConfig) {
        if let Err(err) = next.validate() {
            warn!(%err, "rejecting configuration update");
            return;
        }
        self.config = next;
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Execute one tick of the simulation pipeline.
    pub fn step(&mut self, delta_time: i64) -> TickEvents {
        self.tick = self.tick.next();
        self.flush_telemetry();
        let conversions = if self.rebuild_grid() {
            self.scan_and_dispatch(delta_time)
        } else {
            Vec::new()
        };
        let snapshot = self.build_snapshot();
        self.record_summary(&snapshot, conversions.len());
        let snapshot_published = self.snapshots.publish(snapshot);
        self.drain_agents();
        TickEvents {
            tick: self.tick,
            conversions,
            snapshot_published,
        }
    }

    fn record_summary(&mut self, snapshot: &WorldSnapshot, conversions: usize) {
        while self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(TickSummary {
            tick: self.tick,
            red_count: snapshot.red_count,
            blue_count: snapshot.blue_count,
            conversions,
        });
    }

    fn flush_telemetry(&mut self) {
        if self.last_telemetry.elapsed() < TELEMETRY_INTERVAL {
            return;
        }
        info!(
            rate = self.messages_sent + self.messages_received,
            sent = self.messages_sent,
            received = self.messages_received,
            actors = self.entities.len(),
            "message rate"
        );
        self.messages_sent = 0;
        self.messages_received = 0;
        self.last_telemetry = Instant::now();
    }

    fn rebuild_grid(&mut self) -> bool {
        let positions = &mut self.positions;
        let entities = &self.entities;
        positions.clear();
        for id in &self.roster {
            let entity = &entities[id];
            positions.push((entity.pos.x, entity.pos.y));
        }
        let cell_size = self.config.cell_size();
        match self.grid.rebuild(cell_size, positions) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "skipping tick scan, grid rebuild failed");
                false
            }
        }
    }

    /// Single-pass neighborhood scan: for every entity, walk the 3x3 cell
    /// block once, assembling friend/enemy perception and triggering combat
    /// inline for RED/BLUE contact. Only RED initiates combat, which keeps
    /// each (attacker, victim) pair processed once; an entity already ordered
    /// to convert this tick is skipped in later pairs.
    fn scan_and_dispatch(&mut self, delta_time: i64) -> Vec<ConversionOrder> {
        let visual_sq = self.config.visual_range * self.config.visual_range;
        let detection_sq = self.config.detection_radius * self.config.detection_radius;
        let contact_sq = self.config.contact_radius * self.config.contact_radius;
        let defense_radius = self.config.defense_radius;

        let entities = &self.entities;
        let roster = &self.roster;
        let grid = &self.grid;
        let agents = &mut self.agents;

        let mut conversions: Vec<ConversionOrder> = Vec::new();
        let mut converted: HashSet<usize> = HashSet::new();
        let mut sent: u64 = 0;

        for (idx, id) in roster.iter().enumerate() {
            let (me_pos, me_faction) = {
                let me = &entities[id];
                (me.pos, me.faction)
            };
            let mut perception = Perception::default();

            grid.for_each_in_block(me_pos.x, me_pos.y, &mut |other_idx| {
                if other_idx == idx {
                    return;
                }
                let other = &entities[&roster[other_idx]];
                let dist_sq = me_pos.distance_squared(other.pos);

                if other.faction == me_faction {
                    if dist_sq < visual_sq {
                        perception.friends.push(other.snapshot());
                    }
                } else if dist_sq < detection_sq {
                    perception.enemies.push(other.snapshot());
                }

                if me_faction == Faction::Red
                    && other.faction == Faction::Blue
                    && dist_sq < contact_sq
                    && !converted.contains(&idx)
                    && !converted.contains(&other_idx)
                {
                    let victim_pos = other.pos;
                    let defenders = grid.count_within(
                        (victim_pos.x, victim_pos.y),
                        defense_radius,
                        &mut |candidate| {
                            candidate != other_idx
                                && entities[&roster[candidate]].faction == Faction::Blue
                        },
                    );
                    let (target_idx, to) = if defenders >= DEFENSE_SUCCESS_THRESHOLD {
                        (idx, Faction::Blue)
                    } else {
                        (other_idx, Faction::Red)
                    };
                    converted.insert(target_idx);
                    let target_id = &roster[target_idx];
                    if let Some(agent) = agents.get_mut(target_id)
                        && agent.enqueue(AgentMsg::Convert { to })
                    {
                        sent += 1;
                        conversions.push(ConversionOrder {
                            target: target_id.clone(),
                            to,
                        });
                    }
                }
            });

            if let Some(agent) = agents.get_mut(id)
                && agent.enqueue(AgentMsg::Tick {
                    delta_time,
                    perception,
                })
            {
                sent += 1;
            }
        }

        self.messages_sent += sent;
        conversions
    }

    /// Build the current frame, latching the game-over flag the first time a
    /// faction count reaches zero.
    pub fn build_snapshot(&mut self) -> WorldSnapshot {
        let mut actors = Vec::with_capacity(self.roster.len());
        let mut red_count = 0;
        let mut blue_count = 0;
        for id in &self.roster {
            let entity = &self.entities[id];
            match entity.faction {
                Faction::Red => red_count += 1,
                Faction::Blue => blue_count += 1,
            }
            actors.push(entity.snapshot());
        }
        if self.outcome.is_none() && red_count + blue_count > 0 {
            if red_count == 0 {
                self.outcome = Some(Faction::Blue);
            } else if blue_count == 0 {
                self.outcome = Some(Faction::Red);
            }
            if let Some(winner) = self.outcome {
                info!(%winner, tick = self.tick.0, "game over");
            }
        }
        WorldSnapshot {
            actors,
            red_count,
            blue_count,
            is_game_over: self.outcome.is_some(),
            winner: self.outcome,
        }
    }

    /// Drain every agent mailbox. Agents advance in parallel, each one
    /// processing its own queue sequentially; the resulting state reports are
    /// ingested afterwards in spawn-name order.
    fn drain_agents(&mut self) {
        let config = &self.config;
        let mut batches: Vec<(EntityId, Vec<AgentEvent>)> = self
            .agents
            .par_iter_mut()
            .map(|(id, agent)| {
                let mut events = Vec::with_capacity(2);
                agent.drain(config, &mut events);
                (id.clone(), events)
            })
            .collect();
        batches.sort_by(|a, b| a.0.cmp(&b.0));
        for (_id, events) in batches {
            for event in events {
                match event {
                    AgentEvent::Report(state) => self.ingest_report(state),
                    AgentEvent::State(_state) => {}
                }
            }
        }
    }

    /// Overwrite the authoritative record with an agent's report. Faction is
    /// authoritative (this is how conversions propagate back); positions are
    /// reconciled into the arena bounds.
    fn ingest_report(&mut self, state: ActorState) {
        self.messages_received += 1;
        if let Some(entity) = self.entities.get_mut(&state.id) {
            entity.faction = state.faction;
            entity.vel = state.vel;
            entity.pos = Vec2::new(
                state.pos.x.clamp(0.0, self.config.world_width),
                state.pos.y.clamp(0.0, self.config.world_height),
            );
        }
    }

    /// Synchronously query one agent's state (test surface). The agent gets
    /// an immediate time slice to drain its queue; any pending reports are
    /// ingested along the way.
    pub fn query_agent(&mut self, id: &EntityId) -> Option<ActorState> {
        let mut events = Vec::new();
        {
            let config = &self.config;
            let agent = self.agents.get_mut(id)?;
            if !agent.enqueue(AgentMsg::GetState) {
                return None;
            }
            agent.drain(config, &mut events);
        }
        self.messages_sent += 1;
        let mut state = None;
        for event in events {
            match event {
                AgentEvent::Report(report) => self.ingest_report(report),
                AgentEvent::State(reply) => {
                    self.messages_received += 1;
                    state = Some(reply);
                }
            }
        }
        state
    }
}
