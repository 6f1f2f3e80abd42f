//! Core simulation types shared across the swarmsim workspace.
//!
//! The crate hosts the tick-driven actor pipeline: pure 2D geometry, the
//! per-agent behavior state machine, the Reynolds flocking kernel, the world
//! controller that owns every entity, and the non-blocking snapshot bridge
//! feeding whatever consumes frames. Cross-actor communication is by value
//! only; each mutable piece of state has exactly one owner.

pub mod agent;
pub mod boids;
pub mod bridge;
pub mod config;
pub mod entity;
pub mod geometry;
pub mod message;
pub mod runtime;
pub mod world;

pub use agent::AgentActor;
pub use boids::flocking_force;
pub use bridge::{SNAPSHOT_CAPACITY, SnapshotReceiver, SnapshotSender, snapshot_bridge};
pub use config::{ConfigError, SwarmConfig};
pub use entity::{ActorState, Entity, EntityId, Faction};
pub use geometry::{EPSILON, GeomError, Vec2};
pub use message::{AgentEvent, AgentMsg, PROTOCOL_VERSION, Perception, WorldSnapshot};
pub use runtime::{RuntimeError, WorldHandle, WorldMsg};
pub use world::{ConversionOrder, Tick, TickEvents, TickSummary, WorldActor};
