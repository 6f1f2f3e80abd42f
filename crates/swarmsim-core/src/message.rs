//! The closed set of records exchanged between actors.

use crate::entity::{ActorState, Faction};
use serde::{Deserialize, Serialize};

/// Version tag for the cross-actor message vocabulary. Bump on any change to
/// the serialized shape of the records below.
pub const PROTOCOL_VERSION: u16 = 1;

/// Per-agent, per-tick view of the world: enemies within the detection
/// radius and friends within visual range. Either list may be empty; ordering
/// follows grid iteration and carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub enemies: Vec<ActorState>,
    pub friends: Vec<ActorState>,
}

/// Messages delivered to an agent's mailbox.
#[derive(Debug, Clone)]
pub enum AgentMsg {
    /// One simulation step, enriched with the world's perception scan.
    Tick {
        delta_time: i64,
        perception: Perception,
    },
    /// Order the agent to switch faction (no-op when already `to`).
    Convert { to: Faction },
    /// Request the agent's current state (test surface).
    GetState,
}

/// Replies an agent emits toward whoever scheduled it.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// State report after processing a `Tick`; exactly one per tick.
    Report(ActorState),
    /// Reply to `GetState`.
    State(ActorState),
}

/// Immutable frame published to the snapshot bridge. Consumers must treat the
/// record as read-only and keep at most the last observed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub actors: Vec<ActorState>,
    pub red_count: usize,
    pub blue_count: usize,
    pub is_game_over: bool,
    pub winner: Option<Faction>,
}

impl WorldSnapshot {
    /// An empty pre-spawn frame.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            actors: Vec::new(),
            red_count: 0,
            blue_count: 0,
            is_game_over: false,
            winner: None,
        }
    }
}
