//! Threaded actor runtime: the world actor on its own OS thread behind a
//! bounded mailbox, with a handle for the driver.
//!
//! The driver owns the lifecycle: it pumps `Tick`s through the handle,
//! consumes snapshots from the bridge, relays configuration updates, and on
//! shutdown sends `Stop` and joins the thread. The world processes one
//! message at a time; nothing in the loop blocks except the mailbox `recv`.

use crate::bridge::{SNAPSHOT_CAPACITY, SnapshotReceiver, snapshot_bridge};
use crate::config::{ConfigError, SwarmConfig};
use crate::entity::{ActorState, EntityId};
use crate::message::WorldSnapshot;
use crate::world::WorldActor;
use crossfire::{MAsyncTx, MRx, TryRecvError, TrySendError, mpmc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Capacity of the world's mailbox; the driver produces at most one tick and
/// one config update per frame, so this never fills in steady state.
const WORLD_MAILBOX_CAPACITY: usize = 64;

/// Default deadline for synchronous state queries.
pub const GET_STATE_DEADLINE: Duration = Duration::from_secs(1);

/// Poll interval used while waiting on a reply deadline.
const REPLY_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors surfaced by the runtime layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration invariants failed at startup.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(#[from] ConfigError),
    /// The OS refused to spawn the world thread.
    #[error("failed to spawn world actor: {0}")]
    ActorSpawnFailed(#[source] std::io::Error),
    /// A synchronous request missed its reply deadline.
    #[error("request timed out waiting for a reply")]
    RequestTimedOut,
    /// The world actor is gone; no further messages can be delivered.
    #[error("world actor is no longer running")]
    WorldStopped,
}

/// Messages delivered to the world actor's mailbox.
pub enum WorldMsg {
    /// One simulation step.
    Tick { delta_time: i64 },
    /// Hot configuration update (UI surface).
    UpdateConfig(SwarmConfig),
    /// Synchronous state query for a single agent (test surface).
    GetState {
        id: EntityId,
        reply: MAsyncTx<ActorState>,
    },
    /// Stop the actor and end the thread.
    Stop,
}

/// Driver-side handle to a running world actor.
pub struct WorldHandle {
    commands: MAsyncTx<WorldMsg>,
    snapshots: SnapshotReceiver,
    thread: Option<JoinHandle<()>>,
}

impl WorldHandle {
    /// Validate `config`, seed the starting populations, and launch the
    /// world actor on a dedicated thread.
    pub fn launch(config: SwarmConfig) -> Result<Self, RuntimeError> {
        crossfire::detect_backoff_cfg();
        let (snapshot_tx, snapshot_rx) = snapshot_bridge(SNAPSHOT_CAPACITY);
        let mut world = WorldActor::new(config, snapshot_tx)?;
        world.seed_population();

        let (commands, inbox) = mpmc::bounded_tx_async_rx_blocking(WORLD_MAILBOX_CAPACITY);
        let thread = thread::Builder::new()
            .name("swarm-world".into())
            .spawn(move || run_world_loop(world, inbox))
            .map_err(RuntimeError::ActorSpawnFailed)?;

        Ok(Self {
            commands,
            snapshots: snapshot_rx,
            thread: Some(thread),
        })
    }

    /// Enqueue one simulation step. A full mailbox skips the frame rather
    /// than blocking the driver.
    pub fn tick(&self, delta_time: i64) -> Result<(), RuntimeError> {
        match self.commands.try_send(WorldMsg::Tick { delta_time }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_msg)) => {
                debug!("world mailbox full, skipping tick");
                Ok(())
            }
            Err(TrySendError::Disconnected(_msg)) => Err(RuntimeError::WorldStopped),
        }
    }

    /// Relay a configuration update to the world.
    pub fn update_config(&self, config: SwarmConfig) -> Result<(), RuntimeError> {
        match self.commands.try_send(WorldMsg::UpdateConfig(config)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_msg)) => {
                warn!("world mailbox full, dropping config update");
                Ok(())
            }
            Err(TrySendError::Disconnected(_msg)) => Err(RuntimeError::WorldStopped),
        }
    }

    /// Most recent snapshot published since the last call, if any.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<WorldSnapshot> {
        self.snapshots.latest()
    }

    /// Query one agent's state with the default one-second deadline.
    pub fn get_state(&self, id: &EntityId) -> Result<ActorState, RuntimeError> {
        self.get_state_with_deadline(id, GET_STATE_DEADLINE)
    }

    /// Query one agent's state, failing with [`RuntimeError::RequestTimedOut`]
    /// when no reply arrives within `deadline`. An unknown id never replies
    /// and therefore also times out.
    pub fn get_state_with_deadline(
        &self,
        id: &EntityId,
        deadline: Duration,
    ) -> Result<ActorState, RuntimeError> {
        let expires = Instant::now() + deadline;
        let (reply_tx, reply_rx) = mpmc::bounded_tx_async_rx_blocking(1);
        let mut pending = Some(WorldMsg::GetState {
            id: id.clone(),
            reply: reply_tx,
        });
        while let Some(msg) = pending.take() {
            match self.commands.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) => {
                    if Instant::now() >= expires {
                        return Err(RuntimeError::RequestTimedOut);
                    }
                    pending = Some(msg);
                    thread::sleep(REPLY_POLL_INTERVAL);
                }
                Err(TrySendError::Disconnected(_msg)) => return Err(RuntimeError::WorldStopped),
            }
        }
        loop {
            match reply_rx.try_recv() {
                Ok(state) => return Ok(state),
                Err(TryRecvError::Empty) => {
                    if Instant::now() >= expires {
                        return Err(RuntimeError::RequestTimedOut);
                    }
                    thread::sleep(REPLY_POLL_INTERVAL);
                }
                // The world dropped the reply channel without answering.
                Err(TryRecvError::Disconnected) => return Err(RuntimeError::RequestTimedOut),
            }
        }
    }

    /// Stop the world actor and join its thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let mut pending = Some(WorldMsg::Stop);
        while let Some(msg) = pending.take() {
            match self.commands.try_send(msg) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(msg)) => {
                    // The loop drains continuously; retry until it accepts.
                    pending = Some(msg);
                    thread::sleep(REPLY_POLL_INTERVAL);
                }
            }
        }
        let _ = thread.join();
    }
}

impl Drop for WorldHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_world_loop(mut world: WorldActor, inbox: MRx<WorldMsg>) {
    info!("world actor started");
    loop {
        match inbox.recv() {
            Ok(WorldMsg::Tick { delta_time }) => {
                world.step(delta_time);
            }
            Ok(WorldMsg::UpdateConfig(config)) => world.apply_config(config),
            Ok(WorldMsg::GetState { id, reply }) => {
                if let Some(state) = world.query_agent(&id) {
                    let _ = reply.try_send(state);
                }
            }
            Ok(WorldMsg::Stop) | Err(_) => break,
        }
    }
    info!("world actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Faction;

    fn runtime_config() -> SwarmConfig {
        SwarmConfig {
            num_red_at_start: 3,
            num_blue_at_start: 9,
            rng_seed: Some(17),
            ..SwarmConfig::default()
        }
    }

    #[test]
    fn launch_rejects_invalid_config() {
        let config = SwarmConfig {
            min_speed: 5.0,
            max_speed: 4.0,
            ..SwarmConfig::default()
        };
        assert!(matches!(
            WorldHandle::launch(config),
            Err(RuntimeError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn ticks_produce_snapshots() {
        let handle = WorldHandle::launch(runtime_config()).expect("launch");
        let mut latest = None;
        for _ in 0..50 {
            handle.tick(16).expect("tick");
            thread::sleep(Duration::from_millis(2));
            if let Some(snapshot) = handle.latest_snapshot() {
                latest = Some(snapshot);
            }
            if latest.is_some() {
                break;
            }
        }
        let snapshot = latest.expect("snapshot within deadline");
        assert_eq!(snapshot.red_count + snapshot.blue_count, 12);
        handle.stop();
    }

    #[test]
    fn get_state_round_trips_through_the_world() {
        let handle = WorldHandle::launch(runtime_config()).expect("launch");
        let state = handle
            .get_state(&EntityId::from("Red-000"))
            .expect("state reply");
        assert_eq!(state.id.as_str(), "Red-000");
        assert_eq!(state.faction, Faction::Red);
        handle.stop();
    }

    #[test]
    fn unknown_agent_query_times_out() {
        let handle = WorldHandle::launch(runtime_config()).expect("launch");
        let result = handle.get_state_with_deadline(
            &EntityId::from("Red-999"),
            Duration::from_millis(50),
        );
        assert!(matches!(result, Err(RuntimeError::RequestTimedOut)));
        handle.stop();
    }

    #[test]
    fn stop_joins_the_world_thread() {
        let handle = WorldHandle::launch(runtime_config()).expect("launch");
        handle.tick(16).expect("tick");
        handle.stop();
    }

    #[test]
    fn config_updates_reach_the_world() {
        let handle = WorldHandle::launch(runtime_config()).expect("launch");
        let update = SwarmConfig {
            aggression: 1.9,
            ..runtime_config()
        };
        handle.update_config(update).expect("update");
        // The update is applied between ticks; the world keeps running.
        handle.tick(16).expect("tick");
        let state = handle.get_state(&EntityId::from("Blue-000")).expect("state");
        assert_eq!(state.faction, Faction::Blue);
        handle.stop();
    }
}
