//! End-to-end pursuit scenario through the threaded runtime: a lone pursuer
//! hunts a lone flocker until the conversion protocol ends the game.

use std::thread;
use std::time::Duration;
use swarmsim_core::{EntityId, Faction, RuntimeError, SwarmConfig, WorldHandle};

fn duel_config() -> SwarmConfig {
    SwarmConfig {
        num_red_at_start: 1,
        num_blue_at_start: 1,
        detection_radius: 600.0,
        defense_radius: 300.0,
        contact_radius: 250.0,
        max_speed: 6.0,
        min_speed: 2.0,
        aggression: 0.8,
        rng_seed: Some(0xC0FFEE),
        ..SwarmConfig::default()
    }
}

#[test]
fn duel_runs_to_a_latched_game_over() {
    let handle = WorldHandle::launch(duel_config()).expect("launch");

    let mut final_snapshot = None;
    for _ in 0..20_000 {
        handle.tick(16).expect("tick");
        thread::sleep(Duration::from_millis(1));
        if let Some(snapshot) = handle.latest_snapshot() {
            // The entity set is closed under conversion.
            assert_eq!(snapshot.red_count + snapshot.blue_count, 2);
            let game_over = snapshot.is_game_over;
            final_snapshot = Some(snapshot);
            if game_over {
                break;
            }
        }
    }

    let snapshot = final_snapshot.expect("snapshot stream");
    assert!(snapshot.is_game_over, "duel should resolve within the budget");
    // A lone flocker has no defenders, so the pursuer always wins.
    assert_eq!(snapshot.winner, Some(Faction::Red));
    assert_eq!(snapshot.blue_count, 0);

    // The flag and winner stay latched on every later frame, and the world
    // keeps publishing idempotently even though the outcome is decided.
    for _ in 0..20 {
        handle.tick(16).expect("tick");
        thread::sleep(Duration::from_millis(1));
        if let Some(later) = handle.latest_snapshot() {
            assert!(later.is_game_over);
            assert_eq!(later.winner, Some(Faction::Red));
        }
    }

    // Identity survives conversion: the converted flocker still answers to
    // its spawn name, now flying RED colors.
    let converted = handle.get_state(&EntityId::from("Blue-000")).expect("state");
    assert_eq!(converted.faction, Faction::Red);

    handle.stop();
}

#[test]
fn state_queries_observe_a_live_simulation() {
    let handle = WorldHandle::launch(duel_config()).expect("launch");
    for _ in 0..5 {
        handle.tick(16).expect("tick");
    }
    let red = handle.get_state(&EntityId::from("Red-000")).expect("red state");
    assert_eq!(red.id.as_str(), "Red-000");

    let missing = handle
        .get_state_with_deadline(&EntityId::from("Blue-042"), Duration::from_millis(50));
    assert!(matches!(missing, Err(RuntimeError::RequestTimedOut)));
    handle.stop();
}
