use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use owo_colors::OwoColorize;
use serde_json::Value as JsonValue;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use swarmsim_core::{Faction, SwarmConfig, WorldHandle, WorldSnapshot};
use tracing::{debug, info, warn};

/// Default driver cadence in ticks per second.
const DEFAULT_TICK_RATE: f64 = 60.0;

fn main() -> Result<()> {
    let cli = AppCli::parse();
    init_tracing();

    let config = compose_config(&cli)?;
    let tick_rate = resolve_tick_rate();
    info!(
        red = config.num_red_at_start,
        blue = config.num_blue_at_start,
        tick_rate,
        "starting swarm simulation shell"
    );

    let handle = WorldHandle::launch(config).context("world actor failed to start")?;
    let report = run_driver(&handle, tick_rate, cli.ticks);
    handle.stop();

    print_summary(&report);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[derive(Parser, Debug)]
#[command(name = "swarmsim", version, about = "Swarm simulation shell")]
struct AppCli {
    /// Layered configuration files (TOML or RON) applied in order.
    #[arg(
        long = "config",
        value_name = "FILE",
        action = ArgAction::Append,
        env = "SWARMSIM_CONFIG",
        value_delimiter = ';'
    )]
    config_layers: Vec<PathBuf>,
    /// Stop after this many ticks even if the game is undecided.
    #[arg(long, value_name = "TICKS", env = "SWARMSIM_TICKS")]
    ticks: Option<u64>,
    /// RNG seed override for reproducible runs.
    #[arg(long, env = "SWARMSIM_SEED")]
    seed: Option<u64>,
}

fn compose_config(cli: &AppCli) -> Result<SwarmConfig> {
    let mut config = apply_config_layers(SwarmConfig::default(), &cli.config_layers)?;
    if let Some(seed) = cli.seed {
        config.rng_seed = Some(seed);
    }
    config
        .validate()
        .context("composed configuration violates simulation invariants")?;
    Ok(config)
}

fn apply_config_layers(base: SwarmConfig, layers: &[PathBuf]) -> Result<SwarmConfig> {
    if layers.is_empty() {
        return Ok(base);
    }

    let mut merged = serde_json::to_value(&base).expect("serialize base config");
    for path in layers {
        let layer_value = load_config_layer(path)?;
        info!(layer = %path.display(), "applying configuration layer");
        merge_layer(&mut merged, layer_value);
    }

    serde_json::from_value(merged)
        .map_err(|err| anyhow::anyhow!("failed to deserialize merged configuration: {err}"))
}

fn load_config_layer(path: &Path) -> Result<JsonValue> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration layer {}", path.display()))?;

    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("ron") => ron::from_str(&contents)
            .with_context(|| format!("failed to parse RON config layer {}", path.display())),
        _ => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config layer {}", path.display())),
    }
}

fn merge_layer(base: &mut JsonValue, layer: JsonValue) {
    match (base, layer) {
        (JsonValue::Object(base_map), JsonValue::Object(layer_map)) => {
            for (key, value) in layer_map {
                if let Some(existing) = base_map.get_mut(&key) {
                    merge_layer(existing, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (target, value) => {
            *target = value;
        }
    }
}

fn resolve_tick_rate() -> f64 {
    let Ok(raw) = env::var("SWARMSIM_TICK_RATE") else {
        return DEFAULT_TICK_RATE;
    };
    match raw.trim().parse::<f64>() {
        Ok(rate) if rate > 0.0 && rate.is_finite() => rate,
        _ => {
            warn!(value = %raw, "invalid SWARMSIM_TICK_RATE, using default");
            DEFAULT_TICK_RATE
        }
    }
}

#[derive(Debug, Default)]
struct DriverReport {
    ticks_sent: u64,
    last_snapshot: Option<WorldSnapshot>,
}

/// Pump ticks at the target cadence, keeping only the latest snapshot each
/// frame, until the world reports game over or the optional tick budget runs
/// out.
fn run_driver(handle: &WorldHandle, tick_rate: f64, tick_limit: Option<u64>) -> DriverReport {
    let interval = Duration::from_secs_f64(1.0 / tick_rate);
    let delta_time = interval.as_millis() as i64;
    let mut report = DriverReport::default();
    let mut last_status = Instant::now();

    loop {
        let frame_start = Instant::now();
        if handle.tick(delta_time).is_err() {
            warn!("world actor stopped unexpectedly");
            break;
        }
        report.ticks_sent += 1;

        if let Some(snapshot) = handle.latest_snapshot() {
            report.last_snapshot = Some(snapshot);
        }
        if let Some(snapshot) = &report.last_snapshot {
            if snapshot.is_game_over {
                debug!(ticks = report.ticks_sent, "game over observed, stopping driver");
                break;
            }
            if last_status.elapsed() >= Duration::from_secs(1) {
                info!(
                    red = snapshot.red_count,
                    blue = snapshot.blue_count,
                    ticks = report.ticks_sent,
                    "population"
                );
                last_status = Instant::now();
            }
        }
        if let Some(limit) = tick_limit
            && report.ticks_sent >= limit
        {
            info!(limit, "tick budget exhausted, stopping driver");
            break;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
    report
}

fn print_summary(report: &DriverReport) {
    let Some(snapshot) = &report.last_snapshot else {
        println!("no snapshot observed after {} ticks", report.ticks_sent);
        return;
    };
    match snapshot.winner {
        Some(Faction::Red) => println!(
            "{} {} wins after {} ticks",
            "■".red().bold(),
            "RED".red().bold(),
            report.ticks_sent
        ),
        Some(Faction::Blue) => println!(
            "{} {} wins after {} ticks",
            "■".blue().bold(),
            "BLUE".blue().bold(),
            report.ticks_sent
        ),
        None => println!(
            "undecided after {} ticks ({} red, {} blue)",
            report.ticks_sent,
            snapshot.red_count.to_string().red(),
            snapshot.blue_count.to_string().blue()
        ),
    }
}
