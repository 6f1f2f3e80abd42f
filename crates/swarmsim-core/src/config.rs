//! Simulation configuration and invariant validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest spatial-grid cell size; keeps the grid coarse enough to stay
/// cheap when all interaction radii are tiny.
pub const MIN_CELL_SIZE: f64 = 10.0;

/// Errors raised when validating a configuration record.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("defense_radius ({defense}) cannot exceed detection_radius ({detection})")]
    DefenseExceedsDetection { defense: f64, detection: f64 },
    #[error("contact_radius ({contact}) cannot exceed defense_radius ({defense})")]
    ContactExceedsDefense { contact: f64, defense: f64 },
    #[error("min_speed ({min}) must be less than max_speed ({max})")]
    SpeedOrdering { min: f64, max: f64 },
    #[error("{field} must be non-negative")]
    NegativeField { field: &'static str },
    #[error("world dimensions must be positive")]
    NonPositiveWorld,
    #[error("each faction needs at least one starting member")]
    EmptyPopulation,
    #[error("history_capacity must be non-zero")]
    ZeroHistory,
}

/// Tunable parameters for a swarm world. All fields except the starting
/// populations and the RNG seed are hot-updatable at runtime; population
/// sizes are stored but only consulted when the world seeds its swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Arena width in world units.
    pub world_width: f64,
    /// Arena height in world units.
    pub world_height: f64,
    /// Initial number of RED (pursuer) agents. Restart required.
    pub num_red_at_start: usize,
    /// Initial number of BLUE (flocker) agents. Restart required.
    pub num_blue_at_start: usize,
    /// Range within which RED perceives BLUE.
    pub detection_radius: f64,
    /// Range within which BLUE defenders are counted around a victim.
    pub defense_radius: f64,
    /// Range at which RED/BLUE contact triggers combat resolution.
    pub contact_radius: f64,
    /// Range within which same-faction neighbors contribute to flocking.
    pub visual_range: f64,
    /// Range below which separation dominates flocking.
    pub protected_range: f64,
    /// Upper speed clamp.
    pub max_speed: f64,
    /// Lower speed clamp (BLUE only); must stay below `max_speed`.
    pub min_speed: f64,
    /// Scale on RED pursuit steering.
    pub aggression: f64,
    /// Cohesion strength.
    pub centering_factor: f64,
    /// Separation strength.
    pub avoid_factor: f64,
    /// Alignment strength.
    pub matching_factor: f64,
    /// Soft-boundary steering gain.
    pub turn_factor: f64,
    /// Renderer hint: draw the RED detection circle.
    pub display_detection_circle: bool,
    /// Renderer hint: draw the BLUE defense circle.
    pub display_defense_circle: bool,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
    /// Optional RNG seed for reproducible spawns and wander jitter.
    pub rng_seed: Option<u64>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            world_width: 1_000.0,
            world_height: 800.0,
            num_red_at_start: 5,
            num_blue_at_start: 30,
            detection_radius: 50.0,
            defense_radius: 40.0,
            contact_radius: 12.0,
            visual_range: 70.0,
            protected_range: 20.0,
            max_speed: 4.0,
            min_speed: 2.0,
            aggression: 0.8,
            centering_factor: 0.0005,
            avoid_factor: 0.05,
            matching_factor: 0.05,
            turn_factor: 0.2,
            display_detection_circle: false,
            display_defense_circle: false,
            history_capacity: 256,
            rng_seed: None,
        }
    }
}

impl SwarmConfig {
    /// Check every configuration invariant: radius ordering
    /// (`contact <= defense <= detection`), speed ordering, non-negativity,
    /// positive arena, non-empty starting populations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.world_width > 0.0) || !(self.world_height > 0.0) {
            return Err(ConfigError::NonPositiveWorld);
        }
        if self.num_red_at_start == 0 || self.num_blue_at_start == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        for (field, value) in [
            ("detection_radius", self.detection_radius),
            ("defense_radius", self.defense_radius),
            ("contact_radius", self.contact_radius),
            ("visual_range", self.visual_range),
            ("protected_range", self.protected_range),
            ("max_speed", self.max_speed),
            ("min_speed", self.min_speed),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeField { field });
            }
        }
        if self.defense_radius > self.detection_radius {
            return Err(ConfigError::DefenseExceedsDetection {
                defense: self.defense_radius,
                detection: self.detection_radius,
            });
        }
        if self.contact_radius > self.defense_radius {
            return Err(ConfigError::ContactExceedsDefense {
                contact: self.contact_radius,
                defense: self.defense_radius,
            });
        }
        if self.min_speed >= self.max_speed {
            return Err(ConfigError::SpeedOrdering {
                min: self.min_speed,
                max: self.max_speed,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistory);
        }
        Ok(())
    }

    /// Grid cell size: the largest interaction radius, floored at
    /// [`MIN_CELL_SIZE`], so a 3×3 cell block always covers every relevant
    /// disk.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.detection_radius
            .max(self.defense_radius)
            .max(self.visual_range)
            .max(MIN_CELL_SIZE)
    }
}
