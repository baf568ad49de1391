//! Engine configuration
//!
//! Layered from defaults, an optional `canopy.toml` and `CANOPY__*`
//! environment variables (`CANOPY__MESH__MAX_DEPTH=4`).

use canopy_adaptive::AdaptiveConfig;
use canopy_common::{CanopyError, Result};
use canopy_mesh::MeshConfig;
use canopy_scheduler::SchedulerConfig;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Default config file name, without extension
pub const DEFAULT_CONFIG_FILE: &str = "canopy";

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub mesh: MeshConfig,
    pub adaptive: AdaptiveConfig,
    pub feedback: FeedbackSettings,
    /// Undelivered events retained per subscriber
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            mesh: MeshConfig::default(),
            adaptive: AdaptiveConfig::default(),
            feedback: FeedbackSettings::default(),
            event_channel_capacity: canopy_common::EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// How mesh outcomes feed the adaptive pipeline and how planted
/// adaptations feed scheduler weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    /// Rebalance imbalance ratio at which a friction signal is raised
    pub imbalance_signal_threshold: f64,
    /// Weight shift per unit of expected impact
    pub weight_step: f64,
    /// Apply planted adaptations to scheduler weights
    pub reinforce_weights: bool,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            imbalance_signal_threshold: 0.5,
            weight_step: 0.1,
            reinforce_weights: true,
        }
    }
}

impl EngineConfig {
    /// Load from `.env`, `canopy.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load with an explicit config file name
    pub fn load_from(file: &str) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix("CANOPY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        Self::finish(settings)
    }

    /// Parse a TOML document layered over the defaults
    pub fn from_toml(raw: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .map_err(config_error)?;

        Self::finish(settings)
    }

    fn finish(settings: Config) -> Result<Self> {
        let cfg: Self = settings.try_deserialize().map_err(config_error)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| -> Result<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(CanopyError::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
            Ok(())
        };

        unit("scheduler.coherence_threshold", self.scheduler.coherence_threshold)?;
        unit("scheduler.default_timing_alignment", self.scheduler.default_timing_alignment)?;
        if !(self.scheduler.resource_scale > 0.0) {
            return Err(CanopyError::Config("scheduler.resource_scale must be positive".into()));
        }
        if !(self.scheduler.max_factor_weight > 0.0) {
            return Err(CanopyError::Config("scheduler.max_factor_weight must be positive".into()));
        }

        unit("mesh.edge_compatibility_threshold", self.mesh.edge_compatibility_threshold)?;
        unit("mesh.base_efficiency", self.mesh.base_efficiency)?;
        unit("mesh.decay_rate", self.mesh.decay_rate)?;
        unit("mesh.floor_efficiency", self.mesh.floor_efficiency)?;
        if self.mesh.floor_efficiency > self.mesh.base_efficiency {
            return Err(CanopyError::Config(
                "mesh.floor_efficiency must not exceed mesh.base_efficiency".into(),
            ));
        }
        if self.mesh.rebalance_interval_secs == 0 {
            return Err(CanopyError::Config("mesh.rebalance_interval_secs must be non-zero".into()));
        }
        if !(self.mesh.low_water_ratio < self.mesh.high_water_ratio) {
            return Err(CanopyError::Config(
                "mesh.low_water_ratio must be below mesh.high_water_ratio".into(),
            ));
        }

        unit("adaptive.fire_threshold", self.adaptive.fire_threshold)?;
        unit("adaptive.conditions.timing", self.adaptive.conditions.timing)?;
        unit("adaptive.conditions.resources", self.adaptive.conditions.resources)?;
        unit("adaptive.conditions.user_readiness", self.adaptive.conditions.user_readiness)?;
        unit("adaptive.health_review_threshold", self.adaptive.health_review_threshold)?;
        if self.adaptive.max_seeds_per_type == 0 {
            return Err(CanopyError::Config("adaptive.max_seeds_per_type must be non-zero".into()));
        }

        unit("feedback.imbalance_signal_threshold", self.feedback.imbalance_signal_threshold)?;
        if !(self.feedback.weight_step >= 0.0) {
            return Err(CanopyError::Config("feedback.weight_step must be non-negative".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(CanopyError::Config("event_channel_capacity must be non-zero".into()));
        }

        Ok(())
    }
}

fn config_error(err: config::ConfigError) -> CanopyError {
    CanopyError::Config(err.to_string())
}
