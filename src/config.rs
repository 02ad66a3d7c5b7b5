//! Configuration for the Synheart Form Agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the form agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline tunables
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Path for exporting session results
    pub export_path: PathBuf,

    /// Path for storing activity counters
    pub data_path: PathBuf,

    /// Port for the HTTP ingestion server
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_server_port() -> u16 {
    8787
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-form-agent");

        Self {
            analysis: AnalysisConfig::default(),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            server_port: default_server_port(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-form-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Tunables for stabilization, buffering, sampling and analysis triggers.
///
/// The two confidence thresholds are independent on purpose: stability
/// gating tolerates weaker detections than encoding and movement do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Joints at or below this confidence are ignored by the stability tracker
    pub visibility_threshold: f64,
    /// Joints at or below this confidence are dropped from encoding and movement
    pub encoding_threshold: f64,
    /// How long the last good pose is held after detection is lost
    #[serde(with = "duration_serde")]
    pub loss_timeout: Duration,
    /// Capacity of the recent (live) window
    pub recent_capacity: usize,
    /// Full-mode inputs up to this length are passed through unsampled
    pub full_sample_threshold: usize,
    /// Movement above this (normalized units) counts as active
    pub motion_threshold: f64,
    /// Keep every Nth candidate frame while moving
    pub active_stride: usize,
    /// Keep every Nth candidate frame while static
    pub idle_stride: usize,
    /// Include hips alongside wrists and shoulders in the movement measure
    pub include_hips_in_movement: bool,
    /// Minimum time between live analysis passes
    #[serde(with = "duration_serde")]
    pub live_interval: Duration,
    /// Recent frames required before a live pass
    pub min_live_frames: usize,
    /// Wall-clock bound on a single reasoning call
    #[serde(with = "duration_serde")]
    pub reasoning_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.15,
            encoding_threshold: 0.3,
            loss_timeout: Duration::from_secs(2),
            recent_capacity: 20,
            full_sample_threshold: 30,
            motion_threshold: 0.04,
            active_stride: 2,
            idle_stride: 5,
            include_hips_in_movement: true,
            live_interval: Duration::from_millis(2_500),
            min_live_frames: 8,
            reasoning_timeout: Duration::from_secs(20),
        }
    }
}

impl AnalysisConfig {
    /// Check values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recent_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "recent_capacity must be at least 1".to_string(),
            ));
        }
        if self.active_stride == 0 || self.idle_stride == 0 {
            return Err(ConfigError::InvalidValue(
                "sampling strides must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("visibility_threshold", self.visibility_threshold),
            ("encoding_threshold", self.encoding_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be within 0.0-1.0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.loss_timeout, Duration::from_secs(2));
        assert_eq!(config.analysis.encoding_threshold, 0.3);
        assert!(config.analysis.visibility_threshold < config.analysis.encoding_threshold);
        assert!(config.analysis.validate().is_ok());
    }

    #[test]
    fn test_partial_analysis_config() {
        let json = r#"{"loss_timeout": 1.5, "recent_capacity": 15}"#;
        let analysis: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.loss_timeout, Duration::from_millis(1_500));
        assert_eq!(analysis.recent_capacity, 15);
        assert_eq!(analysis.idle_stride, 5);
    }

    #[test]
    fn test_config_round_trip_without_analysis_block() {
        let json = r#"{"export_path": "/tmp/e", "data_path": "/tmp/d"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.server_port, 8787);
        assert_eq!(config.analysis.min_live_frames, 8);
    }

    #[test]
    fn test_validate_rejects_zero_stride() {
        let analysis = AnalysisConfig {
            active_stride: 0,
            ..Default::default()
        };
        assert!(matches!(
            analysis.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
