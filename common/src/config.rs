use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Delay between two samples of the region.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Hard cap on accepted (non-duplicate) frames per session.
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
    /// How long a caller waits for the sampling task after stopping it.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_overlap_ratio")]
    pub overlap_ratio: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_frames: default_max_frames(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            overlap_ratio: default_overlap_ratio(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the sampling loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_ms == 0 {
            return Err(ConfigError::Invalid("capture.interval_ms must be > 0".into()));
        }
        if self.capture.max_frames == 0 {
            return Err(ConfigError::Invalid("capture.max_frames must be > 0".into()));
        }
        let ratio = self.matching.overlap_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "matching.overlap_ratio must be in (0, 1], got {ratio}"
            )));
        }
        check_unit("matching.confidence_threshold", self.matching.confidence_threshold)?;
        check_unit("filter.similarity_threshold", self.filter.similarity_threshold)?;
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_interval_ms() -> u64 {
    250
}
fn default_max_frames() -> u32 {
    150
}
fn default_join_timeout_ms() -> u64 {
    3000
}
fn default_overlap_ratio() -> f64 {
    0.3
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_similarity_threshold() -> f64 {
    0.98
}
fn default_log_level() -> String {
    "info".into()
}
