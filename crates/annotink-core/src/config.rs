//! Engine configuration.
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a working configuration.

use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::shapes::StrokeColor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the sync outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Delay before the first retry; doubles on each further failure.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Upper bound on the retry delay.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Failed attempts after which an entry is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_retry_base_ms() -> u64 {
    250
}

fn default_retry_max_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    8
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_base_ms: default_retry_base_ms(),
            retry_max_ms: default_retry_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl SyncConfig {
    /// Delay before retrying an entry that has failed `attempts` times.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempts.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(
            self.retry_base_ms
                .saturating_mul(factor)
                .min(self.retry_max_ms),
        )
    }
}

/// Configuration for an annotation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Undo/redo depth per store.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,

    /// Stroke for shapes without a class, as a hex colour.
    #[serde(default = "default_stroke")]
    pub default_stroke: String,

    #[serde(default = "default_stroke_width")]
    pub default_stroke_width: f64,

    /// Idle time before a free-text edit is synced.
    #[serde(default = "default_text_debounce_ms")]
    pub text_debounce_ms: u64,

    /// Send a forward sync for every undo/redo of a persisted shape.
    #[serde(default = "default_reconcile_undo")]
    pub reconcile_undo: bool,

    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}

fn default_stroke() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_text_debounce_ms() -> u64 {
    1000
}

fn default_reconcile_undo() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            default_stroke: default_stroke(),
            default_stroke_width: default_stroke_width(),
            text_debounce_ms: default_text_debounce_ms(),
            reconcile_undo: default_reconcile_undo(),
            sync: SyncConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth == 0 {
            return Err(ConfigError::Invalid("historyDepth must be at least 1".into()));
        }
        if !(self.default_stroke_width.is_finite() && self.default_stroke_width > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "defaultStrokeWidth must be positive, got {}",
                self.default_stroke_width
            )));
        }
        self.stroke()?;
        if self.sync.retry_base_ms == 0 {
            return Err(ConfigError::Invalid("sync.retryBaseMs must be positive".into()));
        }
        if self.sync.retry_max_ms < self.sync.retry_base_ms {
            return Err(ConfigError::Invalid(
                "sync.retryMaxMs must not be below sync.retryBaseMs".into(),
            ));
        }
        Ok(())
    }

    /// The parsed default stroke colour.
    pub fn stroke(&self) -> Result<StrokeColor, ConfigError> {
        self.default_stroke
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("defaultStroke: {e}")))
    }

    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.text_debounce(), Duration::from_secs(1));
        assert!(config.reconcile_undo);
        assert_eq!(config.stroke().unwrap(), StrokeColor::black());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"historyDepth": 25, "sync": {"maxAttempts": 3}}"#)
            .unwrap();
        assert_eq!(config.history_depth, 25);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.retry_base_ms, 250);
        assert_eq!(config.default_stroke, "#000000");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"historyDepth": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r##"{"defaultStroke": "#zzz"}"##),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"sync": {"retryBaseMs": 500, "retryMaxMs": 100}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let sync = SyncConfig {
            retry_base_ms: 100,
            retry_max_ms: 1000,
            max_attempts: 8,
        };
        assert_eq!(sync.backoff(1), Duration::from_millis(100));
        assert_eq!(sync.backoff(2), Duration::from_millis(200));
        assert_eq!(sync.backoff(4), Duration::from_millis(800));
        assert_eq!(sync.backoff(5), Duration::from_millis(1000));
        assert_eq!(sync.backoff(200), Duration::from_millis(1000));
    }
}
