//! # Drift Config
//!
//! Configuration system for the Drift reference-resolution engine.
//!
//! Provides TOML-based configuration parsing and validation for the engine
//! tunables, the per-conversation cache, and the analytics hook.
//!
//! # Configuration Schema
//!
//! The configuration file (`drift.toml`) supports the following sections:
//! - `[engine]` — detection/resolution tunables (fuzzy threshold, flush
//!   interval, snippet and enrichment windows, list result caps)
//! - `[cache]` — per-conversation persisted cache (enabled, directory)
//! - `[analytics]` — locally-toggled UI event hook (off by default)
//!
//! # Environment Variable Overrides
//!
//! Every config field can be overridden via environment variables using the
//! `DRIFT_` prefix and `_` as section separator:
//! - `DRIFT_ENGINE_FUZZY_MERGE_THRESHOLD` → `engine.fuzzy_merge_threshold`
//! - `DRIFT_ENGINE_FLUSH_INTERVAL` → `engine.flush_interval`
//! - `DRIFT_CACHE_DIR` → `cache.dir`
//! - `DRIFT_ANALYTICS_ENABLED` → `analytics.enabled`
//! - etc.

use serde::{Deserialize, Serialize};

/// Top-level Drift engine configuration.
///
/// Parsed from `drift.toml` or constructed programmatically. Environment
/// variables with the `DRIFT_` prefix override TOML values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Detection and resolution tunables.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Per-conversation cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Analytics hook settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Detection and resolution tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum blended similarity for a fuzzy canonical merge (default: 0.82).
    #[serde(default = "default_fuzzy_merge_threshold")]
    pub fuzzy_merge_threshold: f64,
    /// Persist the index every N successful mutations (default: 10).
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,
    /// Bytes of context captured on each side of a mention span (default: 80).
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,
    /// Hard cap on snippet length in bytes (default: 240).
    #[serde(default = "default_snippet_max_len")]
    pub snippet_max_len: usize,
    /// Window scanned around a work candidate for authorship patterns
    /// (default: 120 bytes each direction).
    #[serde(default = "default_authorship_window")]
    pub authorship_window: usize,
    /// Maximum distance between a work and a person mention for
    /// co-occurrence alt-name enrichment (default: 140 bytes).
    #[serde(default = "default_co_occurrence_window")]
    pub co_occurrence_window: usize,
    /// Total cap on list reference matches per query (default: 12).
    #[serde(default = "default_max_list_results")]
    pub max_list_results: usize,
    /// Cap on explicit-surface list matches per query (default: 8).
    #[serde(default = "default_max_list_surface_results")]
    pub max_list_surface_results: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_merge_threshold: default_fuzzy_merge_threshold(),
            flush_interval: default_flush_interval(),
            snippet_radius: default_snippet_radius(),
            snippet_max_len: default_snippet_max_len(),
            authorship_window: default_authorship_window(),
            co_occurrence_window: default_co_occurrence_window(),
            max_list_results: default_max_list_results(),
            max_list_surface_results: default_max_list_surface_results(),
        }
    }
}

fn default_fuzzy_merge_threshold() -> f64 {
    0.82
}
fn default_flush_interval() -> usize {
    10
}
fn default_snippet_radius() -> usize {
    80
}
fn default_snippet_max_len() -> usize {
    240
}
fn default_authorship_window() -> usize {
    120
}
fn default_co_occurrence_window() -> usize {
    140
}
fn default_max_list_results() -> usize {
    12
}
fn default_max_list_surface_results() -> usize {
    8
}

/// Per-conversation cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the index is persisted at all (default: true).
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Directory holding one JSON blob per conversation (default:
    /// "./drift-cache").
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}
fn default_cache_dir() -> String {
    "./drift-cache".to_string()
}

/// Analytics hook settings. Fully inert when disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Whether named UI events are forwarded to the hook (default: false).
    #[serde(default)]
    pub enabled: bool,
}

#[allow(clippy::derivable_impls)]
impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

impl DriftConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        Self::parse_toml(&contents)
    }

    /// Parse configuration from a TOML string, then apply env overrides.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        let mut config: DriftConfig = toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `DRIFT_*` environment variable overrides.
    ///
    /// Unparseable values are ignored (the TOML/default value stands).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DRIFT_ENGINE_FUZZY_MERGE_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                self.engine.fuzzy_merge_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_FLUSH_INTERVAL") {
            if let Ok(parsed) = v.parse() {
                self.engine.flush_interval = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_SNIPPET_RADIUS") {
            if let Ok(parsed) = v.parse() {
                self.engine.snippet_radius = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_SNIPPET_MAX_LEN") {
            if let Ok(parsed) = v.parse() {
                self.engine.snippet_max_len = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_AUTHORSHIP_WINDOW") {
            if let Ok(parsed) = v.parse() {
                self.engine.authorship_window = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_CO_OCCURRENCE_WINDOW") {
            if let Ok(parsed) = v.parse() {
                self.engine.co_occurrence_window = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_MAX_LIST_RESULTS") {
            if let Ok(parsed) = v.parse() {
                self.engine.max_list_results = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_ENGINE_MAX_LIST_SURFACE_RESULTS") {
            if let Ok(parsed) = v.parse() {
                self.engine.max_list_surface_results = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_CACHE_ENABLED") {
            if let Ok(parsed) = v.parse() {
                self.cache.enabled = parsed;
            }
        }
        if let Ok(v) = std::env::var("DRIFT_CACHE_DIR") {
            self.cache.dir = v;
        }
        if let Ok(v) = std::env::var("DRIFT_ANALYTICS_ENABLED") {
            if let Ok(parsed) = v.parse() {
                self.analytics.enabled = parsed;
            }
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        let t = self.engine.fuzzy_merge_threshold;
        if !(t > 0.0 && t <= 1.0) {
            anyhow::bail!("engine.fuzzy_merge_threshold must be in (0, 1], got {}", t);
        }
        if self.engine.flush_interval == 0 {
            anyhow::bail!("engine.flush_interval must be at least 1");
        }
        if self.engine.snippet_max_len < self.engine.snippet_radius {
            anyhow::bail!(
                "engine.snippet_max_len ({}) must be >= engine.snippet_radius ({})",
                self.engine.snippet_max_len,
                self.engine.snippet_radius
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriftConfig::default();
        assert!((config.engine.fuzzy_merge_threshold - 0.82).abs() < 1e-9);
        assert_eq!(config.engine.flush_interval, 10);
        assert_eq!(config.engine.snippet_radius, 80);
        assert_eq!(config.engine.snippet_max_len, 240);
        assert_eq!(config.engine.authorship_window, 120);
        assert_eq!(config.engine.co_occurrence_window, 140);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.dir, "./drift-cache");
        assert!(!config.analytics.enabled);
    }

    #[test]
    fn test_empty_toml_parses_to_defaults() {
        let config = DriftConfig::parse_toml("").unwrap();
        assert_eq!(config.engine.flush_interval, 10);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml = r#"
            [engine]
            fuzzy_merge_threshold = 0.9
            flush_interval = 3

            [analytics]
            enabled = true
        "#;
        let config = DriftConfig::parse_toml(toml).unwrap();
        assert!((config.engine.fuzzy_merge_threshold - 0.9).abs() < 1e-9);
        assert_eq!(config.engine.flush_interval, 3);
        assert!(config.analytics.enabled);
        // Untouched sections keep defaults.
        assert_eq!(config.engine.snippet_radius, 80);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let toml = "[engine]\nfuzzy_merge_threshold = 1.5\n";
        assert!(DriftConfig::parse_toml(toml).is_err());
        let toml = "[engine]\nfuzzy_merge_threshold = 0.0\n";
        assert!(DriftConfig::parse_toml(toml).is_err());
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let toml = "[engine]\nflush_interval = 0\n";
        assert!(DriftConfig::parse_toml(toml).is_err());
    }

    #[test]
    fn test_snippet_cap_must_cover_radius() {
        let toml = "[engine]\nsnippet_radius = 100\nsnippet_max_len = 50\n";
        assert!(DriftConfig::parse_toml(toml).is_err());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(DriftConfig::parse_toml("not [valid toml").is_err());
    }

    #[test]
    fn test_env_override() {
        // Env vars are process-global; use a field no other test overrides.
        std::env::set_var("DRIFT_ENGINE_MAX_LIST_RESULTS", "5");
        let mut config = DriftConfig::default();
        config.apply_env_overrides();
        std::env::remove_var("DRIFT_ENGINE_MAX_LIST_RESULTS");
        assert_eq!(config.engine.max_list_results, 5);
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        std::env::set_var("DRIFT_ENGINE_SNIPPET_RADIUS", "not-a-number");
        let mut config = DriftConfig::default();
        config.apply_env_overrides();
        std::env::remove_var("DRIFT_ENGINE_SNIPPET_RADIUS");
        assert_eq!(config.engine.snippet_radius, 80);
    }
}
