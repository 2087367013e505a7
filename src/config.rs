/// Configuration module for rustfaq.
///
/// Handles loading, validating, and providing default configuration values.
/// Environment variables override the file so deployments can tune the cache
/// and thresholds without editing JSON.
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheConfig;
use crate::query::MatchConfig;

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./faq.db".to_string()
}

fn default_ttl_secs() -> u64 {
    30
}

fn default_auto_refresh_interval_secs() -> u64 {
    120
}

fn default_normal_threshold() -> f64 {
    80.0
}

fn default_mention_threshold() -> f64 {
    70.0
}

fn default_apology_message() -> String {
    "Sorry, I don't have an answer for that yet. An admin will follow up.".to_string()
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub matching: MatchSettings,

    #[serde(default)]
    pub admin_ids: Vec<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub auto_refresh: bool,

    #[serde(default = "default_auto_refresh_interval_secs")]
    pub auto_refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatchSettings {
    #[serde(default = "default_normal_threshold")]
    pub normal_threshold: f64,

    #[serde(default = "default_mention_threshold")]
    pub mention_threshold: f64,

    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cache: CacheSettings::default(),
            matching: MatchSettings::default(),
            admin_ids: Vec::new(),
            bot_username: None,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            auto_refresh: false,
            auto_refresh_interval_secs: default_auto_refresh_interval_secs(),
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            normal_threshold: default_normal_threshold(),
            mention_threshold: default_mention_threshold(),
            apology_message: default_apology_message(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let mut cfg = Self::load_file(config_path)?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    fn load_file(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !std::path::Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Override fields from environment variables. `lookup` is injected so
    /// tests do not touch the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("DB_PATH") {
            self.db_path = v;
        }
        if let Some(v) = get("QA_CACHE_TTL") {
            self.cache.ttl_secs = v.parse().with_context(|| format!("QA_CACHE_TTL: {v}"))?;
        }
        if let Some(v) = get("QA_CACHE_AUTO_REFRESH") {
            self.cache.auto_refresh = parse_flag(&v)
                .with_context(|| format!("QA_CACHE_AUTO_REFRESH: {v}"))?;
        }
        if let Some(v) = get("QA_CACHE_AUTO_INTERVAL") {
            self.cache.auto_refresh_interval_secs =
                v.parse().with_context(|| format!("QA_CACHE_AUTO_INTERVAL: {v}"))?;
        }
        if let Some(v) = get("NORMAL_THRESHOLD") {
            self.matching.normal_threshold =
                v.parse().with_context(|| format!("NORMAL_THRESHOLD: {v}"))?;
        }
        if let Some(v) = get("MENTION_THRESHOLD") {
            self.matching.mention_threshold =
                v.parse().with_context(|| format!("MENTION_THRESHOLD: {v}"))?;
        }
        if let Some(v) = get("APOLOGY_MSG") {
            self.matching.apology_message = v;
        }
        if let Some(v) = get("ADMIN_IDS") {
            self.admin_ids = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse().with_context(|| format!("ADMIN_IDS entry: {s}")))
                .collect::<Result<Vec<i64>>>()?;
        }
        if let Some(v) = get("BOT_USERNAME") {
            self.bot_username = Some(v.trim_start_matches('@').to_string());
        }
        Ok(())
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.db_path.trim().is_empty(), "db_path must not be empty");
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.matching.normal_threshold),
            "matching.normal_threshold must be within 0..=100"
        );
        anyhow::ensure!(
            (0.0..=100.0).contains(&self.matching.mention_threshold),
            "matching.mention_threshold must be within 0..=100"
        );
        anyhow::ensure!(
            !self.matching.apology_message.trim().is_empty(),
            "matching.apology_message must not be empty"
        );
        anyhow::ensure!(
            !self.cache.auto_refresh || self.cache.auto_refresh_interval_secs > 0,
            "cache.auto_refresh_interval_secs must be positive when auto_refresh is on"
        );
        Ok(())
    }

    #[must_use]
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            auto_refresh: self.cache.auto_refresh,
            auto_refresh_interval: Duration::from_secs(self.cache.auto_refresh_interval_secs),
        }
    }

    #[must_use]
    pub fn to_match_config(&self) -> MatchConfig {
        MatchConfig {
            normal_threshold: self.matching.normal_threshold,
            mention_threshold: self.matching.mention_threshold,
            apology_message: self.matching.apology_message.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.db_path, "./faq.db");
        assert_eq!(config.cache.ttl_secs, 30);
        assert!(!config.cache.auto_refresh);
        assert_eq!(config.cache.auto_refresh_interval_secs, 120);
        assert_eq!(config.matching.normal_threshold, 80.0);
        assert_eq!(config.matching.mention_threshold, 70.0);
        assert!(config.admin_ids.is_empty());
        assert!(config.bot_username.is_none());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"db_path": "./test.db", "matching": {"normal_threshold": 75}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.db_path, "./test.db");
        assert_eq!(config.matching.normal_threshold, 75.0);
        // Other fields should have defaults
        assert_eq!(config.matching.mention_threshold, 70.0);
        assert_eq!(config.cache.ttl_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("DB_PATH", "/data/faq.db"),
                ("QA_CACHE_TTL", "0"),
                ("QA_CACHE_AUTO_REFRESH", "yes"),
                ("QA_CACHE_AUTO_INTERVAL", "15"),
                ("NORMAL_THRESHOLD", "72.5"),
                ("MENTION_THRESHOLD", "60"),
                ("APOLOGY_MSG", "No idea, sorry"),
                ("ADMIN_IDS", "1, 2,3,"),
                ("BOT_USERNAME", "@faqbot"),
            ]))
            .unwrap();

        assert_eq!(config.db_path, "/data/faq.db");
        assert_eq!(config.cache.ttl_secs, 0);
        assert!(config.cache.auto_refresh);
        assert_eq!(config.cache.auto_refresh_interval_secs, 15);
        assert_eq!(config.matching.normal_threshold, 72.5);
        assert_eq!(config.matching.mention_threshold, 60.0);
        assert_eq!(config.matching.apology_message, "No idea, sorry");
        assert_eq!(config.admin_ids, vec![1, 2, 3]);
        assert_eq!(config.bot_username.as_deref(), Some("faqbot"));
    }

    #[test]
    fn test_env_blank_values_ignored() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[("DB_PATH", "  "), ("APOLOGY_MSG", "")]))
            .unwrap();
        assert_eq!(config.db_path, "./faq.db");
        assert_eq!(config.matching.apology_message, default_apology_message());
    }

    #[test]
    fn test_env_bad_values_rejected() {
        for (key, value) in [
            ("QA_CACHE_TTL", "soon"),
            ("QA_CACHE_AUTO_REFRESH", "maybe"),
            ("NORMAL_THRESHOLD", "high"),
            ("ADMIN_IDS", "1,x"),
        ] {
            let mut config = Config::default();
            assert!(config.apply_env_overrides(env(&[(key, value)])).is_err(), "{key}");
        }
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_threshold() {
        let mut config = Config::default();
        config.matching.mention_threshold = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_auto_refresh_interval() {
        let mut config = Config::default();
        config.cache.auto_refresh_interval_secs = 0;
        assert!(config.validate().is_ok());
        config.cache.auto_refresh = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        let cache = config.to_cache_config();
        assert_eq!(cache.ttl, Duration::ZERO);
        assert_eq!(cache.auto_refresh_interval, Duration::from_secs(120));

        let matching = config.to_match_config();
        assert_eq!(matching.normal_threshold, 80.0);
        assert_eq!(matching.apology_message, config.matching.apology_message);
    }

    #[test]
    fn test_load_missing_custom_path_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.db_path, "./faq.db");
        assert!(!path.exists());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut config = Config::default();
        config.admin_ids = vec![42];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        config.save(path.to_str().unwrap()).unwrap();
        let parsed = Config::load_file(path.to_str().unwrap()).unwrap();
        assert_eq!(parsed.admin_ids, vec![42]);
        assert_eq!(parsed.db_path, config.db_path);
    }
}
