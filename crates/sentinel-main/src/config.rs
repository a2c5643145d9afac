// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Sentinel.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result, bail};
use sentinel_core::{
    BatchPlan, CouplingTable, DashboardConfig, DataMode, EnergyConfig, PollerConfig, StoreConfig,
    TemperatureScale,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream IoT API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll loop timing and batching
    #[serde(default)]
    pub polling: PollingConfig,

    /// Data mode, display and in-memory log sizes
    #[serde(default)]
    pub dashboard: DashboardSettings,

    /// Energy and cost estimate assumptions
    #[serde(default)]
    pub energy: EnergyConfig,

    /// AI summary collaborator
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Demo sensor coupling rules, built-in table when omitted
    #[serde(default)]
    pub coupling: Option<CouplingTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the version prefix, e.g. `http://host/api/v1`.
    /// Falls back to `IOT_API_BASE_URL` when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Static bearer token, falls back to `IOT_API_TOKEN`
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts for requests that never reached the upstream
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_sensor_batch_size")]
    pub sensor_batch_size: usize,

    #[serde(default = "default_sensor_batch_pause_ms")]
    pub sensor_batch_pause_ms: u64,

    #[serde(default = "default_actuator_batch_size")]
    pub actuator_batch_size: usize,

    #[serde(default = "default_actuator_batch_pause_ms")]
    pub actuator_batch_pause_ms: u64,

    /// Historical mode anchor in seconds since the epoch
    #[serde(default = "default_reference_timestamp")]
    pub reference_timestamp: f64,

    #[serde(default = "default_reference_lookahead_secs")]
    pub reference_lookahead_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSettings {
    #[serde(default)]
    pub mode: DataMode,

    #[serde(default)]
    pub temperature_scale: TemperatureScale,

    #[serde(default = "default_activity_capacity")]
    pub activity_capacity: usize,

    #[serde(default = "default_request_log_capacity")]
    pub request_log_capacity: usize,

    /// Tracing filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Fixed seed for simulated data (reproducible demos)
    #[serde(default)]
    pub demo_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_summary_base_url")]
    pub base_url: String,

    #[serde(default = "default_summary_model")]
    pub model: String,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_interval_secs() -> u64 {
    10
}

fn default_sensor_batch_size() -> usize {
    10
}

fn default_sensor_batch_pause_ms() -> u64 {
    500
}

fn default_actuator_batch_size() -> usize {
    3
}

fn default_actuator_batch_pause_ms() -> u64 {
    2000
}

fn default_reference_timestamp() -> f64 {
    1_589_544_000.0
}

fn default_reference_lookahead_secs() -> u64 {
    3600
}

fn default_activity_capacity() -> usize {
    50
}

fn default_request_log_capacity() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_summary_base_url() -> String {
    "https://api.openai.com/v1".to_owned()
}

fn default_summary_model() -> String {
    "gpt-4o-mini".to_owned()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            sensor_batch_size: default_sensor_batch_size(),
            sensor_batch_pause_ms: default_sensor_batch_pause_ms(),
            actuator_batch_size: default_actuator_batch_size(),
            actuator_batch_pause_ms: default_actuator_batch_pause_ms(),
            reference_timestamp: default_reference_timestamp(),
            reference_lookahead_secs: default_reference_lookahead_secs(),
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            mode: DataMode::default(),
            temperature_scale: TemperatureScale::default(),
            activity_capacity: default_activity_capacity(),
            request_log_capacity: default_request_log_capacity(),
            log_level: default_log_level(),
            demo_seed: None,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_summary_base_url(),
            model: default_summary_model(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit path, or from `config.toml` /
    /// `config.json` in the working directory, or from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let config = Self::from_file(path)?;
            info!("✅ Loaded configuration from {}", path.display());
            config.validate()?;
            return Ok(config);
        }

        // Try config.toml for development
        if let Ok(config_str) = std::fs::read_to_string("config.toml") {
            let config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            info!("✅ Loaded configuration from config.toml");
            config.validate()?;
            return Ok(config);
        }

        // Try config.json for development
        if let Ok(config_str) = std::fs::read_to_string("config.json") {
            let config: AppConfig =
                serde_json::from_str(&config_str).context("Failed to parse config.json")?;
            info!("✅ Loaded configuration from config.json");
            config.validate()?;
            return Ok(config);
        }

        // Fall back to defaults with environment variable overrides
        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a file, JSON when the extension says so, TOML otherwise
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        }
    }

    /// Load from environment variables (development/testing)
    fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `IOT_API_BASE_URL`, `IOT_API_TOKEN`, `POLL_INTERVAL_SECS` and
    /// `DATA_MODE` through `lookup`. Unparseable values are ignored.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("IOT_API_BASE_URL") {
            self.api.base_url = Some(url);
        }
        if let Some(token) = lookup("IOT_API_TOKEN") {
            self.api.token = Some(token);
        }

        if let Some(interval) = lookup("POLL_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.polling.interval_secs = secs,
                Err(_) => warn!("Ignoring invalid POLL_INTERVAL_SECS: {}", interval),
            }
        }

        if let Some(mode) = lookup("DATA_MODE") {
            match mode.parse::<DataMode>() {
                Ok(mode) => self.dashboard.mode = mode,
                Err(e) => warn!("Ignoring DATA_MODE: {}", e),
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.api.base_url {
            if url.trim().is_empty() {
                bail!("api.base_url must not be empty");
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("api.base_url must start with http:// or https://, got '{url}'");
            }
        }

        if self.api.timeout_secs == 0 {
            bail!("api.timeout_secs must be at least 1");
        }

        if self.polling.interval_secs == 0 {
            bail!("polling.interval_secs must be at least 1");
        }

        if self.polling.sensor_batch_size == 0 || self.polling.actuator_batch_size == 0 {
            bail!("polling batch sizes must be at least 1");
        }

        if self.dashboard.activity_capacity == 0 || self.dashboard.request_log_capacity == 0 {
            bail!("dashboard log capacities must be at least 1");
        }

        if self.energy.electricity_rate_per_kwh <= 0.0 {
            bail!(
                "energy.electricity_rate_per_kwh must be positive, got {}",
                self.energy.electricity_rate_per_kwh
            );
        }

        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.api.retry_delay_ms)
    }

    pub fn to_dashboard_config(&self) -> DashboardConfig {
        let polling = &self.polling;
        DashboardConfig {
            mode: self.dashboard.mode,
            poller: PollerConfig {
                interval: Duration::from_secs(polling.interval_secs),
                sensor_batch: BatchPlan::new(
                    polling.sensor_batch_size,
                    Duration::from_millis(polling.sensor_batch_pause_ms),
                ),
                actuator_batch: BatchPlan::new(
                    polling.actuator_batch_size,
                    Duration::from_millis(polling.actuator_batch_pause_ms),
                ),
                reference_timestamp: polling.reference_timestamp,
                reference_lookahead: Duration::from_secs(polling.reference_lookahead_secs),
            },
            store: StoreConfig {
                activity_capacity: self.dashboard.activity_capacity,
                request_log_capacity: self.dashboard.request_log_capacity,
                temperature_scale: self.dashboard.temperature_scale,
            },
            energy: self.energy,
            coupling: self.coupling.clone().unwrap_or_default(),
            seed: self.dashboard.demo_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dashboard.mode, DataMode::Historical);
        assert_eq!(config.polling.interval_secs, 10);
        assert!(!config.summary.enabled);
    }

    #[test]
    fn test_parse_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://iot.example.com/api/v1"
            token = "secret"

            [polling]
            interval_secs = 5
            sensor_batch_size = 4

            [dashboard]
            mode = "live"
            temperature_scale = "celsius"

            [energy]
            electricity_rate_per_kwh = 0.2
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.api.base_url.as_deref(),
            Some("https://iot.example.com/api/v1")
        );
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.polling.interval_secs, 5);
        assert_eq!(config.polling.sensor_batch_size, 4);
        assert_eq!(config.polling.actuator_batch_size, 3);
        assert_eq!(config.dashboard.mode, DataMode::Live);
        assert_eq!(config.dashboard.temperature_scale, TemperatureScale::Celsius);
        assert!((config.energy.electricity_rate_per_kwh - 0.2).abs() < f64::EPSILON);
        assert!((config.energy.mains_voltage - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_json() {
        let config: AppConfig = serde_json::from_str(
            r#"{"dashboard": {"mode": "demo", "demo_seed": 7}, "summary": {"enabled": true}}"#,
        )
        .unwrap();

        assert_eq!(config.dashboard.mode, DataMode::Demo);
        assert_eq!(config.dashboard.demo_seed, Some(7));
        assert!(config.summary.enabled);
        assert_eq!(config.summary.model, "gpt-4o-mini");
        assert!(config.coupling.is_none());
    }

    #[test]
    fn test_parse_custom_coupling() {
        let config: AppConfig = toml::from_str(
            r#"
            [[coupling.rules]]
            name = "humidity"
            sensors = { units = ["%"], name_keywords = ["humid"] }
            actuator_keywords = ["dehumidifier"]
            effect = { type = "shift", on = -5.0, off = 5.0, floor = 0.0 }

            [[coupling.rules]]
            name = "door"
            sensors = { name_keywords = ["door"] }
            effect = { type = "randomize", probability = 0.5 }
            "#,
        )
        .unwrap();

        let coupling = config.to_dashboard_config().coupling;
        assert_eq!(coupling.rules.len(), 2);
        assert_eq!(coupling.rules[0].actuator_keywords, vec!["dehumidifier"]);
        assert!(coupling.rules[1].actuator_keywords.is_empty());
        assert_ne!(coupling, CouplingTable::default());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = AppConfig::default();
        config.api.base_url = Some("ftp://iot.example.com".to_owned());
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("http:// or https://")
        );

        config.api.base_url = Some("  ".to_owned());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.polling.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.polling.actuator_batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.dashboard.activity_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.energy.electricity_rate_per_kwh = 0.0;
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("must be positive")
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("IOT_API_BASE_URL", "http://10.0.0.2:8000/api/v1"),
            ("POLL_INTERVAL_SECS", "30"),
            ("DATA_MODE", "demo"),
        ]);
        let config =
            AppConfig::default().with_overrides(|key| env.get(key).map(|v| (*v).to_owned()));

        assert_eq!(
            config.api.base_url.as_deref(),
            Some("http://10.0.0.2:8000/api/v1")
        );
        assert!(config.api.token.is_none());
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.dashboard.mode, DataMode::Demo);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let env: HashMap<&str, &str> =
            HashMap::from([("POLL_INTERVAL_SECS", "soon"), ("DATA_MODE", "replay")]);
        let config =
            AppConfig::default().with_overrides(|key| env.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.polling.interval_secs, 10);
        assert_eq!(config.dashboard.mode, DataMode::Historical);
    }

    #[test]
    fn test_load_from_explicit_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[polling]\ninterval_secs = 3\n[dashboard]\nmode = \"demo\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.polling.interval_secs, 3);
        assert_eq!(config.dashboard.mode, DataMode::Demo);
    }

    #[test]
    fn test_load_from_explicit_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"api": {{"base_url": "http://localhost:9000/api/v1"}}}}"#).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.api.base_url.as_deref(),
            Some("http://localhost:9000/api/v1")
        );
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[polling]\ninterval_secs = 0").unwrap();
        assert!(AppConfig::load(Some(file.path())).is_err());

        let mut broken = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(broken, "[polling\ninterval_secs = 3").unwrap();
        let err = AppConfig::load(Some(broken.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_dashboard_config_conversion() {
        let mut config = AppConfig::default();
        config.polling.sensor_batch_size = 4;
        config.polling.sensor_batch_pause_ms = 250;
        config.dashboard.request_log_capacity = 20;
        config.dashboard.demo_seed = Some(42);

        let dashboard = config.to_dashboard_config();
        assert_eq!(dashboard.poller.interval, Duration::from_secs(10));
        assert_eq!(
            dashboard.poller.sensor_batch,
            BatchPlan::new(4, Duration::from_millis(250))
        );
        assert!((dashboard.poller.historical_cutoff() - 1_589_547_600.0).abs() < f64::EPSILON);
        assert_eq!(dashboard.store.request_log_capacity, 20);
        assert_eq!(dashboard.coupling, CouplingTable::default());
        assert_eq!(dashboard.seed, Some(42));
    }
}
