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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::fanout::BatchPlan;

/// Where dashboard data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    /// Newest upstream samples
    Live,
    /// Upstream samples around a fixed reference timestamp
    #[default]
    Historical,
    /// Simulated data, no network
    Demo,
}

impl DataMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Historical => "historical",
            Self::Demo => "demo",
        }
    }

    pub fn uses_network(self) -> bool {
        !matches!(self, Self::Demo)
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown data mode '{0}' (expected live, historical or demo)")]
pub struct ParseDataModeError(String);

impl FromStr for DataMode {
    type Err = ParseDataModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "historical" | "history" => Ok(Self::Historical),
            "demo" => Ok(Self::Demo),
            other => Err(ParseDataModeError(other.to_owned())),
        }
    }
}

/// Display scale for temperature readings. Upstream reports Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureScale {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureScale {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Fahrenheit => "°F",
            Self::Celsius => "°C",
        }
    }

    pub fn convert_celsius(self, celsius: f64) -> f64 {
        match self {
            Self::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            Self::Celsius => celsius,
        }
    }
}

/// Polling loop settings
#[derive(Debug, Clone, PartialEq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub sensor_batch: BatchPlan,
    pub actuator_batch: BatchPlan,
    /// Historical mode anchor (2020-05-15 12:00:00 UTC)
    pub reference_timestamp: f64,
    /// Historical detail fetches look this far past the anchor
    pub reference_lookahead: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            sensor_batch: BatchPlan::new(10, Duration::from_millis(500)),
            actuator_batch: BatchPlan::new(3, Duration::from_secs(2)),
            reference_timestamp: 1_589_544_000.0,
            reference_lookahead: Duration::from_secs(3600),
        }
    }
}

impl PollerConfig {
    /// Upper bound for historical "latest sample" lookups
    pub fn historical_cutoff(&self) -> f64 {
        self.reference_timestamp + self.reference_lookahead.as_secs_f64()
    }
}

/// State store sizing and presentation settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreConfig {
    pub activity_capacity: usize,
    pub request_log_capacity: usize,
    pub temperature_scale: TemperatureScale,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            activity_capacity: 50,
            request_log_capacity: 200,
            temperature_scale: TemperatureScale::default(),
        }
    }
}

/// Rates and assumptions behind the energy and cost estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyConfig {
    #[serde(default = "default_electricity_rate")]
    pub electricity_rate_per_kwh: f64,

    #[serde(default = "default_reference_monthly_kwh")]
    pub reference_monthly_kwh: f64,

    #[serde(default = "default_watts_per_actuator")]
    pub watts_per_enabled_actuator: f64,

    #[serde(default = "default_watts_per_actuator")]
    pub watts_saved_per_idle_actuator: f64,

    #[serde(default = "default_mains_voltage")]
    pub mains_voltage: f64,
}

fn default_electricity_rate() -> f64 {
    0.126
}

fn default_reference_monthly_kwh() -> f64 {
    1000.0
}

fn default_watts_per_actuator() -> f64 {
    100.0
}

fn default_mains_voltage() -> f64 {
    120.0
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            electricity_rate_per_kwh: default_electricity_rate(),
            reference_monthly_kwh: default_reference_monthly_kwh(),
            watts_per_enabled_actuator: default_watts_per_actuator(),
            watts_saved_per_idle_actuator: default_watts_per_actuator(),
            mains_voltage: default_mains_voltage(),
        }
    }
}
