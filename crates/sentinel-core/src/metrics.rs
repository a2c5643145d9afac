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

//! Pure functions over a snapshot: change detection for the activity feed
//! and the energy/cost estimates.

use sentinel_api::{Actuator, Sensor};
use serde::Serialize;

use crate::activity::{NewEvent, Severity};
use crate::config::EnergyConfig;
use crate::store::Snapshot;

/// Relative change a sensor reading must exceed to be reported
const CHANGE_THRESHOLD: f64 = 0.1;

/// Activity events describing what changed between two snapshots.
///
/// Entities missing on either side are skipped, so an initial load
/// produces nothing.
pub fn detect_changes(previous: &Snapshot, current: &Snapshot) -> Vec<NewEvent> {
    let mut events = Vec::new();

    for sensor in &current.sensors {
        let Some(now) = sensor.last_sample else {
            continue;
        };
        let Some(before) = previous.sensor(&sensor.id).and_then(|s| s.last_sample) else {
            continue;
        };

        let change = (now.value - before.value).abs();
        if change > before.value.abs() * CHANGE_THRESHOLD {
            let (direction, severity) = if now.value > before.value {
                ("increased", Severity::Warning)
            } else {
                ("decreased", Severity::Success)
            };
            events.push(NewEvent::sensor(
                severity,
                format!(
                    "{} {} to {:.2} {}",
                    sensor.name, direction, now.value, sensor.unit
                ),
            ));
        }
    }

    for actuator in &current.actuators {
        let Some(before) = previous.actuator(&actuator.id) else {
            continue;
        };
        if !actuator.data_type.is_boolean() {
            continue;
        }
        let (was, is) = (before.state.is_active(), actuator.state.is_active());
        if was != is {
            events.push(NewEvent::actuator(
                Severity::Info,
                format!("{} turned {}", actuator.name, if is { "ON" } else { "OFF" }),
            ));
        }
    }

    events
}

/// Watts saved by boolean actuators that are switched off
pub fn energy_saved_watts(actuators: &[Actuator], config: &EnergyConfig) -> f64 {
    let idle = actuators
        .iter()
        .filter(|a| a.data_type.is_boolean() && !a.state.is_active())
        .count();
    idle as f64 * config.watts_saved_per_idle_actuator
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSource {
    /// Summed from power and current sensors
    Measured,
    /// Derived from the number of enabled actuators
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerDraw {
    pub watts: f64,
    pub source: PowerSource,
    pub enabled_actuators: usize,
}

fn is_power_sensor(sensor: &Sensor) -> bool {
    let name = sensor.name.to_lowercase();
    sensor.unit == "W" || name.contains("power") || name.contains("current")
}

fn is_current_sensor(sensor: &Sensor) -> bool {
    sensor.unit == "A" || sensor.name.to_lowercase().contains("current")
}

/// Current power draw, measured when power sensors report, estimated otherwise
pub fn power_draw(snapshot: &Snapshot, config: &EnergyConfig) -> PowerDraw {
    let enabled_actuators = snapshot
        .actuators
        .iter()
        .filter(|a| a.state.is_active())
        .count();

    let power_sensors: Vec<&Sensor> = snapshot
        .sensors
        .iter()
        .filter(|s| is_power_sensor(s))
        .collect();

    let measured: f64 = power_sensors
        .iter()
        .filter_map(|s| {
            let value = s.last_sample?.value;
            Some(if is_current_sensor(s) {
                (value * config.mains_voltage).abs()
            } else {
                value.abs()
            })
        })
        .sum();

    if !power_sensors.is_empty() && measured > 0.0 {
        PowerDraw {
            watts: measured.round(),
            source: PowerSource::Measured,
            enabled_actuators,
        }
    } else {
        PowerDraw {
            watts: enabled_actuators as f64 * config.watts_per_enabled_actuator,
            source: PowerSource::Estimated,
            enabled_actuators,
        }
    }
}

/// Monthly cost projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub monthly_kwh: f64,
    pub monthly_cost: f64,
    pub reference_monthly_kwh: f64,
    pub reference_monthly_cost: f64,
    /// Monthly cost minus the reference cost; negative is cheaper
    pub cost_vs_reference: f64,
    pub percent_vs_reference: f64,
    pub saved_kwh: f64,
    pub saved_cost: f64,
    pub annual_savings: f64,
}

fn watts_to_monthly_kwh(watts: f64) -> f64 {
    watts * 24.0 * 30.0 / 1000.0
}

pub fn cost_estimate(snapshot: &Snapshot, config: &EnergyConfig) -> CostEstimate {
    let rate = config.electricity_rate_per_kwh;

    let watts: f64 = snapshot
        .sensors
        .iter()
        .filter(|s| s.unit == "W")
        .filter_map(|s| s.last_sample.map(|sample| sample.value))
        .sum();

    let monthly_kwh = watts_to_monthly_kwh(watts);
    let monthly_cost = monthly_kwh * rate;
    let reference_monthly_cost = config.reference_monthly_kwh * rate;
    let cost_vs_reference = monthly_cost - reference_monthly_cost;
    let percent_vs_reference = if reference_monthly_cost > 0.0 {
        cost_vs_reference / reference_monthly_cost * 100.0
    } else {
        0.0
    };

    let saved_kwh = watts_to_monthly_kwh(energy_saved_watts(&snapshot.actuators, config));
    let saved_cost = saved_kwh * rate;

    CostEstimate {
        monthly_kwh,
        monthly_cost,
        reference_monthly_kwh: config.reference_monthly_kwh,
        reference_monthly_cost,
        cost_vs_reference,
        percent_vs_reference,
        saved_kwh,
        saved_cost,
        annual_savings: saved_cost * 12.0,
    }
}

/// Everything the dashboard header shows, computed in one pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub energy_saved_watts: f64,
    pub power: PowerDraw,
    pub cost: CostEstimate,
}

impl DashboardMetrics {
    pub fn compute(snapshot: &Snapshot, config: &EnergyConfig) -> Self {
        Self {
            energy_saved_watts: energy_saved_watts(&snapshot.actuators, config),
            power: power_draw(snapshot, config),
            cost: cost_estimate(snapshot, config),
        }
    }
}
