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

//! Single owner of the dashboard state.
//!
//! The poll loop and the command handler are the only writers. Every write
//! goes through one of the operations below; each takes the lock for a short
//! synchronous section (never across an `.await`) and bumps a revision
//! counter readers can subscribe to.

use parking_lot::RwLock;
use sentinel_api::{Actuator, ActuatorListing, ActuatorValue, ErrorKind, Sample, Sensor};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::activity::{ActivityEvent, ActivityLog, NewEvent};
use crate::config::{DataMode, StoreConfig, TemperatureScale};
use crate::diagnostics::{ApiStats, RequestLog, RequestLogEntry};
use crate::metrics;
use crate::units;

/// Sensors and actuators in upstream order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
}

impl Snapshot {
    pub fn sensor(&self, id: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id == id)
    }

    pub fn actuator(&self, id: &str) -> Option<&Actuator> {
        self.actuators.iter().find(|a| a.id == id)
    }

    pub fn sensor_mut(&mut self, id: &str) -> Option<&mut Sensor> {
        self.sensors.iter_mut().find(|s| s.id == id)
    }

    pub fn actuator_mut(&mut self, id: &str) -> Option<&mut Actuator> {
        self.actuators.iter_mut().find(|a| a.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.actuators.is_empty()
    }
}

/// Last connectivity problem the poll loop saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionIssue {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_issue: Option<ConnectionIssue>,
}

/// Result of merging a bulk listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The category was replaced by this many entities
    Replaced(usize),
    /// The listing was empty; this many known entities were kept
    Retained(usize),
}

#[derive(Debug)]
struct StoreState {
    snapshot: Snapshot,
    activity: ActivityLog,
    requests: RequestLog,
    stats: ApiStats,
    connection: ConnectionStatus,
}

#[derive(Debug)]
pub struct DashboardStore {
    state: RwLock<StoreState>,
    scale: TemperatureScale,
    revision: watch::Sender<u64>,
    mode: watch::Sender<DataMode>,
}

impl DashboardStore {
    pub fn new(config: StoreConfig, mode: DataMode) -> Self {
        Self {
            state: RwLock::new(StoreState {
                snapshot: Snapshot::default(),
                activity: ActivityLog::new(config.activity_capacity),
                requests: RequestLog::new(config.request_log_capacity),
                stats: ApiStats::default(),
                connection: ConnectionStatus::default(),
            }),
            scale: config.temperature_scale,
            revision: watch::Sender::new(0),
            mode: watch::Sender::new(mode),
        }
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Run a snapshot mutation and record the changes it caused
    fn mutate_snapshot<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let result = {
            let mut state = self.state.write();
            let previous = state.snapshot.clone();
            let result = f(&mut state.snapshot);
            for event in metrics::detect_changes(&previous, &state.snapshot) {
                trace!("[STORE] {}", event.message);
                state.activity.push(event);
            }
            result
        };
        self.bump();
        result
    }

    // --- readers ---

    pub fn snapshot(&self) -> Snapshot {
        self.state.read().snapshot.clone()
    }

    pub fn actuator(&self, id: &str) -> Option<Actuator> {
        self.state.read().snapshot.actuator(id).cloned()
    }

    pub fn sensor(&self, id: &str) -> Option<Sensor> {
        self.state.read().snapshot.sensor(id).cloned()
    }

    /// Activity feed, newest first
    pub fn activity(&self) -> Vec<ActivityEvent> {
        self.state.read().activity.iter().cloned().collect()
    }

    /// Request log, oldest first
    pub fn request_log(&self) -> Vec<RequestLogEntry> {
        self.state.read().requests.iter().cloned().collect()
    }

    pub fn stats(&self) -> ApiStats {
        self.state.read().stats
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.state.read().connection.clone()
    }

    pub fn temperature_scale(&self) -> TemperatureScale {
        self.scale
    }

    /// Revision counter, bumped on every write
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    // --- data mode ---

    pub fn mode(&self) -> DataMode {
        *self.mode.borrow()
    }

    /// Switch the data mode; returns false when it was already active
    pub fn set_mode(&self, mode: DataMode) -> bool {
        let changed = self.mode.send_if_modified(|current| {
            if *current == mode {
                false
            } else {
                *current = mode;
                true
            }
        });
        if changed {
            debug!("[STORE] Data mode switched to {}", mode);
            self.bump();
        }
        changed
    }

    pub fn watch_mode(&self) -> watch::Receiver<DataMode> {
        self.mode.subscribe()
    }

    // --- snapshot writes ---

    /// Merge a sensor listing. An empty listing never clears known sensors.
    pub fn merge_sensors(&self, incoming: Vec<Sensor>) -> MergeOutcome {
        if incoming.is_empty() {
            return MergeOutcome::Retained(self.state.read().snapshot.sensors.len());
        }

        let scale = self.scale;
        self.mutate_snapshot(|snapshot| {
            let merged: Vec<Sensor> = incoming
                .into_iter()
                .map(|sensor| {
                    let mut sensor = units::normalize_sensor(sensor, scale);
                    if sensor.last_sample.is_none() {
                        sensor.last_sample =
                            snapshot.sensor(&sensor.id).and_then(|known| known.last_sample);
                    }
                    sensor
                })
                .collect();
            snapshot.sensors = merged;
            MergeOutcome::Replaced(snapshot.sensors.len())
        })
    }

    /// Merge an actuator listing. State falls back to the known value, then
    /// to the type default. Stored states always match the declared type.
    pub fn merge_actuators(&self, incoming: Vec<ActuatorListing>) -> MergeOutcome {
        if incoming.is_empty() {
            return MergeOutcome::Retained(self.state.read().snapshot.actuators.len());
        }

        self.mutate_snapshot(|snapshot| {
            let merged: Vec<Actuator> = incoming
                .into_iter()
                .map(|listing| {
                    let state = listing
                        .state
                        .or_else(|| snapshot.actuator(&listing.id).map(|known| known.state))
                        .map_or_else(
                            || listing.data_type.default_value(),
                            |state| listing.data_type.coerce(state),
                        );
                    Actuator {
                        unit: units::actuator_unit(listing.data_type).to_owned(),
                        id: listing.id,
                        name: listing.name,
                        data_type: listing.data_type,
                        state,
                    }
                })
                .collect();
            snapshot.actuators = merged;
            MergeOutcome::Replaced(snapshot.actuators.len())
        })
    }

    /// Apply an upstream sample from the detail fan-out. Unknown ids are ignored.
    pub fn apply_sensor_sample(&self, sensor_id: &str, sample: Sample) -> bool {
        let scale = self.scale;
        self.mutate_snapshot(|snapshot| match snapshot.sensor_mut(sensor_id) {
            Some(sensor) => {
                sensor.last_sample = Some(units::sample_to_display(sample, sensor, scale));
                true
            }
            None => false,
        })
    }

    /// Apply a state from the detail fan-out. Unknown ids are ignored.
    pub fn apply_actuator_state(&self, actuator_id: &str, state: ActuatorValue) -> bool {
        self.set_actuator(actuator_id, state).is_some()
    }

    /// Optimistically set an actuator; returns the value it replaced
    pub fn apply_optimistic_write(
        &self,
        actuator_id: &str,
        value: ActuatorValue,
    ) -> Option<ActuatorValue> {
        self.set_actuator(actuator_id, value)
    }

    /// Replace an optimistic value with the upstream-confirmed one
    pub fn confirm_write(&self, actuator_id: &str, confirmed: ActuatorValue) -> bool {
        self.set_actuator(actuator_id, confirmed).is_some()
    }

    /// Roll an optimistic value back
    pub fn revert_write(&self, actuator_id: &str, previous: ActuatorValue) -> bool {
        self.set_actuator(actuator_id, previous).is_some()
    }

    /// Upstream may report a switch as `1`/`0`; states are coerced to the
    /// declared type before they land in the snapshot.
    fn set_actuator(&self, actuator_id: &str, value: ActuatorValue) -> Option<ActuatorValue> {
        self.mutate_snapshot(|snapshot| {
            snapshot.actuator_mut(actuator_id).map(|actuator| {
                let value = actuator.data_type.coerce(value);
                std::mem::replace(&mut actuator.state, value)
            })
        })
    }

    pub fn replace_snapshot(&self, snapshot: Snapshot) {
        self.mutate_snapshot(|current| *current = snapshot);
    }

    pub fn update_snapshot<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        self.mutate_snapshot(f)
    }

    // --- activity, diagnostics, stats, connection ---

    pub fn record_event(&self, event: NewEvent) -> u64 {
        let id = self.state.write().activity.push(event);
        self.bump();
        id
    }

    pub fn log_request(&self, entry: RequestLogEntry) {
        self.state.write().requests.push(entry);
        self.bump();
    }

    pub fn record_request(&self, latency: Duration, success: bool) {
        self.state.write().stats.record(latency, success);
        self.bump();
    }

    /// Update the connection status; an event returned by `f` goes to the feed
    pub fn update_connection(
        &self,
        f: impl FnOnce(&mut ConnectionStatus) -> Option<NewEvent>,
    ) -> Option<u64> {
        let id = {
            let mut state = self.state.write();
            let event = f(&mut state.connection);
            event.map(|event| state.activity.push(event))
        };
        self.bump();
        id
    }
}
