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

//! Polling / reconciliation loop.
//!
//! Each tick bulk-fetches both entity lists, merges them into the store,
//! updates connectivity and then refreshes every entity individually in
//! paced batches. Ticks run as separate tasks, each with its own
//! cancellation token; a new tick, a mode change or shutdown cancels the
//! previous one so stale results never land in the store.

use sentinel_api::{ErrorKind, IotApi, SampleQuery};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DataMode, PollerConfig};
use crate::connectivity;
use crate::demo::DemoSimulator;
use crate::diagnostics::RequestLogEntry;
use crate::fanout::{BatchReport, run_in_batches};
use crate::store::{DashboardStore, MergeOutcome};

const BULK_URL: &str = "/sensors/ + /actuators/";

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: DataMode,
    pub sensors: Option<MergeOutcome>,
    pub actuators: Option<MergeOutcome>,
    pub sensor_details: BatchReport,
    pub actuator_details: BatchReport,
    pub error: Option<ErrorKind>,
    pub cancelled: bool,
}

impl TickReport {
    fn new(mode: DataMode) -> Self {
        Self {
            mode,
            sensors: None,
            actuators: None,
            sensor_details: BatchReport::default(),
            actuator_details: BatchReport::default(),
            error: None,
            cancelled: false,
        }
    }

    fn cancelled(mut self) -> Self {
        self.cancelled = true;
        self
    }
}

pub struct Poller {
    api: Arc<dyn IotApi>,
    store: Arc<DashboardStore>,
    demo: Arc<DemoSimulator>,
    config: PollerConfig,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("api", &self.api.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Poller {
    pub fn new(
        api: Arc<dyn IotApi>,
        store: Arc<DashboardStore>,
        demo: Arc<DemoSimulator>,
        config: PollerConfig,
    ) -> Self {
        Self {
            api,
            store,
            demo,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run the loop until `shutdown` is cancelled.
    ///
    /// Ticks immediately on start and whenever the data mode changes.
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) {
        let mut mode_rx = self.store.watch_mode();
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<CancellationToken> = None;

        info!(
            "🔄 [POLL] Starting poll loop via {} (every {:?})",
            self.api.name(),
            self.config.interval
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => {}
                changed = mode_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    info!("🔀 [POLL] Data mode changed to {}", *mode_rx.borrow());
                    if let Some(token) = in_flight.take() {
                        token.cancel();
                    }
                    interval.reset_immediately();
                    continue;
                }
            }

            if let Some(token) = in_flight.take() {
                token.cancel();
            }

            let mode = *mode_rx.borrow_and_update();
            let token = shutdown.child_token();
            let poller = Arc::clone(&self);
            let tick_token = token.clone();
            tokio::spawn(async move {
                let report = poller.run_tick(mode, &tick_token).await;
                debug!("[POLL] Tick finished: {:?}", report);
            });
            in_flight = Some(token);
        }

        if let Some(token) = in_flight {
            token.cancel();
        }
        info!("🛑 [POLL] Poll loop stopped");
    }

    /// One reconciliation pass. Never fails; problems end up in the store.
    pub async fn run_tick(&self, mode: DataMode, cancel: &CancellationToken) -> TickReport {
        let report = TickReport::new(mode);
        if cancel.is_cancelled() {
            return report.cancelled();
        }

        match mode {
            DataMode::Demo => self.run_demo_tick(report),
            DataMode::Live | DataMode::Historical => self.run_network_tick(report, cancel).await,
        }
    }

    fn run_demo_tick(&self, mut report: TickReport) -> TickReport {
        let snapshot = self.store.snapshot();
        if DemoSimulator::is_demo_snapshot(&snapshot) {
            self.store
                .update_snapshot(|snapshot| self.demo.refresh_readings(snapshot));
            report.sensors = Some(MergeOutcome::Replaced(snapshot.sensors.len()));
            report.actuators = Some(MergeOutcome::Retained(snapshot.actuators.len()));
        } else {
            let seeded = self.demo.seed_snapshot();
            report.sensors = Some(MergeOutcome::Replaced(seeded.sensors.len()));
            report.actuators = Some(MergeOutcome::Replaced(seeded.actuators.len()));
            self.store.replace_snapshot(seeded);
            info!("🎭 [POLL] Demo snapshot seeded");
        }

        self.store.update_connection(connectivity::on_demo);
        report
    }

    async fn run_network_tick(
        &self,
        mut report: TickReport,
        cancel: &CancellationToken,
    ) -> TickReport {
        self.store.log_request(RequestLogEntry::request("GET", BULK_URL));
        let started = Instant::now();

        let bulk = tokio::select! {
            biased;
            () = cancel.cancelled() => return report.cancelled(),
            result = async {
                tokio::try_join!(self.api.list_sensors(), self.api.list_actuators())
            } => result,
        };
        let elapsed = started.elapsed();

        if cancel.is_cancelled() {
            return report.cancelled();
        }

        let (sensors, actuators) = match bulk {
            Ok(lists) => lists,
            Err(e) => {
                warn!("⚠️ [POLL] Bulk fetch failed ({}): {}", e.kind(), e);
                self.store.log_request(RequestLogEntry::failure(
                    "GET",
                    BULK_URL,
                    e.status(),
                    elapsed,
                    e.to_string(),
                ));
                self.store.record_request(elapsed, false);
                connectivity::record_failure(&self.store, &e);
                report.error = Some(e.kind());
                return report;
            }
        };

        self.store.log_request(RequestLogEntry::response(
            "GET",
            BULK_URL,
            200,
            elapsed,
            Some(json!({ "sensors": sensors.len(), "actuators": actuators.len() })),
        ));
        self.store.record_request(elapsed, true);

        let sensor_ids: Vec<String> = sensors.iter().map(|s| s.id.clone()).collect();
        let actuator_ids: Vec<String> = actuators.iter().map(|a| a.id.clone()).collect();

        let sensor_outcome = self.store.merge_sensors(sensors);
        let actuator_outcome = self.store.merge_actuators(actuators);
        if let MergeOutcome::Retained(kept) = sensor_outcome {
            info!("[POLL] No sensors returned, keeping {} known", kept);
        }
        if let MergeOutcome::Retained(kept) = actuator_outcome {
            info!("[POLL] No actuators returned, keeping {} known", kept);
        }
        report.sensors = Some(sensor_outcome);
        report.actuators = Some(actuator_outcome);

        connectivity::record_success(&self.store);

        let (sensor_details, actuator_details) = tokio::join!(
            self.refresh_samples(sensor_ids, report.mode, cancel),
            self.refresh_actuator_states(actuator_ids, cancel),
        );
        report.sensor_details = sensor_details;
        report.actuator_details = actuator_details;
        report.cancelled = sensor_details.cancelled || actuator_details.cancelled;

        info!(
            "✅ [POLL] {} tick: {}/{} samples, {}/{} actuator states",
            report.mode,
            sensor_details.succeeded,
            sensor_details.succeeded + sensor_details.failed,
            actuator_details.succeeded,
            actuator_details.succeeded + actuator_details.failed,
        );
        report
    }

    fn sample_query(&self, sensor_id: &str, mode: DataMode) -> SampleQuery {
        match mode {
            DataMode::Live => SampleQuery::latest(sensor_id),
            DataMode::Historical | DataMode::Demo => {
                SampleQuery::latest_before(sensor_id, self.config.historical_cutoff())
            }
        }
    }

    /// Newest sample per sensor. An empty answer keeps the known reading.
    async fn refresh_samples(
        &self,
        sensor_ids: Vec<String>,
        mode: DataMode,
        cancel: &CancellationToken,
    ) -> BatchReport {
        run_in_batches(sensor_ids, self.config.sensor_batch, cancel, |id| async move {
            let query = self.sample_query(&id, mode);
            match self.api.sensor_samples(&query).await {
                Ok(samples) => {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    if let Some(sample) = samples.first() {
                        self.store.apply_sensor_sample(&id, *sample);
                    }
                    true
                }
                Err(e) => {
                    debug!("[FANOUT] Skipped sensor {}: {}", id, e);
                    false
                }
            }
        })
        .await
    }

    async fn refresh_actuator_states(
        &self,
        actuator_ids: Vec<String>,
        cancel: &CancellationToken,
    ) -> BatchReport {
        run_in_batches(actuator_ids, self.config.actuator_batch, cancel, |id| async move {
            match self.api.actuator_state(&id).await {
                Ok(response) => {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    if let Some(state) = response.state {
                        self.store.apply_actuator_state(&id, state);
                    }
                    true
                }
                Err(e) => {
                    debug!("[FANOUT] Could not fetch state for actuator {}: {}", id, e);
                    false
                }
            }
        })
        .await
    }
}
