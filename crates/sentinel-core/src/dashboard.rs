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

//! Wiring of store, poll loop, command handler and chart loader behind one
//! handle for the binary and the tests.

use sentinel_api::{ApiResult, IotApi, SummaryProvider};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{ActuatorCommand, CommandError, CommandHandler, CommandOutcome};
use crate::config::{DataMode, EnergyConfig, PollerConfig, StoreConfig};
use crate::demo::{CouplingTable, DemoSimulator};
use crate::export::ExportDocument;
use crate::metrics::DashboardMetrics;
use crate::poller::{Poller, TickReport};
use crate::samples::{ChartLoader, ChartSeries};
use crate::store::DashboardStore;
use crate::summary;

#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub mode: DataMode,
    pub poller: PollerConfig,
    pub store: StoreConfig,
    pub energy: EnergyConfig,
    pub coupling: CouplingTable,
    /// Fixed seed for the simulated data, random when unset
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub struct Dashboard {
    store: Arc<DashboardStore>,
    poller: Arc<Poller>,
    commands: CommandHandler,
    charts: ChartLoader,
    energy: EnergyConfig,
}

impl Dashboard {
    pub fn new(api: Arc<dyn IotApi>, config: DashboardConfig) -> Self {
        let store = Arc::new(DashboardStore::new(config.store, config.mode));
        let demo = Arc::new(match config.seed {
            Some(seed) => DemoSimulator::seeded(config.coupling, seed),
            None => DemoSimulator::new(config.coupling),
        });

        let mut charts = ChartLoader::new(
            Arc::clone(&api),
            config.poller.reference_timestamp,
            config.store.temperature_scale,
        );
        if let Some(seed) = config.seed {
            charts = charts.with_seed(seed);
        }

        Self {
            poller: Arc::new(Poller::new(
                Arc::clone(&api),
                Arc::clone(&store),
                Arc::clone(&demo),
                config.poller,
            )),
            commands: CommandHandler::new(api, Arc::clone(&store), demo),
            charts,
            store,
            energy: config.energy,
        }
    }

    pub fn store(&self) -> &Arc<DashboardStore> {
        &self.store
    }

    pub fn energy(&self) -> &EnergyConfig {
        &self.energy
    }

    /// Start the poll loop on the runtime
    pub fn spawn_poller(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.poller).start(shutdown))
    }

    /// Run a single tick in the current mode
    pub async fn poll_once(&self) -> TickReport {
        self.poller
            .run_tick(self.store.mode(), &CancellationToken::new())
            .await
    }

    pub fn set_mode(&self, mode: DataMode) -> bool {
        self.store.set_mode(mode)
    }

    pub async fn execute(
        &self,
        actuator_id: &str,
        command: ActuatorCommand,
    ) -> Result<CommandOutcome, CommandError> {
        self.commands.execute(actuator_id, command).await
    }

    pub fn metrics(&self) -> DashboardMetrics {
        DashboardMetrics::compute(&self.store.snapshot(), &self.energy)
    }

    /// Chart series for a known sensor
    pub async fn chart(&self, sensor_id: &str) -> Option<ChartSeries> {
        let sensor = self.store.sensor(sensor_id)?;
        Some(self.charts.load(&sensor, self.store.mode()).await)
    }

    pub fn export(&self, samples: Option<ChartSeries>) -> ExportDocument {
        ExportDocument::capture(&self.store, &self.energy, samples)
    }

    pub async fn summary(&self, provider: &dyn SummaryProvider) -> ApiResult<Option<String>> {
        summary::request_summary(provider, &self.store, &self.energy).await
    }
}
