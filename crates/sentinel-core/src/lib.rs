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

//! Dashboard engine: state store, polling/reconciliation loop, optimistic
//! actuator commands and derived metrics on top of `sentinel-api`.

pub mod activity;
pub mod commands;
pub mod config;
pub mod connectivity;
pub mod dashboard;
pub mod demo;
pub mod diagnostics;
pub mod export;
pub mod fanout;
pub mod metrics;
pub mod poller;
pub mod samples;
pub mod store;
pub mod summary;
pub mod units;

pub use activity::{ActivityEvent, EventKind, NewEvent, Severity};
pub use commands::{ActuatorCommand, CommandError, CommandHandler, CommandOutcome};
pub use config::{DataMode, EnergyConfig, PollerConfig, StoreConfig, TemperatureScale};
pub use dashboard::{Dashboard, DashboardConfig};
pub use demo::{CouplingTable, DemoSimulator};
pub use diagnostics::{ApiStats, RequestLogEntry};
pub use export::{ExportDocument, ExportError, ExportFormat};
pub use fanout::{BatchPlan, BatchReport};
pub use metrics::DashboardMetrics;
pub use poller::{Poller, TickReport};
pub use samples::{ChartLoader, ChartSeries};
pub use store::{ConnectionStatus, DashboardStore, MergeOutcome, Snapshot};
