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

//! Line-based operator console on stdin/stdout.

use anyhow::Result;
use sentinel_api::CompletionClient;
use sentinel_core::{
    ActivityEvent, ActuatorCommand, ChartSeries, CommandOutcome, Dashboard, DataMode, ExportFormat,
    RequestLogEntry, Snapshot,
};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::io::BufRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SummaryConfig;

const HELP: &str = "\
Commands:
  status                 Mode, connectivity, request stats and metrics
  sensors                Latest sensor readings
  actuators              Actuator states
  mode <live|historical|demo>
  toggle <actuator-id>   Flip a switch
  set <actuator-id> <v>  Set a numeric actuator
  chart <sensor-id>      Load chart samples for a sensor
  export <json|csv> [dir]
  summary                Ask the AI service for a summary
  activity [n]           Recent activity, newest first
  log [n]                Recent API requests
  help
  quit";

const DEFAULT_LISTING: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Status,
    Sensors,
    Actuators,
    Mode(DataMode),
    Execute {
        actuator_id: String,
        command: ActuatorCommand,
    },
    Chart(String),
    Export {
        format: ExportFormat,
        dir: PathBuf,
    },
    Summary,
    Activity(usize),
    Log(usize),
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line. `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = parts.collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("status", []) => Self::Status,
            ("sensors", []) => Self::Sensors,
            ("actuators", []) => Self::Actuators,
            ("mode", [mode]) => {
                Self::Mode(mode.parse::<DataMode>().map_err(|e| e.to_string())?)
            }
            ("toggle", [id]) => Self::Execute {
                actuator_id: (*id).to_owned(),
                command: ActuatorCommand::Toggle,
            },
            ("set", [id, value]) => Self::Execute {
                actuator_id: (*id).to_owned(),
                command: ActuatorCommand::Set(
                    value
                        .parse::<f64>()
                        .map_err(|_| format!("'{value}' is not a number"))?,
                ),
            },
            ("chart", [id]) => Self::Chart((*id).to_owned()),
            ("export", [format, rest @ ..]) if rest.len() <= 1 => Self::Export {
                format: parse_format(format)?,
                dir: rest
                    .first()
                    .map_or_else(|| PathBuf::from("."), |dir| PathBuf::from(*dir)),
            },
            ("summary", []) => Self::Summary,
            ("activity", rest) if rest.len() <= 1 => Self::Activity(parse_count(rest)?),
            ("log", rest) if rest.len() <= 1 => Self::Log(parse_count(rest)?),
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => return Err(format!("Unrecognized command '{}'; try 'help'", line.trim())),
        };

        Ok(Some(command))
    }
}

/// Stdin lines from a dedicated thread. A blocked read must not keep the
/// runtime from shutting down.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("console-stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn parse_format(format: &str) -> Result<ExportFormat, String> {
    match format.to_lowercase().as_str() {
        "json" => Ok(ExportFormat::Json),
        "csv" => Ok(ExportFormat::Csv),
        other => Err(format!("Unknown export format '{other}' (expected json or csv)")),
    }
}

fn parse_count(args: &[&str]) -> Result<usize, String> {
    match args.first() {
        Some(n) => n.parse().map_err(|_| format!("'{n}' is not a count")),
        None => Ok(DEFAULT_LISTING),
    }
}

/// Console session state
#[derive(Debug)]
pub struct Console<'a> {
    dashboard: &'a Dashboard,
    summary: &'a SummaryConfig,
    /// Last chart loaded, included in exports
    last_chart: Option<ChartSeries>,
}

impl<'a> Console<'a> {
    pub fn new(dashboard: &'a Dashboard, summary: &'a SummaryConfig) -> Self {
        Self {
            dashboard,
            summary,
            last_chart: None,
        }
    }

    /// Read commands until `quit` or shutdown
    pub async fn run(mut self, shutdown: &CancellationToken) -> Result<()> {
        let mut lines = spawn_stdin_reader()?;
        println!("Sentinel console ready. Type 'help' for commands.");

        loop {
            let line = tokio::select! {
                () = shutdown.cancelled() => break,
                line = lines.recv() => line,
            };

            // Without stdin keep polling until the shutdown signal
            let Some(line) = line else {
                debug!("[CONSOLE] stdin closed, waiting for shutdown");
                shutdown.cancelled().await;
                break;
            };

            match ConsoleCommand::parse(&line) {
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => println!("{}", self.handle(command).await),
                Ok(None) => {}
                Err(message) => println!("{message}"),
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: ConsoleCommand) -> String {
        let store = self.dashboard.store();
        match command {
            ConsoleCommand::Status => render_status(self.dashboard),
            ConsoleCommand::Sensors => render_sensors(&store.snapshot()),
            ConsoleCommand::Actuators => render_actuators(&store.snapshot()),
            ConsoleCommand::Mode(mode) => {
                if self.dashboard.set_mode(mode) {
                    info!("[CONSOLE] Data mode switched to {}", mode);
                    format!("Data mode set to {mode}")
                } else {
                    format!("Already in {mode} mode")
                }
            }
            ConsoleCommand::Execute {
                actuator_id,
                command,
            } => match self.dashboard.execute(&actuator_id, command).await {
                Ok(outcome) => render_outcome(&actuator_id, &outcome),
                Err(e) => format!("Command rejected: {e}"),
            },
            ConsoleCommand::Chart(sensor_id) => match self.dashboard.chart(&sensor_id).await {
                Some(series) => {
                    let rendered = render_chart(&series);
                    self.last_chart = Some(series);
                    rendered
                }
                None => format!("Unknown sensor: {sensor_id}"),
            },
            ConsoleCommand::Export { format, dir } => {
                let document = self.dashboard.export(self.last_chart.clone());
                match document.write_to(&dir, format) {
                    Ok(path) => format!("Exported to {}", path.display()),
                    Err(e) => format!("Export failed: {e}"),
                }
            }
            ConsoleCommand::Summary => self.summarize().await,
            ConsoleCommand::Activity(count) => render_activity(&store.activity(), count),
            ConsoleCommand::Log(count) => render_request_log(&store.request_log(), count),
            ConsoleCommand::Help => HELP.to_owned(),
            ConsoleCommand::Quit => String::new(),
        }
    }

    async fn summarize(&self) -> String {
        if !self.summary.enabled {
            return "AI summary is disabled (set summary.enabled = true)".to_owned();
        }

        let provider = match CompletionClient::from_env(
            self.summary.base_url.clone(),
            self.summary.model.clone(),
        ) {
            Ok(provider) => provider,
            Err(e) => return format!("AI summary unavailable: {e}"),
        };

        match self.dashboard.summary(&provider).await {
            Ok(Some(text)) => text,
            Ok(None) => "Nothing to summarize yet".to_owned(),
            Err(e) => {
                warn!("[SUMMARY] Request failed: {}", e);
                format!("AI summary failed: {e}")
            }
        }
    }
}

fn render_status(dashboard: &Dashboard) -> String {
    let store = dashboard.store();
    let connection = store.connection();
    let stats = store.stats();
    let metrics = dashboard.metrics();

    let mut out = String::new();
    let _ = writeln!(out, "Mode:         {}", store.mode());
    let _ = writeln!(
        out,
        "Connection:   {}",
        if connection.connected {
            "connected"
        } else {
            "disconnected"
        }
    );
    if let Some(issue) = &connection.last_issue {
        let _ = writeln!(out, "Last issue:   {} ({})", issue.message, issue.kind);
    }
    let _ = writeln!(
        out,
        "Requests:     {} total, {:.0}% ok, avg {}",
        stats.total_requests,
        stats.success_rate(),
        stats
            .average_latency_ms
            .map_or_else(|| "n/a".to_owned(), |ms| format!("{ms:.0} ms"))
    );
    let _ = writeln!(
        out,
        "Power:        {:.0} W ({:?}, {} actuators on)",
        metrics.power.watts, metrics.power.source, metrics.power.enabled_actuators
    );
    let _ = writeln!(out, "Energy saved: {:.0} W", metrics.energy_saved_watts);
    let _ = write!(
        out,
        "Monthly cost: ${:.2} ({:+.1}% vs reference), annual savings ${:.2}",
        metrics.cost.monthly_cost, metrics.cost.percent_vs_reference, metrics.cost.annual_savings
    );
    out
}

fn render_sensors(snapshot: &Snapshot) -> String {
    if snapshot.sensors.is_empty() {
        return "No sensors known yet".to_owned();
    }

    let mut out = String::new();
    for sensor in &snapshot.sensors {
        let reading = sensor
            .last_sample
            .map_or_else(|| "--".to_owned(), |s| format!("{:.1} {}", s.value, sensor.unit));
        let _ = writeln!(out, "{:<12} {:<28} {}", sensor.id, sensor.name, reading.trim_end());
    }
    out.trim_end().to_owned()
}

fn render_actuators(snapshot: &Snapshot) -> String {
    if snapshot.actuators.is_empty() {
        return "No actuators known yet".to_owned();
    }

    let mut out = String::new();
    for actuator in &snapshot.actuators {
        let _ = writeln!(
            out,
            "{:<12} {:<28} {:<6} [{}]",
            actuator.id, actuator.name, actuator.state, actuator.data_type
        );
    }
    out.trim_end().to_owned()
}

fn render_outcome(actuator_id: &str, outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Simulated { value } => format!("{actuator_id} -> {value} (simulated)"),
        CommandOutcome::Confirmed { value } => format!("{actuator_id} -> {value} (confirmed)"),
        CommandOutcome::KeptOptimistic { value } => {
            format!("{actuator_id} -> {value} (sent, no confirmation)")
        }
        CommandOutcome::KeptLocally { value, error } => {
            format!("{actuator_id} -> {value} (kept locally, upstream {error})")
        }
        CommandOutcome::Reverted { previous, error } => {
            format!("{actuator_id} reverted to {previous} (upstream {error})")
        }
    }
}

fn render_chart(series: &ChartSeries) -> String {
    let values: Vec<f64> = series.samples.iter().map(|s| s.value).collect();
    if values.is_empty() {
        return format!("{}: no samples", series.sensor_id);
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let last = values.last().copied().unwrap_or_default();
    format!(
        "{}: {} samples{} min {:.1} max {:.1} last {:.1}",
        series.sensor_id,
        values.len(),
        if series.synthetic { " (synthetic)" } else { "" },
        min,
        max,
        last
    )
}

fn render_activity(events: &[ActivityEvent], count: usize) -> String {
    if events.is_empty() {
        return "No activity yet".to_owned();
    }

    events
        .iter()
        .take(count)
        .map(|e| {
            format!(
                "{} [{:<7}] {:<8} {}",
                e.timestamp.format("%H:%M:%S"),
                e.severity,
                e.kind,
                e.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_request_log(entries: &[RequestLogEntry], count: usize) -> String {
    if entries.is_empty() {
        return "No requests logged yet".to_owned();
    }

    let skip = entries.len().saturating_sub(count);
    entries
        .iter()
        .skip(skip)
        .map(|e| {
            let mut line = format!(
                "{} {:?} {} {}",
                e.timestamp.format("%H:%M:%S"),
                e.phase,
                e.method,
                e.url
            );
            if let Some(status) = e.status {
                let _ = write!(line, " {status}");
            }
            if let Some(ms) = e.duration_ms {
                let _ = write!(line, " {ms}ms");
            }
            if let Some(error) = &e.error {
                let _ = write!(line, " ({error})");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
