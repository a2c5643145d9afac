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

//! JSON and CSV exports of the dashboard state.

use chrono::{DateTime, Utc};
use sentinel_api::{Actuator, Sensor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::activity::ActivityEvent;
use crate::config::{DataMode, EnergyConfig};
use crate::metrics::DashboardMetrics;
use crate::samples::ChartSeries;
use crate::store::DashboardStore;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not valid UTF-8")]
    Encoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Everything the dashboard shows, captured at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub mode: DataMode,
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<ChartSeries>,
    pub activity: Vec<ActivityEvent>,
    pub metrics: DashboardMetrics,
}

fn timestamp_to_iso(ts: f64) -> String {
    DateTime::<Utc>::from_timestamp_millis((ts * 1000.0) as i64)
        .map_or_else(|| "N/A".to_owned(), |dt| dt.to_rfc3339())
}

fn csv_section<I>(title: &str, headers: &[&str], rows: I) -> Result<String, ExportError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    let body = String::from_utf8(body).map_err(|_| ExportError::Encoding)?;
    Ok(format!("{title}\n{body}"))
}

impl ExportDocument {
    pub fn capture(
        store: &DashboardStore,
        energy: &EnergyConfig,
        samples: Option<ChartSeries>,
    ) -> Self {
        let snapshot = store.snapshot();
        let metrics = DashboardMetrics::compute(&snapshot, energy);
        Self {
            exported_at: Utc::now(),
            mode: store.mode(),
            sensors: snapshot.sensors,
            actuators: snapshot.actuators,
            samples,
            activity: store.activity(),
            metrics,
        }
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sensor, actuator and activity sections separated by blank lines
    pub fn to_csv(&self) -> Result<String, ExportError> {
        let sensors = csv_section(
            "SENSORS",
            &["ID", "Name", "Unit", "Data Type", "Last Value", "Last Updated"],
            self.sensors.iter().map(|s| {
                vec![
                    s.id.clone(),
                    s.name.clone(),
                    s.unit.clone(),
                    s.data_type.to_string(),
                    s.last_sample
                        .map_or_else(|| "N/A".to_owned(), |x| x.value.to_string()),
                    s.last_sample
                        .map_or_else(|| "N/A".to_owned(), |x| timestamp_to_iso(x.timestamp)),
                ]
            }),
        )?;

        let actuators = csv_section(
            "ACTUATORS",
            &["ID", "Name", "Unit", "Data Type", "State"],
            self.actuators.iter().map(|a| {
                vec![
                    a.id.clone(),
                    a.name.clone(),
                    a.unit.clone(),
                    a.data_type.to_string(),
                    a.state.display(),
                ]
            }),
        )?;

        let activity = csv_section(
            "ACTIVITY LOG",
            &["Timestamp", "Type", "Severity", "Message"],
            self.activity.iter().map(|e| {
                vec![
                    e.timestamp.to_rfc3339(),
                    e.kind.to_string(),
                    e.severity.to_string(),
                    e.message.clone(),
                ]
            }),
        )?;

        Ok([sensors, actuators, activity].join("\n"))
    }

    pub fn render(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => self.to_csv(),
        }
    }

    /// `sentinel-data-YYYY-MM-DD.<ext>`
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!(
            "sentinel-data-{}.{}",
            self.exported_at.format("%Y-%m-%d"),
            format.extension()
        )
    }

    /// Write the export into `dir` and return the file path
    pub fn write_to(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.file_name(format));
        std::fs::write(&path, self.render(format)?)?;
        info!("💾 [EXPORT] Wrote {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{NewEvent, Severity};
    use crate::config::StoreConfig;
    use crate::store::Snapshot;
    use sentinel_api::{ActuatorValue, DataType, Sample};

    fn store() -> DashboardStore {
        let store = DashboardStore::new(StoreConfig::default(), DataMode::Live);
        store.replace_snapshot(Snapshot {
            sensors: vec![
                Sensor {
                    id: "1".to_owned(),
                    name: "Main Power".to_owned(),
                    unit: "W".to_owned(),
                    data_type: DataType::Float,
                    last_sample: Some(Sample {
                        timestamp: 1_589_544_000.0,
                        value: 412.5,
                    }),
                },
                Sensor {
                    id: "2".to_owned(),
                    name: "Door, front".to_owned(),
                    unit: "BOOLEAN".to_owned(),
                    data_type: DataType::Boolean,
                    last_sample: None,
                },
            ],
            actuators: vec![Actuator {
                id: "a".to_owned(),
                name: "Fan".to_owned(),
                unit: "on/off".to_owned(),
                data_type: DataType::Boolean,
                state: ActuatorValue::Bool(true),
            }],
        });
        store.record_event(NewEvent::system(Severity::Success, "Connected"));
        store
    }

    #[test]
    fn test_csv_sections() {
        let doc = ExportDocument::capture(&store(), &EnergyConfig::default(), None);
        let csv = doc.to_csv().unwrap();

        assert!(csv.starts_with("SENSORS\n\"ID\",\"Name\""));
        assert!(csv.contains("\"1\",\"Main Power\",\"W\",\"FLOAT\",\"412.5\",\"2020-05-15T12:00:00+00:00\""));
        assert!(csv.contains("\"Door, front\",\"BOOLEAN\",\"BOOLEAN\",\"N/A\",\"N/A\""));
        assert!(csv.contains("\n\nACTUATORS\n"));
        assert!(csv.contains("\"a\",\"Fan\",\"on/off\",\"BOOLEAN\",\"ON\""));
        assert!(csv.contains("\n\nACTIVITY LOG\n"));
        assert!(csv.contains("\"system\",\"success\",\"Connected\""));
    }

    #[test]
    fn test_json_document() {
        let doc = ExportDocument::capture(&store(), &EnergyConfig::default(), None);
        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(value["mode"], "live");
        assert_eq!(value["sensors"][0]["lastSample"]["value"], 412.5);
        assert_eq!(value["actuators"][0]["state"], true);
        assert!(value.get("samples").is_none());
        assert_eq!(value["metrics"]["power"]["source"], "measured");
    }

    #[test]
    fn test_file_name() {
        let doc = ExportDocument::capture(&store(), &EnergyConfig::default(), None);
        let name = doc.file_name(ExportFormat::Csv);
        assert!(name.starts_with("sentinel-data-"));
        assert!(name.ends_with(".csv"));
    }
}
