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

//! Chart data for a single sensor. Falls back to a synthetic series around
//! the current reading when the upstream has nothing or fails.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sentinel_api::{IotApi, Sample, SampleQuery, Sensor};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{DataMode, TemperatureScale};
use crate::units;

const CHART_LIMIT: u32 = 200;
const HOUR: f64 = 3600.0;
const SPACING: f64 = 1800.0;
const FALLBACK_BASE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub sensor_id: String,
    pub samples: Vec<Sample>,
    /// Generated locally rather than fetched
    pub synthetic: bool,
}

pub struct ChartLoader {
    api: Arc<dyn IotApi>,
    reference_timestamp: f64,
    scale: TemperatureScale,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for ChartLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartLoader")
            .field("reference_timestamp", &self.reference_timestamp)
            .field("scale", &self.scale)
            .finish_non_exhaustive()
    }
}

/// `count` points spaced 30 minutes apart from `start`, each within
/// `±variation` of `base`
fn synthesize(rng: &mut impl Rng, base: f64, variation: f64, start: f64, count: usize) -> Vec<Sample> {
    let variation = variation.abs();
    (0..count)
        .map(|i| Sample {
            timestamp: start + i as f64 * SPACING,
            value: base + rng.gen_range(-variation..=variation),
        })
        .collect()
}

impl ChartLoader {
    pub fn new(api: Arc<dyn IotApi>, reference_timestamp: f64, scale: TemperatureScale) -> Self {
        Self {
            api,
            reference_timestamp,
            scale,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn query(&self, sensor: &Sensor, mode: DataMode, now: f64) -> SampleQuery {
        match mode {
            DataMode::Live => SampleQuery::window(&sensor.id, Some(now - 24.0 * HOUR), None, CHART_LIMIT),
            DataMode::Historical | DataMode::Demo => SampleQuery::window(
                &sensor.id,
                Some(self.reference_timestamp - 12.0 * HOUR),
                Some(self.reference_timestamp + 12.0 * HOUR),
                CHART_LIMIT,
            ),
        }
    }

    fn synthetic(&self, sensor: &Sensor, variation: f64, start: f64, count: usize) -> ChartSeries {
        let base = sensor.last_sample.map_or(FALLBACK_BASE, |s| s.value);
        let samples = synthesize(&mut *self.rng.lock(), base, base * variation, start, count);
        ChartSeries {
            sensor_id: sensor.id.clone(),
            samples,
            synthetic: true,
        }
    }

    /// Load chart samples for `sensor` (as held in the store)
    pub async fn load(&self, sensor: &Sensor, mode: DataMode) -> ChartSeries {
        let now = Utc::now().timestamp() as f64;

        if mode == DataMode::Demo {
            return self.synthetic(sensor, 0.1, now - 50.0 * SPACING, 50);
        }

        debug!("[CHART] Fetching samples for {} ({} mode)", sensor.name, mode);
        match self.api.sensor_samples(&self.query(sensor, mode, now)).await {
            Ok(samples) if !samples.is_empty() => {
                info!("📈 [CHART] {} samples for {}", samples.len(), sensor.name);
                let mut samples: Vec<Sample> = samples
                    .into_iter()
                    .map(|s| units::sample_to_display(s, sensor, self.scale))
                    .collect();
                samples.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
                ChartSeries {
                    sensor_id: sensor.id.clone(),
                    samples,
                    synthetic: false,
                }
            }
            Ok(_) => {
                info!("[CHART] No data for {}, using simulated trend", sensor.name);
                let start = match mode {
                    DataMode::Live => now - 30.0 * SPACING,
                    DataMode::Historical | DataMode::Demo => self.reference_timestamp - 15.0 * HOUR,
                };
                self.synthetic(sensor, 0.05, start, 30)
            }
            Err(e) => {
                warn!("⚠️ [CHART] Could not fetch samples for {}: {}", sensor.name, e);
                let start = match mode {
                    DataMode::Live => now - 20.0 * SPACING,
                    DataMode::Historical | DataMode::Demo => self.reference_timestamp - 10.0 * HOUR,
                };
                self.synthetic(sensor, 0.05, start, 20)
            }
        }
    }
}
