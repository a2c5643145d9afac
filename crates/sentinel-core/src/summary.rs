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

use sentinel_api::{ApiResult, SummaryProvider, SummaryRequest};
use tracing::debug;

use crate::config::EnergyConfig;
use crate::metrics;
use crate::store::DashboardStore;

/// Build a summary request from the current snapshot
pub fn summary_request(store: &DashboardStore, energy: &EnergyConfig) -> SummaryRequest {
    let snapshot = store.snapshot();
    let energy_saved = metrics::energy_saved_watts(&snapshot.actuators, energy);
    SummaryRequest {
        sensors: snapshot.sensors,
        actuators: snapshot.actuators,
        energy_saved,
    }
}

/// Ask `provider` for a summary of the dashboard.
///
/// Returns `Ok(None)` when there is nothing to summarize. Provider errors go
/// back to the caller and leave the store untouched.
pub async fn request_summary(
    provider: &dyn SummaryProvider,
    store: &DashboardStore,
    energy: &EnergyConfig,
) -> ApiResult<Option<String>> {
    let request = summary_request(store, energy);
    if request.is_empty() {
        debug!("[SUMMARY] Nothing to summarize yet");
        return Ok(None);
    }

    provider.summarize(&request).await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataMode, StoreConfig};
    use crate::store::Snapshot;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sentinel_api::{Actuator, ActuatorValue, ApiError, DataType};

    #[derive(Default)]
    struct RecordingProvider {
        seen: Mutex<Vec<SummaryRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl SummaryProvider for RecordingProvider {
        async fn summarize(&self, request: &SummaryRequest) -> ApiResult<String> {
            self.seen.lock().push(request.clone());
            if self.fail {
                Err(ApiError::RateLimited {
                    retry_after_secs: None,
                })
            } else {
                Ok("All systems nominal.".to_owned())
            }
        }
    }

    fn store_with_fan() -> DashboardStore {
        let store = DashboardStore::new(StoreConfig::default(), DataMode::Demo);
        store.replace_snapshot(Snapshot {
            sensors: vec![],
            actuators: vec![Actuator {
                id: "a".to_owned(),
                name: "Fan".to_owned(),
                unit: "on/off".to_owned(),
                data_type: DataType::Boolean,
                state: ActuatorValue::Bool(false),
            }],
        });
        store
    }

    #[tokio::test]
    async fn test_skipped_when_empty() {
        let provider = RecordingProvider::default();
        let store = DashboardStore::new(StoreConfig::default(), DataMode::Live);

        let result = request_summary(&provider, &store, &EnergyConfig::default()).await;
        assert!(matches!(result, Ok(None)));
        assert!(provider.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_energy_saved() {
        let provider = RecordingProvider::default();
        let store = store_with_fan();

        let summary = request_summary(&provider, &store, &EnergyConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.as_deref(), Some("All systems nominal."));
        assert!((provider.seen.lock()[0].energy_saved - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failure_leaves_store_alone() {
        let provider = RecordingProvider {
            fail: true,
            ..RecordingProvider::default()
        };
        let store = store_with_fan();
        let revision = store.revision();

        let result = request_summary(&provider, &store, &EnergyConfig::default()).await;
        assert!(result.is_err());
        assert_eq!(store.revision(), revision);
        assert!(store.activity().is_empty());
    }
}
