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

use async_trait::async_trait;

use crate::errors::ApiResult;
use crate::types::{
    ActuatorListing, ActuatorStateResponse, ActuatorValue, DataType, Sample, SampleQuery, Sensor,
};

/// Upstream IoT API as seen by the dashboard core.
///
/// [`crate::IotApiClient`] is the HTTP implementation; tests provide scripted fakes.
#[async_trait]
pub trait IotApi: Send + Sync {
    /// Full sensor list
    async fn list_sensors(&self) -> ApiResult<Vec<Sensor>>;

    /// Full actuator list (states may be missing)
    async fn list_actuators(&self) -> ApiResult<Vec<ActuatorListing>>;

    /// Samples of one sensor, filtered and sorted per `query`
    async fn sensor_samples(&self, query: &SampleQuery) -> ApiResult<Vec<Sample>>;

    /// Authoritative current state of one actuator
    async fn actuator_state(&self, actuator_id: &str) -> ApiResult<ActuatorStateResponse>;

    /// Write a new actuator state; the response may be malformed
    async fn set_actuator_state(
        &self,
        actuator_id: &str,
        data_type: DataType,
        value: ActuatorValue,
    ) -> ApiResult<ActuatorStateResponse>;

    /// Get data source name for logging
    fn name(&self) -> &str;
}
