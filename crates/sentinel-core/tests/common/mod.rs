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

//! Scripted in-memory IoT API for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sentinel_api::{
    ActuatorListing, ActuatorStateResponse, ActuatorValue, ApiError, ApiResult, DataType, IotApi,
    Sample, SampleQuery, Sensor,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

pub fn rate_limited() -> ApiError {
    ApiError::RateLimited {
        retry_after_secs: None,
    }
}

pub fn bad_gateway() -> ApiError {
    ApiError::GatewayUnavailable { status: 502 }
}

pub fn server_error() -> ApiError {
    ApiError::ApiError {
        status: 500,
        message: "Unexpected server fault".to_owned(),
    }
}

pub fn not_found() -> ApiError {
    ApiError::NotFound("actuator".to_owned())
}

/// How the next actuator write is answered
#[derive(Clone, Copy)]
pub enum WriteScript {
    /// Echo the written value back as confirmed
    Echo,
    /// Confirm a different value
    ConfirmAs(ActuatorValue),
    /// Success status, unusable body
    Malformed,
    Fail(fn() -> ApiError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListSensors,
    ListActuators,
    Samples(SampleQuery),
    ActuatorState(String),
    SetState(String, ActuatorValue),
}

struct FakeState {
    sensors: Vec<Sensor>,
    actuators: Vec<ActuatorListing>,
    list_failures: VecDeque<fn() -> ApiError>,
    samples: HashMap<String, Vec<Sample>>,
    failing_samples: HashSet<String>,
    states: HashMap<String, ActuatorValue>,
    write: WriteScript,
    detail_delay: Duration,
    write_delay: Duration,
    calls: Vec<(Call, Instant)>,
}

pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                sensors: Vec::new(),
                actuators: Vec::new(),
                list_failures: VecDeque::new(),
                samples: HashMap::new(),
                failing_samples: HashSet::new(),
                states: HashMap::new(),
                write: WriteScript::Echo,
                detail_delay: Duration::ZERO,
                write_delay: Duration::ZERO,
                calls: Vec::new(),
            }),
        }
    }

    pub fn set_sensors(&self, sensors: Vec<Sensor>) {
        self.state.lock().sensors = sensors;
    }

    pub fn set_actuators(&self, actuators: Vec<ActuatorListing>) {
        self.state.lock().actuators = actuators;
    }

    /// Fail the next bulk fetch with the given error
    pub fn fail_next_list(&self, error: fn() -> ApiError) {
        self.state.lock().list_failures.push_back(error);
    }

    pub fn set_samples(&self, sensor_id: &str, samples: Vec<Sample>) {
        self.state.lock().samples.insert(sensor_id.to_owned(), samples);
    }

    pub fn fail_samples_for(&self, sensor_id: &str) {
        self.state.lock().failing_samples.insert(sensor_id.to_owned());
    }

    pub fn set_state(&self, actuator_id: &str, value: ActuatorValue) {
        self.state.lock().states.insert(actuator_id.to_owned(), value);
    }

    pub fn script_write(&self, script: WriteScript) {
        self.state.lock().write = script;
    }

    pub fn set_detail_delay(&self, delay: Duration) {
        self.state.lock().detail_delay = delay;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().write_delay = delay;
    }

    pub fn calls(&self) -> Vec<(Call, Instant)> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|(c, _)| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push((call, Instant::now()));
    }
}

#[async_trait]
impl IotApi for FakeApi {
    async fn list_sensors(&self) -> ApiResult<Vec<Sensor>> {
        self.record(Call::ListSensors);
        let mut state = self.state.lock();
        if let Some(error) = state.list_failures.pop_front() {
            return Err(error());
        }
        Ok(state.sensors.clone())
    }

    async fn list_actuators(&self) -> ApiResult<Vec<ActuatorListing>> {
        self.record(Call::ListActuators);
        Ok(self.state.lock().actuators.clone())
    }

    async fn sensor_samples(&self, query: &SampleQuery) -> ApiResult<Vec<Sample>> {
        self.record(Call::Samples(query.clone()));
        let delay = self.state.lock().detail_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        if state.failing_samples.contains(&query.sensor_id) {
            return Err(ApiError::Timeout);
        }
        Ok(state
            .samples
            .get(&query.sensor_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn actuator_state(&self, actuator_id: &str) -> ApiResult<ActuatorStateResponse> {
        self.record(Call::ActuatorState(actuator_id.to_owned()));
        let delay = self.state.lock().detail_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.state.lock().states.get(actuator_id) {
            Some(value) => Ok(ActuatorStateResponse {
                id: Some(actuator_id.to_owned()),
                state: Some(*value),
            }),
            None => Err(ApiError::NotFound(actuator_id.to_owned())),
        }
    }

    async fn set_actuator_state(
        &self,
        actuator_id: &str,
        _data_type: DataType,
        value: ActuatorValue,
    ) -> ApiResult<ActuatorStateResponse> {
        self.record(Call::SetState(actuator_id.to_owned(), value));
        let (delay, script) = {
            let state = self.state.lock();
            (state.write_delay, state.write)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match script {
            WriteScript::Echo => Ok(ActuatorStateResponse {
                id: Some(actuator_id.to_owned()),
                state: Some(value),
            }),
            WriteScript::ConfirmAs(confirmed) => Ok(ActuatorStateResponse {
                id: Some(actuator_id.to_owned()),
                state: Some(confirmed),
            }),
            WriteScript::Malformed => Ok(ActuatorStateResponse::default()),
            WriteScript::Fail(error) => Err(error()),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn sensor(id: &str, name: &str, unit: &str) -> Sensor {
    Sensor {
        id: id.to_owned(),
        name: name.to_owned(),
        unit: unit.to_owned(),
        data_type: DataType::Float,
        last_sample: None,
    }
}

pub fn sample(timestamp: f64, value: f64) -> Sample {
    Sample { timestamp, value }
}

pub fn switch(id: &str, name: &str, state: Option<bool>) -> ActuatorListing {
    ActuatorListing {
        id: id.to_owned(),
        name: name.to_owned(),
        unit: String::new(),
        data_type: DataType::Boolean,
        state: state.map(ActuatorValue::Bool),
    }
}

pub fn dial(id: &str, name: &str, state: Option<f64>) -> ActuatorListing {
    ActuatorListing {
        id: id.to_owned(),
        name: name.to_owned(),
        unit: String::new(),
        data_type: DataType::Float,
        state: state.map(ActuatorValue::Number),
    }
}
