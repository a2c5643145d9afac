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

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Declared data type of a sensor or actuator, as reported by the upstream API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Boolean,
    Float,
    Int,
    #[default]
    Number,
    #[serde(other)]
    Other,
}

impl DataType {
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::Boolean)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Float => "FLOAT",
            Self::Int => "INT",
            Self::Number => "NUMBER",
            Self::Other => "OTHER",
        }
    }

    /// Value an actuator of this type falls back to when nothing is known
    pub fn default_value(self) -> ActuatorValue {
        if self.is_boolean() {
            ActuatorValue::Bool(false)
        } else {
            ActuatorValue::Number(0.0)
        }
    }

    /// Shape a value to this type: switches become booleans, numeric types
    /// become numbers and INT set-points are rounded.
    pub fn coerce(self, value: ActuatorValue) -> ActuatorValue {
        match (self, value) {
            (Self::Boolean, ActuatorValue::Number(n)) => ActuatorValue::Bool(n != 0.0),
            (Self::Int, ActuatorValue::Number(n)) => ActuatorValue::Number(n.round()),
            (Self::Float | Self::Int | Self::Number | Self::Other, ActuatorValue::Bool(b)) => {
                ActuatorValue::Number(if b { 1.0 } else { 0.0 })
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actuator state: boolean switches or numeric set-points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActuatorValue {
    Bool(bool),
    Number(f64),
}

impl ActuatorValue {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Number(_) => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Bool(_) => None,
        }
    }

    /// Whether the actuator counts as "enabled" (on, or a positive set-point)
    pub fn is_active(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Number(n) => n > 0.0,
        }
    }

    /// Human-readable form used in activity messages
    pub fn display(self) -> String {
        match self {
            Self::Bool(true) => "ON".to_owned(),
            Self::Bool(false) => "OFF".to_owned(),
            Self::Number(n) => format!("{n:.1}"),
        }
    }
}

impl fmt::Display for ActuatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Single sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Fractional seconds since the Unix epoch
    pub timestamp: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(deserialize_with = "de_entity_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub last_sample: Option<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actuator {
    #[serde(deserialize_with = "de_entity_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub data_type: DataType,
    pub state: ActuatorValue,
}

/// Actuator as it appears in a list response, where the state may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorListing {
    #[serde(deserialize_with = "de_entity_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub state: Option<ActuatorValue>,
}

/// Body of `GET /actuators/{id}` and of the state write response.
/// Both fields are optional so malformed confirmations can be detected
/// instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActuatorStateResponse {
    #[serde(default, deserialize_with = "de_opt_entity_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub state: Option<ActuatorValue>,
}

impl ActuatorStateResponse {
    /// Confirmed state, only when the response carries both an id and a state
    pub fn confirmed_state(&self) -> Option<ActuatorValue> {
        match (&self.id, self.state) {
            (Some(id), Some(state)) if !id.is_empty() => Some(state),
            _ => None,
        }
    }
}

/// `{ "data": [...] }` envelope used by every list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Upper bound the upstream enforces on `limit`
pub const MAX_SAMPLE_LIMIT: u32 = 2000;

/// Query for `GET /sensors/{id}/samples`
#[derive(Debug, Clone, PartialEq)]
pub struct SampleQuery {
    pub sensor_id: String,
    pub after: Option<f64>,
    pub before: Option<f64>,
    pub limit: u32,
    pub sort: SortOrder,
    pub skip: Option<u32>,
}

impl SampleQuery {
    /// Newest sample of a sensor
    pub fn latest(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            after: None,
            before: None,
            limit: 1,
            sort: SortOrder::Desc,
            skip: None,
        }
    }

    /// Newest sample at or before `before`
    pub fn latest_before(sensor_id: impl Into<String>, before: f64) -> Self {
        Self {
            before: Some(before),
            ..Self::latest(sensor_id)
        }
    }

    /// Time-ordered window for charting
    pub fn window(
        sensor_id: impl Into<String>,
        after: Option<f64>,
        before: Option<f64>,
        limit: u32,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            after,
            before,
            limit,
            sort: SortOrder::Asc,
            skip: None,
        }
    }

    /// Query string, `limit` clamped to what the upstream accepts
    pub fn to_query_string(&self) -> String {
        let limit = self.limit.clamp(1, MAX_SAMPLE_LIMIT);
        let mut query = format!("limit={limit}&sort={}", self.sort.as_str());
        if let Some(after) = self.after {
            query.push_str(&format!("&after={after}"));
        }
        if let Some(before) = self.before {
            query.push_str(&format!("&before={before}"));
        }
        if let Some(skip) = self.skip {
            query.push_str(&format!("&skip={skip}"));
        }
        query
    }
}

/// Upstream ids are integers today, but strings are accepted as well
fn de_entity_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(i) => i.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

fn de_opt_entity_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "de_entity_id")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}
