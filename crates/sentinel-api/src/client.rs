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

use crate::errors::{ApiError, ApiResult};
use crate::source::IotApi;
use crate::types::{
    ActuatorListing, ActuatorStateResponse, ActuatorValue, DataEnvelope, DataType, Sample,
    SampleQuery, Sensor,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// IoT REST API client
#[derive(Clone)]
pub struct IotApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for IotApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IotApiClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.is_some())
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl IotApiClient {
    /// Create a new client with the default 10 second timeout
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> ApiResult<Self> {
        Self::with_timeout(base_url, token, Duration::from_secs(10))
    }

    /// Create a new client with a custom request timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(ApiError::ConfigError("API base URL is empty".to_owned()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            client,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Create client for development/testing from environment variables
    pub fn from_env() -> ApiResult<Self> {
        let base_url =
            std::env::var("IOT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let token = std::env::var("IOT_API_TOKEN").ok();

        info!("Initializing IoT API client for development: {}", base_url);
        Self::new(base_url, token)
    }

    /// Create client from configuration values
    /// Falls back to environment variables if config values are not set
    pub fn from_config(
        base_url: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let base_url = base_url
            .or_else(|| std::env::var("IOT_API_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let token = token.or_else(|| std::env::var("IOT_API_TOKEN").ok());

        info!("Initializing IoT API client from configuration: {}", base_url);
        Self::with_timeout(base_url, token, timeout)
    }

    /// Set custom retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON body, mapping error statuses onto the typed taxonomy
    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> ApiResult<T> {
        let url = self.url(path);
        debug!("🔍 [API] GET {}", url);

        let response = self
            .retry_request(|| async { self.authorize(self.client.get(&url)).send().await })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, what).await);
        }

        let body = response.text().await?;
        trace!("   Body: {}", body);
        serde_json::from_str(&body).map_err(|e| {
            error!("❌ [API] Could not decode {}: {}", what, e);
            ApiError::InvalidResponse(format!("{what}: {e}"))
        })
    }

    async fn error_for_status(response: Response, what: &str) -> ApiError {
        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let err = match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(what.to_owned()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed {
                status: status.as_u16(),
            },
            StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited { retry_after_secs },
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => ApiError::GatewayUnavailable {
                status: status.as_u16(),
            },
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                ApiError::Unsupported {
                    status: status.as_u16(),
                }
            }
            status => ApiError::ApiError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            },
        };

        warn!("⚠️ [API] {} failed: {}", what, err);
        err
    }

    /// Get the full sensor list
    pub async fn list_sensors(&self) -> ApiResult<Vec<Sensor>> {
        let envelope: DataEnvelope<Sensor> = self.get_json("/sensors/", "sensor list").await?;
        debug!("✅ [API] {} sensors listed", envelope.data.len());
        Ok(envelope.data)
    }

    /// Get the full actuator list
    pub async fn list_actuators(&self) -> ApiResult<Vec<ActuatorListing>> {
        let envelope: DataEnvelope<ActuatorListing> =
            self.get_json("/actuators/", "actuator list").await?;
        debug!("✅ [API] {} actuators listed", envelope.data.len());
        Ok(envelope.data)
    }

    /// Get samples for a sensor
    pub async fn sensor_samples(&self, query: &SampleQuery) -> ApiResult<Vec<Sample>> {
        let path = format!(
            "/sensors/{}/samples?{}",
            urlencoding::encode(&query.sensor_id),
            query.to_query_string()
        );
        let what = format!("samples for sensor {}", query.sensor_id);
        let envelope: DataEnvelope<Sample> = self.get_json(&path, &what).await?;
        debug!(
            "📊 [API] {} samples for sensor {}",
            envelope.data.len(),
            query.sensor_id
        );
        Ok(envelope.data)
    }

    /// Get the current state of an actuator
    pub async fn actuator_state(&self, actuator_id: &str) -> ApiResult<ActuatorStateResponse> {
        let path = format!("/actuators/{}", urlencoding::encode(actuator_id));
        self.get_json(&path, &format!("actuator {actuator_id}"))
            .await
    }

    /// Write a new actuator state.
    ///
    /// The value is coerced to the actuator's declared type before sending.
    /// A success status with an empty or undecodable body yields an empty
    /// [`ActuatorStateResponse`] rather than an error.
    pub async fn set_actuator_state(
        &self,
        actuator_id: &str,
        data_type: DataType,
        value: ActuatorValue,
    ) -> ApiResult<ActuatorStateResponse> {
        let url = self.url(&format!(
            "/actuators/{}/state",
            urlencoding::encode(actuator_id)
        ));
        let body = json!({ "state": data_type.coerce(value) });
        info!("📞 [API] Setting actuator {} to {}", actuator_id, value);
        debug!("   URL: {}", url);

        let response = self
            .retry_request(|| async {
                self.authorize(self.client.put(&url))
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response, &format!("actuator {actuator_id}")).await);
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            warn!("⚠️ [API] Empty write confirmation for actuator {}", actuator_id);
            return Ok(ActuatorStateResponse::default());
        }

        match serde_json::from_str::<ActuatorStateResponse>(&text) {
            Ok(confirmation) => {
                info!("✅ [API] Actuator {} write acknowledged", actuator_id);
                Ok(confirmation)
            }
            Err(e) => {
                warn!(
                    "⚠️ [API] Undecodable write confirmation for actuator {}: {}",
                    actuator_id, e
                );
                Ok(ActuatorStateResponse::default())
            }
        }
    }

    /// Retry a request with exponential backoff.
    ///
    /// Only transport failures are retried; any HTTP response, including
    /// error statuses, is returned as-is.
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> ApiResult<Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    warn!("Request failed after {} attempts: {}", attempts, e);
                    return Err(ApiError::from(e));
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl IotApi for IotApiClient {
    async fn list_sensors(&self) -> ApiResult<Vec<Sensor>> {
        IotApiClient::list_sensors(self).await
    }

    async fn list_actuators(&self) -> ApiResult<Vec<ActuatorListing>> {
        IotApiClient::list_actuators(self).await
    }

    async fn sensor_samples(&self, query: &SampleQuery) -> ApiResult<Vec<Sample>> {
        IotApiClient::sensor_samples(self, query).await
    }

    async fn actuator_state(&self, actuator_id: &str) -> ApiResult<ActuatorStateResponse> {
        IotApiClient::actuator_state(self, actuator_id).await
    }

    async fn set_actuator_state(
        &self,
        actuator_id: &str,
        data_type: DataType,
        value: ActuatorValue,
    ) -> ApiResult<ActuatorStateResponse> {
        IotApiClient::set_actuator_state(self, actuator_id, data_type, value).await
    }

    fn name(&self) -> &str {
        "iot-rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_list_sensors_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/sensors/")
            .match_header("authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        {"id": 1, "name": "Room Temperature", "dataType": "FLOAT"},
                        {"id": 2, "name": "Power Meter", "unit": "W", "dataType": "FLOAT",
                         "lastSample": {"timestamp": 1589544000.5, "value": 412.0}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), Some("test_token".to_owned())).unwrap();
        let sensors = client.list_sensors().await.unwrap();

        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].id, "1");
        assert_eq!(sensors[1].unit, "W");
        assert_eq!(sensors[1].last_sample.unwrap().value, 412.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_actuators_missing_data_field() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/actuators/")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let actuators = client.list_actuators().await.unwrap();

        assert!(actuators.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/sensors/")
            .with_status(429)
            .with_header("retry-after", "30")
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let err = client.list_sensors().await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_bad_gateway() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/actuators/")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let err = client.list_actuators().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::GatewayUnavailable);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_keeps_message() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/actuators/7")
            .with_status(500)
            .with_body("Unexpected server fault")
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let err = client.actuator_state("7").await.unwrap_err();

        assert!(matches!(err, ApiError::ApiError { status: 500, ref message } if message == "Unexpected server fault"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sensor_samples_query() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/sensors/12/samples")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "1".into()),
                Matcher::UrlEncoded("sort".into(), "desc".into()),
                Matcher::UrlEncoded("before".into(), "1589547600".into()),
            ]))
            .with_status(200)
            .with_body(json!({"data": [{"timestamp": 1589547000.0, "value": 21.5}]}).to_string())
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let samples = client
            .sensor_samples(&SampleQuery::latest_before("12", 1_589_547_600.0))
            .await
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 21.5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sensor_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/sensors/99/samples")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let result = client.sensor_samples(&SampleQuery::latest("99")).await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_actuator_state_confirmed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/actuators/3/state")
            .match_body(Matcher::Json(json!({"state": true})))
            .with_status(200)
            .with_body(json!({"id": 3, "state": true}).to_string())
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let response = client
            .set_actuator_state("3", DataType::Boolean, ActuatorValue::Bool(true))
            .await
            .unwrap();

        assert_eq!(response.confirmed_state(), Some(ActuatorValue::Bool(true)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_actuator_state_malformed_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/actuators/3/state")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let response = client
            .set_actuator_state("3", DataType::Boolean, ActuatorValue::Bool(false))
            .await
            .unwrap();

        assert_eq!(response.confirmed_state(), None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_actuator_state_unsupported() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/actuators/3/state")
            .with_status(405)
            .create_async()
            .await;

        let client = IotApiClient::new(server.url(), None).unwrap();
        let err = client
            .set_actuator_state("3", DataType::Float, ActuatorValue::Number(12.0))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unsupported);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried_then_classified() {
        // Nothing listens on this port
        let client = IotApiClient::new("http://127.0.0.1:9", None)
            .unwrap()
            .with_retry_config(2, Duration::from_millis(10));

        let err = client.list_sensors().await.unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::errors::ErrorKind::Transport | crate::errors::ErrorKind::Timeout
        ));
    }

    #[test]
    fn test_write_value_coercion() {
        assert_eq!(
            DataType::Boolean.coerce(ActuatorValue::Number(1.0)),
            ActuatorValue::Bool(true)
        );
        assert_eq!(
            DataType::Int.coerce(ActuatorValue::Number(2.6)),
            ActuatorValue::Number(3.0)
        );
        assert_eq!(
            DataType::Float.coerce(ActuatorValue::Bool(true)),
            ActuatorValue::Number(1.0)
        );
        assert_eq!(
            DataType::Boolean.coerce(ActuatorValue::Bool(false)),
            ActuatorValue::Bool(false)
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        assert!(matches!(
            IotApiClient::new("", None),
            Err(ApiError::ConfigError(_))
        ));
    }
}
