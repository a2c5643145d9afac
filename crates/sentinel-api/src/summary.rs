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

//! AI summary of the current dashboard state via an OpenAI-compatible
//! chat completion endpoint.

use crate::errors::{ApiError, ApiResult};
use crate::types::{Actuator, Sensor};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are an assistant for a smart building dashboard. \
Given the current sensor readings, actuator states and estimated energy savings, \
write a short plain-language status summary (3-5 sentences). Point out anything \
unusual and suggest at most two concrete actions.";

/// Input of a summary request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub sensors: Vec<Sensor>,
    pub actuators: Vec<Actuator>,
    /// Watts saved by idle actuators
    pub energy_saved: f64,
}

impl SummaryRequest {
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.actuators.is_empty()
    }
}

/// Produces a textual summary of the dashboard state
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> ApiResult<String>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client (`POST {base}/chat/completions`)
#[derive(Clone)]
pub struct CompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> ApiResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ApiError::ConfigError(
                "Completion API key is not configured".to_owned(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            api_key,
            model: model.into(),
            client,
        })
    }

    /// Key taken from `OPENAI_API_KEY`
    pub fn from_env(base_url: impl Into<String>, model: impl Into<String>) -> ApiResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ApiError::ConfigError("OPENAI_API_KEY environment variable not set".to_owned())
        })?;
        Self::new(base_url, api_key, model)
    }
}

#[async_trait]
impl SummaryProvider for CompletionClient {
    async fn summarize(&self, request: &SummaryRequest) -> ApiResult<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": serde_json::to_string(request)?},
            ],
        });

        info!(
            "🤖 [SUMMARY] Requesting summary for {} sensors, {} actuators",
            request.sensors.len(),
            request.actuators.len()
        );
        debug!("   URL: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("⚠️ [SUMMARY] Completion request failed: {} {}", status, message);
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited {
                    retry_after_secs: None,
                },
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ApiError::AuthenticationFailed {
                        status: status.as_u16(),
                    }
                }
                _ => ApiError::ApiError {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("completion had no content".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActuatorValue, DataType};
    use mockito::{Matcher, Server};

    fn request() -> SummaryRequest {
        SummaryRequest {
            sensors: vec![],
            actuators: vec![Actuator {
                id: "1".to_owned(),
                name: "Fan".to_owned(),
                unit: "on/off".to_owned(),
                data_type: DataType::Boolean,
                state: ActuatorValue::Bool(false),
            }],
            energy_saved: 100.0,
        }
    }

    #[tokio::test]
    async fn test_summarize_returns_first_choice() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4o-mini"})))
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": " All quiet. "}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = CompletionClient::new(server.url(), "sk-test", "gpt-4o-mini").unwrap();
        let summary = client.summarize(&request()).await.unwrap();

        assert_eq!(summary, "All quiet.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_summarize_without_choices() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let client = CompletionClient::new(server.url(), "sk-test", "gpt-4o-mini").unwrap();
        let result = client.summarize(&request()).await;

        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_summarize_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .create_async()
            .await;

        let client = CompletionClient::new(server.url(), "sk-bad", "gpt-4o-mini").unwrap();
        let err = client.summarize(&request()).await.unwrap_err();

        assert!(matches!(err, ApiError::AuthenticationFailed { status: 401 }));
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(CompletionClient::new("https://api.openai.com/v1", "", "gpt-4o-mini").is_err());
    }
}
