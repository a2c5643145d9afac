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

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// IoT API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit reached (429)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Upstream gateway unavailable ({status})")]
    GatewayUnavailable { status: u16 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation not supported by upstream ({status})")]
    Unsupported { status: u16 },

    #[error("Authentication failed ({status})")]
    AuthenticationFailed { status: u16 },

    #[error("API returned error status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::HttpError(e)
        }
    }
}

/// Coarse classification of an [`ApiError`], used by the poll loop and the
/// command handler instead of matching on error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    GatewayUnavailable,
    NotFound,
    Unsupported,
    Unauthorized,
    Timeout,
    Transport,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status onto a kind. Success statuses map to `Unknown`.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            502..=504 => Self::GatewayUnavailable,
            404 => Self::NotFound,
            405 | 501 => Self::Unsupported,
            401 | 403 => Self::Unauthorized,
            _ => Self::Unknown,
        }
    }

    /// Transient upstream trouble that should not flip the connectivity flag.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::GatewayUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::RateLimited => "rate-limited",
            Self::GatewayUnavailable => "gateway-unavailable",
            Self::NotFound => "not-found",
            Self::Unsupported => "unsupported",
            Self::Unauthorized => "unauthorized",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpError(_) => ErrorKind::Transport,
            Self::Timeout => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::GatewayUnavailable { .. } => ErrorKind::GatewayUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::AuthenticationFailed { .. } => ErrorKind::Unauthorized,
            Self::ApiError { status, .. } => ErrorKind::from_status(*status),
            Self::InvalidResponse(_) | Self::JsonError(_) | Self::ConfigError(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// HTTP status carried by the error, if the upstream answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::GatewayUnavailable { status }
            | Self::Unsupported { status }
            | Self::AuthenticationFailed { status }
            | Self::ApiError { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            Self::Timeout | Self::InvalidResponse(_) | Self::JsonError(_) | Self::ConfigError(_) => {
                None
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
