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

//! Request log and request statistics shown on the diagnostics panel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPhase {
    Request,
    Response,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub phase: LogPhase,
    pub method: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RequestLogEntry {
    fn base(phase: LogPhase, method: &str, url: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            phase,
            method: method.to_owned(),
            url: url.to_owned(),
            status: None,
            duration_ms: None,
            detail: None,
            error: None,
        }
    }

    pub fn request(method: &str, url: &str) -> Self {
        Self::base(LogPhase::Request, method, url)
    }

    pub fn response(
        method: &str,
        url: &str,
        status: u16,
        duration: Duration,
        detail: Option<serde_json::Value>,
    ) -> Self {
        Self {
            status: Some(status),
            duration_ms: Some(duration.as_millis() as u64),
            detail,
            ..Self::base(LogPhase::Response, method, url)
        }
    }

    pub fn failure(
        method: &str,
        url: &str,
        status: Option<u16>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status,
            duration_ms: Some(duration.as_millis() as u64),
            error: Some(error.into()),
            ..Self::base(LogPhase::Error, method, url)
        }
    }
}

/// Bounded request log, oldest entries dropped first
#[derive(Debug, Clone)]
pub struct RequestLog {
    entries: VecDeque<RequestLogEntry>,
    capacity: usize,
}

impl RequestLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: RequestLogEntry) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregate request statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ApiStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub last_latency_ms: Option<u64>,
    /// Exponential moving average, seeded by the first measurement
    pub average_latency_ms: Option<f64>,
}

impl ApiStats {
    const SMOOTHING: f64 = 0.3;

    /// Count one request and its latency
    pub fn record(&mut self, latency: Duration, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        }
        self.record_latency(latency);
    }

    fn record_latency(&mut self, latency: Duration) {
        let ms = latency.as_millis() as u64;
        self.last_latency_ms = Some(ms);
        self.average_latency_ms = Some(match self.average_latency_ms {
            Some(avg) => avg * (1.0 - Self::SMOOTHING) + ms as f64 * Self::SMOOTHING,
            None => ms as f64,
        });
    }

    /// Percentage of successful requests; 100 when nothing was sent yet
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_log_drops_oldest() {
        let mut log = RequestLog::new(2);
        log.push(RequestLogEntry::request("GET", "/a"));
        log.push(RequestLogEntry::request("GET", "/b"));
        log.push(RequestLogEntry::request("GET", "/c"));

        let urls: Vec<_> = log.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["/b", "/c"]);
    }

    #[test]
    fn test_stats_average_and_rate() {
        let mut stats = ApiStats::default();
        assert!((stats.success_rate() - 100.0).abs() < f64::EPSILON);

        stats.record(Duration::from_millis(100), true);
        assert_eq!(stats.average_latency_ms, Some(100.0));

        stats.record(Duration::from_millis(200), false);
        assert_eq!(stats.last_latency_ms, Some(200));
        assert!((stats.average_latency_ms.unwrap() - 130.0).abs() < 1e-9);
        assert!((stats.success_rate() - 50.0).abs() < 1e-9);
    }
}
