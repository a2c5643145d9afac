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

//! Connectivity state transitions driven by poll outcomes.
//!
//! Transient upstream trouble (gateway, rate limit) is reported once per
//! episode and never flips the connected flag. Anything else counts as a
//! lost connection.

use sentinel_api::{ApiError, ErrorKind};
use tracing::{info, warn};

use crate::activity::{NewEvent, Severity};
use crate::store::{ConnectionIssue, ConnectionStatus, DashboardStore};

pub const CONNECTED_MESSAGE: &str = "Connected to IoT API successfully";
pub const GATEWAY_MESSAGE: &str = "IoT API experiencing issues (gateway unavailable)";
pub const RATE_LIMIT_MESSAGE: &str = "API rate limit reached. Requests are throttled.";
pub const DISCONNECTED_MESSAGE: &str = "Lost connection to IoT API";
pub const DEMO_MESSAGE: &str = "Demo mode activated with simulated data";

/// A successful poll
pub fn on_success(status: &mut ConnectionStatus) -> Option<NewEvent> {
    status.last_issue = None;
    if status.connected {
        return None;
    }

    status.connected = true;
    Some(NewEvent::system(Severity::Success, CONNECTED_MESSAGE))
}

/// Entering demo mode counts as connected
pub fn on_demo(status: &mut ConnectionStatus) -> Option<NewEvent> {
    if status.connected {
        return None;
    }

    status.connected = true;
    status.last_issue = None;
    Some(NewEvent::system(Severity::Success, DEMO_MESSAGE))
}

/// A failed poll of the given kind
pub fn on_failure(
    status: &mut ConnectionStatus,
    kind: ErrorKind,
    message: &str,
) -> Option<NewEvent> {
    let already_reported = status.last_issue.as_ref().is_some_and(|i| i.kind == kind);
    let issue = ConnectionIssue {
        kind,
        message: message.to_owned(),
    };

    match kind {
        ErrorKind::GatewayUnavailable | ErrorKind::RateLimited => {
            status.last_issue = Some(issue);
            if already_reported {
                return None;
            }
            let text = if kind == ErrorKind::RateLimited {
                RATE_LIMIT_MESSAGE
            } else {
                GATEWAY_MESSAGE
            };
            Some(NewEvent::system(Severity::Warning, text))
        }
        ErrorKind::NotFound
        | ErrorKind::Unsupported
        | ErrorKind::Unauthorized
        | ErrorKind::Timeout
        | ErrorKind::Transport
        | ErrorKind::Unknown => {
            status.last_issue = Some(issue);
            if status.connected {
                status.connected = false;
                Some(NewEvent::system(Severity::Warning, DISCONNECTED_MESSAGE))
            } else {
                None
            }
        }
    }
}

/// Record a successful poll against the store
pub fn record_success(store: &DashboardStore) {
    if store.update_connection(on_success).is_some() {
        info!("✅ [POLL] {}", CONNECTED_MESSAGE);
    }
}

/// Record a failed poll against the store
pub fn record_failure(store: &DashboardStore, error: &ApiError) {
    let kind = error.kind();
    let message = error.to_string();
    if store
        .update_connection(|status| on_failure(status, kind, &message))
        .is_some()
    {
        warn!("⚠️ [POLL] Connectivity changed ({}): {}", kind, message);
    }
}
