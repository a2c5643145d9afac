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

//! Optimistic actuator commands.
//!
//! The store is updated before the upstream call. The upstream answer then
//! confirms the value, leaves it in place, or rolls it back depending on the
//! failure kind and the data mode.

use sentinel_api::{ActuatorValue, DataType, ErrorKind, IotApi};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::activity::{NewEvent, Severity};
use crate::config::DataMode;
use crate::demo::DemoSimulator;
use crate::diagnostics::RequestLogEntry;
use crate::store::DashboardStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    /// Flip a boolean actuator
    Toggle,
    /// Set a numeric actuator
    Set(f64),
}

/// Caller mistakes, detected before anything is changed
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown actuator: {0}")]
    UnknownActuator(String),

    #[error("{name} is a {data_type} actuator and cannot be toggled")]
    NotToggleable { name: String, data_type: DataType },

    #[error("{name} is a switch; toggle it instead")]
    NotSettable { name: String },

    #[error("Invalid value: {0}")]
    InvalidValue(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Demo mode, applied locally with sensor coupling
    Simulated { value: ActuatorValue },
    /// Upstream confirmed the state
    Confirmed { value: ActuatorValue },
    /// Upstream accepted the write but its answer was unusable
    KeptOptimistic { value: ActuatorValue },
    /// Write failed in a tolerated way; local value kept
    KeptLocally { value: ActuatorValue, error: ErrorKind },
    /// Write failed; previous value restored
    Reverted {
        previous: ActuatorValue,
        error: ErrorKind,
    },
}

impl CommandOutcome {
    /// Value the actuator holds after the command
    pub fn value(&self) -> ActuatorValue {
        match self {
            Self::Simulated { value }
            | Self::Confirmed { value }
            | Self::KeptOptimistic { value }
            | Self::KeptLocally { value, .. } => *value,
            Self::Reverted { previous, .. } => *previous,
        }
    }
}

/// Failures after which the optimistic value is kept: the write may well
/// have landed, or the upstream simply cannot report on it.
pub fn is_benign(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Timeout | ErrorKind::NotFound | ErrorKind::Unsupported | ErrorKind::Transport
    )
}

pub struct CommandHandler {
    api: Arc<dyn IotApi>,
    store: Arc<DashboardStore>,
    demo: Arc<DemoSimulator>,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("api", &self.api.name())
            .finish_non_exhaustive()
    }
}

impl CommandHandler {
    pub fn new(
        api: Arc<dyn IotApi>,
        store: Arc<DashboardStore>,
        demo: Arc<DemoSimulator>,
    ) -> Self {
        Self { api, store, demo }
    }

    /// Apply `command` to an actuator
    pub async fn execute(
        &self,
        actuator_id: &str,
        command: ActuatorCommand,
    ) -> Result<CommandOutcome, CommandError> {
        let actuator = self
            .store
            .actuator(actuator_id)
            .ok_or_else(|| CommandError::UnknownActuator(actuator_id.to_owned()))?;

        let value = match (command, actuator.data_type.is_boolean()) {
            (ActuatorCommand::Toggle, true) => ActuatorValue::Bool(!actuator.state.is_active()),
            (ActuatorCommand::Toggle, false) => {
                return Err(CommandError::NotToggleable {
                    name: actuator.name,
                    data_type: actuator.data_type,
                });
            }
            (ActuatorCommand::Set(_), true) => {
                return Err(CommandError::NotSettable {
                    name: actuator.name,
                });
            }
            (ActuatorCommand::Set(n), false) if !n.is_finite() => {
                return Err(CommandError::InvalidValue(n));
            }
            (ActuatorCommand::Set(n), false) => ActuatorValue::Number(n),
        };

        let mode = self.store.mode();
        info!(
            "🎛️ [COMMAND] {} -> {} ({} mode)",
            actuator.name, value, mode
        );

        let previous = self
            .store
            .apply_optimistic_write(actuator_id, value)
            .ok_or_else(|| CommandError::UnknownActuator(actuator_id.to_owned()))?;

        if mode == DataMode::Demo {
            let updated = sentinel_api::Actuator {
                state: value,
                ..actuator
            };
            self.store
                .update_snapshot(|snapshot| self.demo.apply_command(snapshot, &updated));
            self.store.record_event(NewEvent::actuator(
                Severity::Info,
                format!("Manually updated {} to {} (demo mode)", updated.name, value),
            ));
            return Ok(CommandOutcome::Simulated { value });
        }

        let url = format!("/actuators/{actuator_id}/state");
        self.store.log_request(RequestLogEntry::request("PUT", &url));
        let started = Instant::now();
        let result = self
            .api
            .set_actuator_state(actuator_id, actuator.data_type, value)
            .await;
        let elapsed = started.elapsed();

        match result {
            Ok(response) => {
                self.store.record_request(elapsed, true);
                self.store.log_request(RequestLogEntry::response(
                    "PUT",
                    &url,
                    200,
                    elapsed,
                    serde_json::to_value(&response).ok(),
                ));

                let outcome = match response.confirmed_state() {
                    Some(confirmed) => {
                        let confirmed = actuator.data_type.coerce(confirmed);
                        self.store.confirm_write(actuator_id, confirmed);
                        CommandOutcome::Confirmed { value: confirmed }
                    }
                    None => {
                        warn!(
                            "⚠️ [COMMAND] Unusable confirmation for {}, keeping {}",
                            actuator.name, value
                        );
                        CommandOutcome::KeptOptimistic { value }
                    }
                };

                self.store.record_event(NewEvent::actuator(
                    Severity::Info,
                    format!("Updated {} to {}", actuator.name, value),
                ));
                info!("✅ [COMMAND] {} updated in {:?}", actuator.name, elapsed);
                Ok(outcome)
            }
            Err(e) => {
                let kind = e.kind();
                self.store.record_request(elapsed, false);
                self.store.log_request(RequestLogEntry::failure(
                    "PUT",
                    &url,
                    e.status(),
                    elapsed,
                    e.to_string(),
                ));

                if mode == DataMode::Historical || is_benign(kind) {
                    let reason = if mode == DataMode::Historical {
                        " (historical mode)"
                    } else {
                        " - API issue"
                    };
                    self.store.record_event(NewEvent::actuator(
                        Severity::Info,
                        format!("{} updated locally{}", actuator.name, reason),
                    ));
                    info!(
                        "[COMMAND] {} kept locally after {} failure: {}",
                        actuator.name, kind, e
                    );
                    Ok(CommandOutcome::KeptLocally { value, error: kind })
                } else {
                    self.store.revert_write(actuator_id, previous);
                    self.store.record_event(NewEvent::actuator(
                        Severity::Warning,
                        format!("Failed to update {}: {}", actuator.name, e),
                    ));
                    warn!("❌ [COMMAND] {} reverted: {}", actuator.name, e);
                    Ok(CommandOutcome::Reverted {
                        previous,
                        error: kind,
                    })
                }
            }
        }
    }
}
