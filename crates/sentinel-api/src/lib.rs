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

//! Client for the IoT sensor/actuator REST API.
//!
//! Provides typed access to sensor listings, sample history and actuator
//! state, plus the optional AI summary collaborator.

pub mod client;
pub mod errors;
pub mod source;
pub mod summary;
pub mod types;

pub use client::IotApiClient;
pub use errors::{ApiError, ApiResult, ErrorKind};
pub use source::IotApi;
pub use summary::{CompletionClient, SummaryProvider, SummaryRequest};
pub use types::*;
