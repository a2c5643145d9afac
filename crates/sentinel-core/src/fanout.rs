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

//! Paced, cancellable fan-out of per-entity requests.

use futures_util::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Batch size and the pause between consecutive batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub size: usize,
    pub pause: Duration,
}

impl BatchPlan {
    pub fn new(size: usize, pause: Duration) -> Self {
        Self {
            size: size.max(1),
            pause,
        }
    }

    /// Number of batches needed for `items`
    pub fn batches_for(&self, items: usize) -> usize {
        items.div_ceil(self.size.max(1))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Run `f` over `items` in batches of `plan.size`.
///
/// Each batch is issued at once and awaited jointly. The pause only sits
/// between batches. Cancellation stops both the in-flight batch and any
/// batch not yet started. `f` reports whether an item succeeded.
pub async fn run_in_batches<T, F, Fut>(
    items: Vec<T>,
    plan: BatchPlan,
    cancel: &CancellationToken,
    mut f: F,
) -> BatchReport
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut report = BatchReport::default();
    let mut items = items.into_iter().peekable();
    let size = plan.size.max(1);

    while items.peek().is_some() {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let batch: Vec<Fut> = items.by_ref().take(size).map(&mut f).collect();
        report.batches += 1;

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            results = join_all(batch) => {
                for ok in results {
                    if ok {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }

        if items.peek().is_none() {
            break;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            () = tokio::time::sleep(plan.pause) => {}
        }
    }

    debug!(
        "[FANOUT] {} batches, {} ok, {} failed{}",
        report.batches,
        report.succeeded,
        report.failed,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    report
}
