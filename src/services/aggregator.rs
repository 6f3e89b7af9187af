// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Debounced aggregation of rapid user actions.
//!
//! Each [`DebouncedAggregator::record`] bumps an in-memory counter and
//! re-arms a timer; once the quiescence window passes without another
//! record, the accumulated count goes out as a single
//! [`CountSink::record_count`] call. Delivery is at-most-once: a failed
//! write is logged and its count is not put back.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// Remote "record N occurrences for target T" write.
#[async_trait]
pub trait CountSink: Send + Sync {
    async fn record_count(&self, target_id: &str, count: u64) -> Result<(), AppError>;
}

/// Observable phase of an aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// Nothing pending, nothing in flight.
    Idle,
    /// Counts waiting for the timer or a flush.
    Accumulating(u64),
    /// A write is in flight and nothing new has been recorded since.
    Flushing,
}

/// Result of a single flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending; no write was issued.
    Idle,
    /// The write succeeded with this count.
    Delivered(u64),
    /// The write failed; this many occurrences are lost remotely.
    Dropped(u64),
}

#[derive(Default)]
struct Pending {
    count: u64,
    local_total: u64,
    in_flight: u32,
    timer: Option<JoinHandle<()>>,
    /// Bumped every time the timer is re-armed or cancelled, so a timer that
    /// woke up after being superseded can tell.
    generation: u64,
}

struct Shared {
    target_id: String,
    sink: Arc<dyn CountSink>,
    delay: Duration,
    pending: Mutex<Pending>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Capture and zero the pending count. Caller holds the lock.
    fn take(pending: &mut Pending) -> Option<u64> {
        if pending.count == 0 {
            return None;
        }
        let count = std::mem::take(&mut pending.count);
        pending.in_flight += 1;
        Some(count)
    }

    async fn write(&self, count: u64) -> FlushOutcome {
        let result = {
            let _flight = InFlight(self);
            self.sink.record_count(&self.target_id, count).await
        };

        match result {
            Ok(()) => {
                tracing::debug!(target_id = %self.target_id, count, "Flushed aggregated count");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                tracing::warn!(
                    target_id = %self.target_id,
                    count,
                    error = %e,
                    "Aggregated write failed, count dropped"
                );
                FlushOutcome::Dropped(count)
            }
        }
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        tokio::time::sleep(self.delay).await;

        let count = {
            let mut pending = self.lock();
            if pending.generation != generation {
                return;
            }
            // Detach ourselves so nobody aborts the write below.
            pending.timer = None;
            Shared::take(&mut pending)
        };

        if let Some(count) = count {
            self.write(count).await;
        }
    }
}

/// Ends a write's flight when dropped, including when the write future is
/// cancelled mid-await.
struct InFlight<'a>(&'a Shared);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut pending = self.0.lock();
        pending.in_flight = pending.in_flight.saturating_sub(1);
    }
}

/// Batches rapid actions on one target into one write per quiet period.
///
/// Owned by the surface that exposes the action. Call
/// [`close`](Self::close) on teardown; if the aggregator is dropped instead,
/// any pending count is still written from a spawned task.
pub struct DebouncedAggregator {
    shared: Arc<Shared>,
}

impl DebouncedAggregator {
    pub fn new(target_id: impl Into<String>, sink: Arc<dyn CountSink>, delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                target_id: target_id.into(),
                sink,
                delay,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    /// Start the optimistic counter from a known remote value.
    pub fn with_baseline(self, total: u64) -> Self {
        self.shared.lock().local_total = total;
        self
    }

    pub fn target_id(&self) -> &str {
        &self.shared.target_id
    }

    /// Count one occurrence and re-arm the flush timer.
    ///
    /// Never suspends. Returns the optimistic total including this one.
    /// Must be called from within a tokio runtime.
    pub fn record(&self) -> u64 {
        let mut pending = self.shared.lock();
        pending.count += 1;
        pending.local_total += 1;

        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation = pending.generation.wrapping_add(1);
        let generation = pending.generation;
        pending.timer = Some(tokio::spawn(Arc::clone(&self.shared).fire(generation)));

        pending.local_total
    }

    /// Write whatever is pending now. Redundant calls are no-ops.
    pub async fn flush(&self) -> FlushOutcome {
        let count = {
            let mut pending = self.shared.lock();
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            pending.generation = pending.generation.wrapping_add(1);
            Shared::take(&mut pending)
        };

        match count {
            Some(count) => self.shared.write(count).await,
            None => FlushOutcome::Idle,
        }
    }

    /// Final flush on teardown.
    pub async fn close(self) -> FlushOutcome {
        self.flush().await
    }

    pub fn pending_count(&self) -> u64 {
        self.shared.lock().count
    }

    /// Optimistic total shown locally, regardless of flush state.
    pub fn local_total(&self) -> u64 {
        self.shared.lock().local_total
    }

    pub fn phase(&self) -> AggregatorPhase {
        let pending = self.shared.lock();
        if pending.count > 0 {
            AggregatorPhase::Accumulating(pending.count)
        } else if pending.in_flight > 0 {
            AggregatorPhase::Flushing
        } else {
            AggregatorPhase::Idle
        }
    }
}

impl Drop for DebouncedAggregator {
    fn drop(&mut self) {
        let count = {
            let mut pending = self.shared.lock();
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            pending.generation = pending.generation.wrapping_add(1);
            Shared::take(&mut pending)
        };

        let Some(count) = count else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.shared);
                handle.spawn(async move {
                    shared.write(count).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    target_id = %self.shared.target_id,
                    count,
                    "Aggregator dropped outside a runtime, pending count lost"
                );
            }
        }
    }
}
