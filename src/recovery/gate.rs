// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Scheduling policy for the sealing pipelines: a bounded pool of pipeline
//! slots, a global pacing rule for phase-1 starts, and the lock that keeps
//! phase 2 exclusive. All of it lives in objects shared by `Arc` so the
//! policy is testable with a simulated clock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Admits pipelines into execution: at most `parallel` sectors in flight,
/// and no two phase-1 starts closer together than `phase1_spacing`, across
/// all pipelines. Phase 1 saturates memory and CPU; simultaneous starts
/// make every copy slower and push the proofs computation into failures.
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    phase1_spacing: Duration,
    last_phase1_start: Mutex<Option<Instant>>,
}

impl AdmissionGate {
    pub fn new(parallel: usize, phase1_spacing: Duration) -> Self {
        AdmissionGate {
            slots: Arc::new(Semaphore::new(parallel.max(1))),
            phase1_spacing,
            last_phase1_start: Mutex::new(None),
        }
    }

    /// Waits for a pipeline slot. The permit is held for the whole pipeline.
    pub async fn acquire_slot(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed")
    }

    /// Suspends the caller until the pacing interval since the previous
    /// phase-1 start has elapsed, then records this start. The check and
    /// the update happen under one lock acquisition, so two waiters can
    /// never both observe an expired interval and start together.
    pub async fn pace_phase1(&self) {
        loop {
            let wait = {
                let mut last = self.last_phase1_start.lock().await;
                let now = Instant::now();
                match *last {
                    Some(prev) if now < prev + self.phase1_spacing => prev + self.phase1_spacing - now,
                    _ => {
                        *last = Some(now);
                        return;
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

/// The phase-2 serializer: phase 2 is exclusive on the GPU, so it runs for
/// at most one sector at a time regardless of pipeline parallelism.
#[derive(Default)]
pub struct ExclusivePhase {
    lock: Mutex<()>,
}

impl ExclusivePhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held exactly for the duration of phase 2, released before any
    /// further processing of its output.
    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}
