// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Fan-out/fan-in completion coordinator.
//!
//! A pipeline stage must await an a-priori-unknown set of async units: one
//! per affected viewport, discovered recursively while the stage is already
//! running. A [`Batch`] tracks them with a pending counter instead of
//! pre-counting. Every unit calls `push()` before it starts and `pop()`
//! exactly once when it is done, whether it finished inline or after an
//! awaited suspension; the completion signal fires exactly once, the first
//! time the counter reaches zero after [`Batch::start`].
//!
//! A continuation that must also wait on work issued after it was queued is
//! expressed as a *nested* batch: the stage that needs children-before-own
//! ordering creates its own `Batch`, spawns the child units onto it, and
//! awaits it before proceeding. Each nested batch is owned exclusively by
//! the stage that created it and is scoped to one pipeline run.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Completion coordinator for one pipeline stage.
pub struct Batch {
    pending: AtomicUsize,
    started: AtomicBool,
    done: AtomicBool,
    notify: Notify,
}

impl Batch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    /// Register one unit of work. Must precede the unit's `pop()`.
    pub fn push(&self) {
        assert!(
            !self.done.load(Ordering::SeqCst),
            "batch push after completion"
        );
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Complete one unit of work.
    pub fn pop(&self) {
        let prev = self.pending.fetch_sub(1, Ordering::SeqCst);
        assert!(prev > 0, "batch pop without matching push");
        if prev == 1 && self.started.load(Ordering::SeqCst) {
            self.complete();
        }
    }

    /// Arm the batch. Performs an initial push+pop so a stage that spawned
    /// zero async units still completes.
    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.push();
        self.pop();
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Wait until every pushed unit has popped and the batch was started.
    /// Completes immediately when the batch is already done.
    pub async fn join(&self) {
        loop {
            if self.is_done() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    fn complete(&self) {
        // Exactly-once: the first zero crossing after start wins.
        if !self.done.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }
}

/// RAII handle for one tracked unit of work: pushes on creation, pops when
/// dropped, so a unit cannot leak its `pop()` on an early return path.
pub struct BatchUnit(Arc<Batch>);

impl BatchUnit {
    pub fn new(batch: &Arc<Batch>) -> Self {
        batch.push();
        Self(Arc::clone(batch))
    }
}

impl Drop for BatchUnit {
    fn drop(&mut self) {
        self.0.pop();
    }
}
