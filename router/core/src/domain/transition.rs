// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! One in-flight navigation attempt.
//!
//! A [`Transition`] carries the instruction tree being navigated to, a
//! snapshot of the committed state it started from, the candidate route
//! tree, the guards cell (first non-passing result wins), the roster of
//! touched viewport agents, and one [`SharedOutcome`] every interested
//! caller awaits. Deduplicated, redirected, and superseded navigations all
//! reuse the outcome so a caller's future resolves exactly once, with the
//! final result only.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

use crate::domain::agent::ViewportAgent;
use crate::domain::component::TransitionHooks;
use crate::domain::context::{ContextId, RouteContext};
use crate::domain::error::RouterError;
use crate::domain::instruction::{
    NavigationOptions, SwapStrategy, Trigger, ViewportInstructionTree,
};
use crate::domain::tree::RouteTree;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct TransitionId(pub u64);

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Guard verdict for a transition. Starts `Passing`; the first veto or
/// redirect anywhere wins for all subsequent decisions.
#[derive(Debug, Clone)]
pub enum GuardsResult {
    Passing,
    Vetoed,
    Redirect(ViewportInstructionTree),
}

pub type NavOutcome = Result<bool, RouterError>;

// ============================================================================
// Shared Outcome
// ============================================================================

/// A resolvable, shareable navigation outcome. Resolves at most once;
/// additional outcomes can be chained so they resolve with the same value
/// (dedupe, redirect, supersede).
#[derive(Clone)]
pub struct SharedOutcome {
    inner: Arc<Mutex<OutcomeInner>>,
}

#[derive(Default)]
struct OutcomeInner {
    result: Option<NavOutcome>,
    waiters: Vec<oneshot::Sender<NavOutcome>>,
    chained: Vec<SharedOutcome>,
}

impl SharedOutcome {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(OutcomeInner::default())),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.lock().result.is_some()
    }

    /// Resolve all waiters (and chained outcomes). The first resolution
    /// wins; later calls are ignored.
    pub fn resolve(&self, outcome: NavOutcome) {
        let (waiters, chained) = {
            let mut inner = self.inner.lock();
            if inner.result.is_some() {
                return;
            }
            inner.result = Some(outcome.clone());
            (
                std::mem::take(&mut inner.waiters),
                std::mem::take(&mut inner.chained),
            )
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
        for other in chained {
            other.resolve(outcome.clone());
        }
    }

    /// Make `other` resolve with this outcome's eventual value.
    pub fn chain(&self, other: SharedOutcome) {
        let resolved = {
            let mut inner = self.inner.lock();
            match &inner.result {
                Some(result) => Some(result.clone()),
                None => {
                    inner.chained.push(other.clone());
                    None
                }
            }
        };
        if let Some(result) = resolved {
            other.resolve(result);
        }
    }

    pub async fn wait(&self) -> NavOutcome {
        let rx = {
            let mut inner = self.inner.lock();
            if let Some(result) = &inner.result {
                return result.clone();
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push(tx);
            rx
        };
        rx.await
            .unwrap_or_else(|_| Err(RouterError::hook("navigation outcome was dropped")))
    }
}

impl Default for SharedOutcome {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Transition Engine Seam
// ============================================================================

/// What a viewport agent needs from the orchestrator while recursing:
/// context lookup for child agents and the registered cross-cutting hooks.
/// Implemented by the router's shared core.
pub trait TransitionEngine: Send + Sync {
    fn context(&self, id: ContextId) -> Option<Arc<RouteContext>>;

    fn hooks(&self) -> Vec<Arc<dyn TransitionHooks>>;
}

// ============================================================================
// Transition
// ============================================================================

/// Committed state a transition started from.
#[derive(Debug, Clone)]
pub struct PrevSnapshot {
    pub instructions: ViewportInstructionTree,
    pub url: String,
    pub tree: RouteTree,
}

pub struct Transition {
    pub id: TransitionId,
    pub trigger: Trigger,
    engine: Arc<dyn TransitionEngine>,
    swap_strategy: SwapStrategy,
    instructions: Mutex<ViewportInstructionTree>,
    prev: Mutex<Option<PrevSnapshot>>,
    next_tree: Mutex<Option<RouteTree>>,
    guards: Mutex<GuardsResult>,
    error: Mutex<Option<RouterError>>,
    touched: Mutex<Vec<Arc<ViewportAgent>>>,
    guards_started: AtomicBool,
    outcome: SharedOutcome,
}

impl Transition {
    pub fn new(
        id: TransitionId,
        trigger: Trigger,
        instructions: ViewportInstructionTree,
        swap_strategy: SwapStrategy,
        engine: Arc<dyn TransitionEngine>,
        outcome: SharedOutcome,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            trigger,
            engine,
            swap_strategy,
            instructions: Mutex::new(instructions),
            prev: Mutex::new(None),
            next_tree: Mutex::new(None),
            guards: Mutex::new(GuardsResult::Passing),
            error: Mutex::new(None),
            touched: Mutex::new(Vec::new()),
            guards_started: AtomicBool::new(false),
            outcome,
        })
    }

    pub fn engine(&self) -> &Arc<dyn TransitionEngine> {
        &self.engine
    }

    pub fn swap_strategy(&self) -> SwapStrategy {
        self.swap_strategy
    }

    pub fn instructions(&self) -> ViewportInstructionTree {
        self.instructions.lock().clone()
    }

    pub fn options(&self) -> NavigationOptions {
        self.instructions.lock().options.clone()
    }

    pub fn url(&self) -> String {
        self.instructions.lock().to_url()
    }

    /// Replace the instruction tree with its finalized (normalized) form.
    pub fn freeze_instructions(&self, instructions: ViewportInstructionTree) {
        *self.instructions.lock() = instructions;
    }

    pub fn snapshot_prev(&self, snapshot: PrevSnapshot) {
        *self.prev.lock() = Some(snapshot);
    }

    pub fn prev(&self) -> Option<PrevSnapshot> {
        self.prev.lock().clone()
    }

    pub fn set_next_tree(&self, tree: RouteTree) {
        *self.next_tree.lock() = Some(tree);
    }

    pub fn next_tree(&self) -> Option<RouteTree> {
        self.next_tree.lock().clone()
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    pub fn guards_result(&self) -> GuardsResult {
        self.guards.lock().clone()
    }

    pub fn guards_passing(&self) -> bool {
        matches!(*self.guards.lock(), GuardsResult::Passing)
    }

    /// Record a veto. The first non-passing result wins.
    pub fn veto(&self) {
        let mut guards = self.guards.lock();
        if matches!(*guards, GuardsResult::Passing) {
            *guards = GuardsResult::Vetoed;
        }
    }

    /// Record a redirect target. The first non-passing result wins.
    pub fn redirect(&self, target: ViewportInstructionTree) {
        let mut guards = self.guards.lock();
        if matches!(*guards, GuardsResult::Passing) {
            *guards = GuardsResult::Redirect(target);
        }
    }

    pub fn mark_guards_started(&self) {
        self.guards_started.store(true, Ordering::SeqCst);
    }

    pub fn guards_started(&self) -> bool {
        self.guards_started.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Route an error raised inside a batch-tracked unit to the transition.
    /// The first error wins; the router rejects the shared outcome with it.
    pub fn handle_error(&self, error: RouterError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            warn!(transition_id = %self.id, error = %error, "transition unit failed");
            *slot = Some(error);
        }
    }

    pub fn failed(&self) -> bool {
        self.error.lock().is_some()
    }

    pub fn error(&self) -> Option<RouterError> {
        self.error.lock().clone()
    }

    // ------------------------------------------------------------------
    // Touched agents
    // ------------------------------------------------------------------

    pub fn register_touched(&self, agent: Arc<ViewportAgent>) {
        self.touched.lock().push(agent);
    }

    pub fn touched(&self) -> Vec<Arc<ViewportAgent>> {
        self.touched.lock().clone()
    }

    pub fn outcome(&self) -> &SharedOutcome {
        &self.outcome
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("url", &self.url())
            .field("guards", &*self.guards.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outcome_resolves_every_waiter_once() {
        let outcome = SharedOutcome::new();
        let a = outcome.clone();
        let b = outcome.clone();
        let wait_a = tokio::spawn(async move { a.wait().await });
        let wait_b = tokio::spawn(async move { b.wait().await });
        outcome.resolve(Ok(true));
        outcome.resolve(Ok(false));
        assert_eq!(wait_a.await.unwrap().unwrap(), true);
        assert_eq!(wait_b.await.unwrap().unwrap(), true);
        assert_eq!(outcome.wait().await.unwrap(), true);
    }

    #[tokio::test]
    async fn chained_outcome_follows_the_source() {
        let source = SharedOutcome::new();
        let follower = SharedOutcome::new();
        source.chain(follower.clone());
        source.resolve(Ok(false));
        assert_eq!(follower.wait().await.unwrap(), false);

        // Chaining onto an already-resolved source resolves immediately.
        let late = SharedOutcome::new();
        source.chain(late.clone());
        assert_eq!(late.wait().await.unwrap(), false);
    }

    struct NullEngine;

    impl TransitionEngine for NullEngine {
        fn context(&self, _id: ContextId) -> Option<Arc<RouteContext>> {
            None
        }

        fn hooks(&self) -> Vec<Arc<dyn TransitionHooks>> {
            Vec::new()
        }
    }

    fn transition() -> Arc<Transition> {
        Transition::new(
            TransitionId(1),
            Trigger::Api,
            ViewportInstructionTree::default(),
            SwapStrategy::SequentialRemoveFirst,
            Arc::new(NullEngine),
            SharedOutcome::new(),
        )
    }

    #[test]
    fn first_non_passing_guard_result_wins() {
        let tr = transition();
        assert!(tr.guards_passing());
        tr.veto();
        tr.redirect(ViewportInstructionTree::default());
        assert!(matches!(tr.guards_result(), GuardsResult::Vetoed));

        let tr = transition();
        tr.redirect(ViewportInstructionTree::default());
        tr.veto();
        assert!(matches!(tr.guards_result(), GuardsResult::Redirect(_)));
    }

    #[test]
    fn first_error_wins() {
        let tr = transition();
        tr.handle_error(RouterError::hook("first"));
        tr.handle_error(RouterError::hook("second"));
        match tr.error() {
            Some(RouterError::Hook(message)) => assert_eq!(message, "first"),
            other => panic!("unexpected error slot: {other:?}"),
        }
    }
}
