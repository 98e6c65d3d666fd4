// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Router Application Service
//!
//! This module implements the transition orchestrator that drives navigation
//! attempts across all affected viewport agents.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Serialize navigation attempts and run the guard/mutation
//!   pipeline
//! - **Dependencies:** Domain (agents, transitions, trees), Infrastructure
//!   (event bus, recognizer, history)
//!
//! # Pipeline
//!
//! ```text
//! load(request)
//!     → enqueue (dedupe identical pending API navigations)
//!     → run:
//!         no-op check → start event → supersede boundary
//!         → build candidate tree (schedule updates/removals)
//!         → can_unload(removed) → [veto/redirect check]
//!         → can_load(added)     → [veto/redirect check]
//!         → unload(removed) → load(added) → swap
//!         → finalize (commit agents, freeze instructions, history, end event)
//! ```
//!
//! Exactly one transition executes guard/mutation phases at a time; the
//! pipeline gate is a fair async mutex, so transitions enqueued while one is
//! active queue behind it in arrival order.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::tree_builder::{flatten, TreeBuilder};
use crate::domain::agent::ViewportAgent;
use crate::domain::batch::Batch;
use crate::domain::component::{Component, ComponentRegistry, TransitionHooks};
use crate::domain::context::{ContextArena, ContextId, RouteContext};
use crate::domain::error::RouterError;
use crate::domain::events::{CancelReason, NavigationEvent};
use crate::domain::history::HistoryApi;
use crate::domain::instruction::{
    HistoryStrategy, NavigationOptions, NavigationRequest, RoutingMode, SameUrlStrategy,
    SwapStrategy, Trigger, ViewportInstruction, ViewportInstructionTree,
};
use crate::domain::recognizer::RecognizerFactory;
use crate::domain::route::{RouteConfig, ViewportDecl};
use crate::domain::transition::{
    GuardsResult, PrevSnapshot, SharedOutcome, Transition, TransitionEngine, TransitionId,
};
use crate::domain::tree::{RouteNode, RouteTree};
use crate::infrastructure::event_bus::{EventBus, EventReceiver};
use crate::infrastructure::recognizer::SegmentRecognizerFactory;

// ============================================================================
// Configuration
// ============================================================================

/// Router-wide strategy defaults, overridable per navigation.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub history_strategy: HistoryStrategy,
    pub swap_strategy: SwapStrategy,
    pub routing_mode: RoutingMode,
    pub same_url_strategy: SameUrlStrategy,
    pub event_capacity: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            history_strategy: HistoryStrategy::Push,
            swap_strategy: SwapStrategy::SequentialRemoveFirst,
            routing_mode: RoutingMode::ConfiguredFirst,
            same_url_strategy: SameUrlStrategy::Ignore,
            event_capacity: 256,
        }
    }
}

/// Root routing scope plus the component registry.
#[derive(Default)]
pub struct RouterConfig {
    pub routes: Vec<RouteConfig>,
    pub viewports: Vec<ViewportDecl>,
    pub components: Vec<Arc<dyn Component>>,
    pub fallback: Option<String>,
    pub options: RouterOptions,
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_viewport(mut self, viewport: ViewportDecl) -> Self {
        self.viewports.push(viewport);
        self
    }

    pub fn with_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_fallback(mut self, component: impl Into<String>) -> Self {
        self.fallback = Some(component.into());
        self
    }

    pub fn with_options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }
}

// ============================================================================
// Application Service: Router
// ============================================================================

struct PendingNav {
    id: TransitionId,
    url: String,
    trigger: Trigger,
    outcome: SharedOutcome,
}

struct NavState {
    /// Committed instruction tree.
    instructions: ViewportInstructionTree,
    /// Committed URL.
    url: String,
    /// The live route tree.
    tree: RouteTree,
    /// Most recently enqueued navigation, for dedupe and supersede.
    latest: Option<PendingNav>,
}

struct RouterCore {
    options: RouterOptions,
    registry: ComponentRegistry,
    recognizers: Arc<dyn RecognizerFactory>,
    arena: ContextArena,
    root_context: ContextId,
    bus: EventBus,
    history: Arc<dyn HistoryApi>,
    hooks: Mutex<Vec<Arc<dyn TransitionHooks>>>,
    nav: Mutex<NavState>,
    /// Serializes transitions: exactly one runs guard/mutation phases at a
    /// time; waiters are served in arrival order.
    gate: tokio::sync::Mutex<()>,
    ids: AtomicU64,
}

impl TransitionEngine for RouterCore {
    fn context(&self, id: ContextId) -> Option<Arc<RouteContext>> {
        self.arena.get(id)
    }

    fn hooks(&self) -> Vec<Arc<dyn TransitionHooks>> {
        self.hooks.lock().clone()
    }
}

enum RunResult {
    Done,
    Redirect(Arc<Transition>),
}

#[derive(Clone)]
pub struct Router {
    core: Arc<RouterCore>,
}

impl Router {
    pub fn new(config: RouterConfig, history: Arc<dyn HistoryApi>) -> Self {
        let registry = ComponentRegistry::new();
        for component in config.components {
            registry.register(component);
        }
        let recognizers: Arc<dyn RecognizerFactory> = Arc::new(SegmentRecognizerFactory);
        let arena = ContextArena::new();
        let viewports = if config.viewports.is_empty() {
            vec![ViewportDecl::default()]
        } else {
            config.viewports
        };
        let root = RouteContext::new(
            None,
            None,
            config.routes,
            viewports,
            config.fallback,
            recognizers.as_ref(),
        );
        let root_context = root.id;
        arena.insert(root);
        let bus = EventBus::new(config.options.event_capacity);
        Self {
            core: Arc::new(RouterCore {
                options: config.options,
                registry,
                recognizers,
                arena,
                root_context,
                bus,
                history,
                hooks: Mutex::new(Vec::new()),
                nav: Mutex::new(NavState {
                    instructions: ViewportInstructionTree::default(),
                    url: String::new(),
                    tree: RouteTree::empty(root_context),
                    latest: None,
                }),
                gate: tokio::sync::Mutex::new(()),
                ids: AtomicU64::new(0),
            }),
        }
    }

    /// Register a cross-cutting lifecycle-hook participant. Participants fire
    /// in registration order, before the component's own same-named hook.
    pub fn register_hooks(&self, hooks: Arc<dyn TransitionHooks>) {
        self.core.hooks.lock().push(hooks);
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.core.bus.subscribe()
    }

    pub fn root_context(&self) -> ContextId {
        self.core.root_context
    }

    pub fn current_url(&self) -> String {
        self.core.nav.lock().url.clone()
    }

    pub fn current_instructions(&self) -> ViewportInstructionTree {
        self.core.nav.lock().instructions.clone()
    }

    pub fn current_tree(&self) -> RouteTree {
        self.core.nav.lock().tree.clone()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Navigate. Resolves `Ok(true)` when the navigation committed,
    /// `Ok(false)` when it was vetoed or was a no-op, and `Err` when route
    /// resolution or a lifecycle hook failed.
    pub async fn load(
        &self,
        request: impl Into<NavigationRequest>,
        options: NavigationOptions,
    ) -> Result<bool, RouterError> {
        let tree = request.into().into_tree(options);
        self.enqueue(tree, Trigger::Api).await
    }

    /// Entry point for change events from the history/location collaborator;
    /// the embedder parses the URL into an instruction tree first.
    pub async fn handle_location_change(
        &self,
        tree: ViewportInstructionTree,
    ) -> Result<bool, RouterError> {
        self.publish(NavigationEvent::LocationChange {
            url: tree.to_url(),
            changed_at: Utc::now(),
        });
        self.enqueue(tree, Trigger::Location).await
    }

    /// Whether the instruction matches the committed tree under the given
    /// context (the root when `None`).
    pub fn is_active(&self, instruction: &ViewportInstruction, context: Option<ContextId>) -> bool {
        let tree = self.current_tree();
        let ctx = context.unwrap_or(self.core.root_context);
        let mut hit = false;
        tree.visit(&mut |node| {
            if !hit && node.context == ctx && instruction_matches(instruction, node) {
                hit = true;
            }
        });
        hit
    }

    async fn enqueue(
        &self,
        tree: ViewportInstructionTree,
        trigger: Trigger,
    ) -> Result<bool, RouterError> {
        let url = tree.to_url();
        let reload = tree
            .options
            .same_url_strategy
            .unwrap_or(self.core.options.same_url_strategy)
            == SameUrlStrategy::Reload;

        enum Enqueued {
            Shared(SharedOutcome),
            New(Arc<Transition>, SharedOutcome),
        }

        let enqueued = {
            let mut nav = self.core.nav.lock();
            let duplicate = trigger == Trigger::Api
                && !reload
                && nav
                    .latest
                    .as_ref()
                    .is_some_and(|pending| pending.trigger == Trigger::Api && pending.url == url);
            if duplicate {
                let pending = nav.latest.as_ref().map(|p| p.outcome.clone());
                Enqueued::Shared(pending.unwrap_or_default())
            } else {
                let id = TransitionId(self.core.ids.fetch_add(1, Ordering::Relaxed) + 1);
                let outcome = SharedOutcome::new();
                let swap = tree
                    .options
                    .swap_strategy
                    .unwrap_or(self.core.options.swap_strategy);
                let engine: Arc<dyn TransitionEngine> = self.core.clone();
                let tr = Transition::new(id, trigger, tree, swap, engine, outcome.clone());
                nav.latest = Some(PendingNav {
                    id,
                    url: url.clone(),
                    trigger,
                    outcome: outcome.clone(),
                });
                Enqueued::New(tr, outcome)
            }
        };

        match enqueued {
            Enqueued::Shared(outcome) => {
                debug!(url = %url, "deduplicated identical pending navigation");
                outcome.wait().await
            }
            Enqueued::New(tr, outcome) => {
                self.drive(tr).await;
                outcome.wait().await
            }
        }
    }

    /// Hold the pipeline gate and run the transition, following redirects
    /// under the same gate so nothing interleaves.
    async fn drive(&self, tr: Arc<Transition>) {
        let gate = Arc::clone(&self.core);
        let _permit = gate.gate.lock().await;
        let mut current = tr;
        loop {
            match self.run(&current).await {
                RunResult::Done => break,
                RunResult::Redirect(next) => current = next,
            }
        }
        let mut nav = self.core.nav.lock();
        if nav.latest.as_ref().is_some_and(|p| p.id == current.id) {
            nav.latest = None;
        }
    }

    async fn run(&self, tr: &Arc<Transition>) -> RunResult {
        let prev = {
            let nav = self.core.nav.lock();
            PrevSnapshot {
                instructions: nav.instructions.clone(),
                url: nav.url.clone(),
                tree: nav.tree.clone(),
            }
        };
        tr.snapshot_prev(prev.clone());

        // A navigation to the committed URL is a legitimate no-op unless the
        // same-URL strategy asks for a reload.
        let same_url = tr
            .options()
            .same_url_strategy
            .unwrap_or(self.core.options.same_url_strategy);
        if tr.url() == prev.url && same_url != SameUrlStrategy::Reload {
            debug!(transition_id = %tr.id, url = %prev.url, "same-URL navigation ignored");
            tr.outcome().resolve(Ok(false));
            return RunResult::Done;
        }

        self.publish(NavigationEvent::NavigationStart {
            transition_id: tr.id,
            trigger: tr.trigger,
            instructions: tr.instructions(),
            url: tr.url(),
            started_at: Utc::now(),
        });

        // Give same-runtime start subscribers a chance to react before any
        // guard runs; a newer navigation enqueued in that window wins.
        tokio::task::yield_now().await;
        let winner = {
            let nav = self.core.nav.lock();
            match &nav.latest {
                Some(pending) if pending.id > tr.id && !tr.guards_started() => {
                    Some(pending.outcome.clone())
                }
                _ => None,
            }
        };
        if let Some(winner) = winner {
            // Last writer wins at this single boundary; the abandoned
            // callers observe the winner's outcome.
            winner.chain(tr.outcome().clone());
            debug!(transition_id = %tr.id, "superseded at the start boundary");
            self.publish(NavigationEvent::NavigationCancel {
                transition_id: tr.id,
                url: tr.url(),
                reason: CancelReason::Superseded,
                cancelled_at: Utc::now(),
            });
            return RunResult::Done;
        }

        let Some(root) = self.core.arena.get(self.core.root_context) else {
            return self.fail(
                tr,
                RouterError::MissingContext {
                    node: "<root>".to_string(),
                    viewport: "<root>".to_string(),
                },
            );
        };
        let routing_mode = tr
            .options()
            .routing_mode
            .unwrap_or(self.core.options.routing_mode);
        let builder = TreeBuilder::new(
            tr,
            &self.core.registry,
            &self.core.arena,
            self.core.recognizers.as_ref(),
            routing_mode,
            self.core.root_context,
        );
        let built = match builder.build(&prev.tree, &root) {
            Ok(built) => built,
            Err(error) => return self.fail(tr, error),
        };
        tr.set_next_tree(built.tree.clone());
        tr.mark_guards_started();
        let agents = built.root_agents;

        // Guard phases, each with a veto/redirect check at the barrier.
        run_stage(&agents, |agent, batch| agent.can_unload(tr, batch)).await;
        if let Some(error) = tr.error() {
            return self.fail(tr, error);
        }
        if !tr.guards_passing() {
            return self.cancel_navigation(tr);
        }
        run_stage(&agents, |agent, batch| agent.can_load(tr, batch)).await;
        if let Some(error) = tr.error() {
            return self.fail(tr, error);
        }
        if !tr.guards_passing() {
            return self.cancel_navigation(tr);
        }

        // Mutation phases.
        run_stage(&agents, |agent, batch| agent.unload(tr, batch)).await;
        if let Some(error) = tr.error() {
            return self.fail(tr, error);
        }
        run_stage(&agents, |agent, batch| agent.load(tr, batch)).await;
        if let Some(error) = tr.error() {
            return self.fail(tr, error);
        }
        run_stage(&agents, |agent, batch| agent.swap(tr, batch)).await;
        if let Some(error) = tr.error() {
            return self.fail(tr, error);
        }

        self.finalize(tr, built.tree)
    }

    /// Veto or redirect: roll the touched agents back and either resolve
    /// `false` or re-enqueue the redirect target on the original outcome.
    fn cancel_navigation(&self, tr: &Arc<Transition>) -> RunResult {
        for agent in tr.touched() {
            agent.cancel_update(tr);
        }
        match tr.guards_result() {
            GuardsResult::Redirect(target) => {
                self.publish(NavigationEvent::NavigationCancel {
                    transition_id: tr.id,
                    url: tr.url(),
                    reason: CancelReason::Redirected,
                    cancelled_at: Utc::now(),
                });
                let id = TransitionId(self.core.ids.fetch_add(1, Ordering::Relaxed) + 1);
                let swap = target
                    .options
                    .swap_strategy
                    .unwrap_or(self.core.options.swap_strategy);
                let engine: Arc<dyn TransitionEngine> = self.core.clone();
                let redirected =
                    Transition::new(id, tr.trigger, target, swap, engine, tr.outcome().clone());
                {
                    let mut nav = self.core.nav.lock();
                    nav.latest = Some(PendingNav {
                        id,
                        url: redirected.url(),
                        trigger: tr.trigger,
                        outcome: tr.outcome().clone(),
                    });
                }
                info!(transition_id = %tr.id, redirected_to = %redirected.url(), "navigation redirected");
                RunResult::Redirect(redirected)
            }
            _ => {
                self.publish(NavigationEvent::NavigationCancel {
                    transition_id: tr.id,
                    url: tr.url(),
                    reason: CancelReason::Vetoed,
                    cancelled_at: Utc::now(),
                });
                info!(transition_id = %tr.id, url = %tr.url(), "navigation vetoed");
                tr.outcome().resolve(Ok(false));
                RunResult::Done
            }
        }
    }

    /// Route a fatal error to the single handler: roll back, publish, reject.
    fn fail(&self, tr: &Arc<Transition>, error: RouterError) -> RunResult {
        for agent in tr.touched() {
            agent.cancel_update(tr);
        }
        self.publish(NavigationEvent::NavigationError {
            transition_id: tr.id,
            url: tr.url(),
            error: error.to_string(),
            failed_at: Utc::now(),
        });
        tr.outcome().resolve(Err(error));
        RunResult::Done
    }

    fn finalize(&self, tr: &Arc<Transition>, tree: RouteTree) -> RunResult {
        for agent in tr.touched() {
            if let Err(error) = agent.end_transition(tr) {
                return self.fail(tr, error);
            }
        }

        let final_instructions = tree_instructions(&tree, tr.options());
        tr.freeze_instructions(final_instructions.clone());
        let url = final_instructions.to_url();
        {
            let mut nav = self.core.nav.lock();
            nav.instructions = final_instructions.clone();
            nav.url = url.clone();
            nav.tree = tree.clone();
        }

        let title = final_instructions.options.title.clone().or_else(|| {
            let chain = tree.title_chain();
            if chain.is_empty() {
                None
            } else {
                Some(chain.join(" | "))
            }
        });
        let strategy = final_instructions
            .options
            .history_strategy
            .unwrap_or(match tr.trigger {
                Trigger::Api => self.core.options.history_strategy,
                // The location already changed; pushing would duplicate it.
                Trigger::Location => HistoryStrategy::Replace,
            });
        let state = final_instructions.options.state.clone();
        match strategy {
            HistoryStrategy::Push => self.core.history.push_state(state, title.as_deref(), &url),
            HistoryStrategy::Replace => {
                self.core.history.replace_state(state, title.as_deref(), &url)
            }
            HistoryStrategy::None => {}
        }

        info!(transition_id = %tr.id, url = %url, "navigation committed");
        self.publish(NavigationEvent::NavigationEnd {
            transition_id: tr.id,
            instructions: final_instructions,
            url,
            finished_at: Utc::now(),
        });
        tr.outcome().resolve(Ok(true));
        RunResult::Done
    }

    fn publish(&self, event: NavigationEvent) {
        self.core.bus.publish(event);
    }
}

/// Fan one pipeline stage out over the affected root agents and wait for
/// every unit, including the ones discovered recursively.
async fn run_stage(
    agents: &[Arc<ViewportAgent>],
    op: impl Fn(&Arc<ViewportAgent>, &Arc<Batch>),
) {
    let batch = Batch::new();
    for agent in agents {
        op(agent, &batch);
    }
    batch.start();
    batch.join().await;
}

/// Rebuild the committed instruction tree from the committed route tree.
fn tree_instructions(tree: &RouteTree, options: NavigationOptions) -> ViewportInstructionTree {
    ViewportInstructionTree {
        children: tree.root.children.iter().map(node_instruction).collect(),
        query_params: tree.query_params.clone(),
        fragment: tree.fragment.clone(),
        options,
    }
}

fn node_instruction(node: &Arc<RouteNode>) -> ViewportInstruction {
    let mut instruction = node
        .instruction
        .clone()
        .unwrap_or_else(|| ViewportInstruction::new(node.component_name()));
    let children = node.children.iter().map(node_instruction).collect();
    instruction.attach_at_leaf(children);
    instruction
}

/// Structural match of an instruction against a committed node.
fn instruction_matches(instruction: &ViewportInstruction, node: &RouteNode) -> bool {
    let (want, chain) = flatten(instruction);
    let have = node
        .instruction
        .as_ref()
        .map(|i| flatten(i).0)
        .unwrap_or_else(|| vec![node.component_name().to_string()]);

    let by_name = want.first().map(String::as_str) == Some(node.component_name());
    let shared = want.len().min(have.len());
    let by_path = shared > 0 && want[..shared] == have[..shared];
    if !(by_path || (by_name && want.len() == 1)) {
        return false;
    }
    if let Some(viewport) = &instruction.viewport {
        if node.viewport != *viewport {
            return false;
        }
    }
    if !instruction
        .params
        .iter()
        .all(|(k, v)| node.params.get(k) == Some(v))
    {
        return false;
    }
    // Whatever the node's own segment chain did not cover must match among
    // its children.
    let rest: Vec<ViewportInstruction> = if want.len() > have.len() {
        vec![chain[have.len()].clone()]
    } else {
        chain
            .last()
            .map(|link| link.children.clone())
            .unwrap_or_default()
    };
    rest.iter().all(|child| {
        node.children
            .iter()
            .any(|candidate| instruction_matches(child, candidate))
    })
}

// ============================================================================
// Tests
// ============================================================================
