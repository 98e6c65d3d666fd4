// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Per-viewport state machine.
//!
//! One [`ViewportAgent`] exists per mounted viewport placeholder and drives
//! that viewport through the guard/commit phases of a transition. The agent
//! keeps two independent state fields: `curr` for the mounted component and
//! `next` for the incoming one, both inspectable at any time. An idle agent
//! always has `next = Empty`.
//!
//! Happy-path forward walks:
//!
//! ```text
//! next: Empty → Scheduled → CanLoad → CanLoadDone → Load → LoadDone → Activate
//! curr: Active → CanUnload → CanUnloadDone → Unload → UnloadDone → Deactivate → Empty
//! ```
//!
//! Every operation validates the (curr, next) pair it requires; a pair
//! outside the expected range is a fatal consistency error, never a
//! recoverable condition. Within one agent the own-component guard strictly
//! precedes its children (`can_unload`/`can_load`) while the own-component
//! hook strictly follows its children (`unload`/`load`); the latter ordering
//! is enforced with a nested [`Batch`] owned by the stage that needs it.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

use crate::domain::batch::{Batch, BatchUnit};
use crate::domain::component::{CanResult, ComponentAdapter};
use crate::domain::context::ContextId;
use crate::domain::error::RouterError;
use crate::domain::instruction::SwapStrategy;
use crate::domain::route::{Plan, ViewportDecl};
use crate::domain::transition::{Transition, TransitionId};
use crate::domain::tree::RouteNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// States
// ============================================================================

/// Phase of the mounted (outgoing) component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrState {
    Empty,
    Active,
    CanUnload,
    CanUnloadDone,
    Unload,
    UnloadDone,
    Deactivate,
}

/// Phase of the incoming component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Empty,
    Scheduled,
    CanLoad,
    CanLoadDone,
    Load,
    LoadDone,
    Activate,
}

impl fmt::Display for CurrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Active => "active",
            Self::CanUnload => "can-unload",
            Self::CanUnloadDone => "can-unload-done",
            Self::Unload => "unload",
            Self::UnloadDone => "unload-done",
            Self::Deactivate => "deactivate",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Scheduled => "scheduled",
            Self::CanLoad => "can-load",
            Self::CanLoadDone => "can-load-done",
            Self::Load => "load",
            Self::LoadDone => "load-done",
            Self::Activate => "activate",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Agent
// ============================================================================

struct AgentState {
    curr: CurrState,
    next: NextState,
    plan: Plan,
    /// The viewport loses its content in this transition.
    removal: bool,
    transition: Option<TransitionId>,
    cur_ca: Option<Arc<dyn ComponentAdapter>>,
    next_ca: Option<Arc<dyn ComponentAdapter>>,
    curr_node: Option<Arc<RouteNode>>,
    next_node: Option<Arc<RouteNode>>,
}

pub struct ViewportAgent {
    pub id: AgentId,
    context: ContextId,
    decl: ViewportDecl,
    me: Weak<ViewportAgent>,
    state: Mutex<AgentState>,
}

impl ViewportAgent {
    pub fn new(context: ContextId, decl: ViewportDecl) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id: AgentId::new(),
            context,
            decl,
            me: me.clone(),
            state: Mutex::new(AgentState {
                curr: CurrState::Empty,
                next: NextState::Empty,
                plan: Plan::None,
                removal: false,
                transition: None,
                cur_ca: None,
                next_ca: None,
                curr_node: None,
                next_node: None,
            }),
        })
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    fn strong(&self) -> Arc<Self> {
        self.me.upgrade().expect("agent is owned by its context")
    }

    pub fn decl(&self) -> &ViewportDecl {
        &self.decl
    }

    pub fn viewport_name(&self) -> &str {
        &self.decl.name
    }

    pub fn states(&self) -> (CurrState, NextState) {
        let st = self.state.lock();
        (st.curr, st.next)
    }

    pub fn plan(&self) -> Plan {
        self.state.lock().plan
    }

    pub fn is_scheduled_for(&self, transition: TransitionId) -> bool {
        self.state.lock().transition == Some(transition)
    }

    pub fn has_current(&self) -> bool {
        self.state.lock().curr_node.is_some()
    }

    pub fn current_node(&self) -> Option<Arc<RouteNode>> {
        self.state.lock().curr_node.clone()
    }

    pub fn current_component(&self) -> Option<String> {
        self.state
            .lock()
            .curr_node
            .as_ref()
            .map(|n| n.component_name().to_string())
    }

    fn unexpected(&self, op: &'static str, st: &AgentState) -> RouterError {
        RouterError::UnexpectedState {
            op,
            viewport: self.decl.name.clone(),
            curr: st.curr.to_string(),
            next: st.next.to_string(),
        }
    }

    fn expect(
        &self,
        op: &'static str,
        st: &AgentState,
        curr_ok: &[CurrState],
        next_ok: &[NextState],
    ) -> Result<(), RouterError> {
        if curr_ok.contains(&st.curr) && next_ok.contains(&st.next) {
            Ok(())
        } else {
            Err(self.unexpected(op, st))
        }
    }

    // ------------------------------------------------------------------
    // Scheduling
    // ------------------------------------------------------------------

    /// Bind the incoming node for this transition and decide the plan.
    /// Called once per viewport per transition, before any guard runs.
    pub fn schedule_update(
        &self,
        tr: &Arc<Transition>,
        node: Arc<RouteNode>,
    ) -> Result<(), RouterError> {
        let plan = {
            let mut st = self.state.lock();
            if st.transition.is_some() {
                return Err(self.unexpected("schedule-update", &st));
            }
            self.expect(
                "schedule-update",
                &st,
                &[CurrState::Empty, CurrState::Active],
                &[NextState::Empty],
            )?;
            let plan = match &st.curr_node {
                Some(curr) if curr.component_name() == node.component_name() => {
                    let configured = node
                        .config
                        .as_ref()
                        .and_then(|config| config.transition_plan.as_ref());
                    match configured {
                        Some(transition_plan) => transition_plan.resolve(curr, &node),
                        None if curr.params != node.params
                            || curr.query_params != node.query_params =>
                        {
                            Plan::InvokeLifecycles
                        }
                        None => Plan::None,
                    }
                }
                _ => Plan::Replace,
            };
            st.plan = plan;
            st.removal = false;
            st.next = NextState::Scheduled;
            st.next_node = Some(node);
            st.transition = Some(tr.id);
            plan
        };
        tr.register_touched(self.strong());
        debug!(
            transition_id = %tr.id,
            viewport = %self.decl.name,
            plan = %plan,
            "scheduled viewport update"
        );
        Ok(())
    }

    /// Mark this viewport as losing its content in this transition. Returns
    /// `false` for a vacant viewport, which has nothing to remove.
    pub fn schedule_removal(&self, tr: &Arc<Transition>) -> Result<bool, RouterError> {
        {
            let mut st = self.state.lock();
            if st.curr_node.is_none() {
                return Ok(false);
            }
            if st.transition.is_some() {
                return Err(self.unexpected("schedule-removal", &st));
            }
            self.expect(
                "schedule-removal",
                &st,
                &[CurrState::Active],
                &[NextState::Empty],
            )?;
            st.plan = Plan::Replace;
            st.removal = true;
            st.transition = Some(tr.id);
        }
        tr.register_touched(self.strong());
        debug!(
            transition_id = %tr.id,
            viewport = %self.decl.name,
            "scheduled viewport removal"
        );
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Guard phases
    // ------------------------------------------------------------------

    pub fn can_unload(&self, tr: &Arc<Transition>, batch: &Arc<Batch>) {
        if !tr.guards_passing() || tr.failed() {
            return;
        }
        spawn_unit(
            tr,
            batch,
            self.strong().run_can_unload(Arc::clone(tr), Arc::clone(batch)),
        );
    }

    async fn run_can_unload(
        self: Arc<Self>,
        tr: Arc<Transition>,
        batch: Arc<Batch>,
    ) -> Result<(), RouterError> {
        if !tr.guards_passing() || tr.failed() {
            return Ok(());
        }
        let (plan, removal, cur_ca, curr_node, next_node) = {
            let mut st = self.state.lock();
            if st.transition != Some(tr.id) || st.curr_node.is_none() {
                return Ok(());
            }
            self.expect(
                "can-unload",
                &st,
                &[CurrState::Active],
                &[NextState::Empty, NextState::Scheduled],
            )?;
            st.curr = CurrState::CanUnload;
            (
                st.plan,
                st.removal,
                st.cur_ca.clone(),
                st.curr_node.clone().ok_or_else(|| self.unexpected("can-unload", &st))?,
                st.next_node.clone(),
            )
        };
        if plan != Plan::None {
            for hook in tr.engine().hooks() {
                if !tr.guards_passing() {
                    break;
                }
                if !hook.can_unload(&curr_node).await? {
                    tr.veto();
                }
            }
            if tr.guards_passing() {
                if let Some(adapter) = &cur_ca {
                    if !adapter.can_unload(next_node.as_deref(), &curr_node).await? {
                        tr.veto();
                    }
                }
            }
        }
        self.state.lock().curr = CurrState::CanUnloadDone;
        if !tr.guards_passing() {
            return Ok(());
        }
        let tearing_down = removal || plan == Plan::Replace;
        for child in &curr_node.children {
            let agent = child_agent(&tr, child)?;
            if tearing_down {
                agent.schedule_removal(&tr)?;
            }
            agent.can_unload(&tr, &batch);
        }
        Ok(())
    }

    pub fn can_load(&self, tr: &Arc<Transition>, batch: &Arc<Batch>) {
        if !tr.guards_passing() || tr.failed() {
            return;
        }
        spawn_unit(
            tr,
            batch,
            self.strong().run_can_load(Arc::clone(tr), Arc::clone(batch)),
        );
    }

    async fn run_can_load(
        self: Arc<Self>,
        tr: Arc<Transition>,
        batch: Arc<Batch>,
    ) -> Result<(), RouterError> {
        if !tr.guards_passing() || tr.failed() {
            return Ok(());
        }
        let (plan, cur_ca, curr_node, next_node) = {
            let mut st = self.state.lock();
            if st.transition != Some(tr.id) || st.next != NextState::Scheduled {
                return Ok(());
            }
            self.expect(
                "can-load",
                &st,
                &[CurrState::Empty, CurrState::CanUnloadDone],
                &[NextState::Scheduled],
            )?;
            st.next = NextState::CanLoad;
            let next_node = st
                .next_node
                .clone()
                .ok_or_else(|| self.unexpected("can-load", &st))?;
            (st.plan, st.cur_ca.clone(), st.curr_node.clone(), next_node)
        };

        // Resolve the incoming adapter: a fresh (possibly lazily loaded)
        // instance under `replace`, the continuing instance otherwise.
        let adapter = match plan {
            Plan::Replace => {
                let component = next_node.component.clone().ok_or_else(|| {
                    RouterError::MissingContext {
                        node: next_node.id.to_string(),
                        viewport: self.decl.name.clone(),
                    }
                })?;
                component.create_adapter().await?
            }
            Plan::None | Plan::InvokeLifecycles => cur_ca.clone().ok_or_else(|| {
                RouterError::MissingContext {
                    node: next_node.id.to_string(),
                    viewport: self.decl.name.clone(),
                }
            })?,
        };

        if plan != Plan::None {
            for hook in tr.engine().hooks() {
                if !tr.guards_passing() {
                    break;
                }
                match hook.can_load(&next_node).await? {
                    CanResult::Allow => {}
                    CanResult::Veto => tr.veto(),
                    CanResult::Redirect(target) => tr.redirect(target),
                }
            }
            if tr.guards_passing() {
                match adapter
                    .can_load(&next_node.params, &next_node, curr_node.as_deref())
                    .await?
                {
                    CanResult::Allow => {}
                    CanResult::Veto => tr.veto(),
                    CanResult::Redirect(target) => tr.redirect(target),
                }
            }
        }
        {
            let mut st = self.state.lock();
            st.next_ca = Some(adapter);
            st.next = NextState::CanLoadDone;
        }
        if !tr.guards_passing() {
            return Ok(());
        }
        for child in &next_node.children {
            child_agent(&tr, child)?.can_load(&tr, &batch);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutation phases
    // ------------------------------------------------------------------

    pub fn unload(&self, tr: &Arc<Transition>, batch: &Arc<Batch>) {
        if tr.failed() {
            return;
        }
        spawn_unit(tr, batch, self.strong().run_unload(Arc::clone(tr)));
    }

    async fn run_unload(self: Arc<Self>, tr: Arc<Transition>) -> Result<(), RouterError> {
        if tr.failed() {
            return Ok(());
        }
        let (plan, removal, cur_ca, curr_node, next_node) = {
            let st = self.state.lock();
            if st.transition != Some(tr.id) || st.curr_node.is_none() {
                return Ok(());
            }
            (
                st.plan,
                st.removal,
                st.cur_ca.clone(),
                st.curr_node.clone().ok_or_else(|| self.unexpected("unload", &st))?,
                st.next_node.clone(),
            )
        };

        // Children strictly precede the own component.
        let nested = Batch::new();
        for child in &curr_node.children {
            child_agent(&tr, child)?.unload(&tr, &nested);
        }
        nested.start();
        nested.join().await;
        if tr.failed() {
            return Ok(());
        }

        {
            let mut st = self.state.lock();
            self.expect(
                "unload",
                &st,
                &[CurrState::CanUnloadDone],
                &[NextState::Empty, NextState::CanLoadDone],
            )?;
            st.curr = CurrState::Unload;
        }
        if removal || plan != Plan::None {
            for hook in tr.engine().hooks() {
                hook.unloading(&curr_node).await?;
            }
            if let Some(adapter) = &cur_ca {
                adapter.unloading(next_node.as_deref(), &curr_node).await?;
            }
        }
        self.state.lock().curr = CurrState::UnloadDone;
        debug!(transition_id = %tr.id, viewport = %self.decl.name, "unloaded");
        Ok(())
    }

    pub fn load(&self, tr: &Arc<Transition>, batch: &Arc<Batch>) {
        if tr.failed() {
            return;
        }
        spawn_unit(tr, batch, self.strong().run_load(Arc::clone(tr)));
    }

    async fn run_load(self: Arc<Self>, tr: Arc<Transition>) -> Result<(), RouterError> {
        if tr.failed() {
            return Ok(());
        }
        let (plan, next_ca, curr_node, next_node) = {
            let st = self.state.lock();
            if st.transition != Some(tr.id) || st.next_node.is_none() {
                return Ok(());
            }
            (
                st.plan,
                st.next_ca.clone(),
                st.curr_node.clone(),
                st.next_node.clone().ok_or_else(|| self.unexpected("load", &st))?,
            )
        };

        // Children strictly precede the own component.
        let nested = Batch::new();
        for child in &next_node.children {
            child_agent(&tr, child)?.load(&tr, &nested);
        }
        nested.start();
        nested.join().await;
        if tr.failed() {
            return Ok(());
        }

        {
            let mut st = self.state.lock();
            self.expect(
                "load",
                &st,
                &[CurrState::Empty, CurrState::UnloadDone],
                &[NextState::CanLoadDone],
            )?;
            st.next = NextState::Load;
        }
        if plan != Plan::None {
            for hook in tr.engine().hooks() {
                hook.loading(&next_node).await?;
            }
            if let Some(adapter) = &next_ca {
                adapter
                    .loading(&next_node.params, &next_node, curr_node.as_deref())
                    .await?;
            }
        }
        self.state.lock().next = NextState::LoadDone;
        debug!(transition_id = %tr.id, viewport = %self.decl.name, "loaded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Swap
    // ------------------------------------------------------------------

    /// Combine deactivate/activate for this viewport per the transition's
    /// swap strategy. Degenerates to a plain activate or deactivate when one
    /// side is empty; recurses for viewports whose own component is kept.
    pub fn swap(&self, tr: &Arc<Transition>, batch: &Arc<Batch>) {
        if tr.failed() {
            return;
        }
        spawn_unit(
            tr,
            batch,
            self.strong().run_swap(Arc::clone(tr), Arc::clone(batch)),
        );
    }

    async fn run_swap(
        self: Arc<Self>,
        tr: Arc<Transition>,
        batch: Arc<Batch>,
    ) -> Result<(), RouterError> {
        if tr.failed() {
            return Ok(());
        }
        let (plan, removal, curr_node, next_node) = {
            let st = self.state.lock();
            if st.transition != Some(tr.id) {
                return Ok(());
            }
            (st.plan, st.removal, st.curr_node.clone(), st.next_node.clone())
        };

        if removal {
            return Arc::clone(&self).deactivate_subtree(Arc::clone(&tr)).await;
        }
        match plan {
            Plan::Replace => match (curr_node.is_some(), next_node.is_some()) {
                (true, true) => match tr.swap_strategy() {
                    SwapStrategy::SequentialRemoveFirst => {
                        Arc::clone(&self).deactivate_subtree(Arc::clone(&tr)).await?;
                        Arc::clone(&self).activate_subtree(Arc::clone(&tr)).await?;
                    }
                    SwapStrategy::SequentialAddFirst => {
                        Arc::clone(&self).activate_subtree(Arc::clone(&tr)).await?;
                        Arc::clone(&self).deactivate_subtree(Arc::clone(&tr)).await?;
                    }
                    SwapStrategy::ParallelRemoveFirst => {
                        // Removal is initiated first; both run interleaved.
                        let deactivate = Arc::clone(&self).deactivate_subtree(Arc::clone(&tr));
                        let activate = Arc::clone(&self).activate_subtree(Arc::clone(&tr));
                        futures::future::try_join(deactivate, activate).await?;
                    }
                },
                (false, true) => {
                    Arc::clone(&self).activate_subtree(Arc::clone(&tr)).await?;
                }
                (true, false) => {
                    Arc::clone(&self).deactivate_subtree(Arc::clone(&tr)).await?;
                }
                (false, false) => {}
            },
            Plan::None | Plan::InvokeLifecycles => {
                // The own component stays mounted; swaps may still be needed
                // deeper in the tree.
                let mut seen: HashSet<AgentId> = HashSet::new();
                let children = next_node
                    .iter()
                    .chain(curr_node.iter())
                    .flat_map(|node| node.children.iter());
                for child in children {
                    let agent = child_agent(&tr, child)?;
                    if seen.insert(agent.id) {
                        agent.swap(&tr, &batch);
                    }
                }
            }
        }
        Ok(())
    }

    fn activate_subtree(
        self: Arc<Self>,
        tr: Arc<Transition>,
    ) -> BoxFuture<'static, Result<(), RouterError>> {
        Box::pin(async move {
            let (next_ca, next_node) = {
                let mut st = self.state.lock();
                if st.transition != Some(tr.id) || st.next_node.is_none() {
                    return Ok(());
                }
                self.expect(
                    "activate",
                    &st,
                    &[CurrState::Empty, CurrState::UnloadDone, CurrState::Deactivate],
                    &[NextState::LoadDone],
                )?;
                st.next = NextState::Activate;
                (
                    st.next_ca.clone(),
                    st.next_node.clone().ok_or_else(|| self.unexpected("activate", &st))?,
                )
            };
            if let Some(adapter) = &next_ca {
                adapter.activate().await?;
            }
            debug!(transition_id = %tr.id, viewport = %self.decl.name, "activated");
            for child in &next_node.children {
                child_agent(&tr, child)?
                    .activate_subtree(Arc::clone(&tr))
                    .await?;
            }
            Ok(())
        })
    }

    fn deactivate_subtree(
        self: Arc<Self>,
        tr: Arc<Transition>,
    ) -> BoxFuture<'static, Result<(), RouterError>> {
        Box::pin(async move {
            let (cur_ca, curr_node) = {
                let st = self.state.lock();
                if st.transition != Some(tr.id) || st.curr_node.is_none() {
                    return Ok(());
                }
                self.expect("deactivate", &st, &[CurrState::UnloadDone], ANY_NEXT)?;
                (
                    st.cur_ca.clone(),
                    st.curr_node.clone().ok_or_else(|| self.unexpected("deactivate", &st))?,
                )
            };
            for child in &curr_node.children {
                child_agent(&tr, child)?
                    .deactivate_subtree(Arc::clone(&tr))
                    .await?;
            }
            self.state.lock().curr = CurrState::Deactivate;
            if let Some(adapter) = &cur_ca {
                adapter.deactivate().await?;
            }
            debug!(transition_id = %tr.id, viewport = %self.decl.name, "deactivated");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Commit / rollback
    // ------------------------------------------------------------------

    /// Drop the incoming side only. The mounted component stays untouched.
    pub fn cancel_update(&self, tr: &Transition) {
        let mut st = self.state.lock();
        if st.transition != Some(tr.id) {
            return;
        }
        st.next = NextState::Empty;
        st.next_ca = None;
        st.next_node = None;
        st.removal = false;
        st.plan = Plan::None;
        st.curr = if st.curr_node.is_some() {
            CurrState::Active
        } else {
            CurrState::Empty
        };
        st.transition = None;
        debug!(transition_id = %tr.id, viewport = %self.decl.name, "update cancelled");
    }

    /// Commit the transition for this viewport: promote next* → curr* (or
    /// discard, per plan), reset `next` to `Empty`, and release the
    /// transition binding.
    pub fn end_transition(&self, tr: &Transition) -> Result<(), RouterError> {
        let mut st = self.state.lock();
        if st.transition != Some(tr.id) {
            return Err(RouterError::TransitionMismatch {
                viewport: self.decl.name.clone(),
                transition: tr.id.0,
            });
        }
        if st.removal {
            self.expect(
                "end-transition",
                &st,
                &[CurrState::Deactivate],
                &[NextState::Empty],
            )?;
            st.cur_ca = None;
            st.curr_node = None;
            st.curr = CurrState::Empty;
        } else if st.next_node.is_some() {
            match st.plan {
                Plan::Replace => {
                    self.expect(
                        "end-transition",
                        &st,
                        &[CurrState::Empty, CurrState::Deactivate],
                        &[NextState::Activate],
                    )?;
                    st.cur_ca = st.next_ca.take();
                    st.curr_node = st.next_node.take();
                    st.curr = CurrState::Active;
                }
                Plan::None | Plan::InvokeLifecycles => {
                    self.expect(
                        "end-transition",
                        &st,
                        &[CurrState::UnloadDone],
                        &[NextState::LoadDone],
                    )?;
                    st.curr_node = st.next_node.take();
                    st.curr = CurrState::Active;
                }
            }
        }
        st.next = NextState::Empty;
        st.next_ca = None;
        st.next_node = None;
        st.removal = false;
        st.plan = Plan::None;
        st.transition = None;
        debug!(transition_id = %tr.id, viewport = %self.decl.name, "transition ended");
        Ok(())
    }
}

const ANY_NEXT: &[NextState] = &[
    NextState::Empty,
    NextState::Scheduled,
    NextState::CanLoad,
    NextState::CanLoadDone,
    NextState::Load,
    NextState::LoadDone,
    NextState::Activate,
];

impl fmt::Debug for ViewportAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (curr, next) = self.states();
        f.debug_struct("ViewportAgent")
            .field("viewport", &self.decl.name)
            .field("curr", &curr.to_string())
            .field("next", &next.to_string())
            .finish()
    }
}

/// Spawn one batch-tracked unit; errors inside it are routed to the
/// transition's single error slot.
fn spawn_unit(
    tr: &Arc<Transition>,
    batch: &Arc<Batch>,
    fut: impl Future<Output = Result<(), RouterError>> + Send + 'static,
) {
    let unit = BatchUnit::new(batch);
    let tr = Arc::clone(tr);
    tokio::spawn(async move {
        if let Err(error) = fut.await {
            tr.handle_error(error);
        }
        drop(unit);
    });
}

/// The agent serving a child node, looked up through the transition engine.
fn child_agent(tr: &Transition, node: &RouteNode) -> Result<Arc<ViewportAgent>, RouterError> {
    let missing = || RouterError::MissingContext {
        node: node.id.to_string(),
        viewport: node.viewport.clone(),
    };
    let agent_id = node.agent.ok_or_else(missing)?;
    tr.engine()
        .context(node.context)
        .and_then(|context| context.agent_by_id(agent_id))
        .ok_or_else(missing)
}
