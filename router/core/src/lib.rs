// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Meridian router core.
//!
//! The navigation/transition engine: resolves navigation requests against a
//! tree of nested viewports, decides which components are added, removed, or
//! reused, runs ordered asynchronous guard/lifecycle hooks, and commits the
//! result atomically relative to competing concurrent requests.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **domain** — value objects (instructions, route trees), the per-viewport
//!   state machine, the Batch coordination primitive, and the collaborator
//!   trait seams.
//! - **application** — the [`Router`] orchestrator and the candidate-tree
//!   builder.
//! - **infrastructure** — the navigation event bus and reference
//!   implementations of the consumed collaborators.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Router, RouterConfig, RouterOptions};
pub use domain::agent::{AgentId, CurrState, NextState, ViewportAgent};
pub use domain::batch::{Batch, BatchUnit};
pub use domain::component::{
    CanResult, Component, ComponentAdapter, ComponentRegistry, TransitionHooks,
};
pub use domain::context::{ContextArena, ContextId, RouteContext};
pub use domain::error::RouterError;
pub use domain::events::{CancelReason, NavigationEvent};
pub use domain::history::{HistoryApi, LocationChange};
pub use domain::instruction::{
    ComponentRef, HistoryStrategy, NavigationOptions, NavigationRequest, Params, RoutingMode,
    SameUrlStrategy, SwapStrategy, Trigger, ViewportInstruction, ViewportInstructionTree,
};
pub use domain::recognizer::{Recognition, RecognizerFactory, RouteRecognizer};
pub use domain::route::{Plan, RouteConfig, TransitionPlan, ViewportDecl, DEFAULT_VIEWPORT};
pub use domain::transition::{
    GuardsResult, SharedOutcome, Transition, TransitionEngine, TransitionId,
};
pub use domain::tree::{NodeId, RouteNode, RouteTree};
pub use infrastructure::event_bus::{EventBus, EventBusError, EventReceiver};
pub use infrastructure::history::InMemoryHistory;
pub use infrastructure::recognizer::{SegmentRecognizer, SegmentRecognizerFactory};
