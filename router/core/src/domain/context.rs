// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Routing contexts and the context arena.
//!
//! A [`RouteContext`] exists per hydrated, viewport-hosting component
//! instance: it owns the child [`ViewportAgent`]s and a recognizer over the
//! component's configured routes. Contexts are cached in a [`ContextArena`]
//! keyed by the stable (owning agent, component definition) pair so
//! re-navigation to the same placement reuses the same context; the arena is
//! owned exclusively by the router and contexts are never shared outside
//! their owning pair.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::agent::{AgentId, ViewportAgent};
use crate::domain::component::Component;
use crate::domain::error::RouterError;
use crate::domain::recognizer::{Recognition, RecognizerFactory, RouteRecognizer};
use crate::domain::route::{RouteConfig, ViewportDecl};
use crate::domain::transition::TransitionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per hosting-component registry of viewport agents and route matching.
pub struct RouteContext {
    pub id: ContextId,
    pub parent: Option<ContextId>,
    /// Hosting component name; `None` for the application root.
    pub component: Option<String>,
    /// Component used when no route matches in this scope.
    pub fallback: Option<String>,
    routes: Vec<Arc<RouteConfig>>,
    recognizer: Arc<dyn RouteRecognizer>,
    agents: Vec<Arc<ViewportAgent>>,
}

impl RouteContext {
    pub fn new(
        parent: Option<ContextId>,
        component: Option<String>,
        routes: Vec<RouteConfig>,
        viewports: Vec<ViewportDecl>,
        fallback: Option<String>,
        recognizers: &dyn RecognizerFactory,
    ) -> Arc<Self> {
        let id = ContextId::new();
        let routes: Vec<Arc<RouteConfig>> = routes.into_iter().map(Arc::new).collect();
        let recognizer = recognizers.build(routes.clone());
        let agents = viewports
            .into_iter()
            .map(|decl| ViewportAgent::new(id, decl))
            .collect();
        Arc::new(Self {
            id,
            parent,
            component,
            fallback,
            routes,
            recognizer,
            agents,
        })
    }

    pub fn recognize(&self, segments: &[String]) -> Option<Recognition> {
        self.recognizer.recognize(segments)
    }

    pub fn routes(&self) -> &[Arc<RouteConfig>] {
        &self.routes
    }

    pub fn agents(&self) -> &[Arc<ViewportAgent>] {
        &self.agents
    }

    pub fn agent_by_id(&self, id: AgentId) -> Option<Arc<ViewportAgent>> {
        self.agents.iter().find(|a| a.id == id).cloned()
    }

    /// Display name for diagnostics.
    pub fn scope_name(&self) -> &str {
        self.component.as_deref().unwrap_or("<root>")
    }

    /// Resolve which agent serves an instruction, by explicit viewport name,
    /// `used_by` acceptance, and append rules. An agent already scheduled in
    /// this transition is taken by another instruction and is never a valid
    /// target, so appended siblings spill into the next accepting viewport.
    pub fn resolve_agent(
        &self,
        viewport: Option<&str>,
        component: &str,
        transition: TransitionId,
    ) -> Result<Arc<ViewportAgent>, RouterError> {
        for agent in &self.agents {
            if let Some(name) = viewport {
                if agent.viewport_name() != name {
                    continue;
                }
            } else if !agent.decl().accepts(component) {
                continue;
            }
            if !agent.is_scheduled_for(transition) {
                return Ok(Arc::clone(agent));
            }
        }
        Err(RouterError::ViewportNotFound {
            viewport: viewport.unwrap_or("*").to_string(),
            component: component.to_string(),
        })
    }
}

impl fmt::Debug for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteContext")
            .field("id", &self.id)
            .field("component", &self.scope_name())
            .field("routes", &self.routes.len())
            .field("agents", &self.agents.len())
            .finish()
    }
}

/// Arena of all live contexts, keyed by identity and by owning pair.
pub struct ContextArena {
    contexts: DashMap<ContextId, Arc<RouteContext>>,
    by_owner: DashMap<(AgentId, String), ContextId>,
}

impl ContextArena {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
            by_owner: DashMap::new(),
        }
    }

    pub fn insert(&self, context: Arc<RouteContext>) {
        self.contexts.insert(context.id, context);
    }

    pub fn get(&self, id: ContextId) -> Option<Arc<RouteContext>> {
        self.contexts.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Context for a component placed in a given agent, creating and caching
    /// it on first use.
    pub fn get_or_create(
        &self,
        owner: AgentId,
        parent: ContextId,
        component: &Arc<dyn Component>,
        recognizers: &dyn RecognizerFactory,
    ) -> Arc<RouteContext> {
        let key = (owner, component.name().to_string());
        if let Some(existing) = self.by_owner.get(&key) {
            if let Some(context) = self.get(*existing) {
                return context;
            }
        }
        let context = RouteContext::new(
            Some(parent),
            Some(component.name().to_string()),
            component.routes(),
            component.viewports(),
            component.fallback(),
            recognizers,
        );
        self.insert(Arc::clone(&context));
        self.by_owner.insert(key, context.id);
        context
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl Default for ContextArena {
    fn default() -> Self {
        Self::new()
    }
}
