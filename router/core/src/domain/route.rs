// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Route configuration.
//!
//! A [`RouteConfig`] binds one or more path patterns to a component (or to a
//! `redirect_to` rewrite), a target viewport, a title, and a transition
//! plan. Configurations are immutable once handed to the router.

use std::fmt;
use std::sync::Arc;

use crate::domain::tree::RouteNode;

/// How much lifecycle work a navigation triggers for one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Nothing changed; no hooks run.
    None,
    /// Same component, new data; guard and load/unload hooks run on the one
    /// instance, no activate/deactivate.
    InvokeLifecycles,
    /// Different component; full teardown of the old and build-up of the new.
    Replace,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::InvokeLifecycles => write!(f, "invoke-lifecycles"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Plan selection strategy for a route: pinned, or computed per transition
/// from the (current, next) node pair. Resolved once per `schedule_update`.
#[derive(Clone)]
pub enum TransitionPlan {
    Static(Plan),
    Dynamic(Arc<dyn Fn(&RouteNode, &RouteNode) -> Plan + Send + Sync>),
}

impl TransitionPlan {
    pub fn resolve(&self, current: &RouteNode, next: &RouteNode) -> Plan {
        match self {
            Self::Static(plan) => *plan,
            Self::Dynamic(f) => f(current, next),
        }
    }
}

impl fmt::Debug for TransitionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(plan) => write!(f, "TransitionPlan::Static({plan})"),
            Self::Dynamic(_) => write!(f, "TransitionPlan::Dynamic(..)"),
        }
    }
}

/// One entry of a context's route table.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Stable identifier; defaults to the first path pattern.
    pub id: Option<String>,
    /// Path patterns: static segments and `:param` dynamic segments.
    pub path: Vec<String>,
    /// Registered component this route resolves to.
    pub component: Option<String>,
    /// Rewrite target re-matched against the same route table instead of a
    /// component. Mutually exclusive with `component`.
    pub redirect_to: Option<String>,
    /// Target viewport name; defaults to the instruction's explicit viewport
    /// or the context's first accepting viewport.
    pub viewport: Option<String>,
    pub title: Option<String>,
    /// Plan override; when unset the engine derives the plan from the
    /// (current, next) pair.
    pub transition_plan: Option<TransitionPlan>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: None,
            path: vec![path.into()],
            component: Some(component.into()),
            redirect_to: None,
            viewport: None,
            title: None,
            transition_plan: None,
        }
    }

    pub fn redirect(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            path: vec![path.into()],
            component: None,
            redirect_to: Some(target.into()),
            viewport: None,
            title: None,
            transition_plan: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path.push(path.into());
        self
    }

    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_transition_plan(mut self, plan: TransitionPlan) -> Self {
        self.transition_plan = Some(plan);
        self
    }

    pub fn id(&self) -> &str {
        self.id
            .as_deref()
            .or_else(|| self.path.first().map(String::as_str))
            .unwrap_or_default()
    }
}

/// Name of the implicit viewport when none is declared.
pub const DEFAULT_VIEWPORT: &str = "default";

/// A viewport placeholder declared by a hosting component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewportDecl {
    pub name: String,
    /// Component names this viewport accepts; empty accepts any.
    pub used_by: Vec<String>,
    /// Component shown when the navigation leaves this viewport without
    /// explicit content.
    pub default: Option<String>,
}

impl ViewportDecl {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            used_by: Vec::new(),
            default: None,
        }
    }

    pub fn used_by(mut self, component: impl Into<String>) -> Self {
        self.used_by.push(component.into());
        self
    }

    pub fn with_default(mut self, component: impl Into<String>) -> Self {
        self.default = Some(component.into());
        self
    }

    pub fn accepts(&self, component: &str) -> bool {
        self.used_by.is_empty() || self.used_by.iter().any(|c| c == component)
    }
}

impl Default for ViewportDecl {
    fn default() -> Self {
        Self::named(DEFAULT_VIEWPORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_id_falls_back_to_first_path() {
        let config = RouteConfig::new("product/:id", "product");
        assert_eq!(config.id(), "product/:id");
        let config = config.with_id("product");
        assert_eq!(config.id(), "product");
    }

    #[test]
    fn viewport_accepts_any_when_used_by_empty() {
        let decl = ViewportDecl::named("main");
        assert!(decl.accepts("anything"));
        let decl = decl.used_by("list");
        assert!(decl.accepts("list"));
        assert!(!decl.accepts("detail"));
    }

    #[test]
    fn static_plan_resolves_without_nodes() {
        let plan = TransitionPlan::Static(Plan::InvokeLifecycles);
        match plan {
            TransitionPlan::Static(p) => assert_eq!(p, Plan::InvokeLifecycles),
            TransitionPlan::Dynamic(_) => unreachable!(),
        }
    }
}
