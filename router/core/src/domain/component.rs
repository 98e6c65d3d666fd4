// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Component collaborator seam.
//!
//! The rendering machinery is external; the engine only sees two traits. A
//! [`Component`] is the static side of a routed target: its name, its own
//! route table and viewport set, and an async factory for instances (which
//! also covers lazily loaded modules). A [`ComponentAdapter`] is one mounted
//! instance driven through the guard/lifecycle phases. All hook bodies
//! default to permissive no-ops so adapters implement only what they need.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::error::RouterError;
use crate::domain::instruction::{Params, ViewportInstructionTree};
use crate::domain::route::{RouteConfig, ViewportDecl};
use crate::domain::tree::RouteNode;

/// Outcome of a `can_load` guard.
#[derive(Debug, Clone)]
pub enum CanResult {
    Allow,
    Veto,
    /// Abandon this navigation and run the given one instead; the original
    /// caller observes the redirected navigation's outcome.
    Redirect(ViewportInstructionTree),
}

/// Static definition of a routed target.
#[async_trait]
pub trait Component: Send + Sync {
    /// Registry name, also used for direct-lookup routing.
    fn name(&self) -> &str;

    /// Route table for this component's own routing scope.
    fn routes(&self) -> Vec<RouteConfig> {
        Vec::new()
    }

    /// Viewport placeholders this component renders.
    fn viewports(&self) -> Vec<ViewportDecl> {
        Vec::new()
    }

    /// Component shown by this scope when no route matches, if any.
    fn fallback(&self) -> Option<String> {
        None
    }

    /// Hydrate an adapter for one mounted occurrence. Async so lazily
    /// resolved modules can load here.
    async fn create_adapter(&self) -> Result<Arc<dyn ComponentAdapter>, RouterError>;
}

/// One mounted component instance.
#[async_trait]
pub trait ComponentAdapter: Send + Sync {
    async fn can_load(
        &self,
        _params: &Params,
        _next: &RouteNode,
        _current: Option<&RouteNode>,
    ) -> Result<CanResult, RouterError> {
        Ok(CanResult::Allow)
    }

    async fn loading(
        &self,
        _params: &Params,
        _next: &RouteNode,
        _current: Option<&RouteNode>,
    ) -> Result<(), RouterError> {
        Ok(())
    }

    async fn can_unload(
        &self,
        _next: Option<&RouteNode>,
        _current: &RouteNode,
    ) -> Result<bool, RouterError> {
        Ok(true)
    }

    async fn unloading(
        &self,
        _next: Option<&RouteNode>,
        _current: &RouteNode,
    ) -> Result<(), RouterError> {
        Ok(())
    }

    /// Mount the instance.
    async fn activate(&self) -> Result<(), RouterError> {
        Ok(())
    }

    /// Unmount the instance.
    async fn deactivate(&self) -> Result<(), RouterError> {
        Ok(())
    }
}

/// Cross-cutting lifecycle participant registered with the router.
///
/// For every affected node, registered participants fire in registration
/// order, then the component's own same-named hook — identically for the
/// `can_load`/`loading` pair and the `can_unload`/`unloading` pair.
#[async_trait]
pub trait TransitionHooks: Send + Sync {
    async fn can_load(&self, _next: &RouteNode) -> Result<CanResult, RouterError> {
        Ok(CanResult::Allow)
    }

    async fn loading(&self, _next: &RouteNode) -> Result<(), RouterError> {
        Ok(())
    }

    async fn can_unload(&self, _current: &RouteNode) -> Result<bool, RouterError> {
        Ok(true)
    }

    async fn unloading(&self, _current: &RouteNode) -> Result<(), RouterError> {
        Ok(())
    }
}

/// Component registry: name → definition.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: Arc<DashMap<String, Arc<dyn Component>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, component: Arc<dyn Component>) {
        self.components
            .insert(component.name().to_string(), component);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.get(name).map(|entry| Arc::clone(&entry))
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Component>, RouterError> {
        self.get(name)
            .ok_or_else(|| RouterError::ComponentNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare(&'static str);

    #[async_trait]
    impl Component for Bare {
        fn name(&self) -> &str {
            self.0
        }

        async fn create_adapter(&self) -> Result<Arc<dyn ComponentAdapter>, RouterError> {
            Ok(Arc::new(Inert))
        }
    }

    struct Inert;

    #[async_trait]
    impl ComponentAdapter for Inert {}

    #[test]
    fn registry_resolves_registered_components() {
        let registry = ComponentRegistry::new();
        registry.register(Arc::new(Bare("home")));
        assert!(registry.get("home").is_some());
        assert!(registry.resolve("home").is_ok());
        assert!(matches!(
            registry.resolve("missing"),
            Err(RouterError::ComponentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn default_adapter_hooks_are_permissive() {
        let adapter = Inert;
        assert!(adapter.activate().await.is_ok());
        assert!(adapter.deactivate().await.is_ok());
    }
}
