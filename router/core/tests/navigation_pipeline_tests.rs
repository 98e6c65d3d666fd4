// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the navigation pipeline
//!
//! These tests drive the public surface end-to-end:
//! 1. Configure routes and components
//! 2. Navigate through the router
//! 3. Verify hook ordering, veto/redirect semantics, and committed state

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use meridian_router_core::{
    CanResult, Component, ComponentAdapter, HistoryApi, InMemoryHistory, NavigationEvent,
    NavigationOptions, Params, RouteConfig, RouteNode, Router, RouterConfig, RouterError,
    ViewportInstruction, ViewportInstructionTree,
};

type Log = Arc<Mutex<Vec<String>>>;

struct Page {
    name: &'static str,
    log: Log,
    refuse_unload: bool,
    redirect_to: Option<&'static str>,
}

impl Page {
    fn new(name: &'static str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            refuse_unload: false,
            redirect_to: None,
        })
    }

    fn stubborn(name: &'static str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            refuse_unload: true,
            redirect_to: None,
        })
    }

    fn redirecting(name: &'static str, target: &'static str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
            refuse_unload: false,
            redirect_to: Some(target),
        })
    }
}

#[async_trait]
impl Component for Page {
    fn name(&self) -> &str {
        self.name
    }

    async fn create_adapter(&self) -> Result<Arc<dyn ComponentAdapter>, RouterError> {
        Ok(Arc::new(PageInstance {
            name: self.name,
            log: Arc::clone(&self.log),
            refuse_unload: self.refuse_unload,
            redirect_to: self.redirect_to,
        }))
    }
}

struct PageInstance {
    name: &'static str,
    log: Log,
    refuse_unload: bool,
    redirect_to: Option<&'static str>,
}

#[async_trait]
impl ComponentAdapter for PageInstance {
    async fn can_load(
        &self,
        _params: &Params,
        _next: &RouteNode,
        _current: Option<&RouteNode>,
    ) -> Result<CanResult, RouterError> {
        self.log.lock().push(format!("canLoad({})", self.name));
        match self.redirect_to {
            Some(target) => Ok(CanResult::Redirect(ViewportInstructionTree::new(vec![
                ViewportInstruction::new(target),
            ]))),
            None => Ok(CanResult::Allow),
        }
    }

    async fn loading(
        &self,
        _params: &Params,
        _next: &RouteNode,
        _current: Option<&RouteNode>,
    ) -> Result<(), RouterError> {
        self.log.lock().push(format!("load({})", self.name));
        Ok(())
    }

    async fn can_unload(
        &self,
        _next: Option<&RouteNode>,
        _current: &RouteNode,
    ) -> Result<bool, RouterError> {
        self.log.lock().push(format!("canUnload({})", self.name));
        Ok(!self.refuse_unload)
    }

    async fn unloading(
        &self,
        _next: Option<&RouteNode>,
        _current: &RouteNode,
    ) -> Result<(), RouterError> {
        self.log.lock().push(format!("unload({})", self.name));
        Ok(())
    }

    async fn activate(&self) -> Result<(), RouterError> {
        self.log.lock().push(format!("activate({})", self.name));
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), RouterError> {
        self.log.lock().push(format!("deactivate({})", self.name));
        Ok(())
    }
}

fn go(name: &str) -> ViewportInstruction {
    ViewportInstruction::new(name)
}

#[tokio::test]
async fn test_navigation_runs_hooks_in_pipeline_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("home", "home"))
            .with_route(RouteConfig::new("foo", "foo"))
            .with_component(Page::new("home", &log))
            .with_component(Page::new("foo", &log)),
        history,
    );

    assert!(router
        .load(go("home"), NavigationOptions::default())
        .await
        .unwrap());
    log.lock().clear();

    assert!(router
        .load(go("foo"), NavigationOptions::default())
        .await
        .unwrap());

    // All canUnload, then all canLoad, then unload, load, swap.
    assert_eq!(
        &log.lock()[..4],
        &[
            "canUnload(home)".to_string(),
            "canLoad(foo)".to_string(),
            "unload(home)".to_string(),
            "load(foo)".to_string()
        ]
    );
}

#[tokio::test]
async fn test_veto_keeps_committed_state_and_history() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("home", "home"))
            .with_route(RouteConfig::new("foo", "foo"))
            .with_component(Page::stubborn("home", &log))
            .with_component(Page::new("foo", &log)),
        history.clone(),
    );

    router
        .load(go("home"), NavigationOptions::default())
        .await
        .unwrap();

    let committed = router
        .load(go("foo"), NavigationOptions::default())
        .await
        .unwrap();
    assert!(!committed);
    assert_eq!(router.current_url(), "home");
    assert_eq!(history.len(), 1);
    assert!(router.is_active(&go("home"), None));
    assert!(!router.is_active(&go("foo"), None));
}

#[tokio::test]
async fn test_redirecting_guard_is_transparent_to_the_caller() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("login", "login"))
            .with_route(RouteConfig::new("account", "account"))
            .with_component(Page::redirecting("account", "login", &log))
            .with_component(Page::new("login", &log)),
        history.clone(),
    );

    let committed = router
        .load(go("account"), NavigationOptions::default())
        .await
        .unwrap();
    assert!(committed, "the caller sees the redirected navigation commit");
    assert_eq!(router.current_url(), "login");
    assert_eq!(history.get_path(), "login");
    assert!(!log.lock().contains(&"activate(account)".to_string()));
}

#[tokio::test]
async fn test_repeat_navigation_is_ignored_by_default() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("home", "home"))
            .with_component(Page::new("home", &log)),
        history.clone(),
    );

    assert!(router
        .load(go("home"), NavigationOptions::default())
        .await
        .unwrap());
    log.lock().clear();

    assert!(!router
        .load(go("home"), NavigationOptions::default())
        .await
        .unwrap());
    assert!(log.lock().is_empty());
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_event_stream_reports_commits() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("home", "home"))
            .with_component(Page::new("home", &log)),
        history,
    );
    let mut events = router.subscribe();

    router
        .load(go("home"), NavigationOptions::default())
        .await
        .unwrap();

    let first = events.try_recv().unwrap();
    assert!(matches!(first, NavigationEvent::NavigationStart { .. }));
    let second = events.try_recv().unwrap();
    match second {
        NavigationEvent::NavigationEnd { url, .. } => assert_eq!(url, "home"),
        other => panic!("expected end event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_committed_instructions_serialize_back_to_the_url() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let history = Arc::new(InMemoryHistory::new());
    let router = Router::new(
        RouterConfig::new()
            .with_route(RouteConfig::new("detail/:id", "detail"))
            .with_component(Page::new("detail", &log)),
        history,
    );

    router
        .load(
            ViewportInstruction::new("detail").with_child(ViewportInstruction::new("42")),
            NavigationOptions::default(),
        )
        .await
        .unwrap();

    let instructions = router.current_instructions();
    assert_eq!(instructions.to_url(), "detail/42");
    assert_eq!(router.current_url(), "detail/42");
    let json = serde_json::to_string(&instructions).unwrap();
    let back: ViewportInstructionTree = serde_json::from_str(&json).unwrap();
    assert_eq!(back.to_url(), "detail/42");
}
