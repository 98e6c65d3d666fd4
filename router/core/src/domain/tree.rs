// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Resolved navigation tree.
//!
//! A [`RouteNode`] is one matched, parameter-bound placement of a component
//! in a viewport; a [`RouteTree`] is the full resolved tree mirroring the
//! mounted component tree. Nodes are immutable once built. Exactly one tree
//! is live (committed) at a time; a candidate is built for the active
//! transition and replaces the live tree only on successful finalize.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::agent::AgentId;
use crate::domain::component::Component;
use crate::domain::context::ContextId;
use crate::domain::instruction::{Params, ViewportInstruction};
use crate::domain::route::RouteConfig;

/// Monotonic node identity, stable across per-transition clones of the same
/// logical node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One resolved tree node.
pub struct RouteNode {
    pub id: NodeId,
    /// Strictly increases across clones of the same logical node.
    pub version: u32,
    /// Context the node was matched in.
    pub context: ContextId,
    /// Agent serving the node; `None` only for the synthetic root.
    pub agent: Option<AgentId>,
    /// Matched component definition; `None` only for the synthetic root.
    pub component: Option<Arc<dyn Component>>,
    /// Matched route configuration; `None` for the synthetic root.
    pub config: Option<Arc<RouteConfig>>,
    /// Originating instruction, frozen at match time.
    pub instruction: Option<ViewportInstruction>,
    /// Merged parent + matched + explicit params.
    pub params: Params,
    pub query_params: Params,
    pub fragment: Option<String>,
    /// Viewport name the node is placed in; empty for the synthetic root.
    pub viewport: String,
    pub title: Option<String>,
    /// The trailing portion of the instruction that was deferred to the
    /// component's own viewport set.
    pub residue: Vec<ViewportInstruction>,
    pub children: Vec<Arc<RouteNode>>,
}

impl RouteNode {
    /// Synthetic root for a context with no hosting component (the app root).
    pub fn root(context: ContextId) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::next(),
            version: 1,
            context,
            agent: None,
            component: None,
            config: None,
            instruction: None,
            params: Params::new(),
            query_params: Params::new(),
            fragment: None,
            viewport: String::new(),
            title: None,
            residue: Vec::new(),
            children: Vec::new(),
        })
    }

    pub fn component_name(&self) -> &str {
        self.component
            .as_ref()
            .map(|c| c.name())
            .unwrap_or_default()
    }

    /// Duplicate this node for a new transition with rebuilt children. Keeps
    /// the logical identity (`id`) and bumps `version`.
    pub fn cloned_with_children(&self, children: Vec<Arc<RouteNode>>) -> Arc<Self> {
        Arc::new(Self {
            id: self.id,
            version: self.version + 1,
            context: self.context,
            agent: self.agent,
            component: self.component.clone(),
            config: self.config.clone(),
            instruction: self.instruction.clone(),
            params: self.params.clone(),
            query_params: self.query_params.clone(),
            fragment: self.fragment.clone(),
            viewport: self.viewport.clone(),
            title: self.title.clone(),
            residue: self.residue.clone(),
            children,
        })
    }
}

impl fmt::Debug for RouteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteNode")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("component", &self.component_name())
            .field("viewport", &self.viewport)
            .field("params", &self.params)
            .field("children", &self.children)
            .finish()
    }
}

/// The resolved navigation tree plus tree-level query/fragment.
#[derive(Debug, Clone)]
pub struct RouteTree {
    pub root: Arc<RouteNode>,
    pub query_params: Params,
    pub fragment: Option<String>,
}

impl RouteTree {
    pub fn empty(root_context: ContextId) -> Self {
        Self {
            root: RouteNode::root(root_context),
            query_params: Params::new(),
            fragment: None,
        }
    }

    /// Depth-first walk over all non-root nodes.
    pub fn visit<'a>(&'a self, visitor: &mut dyn FnMut(&'a RouteNode)) {
        fn walk<'a>(node: &'a RouteNode, visitor: &mut dyn FnMut(&'a RouteNode)) {
            for child in &node.children {
                visitor(child);
                walk(child, visitor);
            }
        }
        walk(&self.root, visitor);
    }

    /// Titles along the primary (first-child) chain, leaf first.
    pub fn title_chain(&self) -> Vec<String> {
        let mut titles = Vec::new();
        let mut node = self.root.children.first();
        while let Some(current) = node {
            if let Some(title) = &current.title {
                titles.push(title.clone());
            }
            node = current.children.first();
        }
        titles.reverse();
        titles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn node_ids_are_monotonic() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert!(b > a);
    }

    #[test]
    fn clone_keeps_identity_and_bumps_version() {
        let ctx = ContextId(Uuid::new_v4());
        let root = RouteNode::root(ctx);
        let cloned = root.cloned_with_children(Vec::new());
        assert_eq!(cloned.id, root.id);
        assert_eq!(cloned.version, root.version + 1);
        let again = cloned.cloned_with_children(Vec::new());
        assert_eq!(again.version, root.version + 2);
    }

    #[test]
    fn empty_tree_has_no_titles() {
        let tree = RouteTree::empty(ContextId(Uuid::new_v4()));
        assert!(tree.title_chain().is_empty());
        let mut count = 0;
        tree.visit(&mut |_| count += 1);
        assert_eq!(count, 0);
    }
}
