// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Navigation instruction value objects.
//!
//! A [`ViewportInstruction`] is a request to place one component into a named
//! viewport; a [`ViewportInstructionTree`] is a complete top-level request:
//! ordered root instructions plus query params, fragment, and navigation
//! options. Instructions are immutable to callers and cloned when absorbed
//! into a route tree.
//!
//! The string → instruction URL grammar parser is an external collaborator;
//! this module only *produces* URLs, via [`ViewportInstructionTree::to_url`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::component::Component;
use crate::domain::context::ContextId;

/// Ordered parameter map. Ordering keeps URL production stable.
pub type Params = BTreeMap<String, String>;

/// Merge `over` on top of `base` (own params win over parent params).
pub fn merge_params(base: &Params, over: &Params) -> Params {
    let mut merged = base.clone();
    for (k, v) in over {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

// ============================================================================
// Value Objects: Component Reference
// ============================================================================

/// Target of an instruction: a component name resolved through the registry,
/// or a directly supplied definition (which also covers lazily resolved
/// modules, since adapter hydration is async).
#[derive(Clone)]
pub enum ComponentRef {
    Name(String),
    Definition(Arc<dyn Component>),
}

impl ComponentRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Definition(component) => component.name(),
        }
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "ComponentRef::Name({name:?})"),
            Self::Definition(component) => {
                write!(f, "ComponentRef::Definition({:?})", component.name())
            }
        }
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for ComponentRef {}

impl Serialize for ComponentRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ComponentRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::Name(String::deserialize(deserializer)?))
    }
}

impl From<&str> for ComponentRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ComponentRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

// ============================================================================
// Value Objects: Instructions
// ============================================================================

/// A request to place a component in a named viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportInstruction {
    pub component: ComponentRef,

    /// Explicit target viewport (the `@name` suffix of the grammar).
    pub viewport: Option<String>,

    /// Explicit parameters (the `(k=v,...)` group of the grammar).
    #[serde(default)]
    pub params: Params,

    /// Nested child instructions (deeper path segments / scoped groups).
    #[serde(default)]
    pub children: Vec<ViewportInstruction>,

    /// Append to the current content of the target scope instead of
    /// replacing it.
    #[serde(default)]
    pub append: bool,
}

impl ViewportInstruction {
    pub fn new(component: impl Into<ComponentRef>) -> Self {
        Self {
            component: component.into(),
            viewport: None,
            params: Params::new(),
            children: Vec::new(),
            append: false,
        }
    }

    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_child(mut self, child: ViewportInstruction) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<ViewportInstruction>) -> Self {
        self.children = children;
        self
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    /// Append children at the leaf of this instruction's single-child chain.
    pub fn attach_at_leaf(&mut self, children: Vec<ViewportInstruction>) {
        if children.is_empty() {
            return;
        }
        let mut node = self;
        while node.children.len() == 1 {
            node = &mut node.children[0];
        }
        node.children.extend(children);
    }

    fn write_url(&self, out: &mut String) {
        out.push_str(self.component.name());
        if !self.params.is_empty() {
            out.push('(');
            let mut first = true;
            for (k, v) in &self.params {
                if !first {
                    out.push(',');
                }
                first = false;
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
            out.push(')');
        }
        if let Some(viewport) = &self.viewport {
            out.push('@');
            out.push_str(viewport);
        }
        match self.children.len() {
            0 => {}
            1 => {
                out.push('/');
                self.children[0].write_url(out);
            }
            _ => {
                out.push_str("/(");
                write_siblings(&self.children, out);
                out.push(')');
            }
        }
    }
}

fn write_siblings(instructions: &[ViewportInstruction], out: &mut String) {
    let mut first = true;
    for instruction in instructions {
        if !first {
            out.push('+');
        }
        first = false;
        instruction.write_url(out);
    }
}

/// Parsed top-level navigation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ViewportInstructionTree {
    #[serde(default)]
    pub children: Vec<ViewportInstruction>,
    #[serde(default)]
    pub query_params: Params,
    pub fragment: Option<String>,
    #[serde(default)]
    pub options: NavigationOptions,
}

impl ViewportInstructionTree {
    pub fn new(children: Vec<ViewportInstruction>) -> Self {
        Self {
            children,
            query_params: Params::new(),
            fragment: None,
            options: NavigationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: NavigationOptions) -> Self {
        if !options.query_params.is_empty() {
            self.query_params = options.query_params.clone();
        }
        if options.fragment.is_some() {
            self.fragment = options.fragment.clone();
        }
        self.options = options;
        self
    }

    /// Whether any root instruction (or the options) asks for appending.
    pub fn is_append(&self) -> bool {
        self.options.append
            || (!self.children.is_empty() && self.children.iter().all(|c| c.append))
    }

    /// Serialize back to the canonical URL grammar: segments by `/`, siblings
    /// by `+`, parenthesized scoping groups, `@name` viewport suffix,
    /// `(k=v,...)` params, `?`/`#` query and fragment.
    pub fn to_url(&self) -> String {
        let mut out = String::new();
        write_siblings(&self.children, &mut out);
        if !self.query_params.is_empty() {
            out.push('?');
            let mut first = true;
            for (k, v) in &self.query_params {
                if !first {
                    out.push('&');
                }
                first = false;
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

// ============================================================================
// Value Objects: Navigation Options
// ============================================================================

/// How a committed navigation is reflected in the history collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStrategy {
    Push,
    Replace,
    None,
}

/// Ordering between old-deactivate and new-activate when a viewport's
/// component is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapStrategy {
    SequentialAddFirst,
    SequentialRemoveFirst,
    ParallelRemoveFirst,
}

/// Whether unmatched instructions may fall back to a direct component-name
/// lookup in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    ConfiguredOnly,
    ConfiguredFirst,
}

/// What a navigation to the already-committed URL does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameUrlStrategy {
    Ignore,
    Reload,
}

/// What initiated a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Programmatic `Router::load`.
    Api,
    /// A change event from the history/location collaborator.
    Location,
}

/// Per-navigation options. Unset strategy fields fall back to the router's
/// configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NavigationOptions {
    pub title: Option<String>,
    #[serde(default)]
    pub append: bool,
    /// Context the instructions are resolved against; `None` means the root.
    pub context: Option<ContextId>,
    #[serde(default)]
    pub query_params: Params,
    pub fragment: Option<String>,
    /// Opaque state handed to the history collaborator on commit.
    pub state: Option<serde_json::Value>,
    pub history_strategy: Option<HistoryStrategy>,
    pub swap_strategy: Option<SwapStrategy>,
    pub routing_mode: Option<RoutingMode>,
    pub same_url_strategy: Option<SameUrlStrategy>,
}

impl NavigationOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn appending(mut self) -> Self {
        self.append = true;
        self
    }

    pub fn with_context(mut self, context: ContextId) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_history_strategy(mut self, strategy: HistoryStrategy) -> Self {
        self.history_strategy = Some(strategy);
        self
    }

    pub fn with_swap_strategy(mut self, strategy: SwapStrategy) -> Self {
        self.swap_strategy = Some(strategy);
        self
    }

    pub fn with_routing_mode(mut self, mode: RoutingMode) -> Self {
        self.routing_mode = Some(mode);
        self
    }

    pub fn with_same_url_strategy(mut self, strategy: SameUrlStrategy) -> Self {
        self.same_url_strategy = Some(strategy);
        self
    }
}

/// Anything `Router::load` accepts as a navigation request.
#[derive(Debug, Clone)]
pub enum NavigationRequest {
    Tree(ViewportInstructionTree),
    Instructions(Vec<ViewportInstruction>),
    Instruction(ViewportInstruction),
}

impl NavigationRequest {
    pub fn into_tree(self, options: NavigationOptions) -> ViewportInstructionTree {
        match self {
            Self::Tree(tree) => tree.with_options(options),
            Self::Instructions(children) => {
                ViewportInstructionTree::new(children).with_options(options)
            }
            Self::Instruction(child) => {
                ViewportInstructionTree::new(vec![child]).with_options(options)
            }
        }
    }
}

impl From<ViewportInstructionTree> for NavigationRequest {
    fn from(tree: ViewportInstructionTree) -> Self {
        Self::Tree(tree)
    }
}

impl From<ViewportInstruction> for NavigationRequest {
    fn from(instruction: ViewportInstruction) -> Self {
        Self::Instruction(instruction)
    }
}

impl From<Vec<ViewportInstruction>> for NavigationRequest {
    fn from(instructions: Vec<ViewportInstruction>) -> Self {
        Self::Instructions(instructions)
    }
}
