// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Candidate route tree construction.
//!
//! For one transition, the builder matches the instruction tree against the
//! routing contexts and produces the candidate [`RouteTree`], scheduling
//! every affected [`ViewportAgent`] along the way — updates for agents that
//! receive content, removals for agents that lose it. Untouched committed
//! subtrees are carried into the candidate as version-bumped clones, so the
//! previous tree stays intact for rollback while the candidate replaces the
//! live tree only on finalize.
//!
//! Matching is per context: the linear prefix of an instruction chain is
//! flattened into path segments and recognized against the context's route
//! table (with a direct component-name fallback under `configured-first`
//! routing); the matched route consumes leading segments and the tail is the
//! node's residue, deferred to the matched component's own viewport set.
//! `redirect_to` configurations rewrite the matched segments through the
//! target template before re-matching.

use std::cell::Cell;
use std::sync::Arc;

use crate::domain::component::ComponentRegistry;
use crate::domain::context::{ContextArena, ContextId, RouteContext};
use crate::domain::error::RouterError;
use crate::domain::instruction::{
    merge_params, ComponentRef, Params, RoutingMode, ViewportInstruction, ViewportInstructionTree,
};
use crate::domain::recognizer::{Recognition, RecognizerFactory};
use crate::domain::route::RouteConfig;
use crate::domain::transition::Transition;
use crate::domain::tree::{NodeId, RouteNode, RouteTree};

/// Bound on `redirect_to` chains so a cyclic configuration cannot hang
/// tree-building.
const MAX_REDIRECTS: usize = 16;

pub(crate) struct BuildOutcome {
    pub tree: RouteTree,
    /// Root-level agents touched by this transition; the swap/finalize union.
    pub root_agents: Vec<Arc<crate::domain::agent::ViewportAgent>>,
}

pub(crate) struct TreeBuilder<'a> {
    tr: &'a Arc<Transition>,
    registry: &'a ComponentRegistry,
    arena: &'a ContextArena,
    recognizers: &'a dyn RecognizerFactory,
    routing_mode: RoutingMode,
    instructions: ViewportInstructionTree,
    target: ContextId,
    append: bool,
    placed: Cell<bool>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        tr: &'a Arc<Transition>,
        registry: &'a ComponentRegistry,
        arena: &'a ContextArena,
        recognizers: &'a dyn RecognizerFactory,
        routing_mode: RoutingMode,
        root_context: ContextId,
    ) -> Self {
        let instructions = tr.instructions();
        let target = instructions.options.context.unwrap_or(root_context);
        let append = instructions.is_append();
        Self {
            tr,
            registry,
            arena,
            recognizers,
            routing_mode,
            instructions,
            target,
            append,
            placed: Cell::new(false),
        }
    }

    pub fn build(&self, prev: &RouteTree, root: &Arc<RouteContext>) -> Result<BuildOutcome, RouterError> {
        let children = if root.id == self.target {
            self.place_scope(root, &self.instructions.children.clone(), &Params::new(), &prev.root.children)?
        } else {
            let mut carried = Vec::with_capacity(prev.root.children.len());
            for child in &prev.root.children {
                carried.push(self.carry_node(child)?);
            }
            carried
        };
        if !self.placed.get() {
            return Err(RouterError::MissingContext {
                node: "<instructions>".to_string(),
                viewport: self.target.to_string(),
            });
        }
        let tree = RouteTree {
            root: prev.root.cloned_with_children(children),
            query_params: self.instructions.query_params.clone(),
            fragment: self.instructions.fragment.clone(),
        };
        let root_agents = root
            .agents()
            .iter()
            .filter(|agent| agent.is_scheduled_for(self.tr.id))
            .cloned()
            .collect();
        Ok(BuildOutcome { tree, root_agents })
    }

    /// Place instructions into one context: resolve each instruction, carry
    /// kept content when appending, fill declared defaults, and mark the
    /// remaining content-holding agents as removed.
    fn place_scope(
        &self,
        ctx: &Arc<RouteContext>,
        instructions: &[ViewportInstruction],
        parent_params: &Params,
        prev_children: &[Arc<RouteNode>],
    ) -> Result<Vec<Arc<RouteNode>>, RouterError> {
        self.placed.set(true);
        let mut nodes = Vec::new();
        for instruction in instructions {
            nodes.push(self.resolve_instruction(ctx, instruction, parent_params)?);
        }
        if self.append {
            for prev in prev_children {
                let agent = self.agent_of(prev)?;
                if !agent.is_scheduled_for(self.tr.id) {
                    nodes.push(self.carry_node(prev)?);
                }
            }
        }
        for agent in ctx.agents() {
            if agent.is_scheduled_for(self.tr.id) {
                continue;
            }
            if let Some(default) = agent.decl().default.clone() {
                let filler = ViewportInstruction::new(default)
                    .with_viewport(agent.viewport_name().to_string());
                nodes.push(self.resolve_instruction(ctx, &filler, parent_params)?);
            } else if agent.has_current() && !self.append {
                agent.schedule_removal(self.tr)?;
            }
        }
        Ok(nodes)
    }

    /// Resolve one instruction in one context into a scheduled route node.
    fn resolve_instruction(
        &self,
        ctx: &Arc<RouteContext>,
        instruction: &ViewportInstruction,
        parent_params: &Params,
    ) -> Result<Arc<RouteNode>, RouterError> {
        // Direct definitions bypass the route table entirely; the nested
        // instructions become residue for the definition's own scope.
        if let ComponentRef::Definition(component) = &instruction.component {
            let config = Arc::new(RouteConfig::new(component.name(), component.name()));
            let mut normalized = instruction.clone();
            normalized.children = Vec::new();
            return self.build_node(
                ctx,
                &normalized,
                Arc::clone(component),
                config,
                Params::new(),
                instruction.params.clone(),
                instruction.children.clone(),
                parent_params,
            );
        }

        let (mut segments, chain) = flatten(instruction);
        let mut redirects = 0;
        let recognition = loop {
            let recognition = match ctx.recognize(&segments) {
                Some(recognition) => recognition,
                None => break self.unconfigured(ctx, &segments)?,
            };
            match &recognition.config.redirect_to {
                None => break recognition,
                Some(target) => {
                    redirects += 1;
                    if redirects > MAX_REDIRECTS {
                        return Err(RouterError::RedirectLoop(segments.join("/")));
                    }
                    segments = rewrite_redirect(
                        &recognition.pattern,
                        &recognition.params,
                        target,
                        &segments[recognition.consumed..],
                    )?;
                }
            }
        };

        let component_name = recognition
            .config
            .component
            .clone()
            .ok_or_else(|| RouterError::ComponentNotFound(recognition.config.id().to_string()))?;
        let component = self.registry.resolve(&component_name)?;

        // Everything the match did not consume is residue, deferred to the
        // component's own viewport set.
        let explicit_viewport = chain.first().and_then(|link| link.viewport.clone());
        let (explicit_params, residue) = if segments_match(&chain, &segments) {
            let mut explicit = Params::new();
            for link in chain.iter().take(recognition.consumed) {
                explicit = merge_params(&explicit, &link.params);
            }
            let residue = if recognition.consumed < chain.len() {
                vec![chain[recognition.consumed].clone()]
            } else {
                chain
                    .last()
                    .map(|link| link.children.clone())
                    .unwrap_or_default()
            };
            (explicit, residue)
        } else {
            // Redirect-rewritten segments no longer map onto the original
            // instruction objects; explicit params and the branch children
            // still come from the original chain.
            let mut explicit = Params::new();
            for link in &chain {
                explicit = merge_params(&explicit, &link.params);
            }
            let branch = chain
                .last()
                .map(|link| link.children.clone())
                .unwrap_or_default();
            let residue = if recognition.consumed < segments.len() {
                let mut tail = linear_instruction(&segments[recognition.consumed..]);
                tail.attach_at_leaf(branch);
                vec![tail]
            } else {
                branch
            };
            (explicit, residue)
        };

        let matched_segments: Vec<String> =
            segments[..recognition.consumed.min(segments.len())].to_vec();
        let matched_params = recognition.params.clone();
        let config = Arc::clone(&recognition.config);

        let mut normalized = if matched_segments.is_empty() {
            ViewportInstruction::new(component.name())
        } else {
            linear_instruction(&matched_segments)
        };
        normalized.params = explicit_params.clone();
        normalized.viewport = explicit_viewport.clone();

        self.build_node(
            ctx,
            &normalized,
            component,
            config,
            matched_params,
            explicit_params,
            residue,
            parent_params,
        )
    }

    /// Construct the node, resolve its serving agent, build its child scope,
    /// and schedule the agent.
    #[allow(clippy::too_many_arguments)]
    fn build_node(
        &self,
        ctx: &Arc<RouteContext>,
        normalized: &ViewportInstruction,
        component: Arc<dyn crate::domain::component::Component>,
        config: Arc<RouteConfig>,
        matched_params: Params,
        explicit_params: Params,
        residue: Vec<ViewportInstruction>,
        parent_params: &Params,
    ) -> Result<Arc<RouteNode>, RouterError> {
        let params = merge_params(
            &merge_params(parent_params, &matched_params),
            &explicit_params,
        );
        let viewport = normalized
            .viewport
            .as_deref()
            .or(config.viewport.as_deref());
        let agent = ctx.resolve_agent(viewport, component.name(), self.tr.id)?;

        let child_ctx = self
            .arena
            .get_or_create(agent.id, ctx.id, &component, self.recognizers);

        let same_component = agent.current_component().as_deref() == Some(component.name());
        let children = if child_ctx.id == self.target {
            // The navigation addresses this component's own scope directly.
            self.place_scope(
                &child_ctx,
                &self.instructions.children.clone(),
                &params,
                &agent
                    .current_node()
                    .map(|node| node.children.clone())
                    .unwrap_or_default(),
            )?
        } else if residue.is_empty() && same_component {
            // Same component, no deeper instructions: the whole child scope
            // is carried as-is.
            let prev_children = agent
                .current_node()
                .map(|node| node.children.clone())
                .unwrap_or_default();
            let mut carried = Vec::with_capacity(prev_children.len());
            for child in &prev_children {
                carried.push(self.carry_node(child)?);
            }
            carried
        } else {
            self.place_child_scope(&child_ctx, &residue, &params, same_component)?
        };

        // The frozen instruction is the matched segment chain only; the
        // finalized instruction tree re-attaches children from the node's
        // children at serialization time.
        let frozen = normalized.clone();

        let node = Arc::new(RouteNode {
            id: NodeId::next(),
            version: 1,
            context: ctx.id,
            agent: Some(agent.id),
            component: Some(component),
            config: Some(Arc::clone(&config)),
            instruction: Some(frozen),
            params,
            query_params: self.instructions.query_params.clone(),
            fragment: self.instructions.fragment.clone(),
            viewport: agent.viewport_name().to_string(),
            title: config.title.clone(),
            residue,
            children,
        });
        agent.schedule_update(self.tr, Arc::clone(&node))?;
        Ok(node)
    }

    /// Residue placement into a child context: like `place_scope` but
    /// without append semantics, and removals only apply when the hosting
    /// component is kept (a replaced component tears its old scope down
    /// through the unload recursion instead).
    fn place_child_scope(
        &self,
        ctx: &Arc<RouteContext>,
        residue: &[ViewportInstruction],
        parent_params: &Params,
        same_component: bool,
    ) -> Result<Vec<Arc<RouteNode>>, RouterError> {
        let mut nodes = Vec::new();
        for instruction in residue {
            nodes.push(self.resolve_instruction(ctx, instruction, parent_params)?);
        }
        for agent in ctx.agents() {
            if agent.is_scheduled_for(self.tr.id) {
                continue;
            }
            if let Some(default) = agent.decl().default.clone() {
                let filler = ViewportInstruction::new(default)
                    .with_viewport(agent.viewport_name().to_string());
                nodes.push(self.resolve_instruction(ctx, &filler, parent_params)?);
            } else if same_component && agent.has_current() {
                agent.schedule_removal(self.tr)?;
            }
        }
        Ok(nodes)
    }

    /// Clone a committed node (version+1) into the candidate tree and
    /// schedule its agent with the clone, splicing the new instructions in
    /// when the target context is found deeper in this subtree.
    fn carry_node(&self, prev: &Arc<RouteNode>) -> Result<Arc<RouteNode>, RouterError> {
        let agent = self.agent_of(prev)?;
        let component = prev.component.clone().ok_or_else(|| RouterError::MissingContext {
            node: prev.id.to_string(),
            viewport: prev.viewport.clone(),
        })?;
        let child_ctx = self
            .arena
            .get_or_create(agent.id, prev.context, &component, self.recognizers);

        let children = if child_ctx.id == self.target {
            self.place_scope(
                &child_ctx,
                &self.instructions.children.clone(),
                &prev.params,
                &prev.children,
            )?
        } else {
            let mut carried = Vec::with_capacity(prev.children.len());
            for child in &prev.children {
                carried.push(self.carry_node(child)?);
            }
            carried
        };

        let node = prev.cloned_with_children(children);
        agent.schedule_update(self.tr, Arc::clone(&node))?;
        Ok(node)
    }

    fn agent_of(
        &self,
        node: &Arc<RouteNode>,
    ) -> Result<Arc<crate::domain::agent::ViewportAgent>, RouterError> {
        let missing = || RouterError::MissingContext {
            node: node.id.to_string(),
            viewport: node.viewport.clone(),
        };
        let agent_id = node.agent.ok_or_else(missing)?;
        self.arena
            .get(node.context)
            .and_then(|ctx| ctx.agent_by_id(agent_id))
            .ok_or_else(missing)
    }

    /// No configured route matched: direct component lookup under
    /// `configured-first`, then the context's declared fallback, then a
    /// resolution error.
    fn unconfigured(
        &self,
        ctx: &Arc<RouteContext>,
        segments: &[String],
    ) -> Result<Recognition, RouterError> {
        let head = segments.first().cloned().unwrap_or_default();
        if self.routing_mode == RoutingMode::ConfiguredFirst && self.registry.get(&head).is_some()
        {
            return Ok(Recognition {
                config: Arc::new(RouteConfig::new(head.clone(), head.clone())),
                pattern: head,
                params: Params::new(),
                consumed: 1,
            });
        }
        if let Some(fallback) = ctx.fallback.clone() {
            return Ok(Recognition {
                config: Arc::new(RouteConfig::new(segments.join("/"), fallback)),
                pattern: segments.join("/"),
                params: Params::new(),
                consumed: segments.len(),
            });
        }
        Err(RouterError::RouteNotFound {
            path: segments.join("/"),
            context: ctx.scope_name().to_string(),
        })
    }
}

/// Flatten the linear prefix of an instruction chain into path segments.
/// Flattening stops at a branch (multiple children), at a directly supplied
/// definition, and at an explicit viewport placement.
pub(crate) fn flatten(
    instruction: &ViewportInstruction,
) -> (Vec<String>, Vec<ViewportInstruction>) {
    let mut chain = vec![instruction.clone()];
    let mut current = instruction;
    while current.children.len() == 1 {
        let child = &current.children[0];
        let linear = matches!(child.component, ComponentRef::Name(_)) && child.viewport.is_none();
        if !linear {
            break;
        }
        chain.push(child.clone());
        current = child;
    }
    let segments = chain
        .iter()
        .map(|link| link.component.name().to_string())
        .collect();
    (segments, chain)
}

fn segments_match(chain: &[ViewportInstruction], segments: &[String]) -> bool {
    chain.len() == segments.len()
        && chain
            .iter()
            .zip(segments)
            .all(|(link, segment)| link.component.name() == segment)
}

/// Build a linear single-child instruction chain from path segments.
fn linear_instruction(segments: &[String]) -> ViewportInstruction {
    let mut iter = segments.iter().rev();
    let mut node = ViewportInstruction::new(
        iter.next().map(String::as_str).unwrap_or_default(),
    );
    for segment in iter {
        node = ViewportInstruction::new(segment.as_str()).with_child(node);
    }
    node
}

/// Rewrite the matched dynamic segments through a `redirect_to` target
/// template: named substitution first, positional substitution over the
/// source pattern's remaining dynamic values otherwise. Targets that are not
/// plain segment expressions fail fast.
fn rewrite_redirect(
    pattern: &str,
    params: &Params,
    target: &str,
    tail: &[String],
) -> Result<Vec<String>, RouterError> {
    if target.contains(['+', '(', ')', '@', '?', '#']) {
        return Err(RouterError::MalformedRedirect(target.to_string()));
    }
    let source_dynamics: Vec<&str> = pattern
        .split('/')
        .filter_map(|segment| segment.strip_prefix(':'))
        .collect();
    let mut positional = source_dynamics.iter();

    let mut rewritten = Vec::new();
    for segment in target.split('/').filter(|s| !s.is_empty()) {
        if let Some(name) = segment.strip_prefix(':') {
            let value = match params.get(name) {
                Some(value) => value.clone(),
                None => positional
                    .find_map(|candidate| params.get(*candidate).cloned())
                    .ok_or_else(|| RouterError::RedirectParamMissing {
                        param: name.to_string(),
                        target: target.to_string(),
                    })?,
            };
            rewritten.push(value);
        } else {
            rewritten.push(segment.to_string());
        }
    }
    rewritten.extend(tail.iter().cloned());
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn flatten_walks_the_linear_prefix() {
        let instruction = ViewportInstruction::new("shop")
            .with_child(ViewportInstruction::new("cart").with_child(ViewportInstruction::new("42")));
        let (segments, chain) = flatten(&instruction);
        assert_eq!(segments, vec!["shop", "cart", "42"]);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn flatten_stops_at_branches_and_viewport_placements() {
        let instruction = ViewportInstruction::new("shell").with_children(vec![
            ViewportInstruction::new("a"),
            ViewportInstruction::new("b"),
        ]);
        let (segments, chain) = flatten(&instruction);
        assert_eq!(segments, vec!["shell"]);
        assert_eq!(chain[0].children.len(), 2);

        let placed = ViewportInstruction::new("shell")
            .with_child(ViewportInstruction::new("a").with_viewport("left"));
        let (segments, _) = flatten(&placed);
        assert_eq!(segments, vec!["shell"]);
    }

    #[test]
    fn linear_instruction_round_trips_segments() {
        let segments: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let instruction = linear_instruction(&segments);
        let (back, _) = flatten(&instruction);
        assert_eq!(back, segments);
    }

    // ── redirect rewriting ───────────────────────────────────────────────────

    #[test]
    fn redirect_substitutes_named_params() {
        let rewritten = rewrite_redirect(
            "old/:id",
            &params(&[("id", "5")]),
            "new/:id",
            &[],
        )
        .unwrap();
        assert_eq!(rewritten, vec!["new", "5"]);
    }

    #[test]
    fn redirect_substitutes_positionally_when_names_differ() {
        let rewritten = rewrite_redirect(
            "old/:from",
            &params(&[("from", "7")]),
            "new/:to",
            &[],
        )
        .unwrap();
        assert_eq!(rewritten, vec!["new", "7"]);
    }

    #[test]
    fn redirect_keeps_the_unconsumed_tail() {
        let rewritten = rewrite_redirect(
            "old",
            &Params::new(),
            "new",
            &[String::from("deep"), String::from("er")],
        )
        .unwrap();
        assert_eq!(rewritten, vec!["new", "deep", "er"]);
    }

    #[test]
    fn redirect_fails_fast_on_compound_targets() {
        for target in ["a+b", "a/(b)", "a@vp", "a?x=1"] {
            let result = rewrite_redirect("old", &Params::new(), target, &[]);
            assert!(
                matches!(result, Err(RouterError::MalformedRedirect(_))),
                "{target} must be rejected"
            );
        }
    }

    #[test]
    fn redirect_reports_unfillable_params() {
        let result = rewrite_redirect("old", &Params::new(), "new/:id", &[]);
        assert!(matches!(
            result,
            Err(RouterError::RedirectParamMissing { .. })
        ));
    }
}
