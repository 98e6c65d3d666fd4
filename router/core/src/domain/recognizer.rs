// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Route matching collaborator seam.
//!
//! Matching path segments against a route table is external to the engine;
//! the engine consumes it through [`RouteRecognizer`]. A reference
//! implementation lives in `infrastructure::recognizer`.

use std::sync::Arc;

use crate::domain::instruction::Params;
use crate::domain::route::RouteConfig;

/// Result of matching a segment sequence against a route table.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub config: Arc<RouteConfig>,
    /// The path pattern that matched, needed for `redirect_to` rewriting.
    pub pattern: String,
    /// Captured dynamic-segment parameters.
    pub params: Params,
    /// Number of leading segments the match consumed; the unconsumed tail is
    /// the caller's residue.
    pub consumed: usize,
}

pub trait RouteRecognizer: Send + Sync {
    fn recognize(&self, segments: &[String]) -> Option<Recognition>;
}

/// Builds a recognizer over one context's route table.
pub trait RecognizerFactory: Send + Sync {
    fn build(&self, routes: Vec<Arc<RouteConfig>>) -> Arc<dyn RouteRecognizer>;
}
