// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0
//! Reference route recognizer.
//!
//! Matches a segment sequence against a route table of static and `:param`
//! dynamic segments. The longest match wins; at equal length the match with
//! more static segments wins, so `product/new` beats `product/:id` for the
//! path `product/new`. Unconsumed trailing segments are reported through
//! `Recognition::consumed` and become the caller's residue.

use std::sync::Arc;

use crate::domain::instruction::Params;
use crate::domain::recognizer::{Recognition, RecognizerFactory, RouteRecognizer};
use crate::domain::route::RouteConfig;

pub struct SegmentRecognizer {
    routes: Vec<Arc<RouteConfig>>,
}

impl SegmentRecognizer {
    pub fn new(routes: Vec<Arc<RouteConfig>>) -> Self {
        Self { routes }
    }
}

impl RouteRecognizer for SegmentRecognizer {
    fn recognize(&self, segments: &[String]) -> Option<Recognition> {
        let mut best: Option<(usize, usize, Recognition)> = None;
        for config in &self.routes {
            for pattern in &config.path {
                let Some((params, consumed, statics)) = match_pattern(pattern, segments) else {
                    continue;
                };
                let better = match &best {
                    Some((best_consumed, best_statics, _)) => {
                        consumed > *best_consumed
                            || (consumed == *best_consumed && statics > *best_statics)
                    }
                    None => true,
                };
                if better {
                    best = Some((
                        consumed,
                        statics,
                        Recognition {
                            config: Arc::clone(config),
                            pattern: pattern.clone(),
                            params,
                            consumed,
                        },
                    ));
                }
            }
        }
        best.map(|(_, _, recognition)| recognition)
    }
}

fn match_pattern(pattern: &str, segments: &[String]) -> Option<(Params, usize, usize)> {
    let pattern_segments: Vec<&str> = if pattern.is_empty() {
        Vec::new()
    } else {
        pattern.split('/').collect()
    };
    // The empty route only matches an empty request.
    if pattern_segments.is_empty() && !segments.is_empty() {
        return None;
    }
    if pattern_segments.len() > segments.len() {
        return None;
    }
    let mut params = Params::new();
    let mut statics = 0;
    for (pattern_segment, segment) in pattern_segments.iter().zip(segments) {
        if let Some(name) = pattern_segment.strip_prefix(':') {
            params.insert(name.to_string(), segment.clone());
        } else if *pattern_segment == segment.as_str() {
            statics += 1;
        } else {
            return None;
        }
    }
    Some((params, pattern_segments.len(), statics))
}

/// Builds a [`SegmentRecognizer`] per context. The router's default factory.
#[derive(Default)]
pub struct SegmentRecognizerFactory;

impl RecognizerFactory for SegmentRecognizerFactory {
    fn build(&self, routes: Vec<Arc<RouteConfig>>) -> Arc<dyn RouteRecognizer> {
        Arc::new(SegmentRecognizer::new(routes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    fn recognizer(patterns: &[&str]) -> SegmentRecognizer {
        let routes = patterns
            .iter()
            .map(|p| Arc::new(RouteConfig::new(*p, "c")))
            .collect();
        SegmentRecognizer::new(routes)
    }

    #[test]
    fn static_segments_match_exactly() {
        let r = recognizer(&["home", "about"]);
        let hit = r.recognize(&segments("about")).unwrap();
        assert_eq!(hit.config.path[0], "about");
        assert_eq!(hit.consumed, 1);
        assert!(hit.params.is_empty());
        assert!(r.recognize(&segments("missing")).is_none());
    }

    #[test]
    fn dynamic_segments_capture_params() {
        let r = recognizer(&["product/:id"]);
        let hit = r.recognize(&segments("product/42")).unwrap();
        assert_eq!(hit.consumed, 2);
        assert_eq!(hit.params.get("id").unwrap(), "42");
    }

    #[test]
    fn unconsumed_tail_is_reported_as_residue() {
        let r = recognizer(&["shop"]);
        let hit = r.recognize(&segments("shop/cart/items")).unwrap();
        assert_eq!(hit.consumed, 1);
    }

    #[test]
    fn longest_match_wins() {
        let r = recognizer(&["shop", "shop/cart"]);
        let hit = r.recognize(&segments("shop/cart")).unwrap();
        assert_eq!(hit.config.path[0], "shop/cart");
    }

    #[test]
    fn static_beats_dynamic_at_equal_length() {
        let r = recognizer(&["product/:id", "product/new"]);
        let hit = r.recognize(&segments("product/new")).unwrap();
        assert_eq!(hit.config.path[0], "product/new");
        let hit = r.recognize(&segments("product/7")).unwrap();
        assert_eq!(hit.config.path[0], "product/:id");
    }

    #[test]
    fn empty_pattern_matches_only_empty_request() {
        let r = recognizer(&["", "home"]);
        let hit = r.recognize(&[]).unwrap();
        assert_eq!(hit.consumed, 0);
        let hit = r.recognize(&segments("home")).unwrap();
        assert_eq!(hit.config.path[0], "home");
    }

    #[test]
    fn multiple_patterns_on_one_route() {
        let route = Arc::new(RouteConfig::new("home", "home").with_path(""));
        let r = SegmentRecognizer::new(vec![route]);
        assert!(r.recognize(&[]).is_some());
        assert!(r.recognize(&segments("home")).is_some());
    }
}
