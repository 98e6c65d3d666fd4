// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Engine-wide error type.
///
/// Every variant is clonable so a single shared navigation outcome can
/// deliver the same rejection to every caller awaiting it.
#[derive(Debug, Clone, Error)]
pub enum RouterError {
    /// No configured route (and no registered component, under
    /// `configured-first` routing) matched an instruction.
    #[error("no route matched '{path}' in context '{context}'")]
    RouteNotFound { path: String, context: String },

    /// A route configuration names a component that is not registered.
    #[error("component '{0}' is not registered")]
    ComponentNotFound(String),

    /// No viewport in the target context accepts the resolved component.
    #[error("no viewport '{viewport}' available for component '{component}'")]
    ViewportNotFound { viewport: String, component: String },

    /// Illegal state-machine transition. Always fatal to the navigation.
    #[error("unexpected viewport state in {op} for '{viewport}': curr={curr}, next={next}")]
    UnexpectedState {
        op: &'static str,
        viewport: String,
        curr: String,
        next: String,
    },

    /// A viewport operation was invoked with a transition it is not bound to.
    #[error("viewport '{viewport}' is not bound to transition {transition}")]
    TransitionMismatch { viewport: String, transition: u64 },

    /// A route node references a context or agent that is no longer live.
    #[error("no live context for node '{node}' in viewport '{viewport}'")]
    MissingContext { node: String, viewport: String },

    /// A `redirect_to` target is not a plain segment expression.
    #[error("redirect target '{0}' must be a plain segment expression")]
    MalformedRedirect(String),

    /// A dynamic segment of a `redirect_to` target could not be generated
    /// from the matched parameters.
    #[error("cannot fill parameter '{param}' of redirect target '{target}'")]
    RedirectParamMissing { param: String, target: String },

    /// A chain of `redirect_to` configurations never reached a component.
    #[error("redirect chain starting at '{0}' did not terminate")]
    RedirectLoop(String),

    /// A lazily resolved component did not produce a usable adapter.
    #[error("component '{name}' resolved to a malformed module: {reason}")]
    MalformedComponent { name: String, reason: String },

    /// Error raised by a guard or lifecycle hook.
    #[error("{0}")]
    Hook(String),
}

impl RouterError {
    /// Convenience constructor for hook implementations.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}
