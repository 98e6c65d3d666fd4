// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0

pub mod router;
pub(crate) mod tree_builder;

pub use router::{Router, RouterConfig, RouterOptions};
