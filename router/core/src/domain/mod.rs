// Copyright (c) 2026 Meridian Project Developers
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod batch;
pub mod component;
pub mod context;
pub mod error;
pub mod events;
pub mod history;
pub mod instruction;
pub mod recognizer;
pub mod route;
pub mod transition;
pub mod tree;
