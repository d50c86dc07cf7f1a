// SPDX-License-Identifier: MIT

//! Workflow graphs
//!
//! Definitions are loaded by id, compiled into [`graph::ExecutableGraph`]s
//! and run against a [`state::WorkflowState`]. The [`builder::Builder`] ties
//! loading, compiling and invoking together.

pub mod builder;
pub mod condition;
pub mod graph;
pub mod loader;
pub mod nodes;
pub mod resolver;
pub mod state;
pub mod types;
