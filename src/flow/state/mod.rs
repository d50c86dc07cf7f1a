// SPDX-License-Identifier: MIT

//! Workflow state: storage, merging and variable updates

pub mod reducer;
pub mod store;
pub mod updates;

pub use reducer::merge;
pub use store::{
    InitialState, WorkflowState, FLOW, INTERFACE, ITERATION_COUNT, MESSAGES, NODES, NODE_OUTPUT,
    SYSTEM, TOOL_RESULTS,
};
pub use updates::{apply_variable_updates, UpdateOperation};
