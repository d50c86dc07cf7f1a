// SPDX-License-Identifier: MIT

//! State merge reducer
//!
//! Combines two state snapshots. `flow`, `system`, `nodes` and
//! `toolResults` are merged key by key with the right side winning,
//! `messages` are concatenated, and every other key takes the right
//! side's value when present.

use serde_json::Value;

use super::store::{WorkflowState, FLOW, MESSAGES, NODES, SYSTEM, TOOL_RESULTS};

/// Scopes merged shallowly instead of replaced
const MERGED_SCOPES: [&str; 4] = [FLOW, SYSTEM, NODES, TOOL_RESULTS];

/// Merge two optional snapshots; an absent side is the identity
pub fn merge(left: Option<&WorkflowState>, right: Option<&WorkflowState>) -> WorkflowState {
    match (left, right) {
        (None, None) => WorkflowState::empty(),
        (Some(l), None) => l.clone(),
        (None, Some(r)) => r.clone(),
        (Some(l), Some(r)) => l.merge(r),
    }
}

impl WorkflowState {
    /// Merge `other` on top of `self`, returning a new state
    pub fn merge(&self, other: &WorkflowState) -> WorkflowState {
        let mut merged = self.clone();

        for key in other.keys() {
            let Some(incoming) = other.get(key) else {
                continue;
            };

            if key == MESSAGES {
                let mut messages = self.messages().to_vec();
                messages.extend(other.messages().iter().cloned());
                merged.set(MESSAGES, Value::Array(messages));
            } else if MERGED_SCOPES.contains(&key.as_str()) {
                match (self.get(key), incoming) {
                    (Some(Value::Object(current)), Value::Object(update)) => {
                        let mut scope = current.clone();
                        for (k, v) in update {
                            scope.insert(k.clone(), v.clone());
                        }
                        merged.set(key.clone(), Value::Object(scope));
                    }
                    _ => merged.set(key.clone(), incoming.clone()),
                }
            } else {
                merged.set(key.clone(), incoming.clone());
            }
        }

        merged
    }
}
