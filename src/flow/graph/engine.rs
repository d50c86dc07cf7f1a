// SPDX-License-Identifier: MIT

//! Minimal single-path state graph
//!
//! Nodes are async functions from state to state. After a node runs, its
//! transition decides the next node: a direct edge, a conditional router, or
//! termination when no transition is registered. Exactly one node is active
//! at a time. A run may end through a named exit, which the caller uses to
//! tell terminal points apart.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::adk::error::{CompileError, FlowError};
use crate::flow::state::WorkflowState;

/// Default bound on node executions per invocation
pub const DEFAULT_MAX_STEPS: usize = 100;

pub type NodeFn = Arc<dyn Fn(WorkflowState) -> BoxFuture<'static, WorkflowState> + Send + Sync>;
pub type RouterFn = Arc<dyn Fn(&WorkflowState) -> Next + Send + Sync>;

/// Where execution goes after a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Node(String),
    /// Terminate through the named exit
    Exit(String),
    End,
}

impl fmt::Display for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Node(id) => write!(f, "{}", id),
            Next::Exit(id) => write!(f, "END({})", id),
            Next::End => write!(f, "END"),
        }
    }
}

#[derive(Clone)]
enum Transition {
    Direct(Next),
    Conditional {
        router: RouterFn,
        targets: Vec<Next>,
    },
}

impl Transition {
    fn targets(&self) -> Vec<&Next> {
        match self {
            Transition::Direct(next) => vec![next],
            Transition::Conditional { targets, .. } => targets.iter().collect(),
        }
    }
}

/// Graph under construction
pub struct StateGraph {
    name: String,
    nodes: HashMap<String, NodeFn>,
    transitions: HashMap<String, Vec<Transition>>,
    entry: Option<Next>,
}

impl StateGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            transitions: HashMap::new(),
            entry: None,
        }
    }

    pub fn add_node(&mut self, id: impl Into<String>, node: NodeFn) -> Result<(), CompileError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(CompileError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: Next) {
        self.transitions
            .entry(from.into())
            .or_default()
            .push(Transition::Direct(to));
    }

    /// Register a router; `targets` lists every destination it may return
    pub fn add_conditional_edges(
        &mut self,
        from: impl Into<String>,
        router: RouterFn,
        targets: Vec<Next>,
    ) {
        self.transitions
            .entry(from.into())
            .or_default()
            .push(Transition::Conditional { router, targets });
    }

    pub fn set_entry_point(&mut self, entry: Next) {
        self.entry = Some(entry);
    }

    /// Validate the topology and freeze it
    pub fn compile(self, max_steps: usize) -> Result<CompiledGraph, CompileError> {
        let entry = self
            .entry
            .clone()
            .ok_or_else(|| CompileError::MissingEntryPoint(self.name.clone()))?;
        if let Next::Node(id) = &entry {
            if !self.has_node(id) {
                return Err(CompileError::UnknownTarget {
                    source_id: "start".to_string(),
                    target: id.clone(),
                });
            }
        }

        let mut transitions = HashMap::new();
        for (source, mut registered) in self.transitions {
            for transition in &registered {
                for target in transition.targets() {
                    if let Next::Node(id) = target {
                        if !self.nodes.contains_key(id) {
                            return Err(CompileError::UnknownTarget {
                                source_id: source.clone(),
                                target: id.clone(),
                            });
                        }
                    }
                }
            }
            if registered.len() > 1 {
                log::warn!(
                    "Node '{}' in '{}' has {} transitions; only the first is followed",
                    source,
                    self.name,
                    registered.len()
                );
            }
            if !registered.is_empty() {
                transitions.insert(source, registered.swap_remove(0));
            }
        }

        Ok(CompiledGraph {
            name: self.name,
            nodes: self.nodes,
            transitions,
            entry,
            max_steps,
        })
    }
}

/// Frozen, runnable graph
pub struct CompiledGraph {
    name: String,
    nodes: HashMap<String, NodeFn>,
    transitions: HashMap<String, Transition>,
    entry: Next,
    max_steps: usize,
}

impl CompiledGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> &Next {
        &self.entry
    }

    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    fn next_after(&self, id: &str, state: &WorkflowState) -> Next {
        match self.transitions.get(id) {
            None => Next::End,
            Some(Transition::Direct(next)) => next.clone(),
            Some(Transition::Conditional { router, .. }) => router(state),
        }
    }

    /// Run from the entry point until a node routes to the end
    pub async fn invoke(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        self.run(state).await.map(|(state, _)| state)
    }

    /// Like [`invoke`](Self::invoke), also returning how the run ended
    /// (`Next::End` or `Next::Exit`)
    pub async fn run(&self, mut state: WorkflowState) -> Result<(WorkflowState, Next), FlowError> {
        let mut current = self.entry.clone();
        let mut steps = 0usize;

        while let Next::Node(id) = current {
            if steps >= self.max_steps {
                log::error!("Workflow '{}' exceeded {} steps", self.name, self.max_steps);
                return Err(FlowError::StepLimitExceeded {
                    limit: self.max_steps,
                });
            }
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| FlowError::NodeNotFound(id.clone()))?;

            state = node(state).await;
            state.increment_iteration();
            steps += 1;

            current = self.next_after(&id, &state);
            log::debug!("{}: {} -> {}", self.name, id, current);
        }

        Ok((state, current))
    }
}
