// SPDX-License-Identifier: MIT

//! Process-wide caches for loaded definitions and compiled graphs
//!
//! Entries are added on first use and never evicted; definitions are
//! treated as immutable once loaded.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::compiler::ExecutableGraph;
use crate::flow::types::WorkflowDefinition;

#[derive(Default)]
pub struct WorkflowCache {
    definitions: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
    graphs: RwLock<HashMap<String, Arc<ExecutableGraph>>>,
}

impl WorkflowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definition(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        let definitions = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        definitions.get(id).cloned()
    }

    /// Store a definition unless one is already cached under its id
    pub fn insert_definition(&self, definition: WorkflowDefinition) -> Arc<WorkflowDefinition> {
        let mut definitions = self
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        definitions
            .entry(definition.id.clone())
            .or_insert_with(|| Arc::new(definition))
            .clone()
    }

    pub fn graph(&self, id: &str) -> Option<Arc<ExecutableGraph>> {
        let graphs = self.graphs.read().unwrap_or_else(PoisonError::into_inner);
        graphs.get(id).cloned()
    }

    /// Store a compiled graph unless one is already cached under its id
    pub fn insert_graph(&self, graph: Arc<ExecutableGraph>) -> Arc<ExecutableGraph> {
        let mut graphs = self.graphs.write().unwrap_or_else(PoisonError::into_inner);
        graphs
            .entry(graph.id().to_string())
            .or_insert(graph)
            .clone()
    }

    pub fn definition_count(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn graph_count(&self) -> usize {
        self.graphs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
