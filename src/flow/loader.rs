// SPDX-License-Identifier: MIT

//! Workflow loader - definition lookup by id
//!
//! [`DirectoryLoader`] reads JSON or YAML files from a directory and
//! [`InMemoryLoader`] serves definitions registered in code.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use crate::adk::error::FlowError;
use crate::flow::types::WorkflowDefinition;

/// Resolves a workflow id to its definition
pub trait WorkflowLoader: Send + Sync {
    /// Returns `Ok(None)` when no definition exists for the id
    fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, FlowError>;

    /// Ids this loader can serve, sorted
    fn list(&self) -> Result<Vec<String>, FlowError>;
}

/// Parse a workflow definition from a JSON string
pub fn parse_json(content: &str) -> Result<WorkflowDefinition, FlowError> {
    Ok(serde_json::from_str(content)?)
}

/// Parse a workflow definition from a YAML string
pub fn parse_yaml(content: &str) -> Result<WorkflowDefinition, FlowError> {
    Ok(serde_yaml::from_str(content)?)
}

/// Load a definition file, choosing the parser by extension
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<WorkflowDefinition, FlowError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => parse_yaml(&content),
        _ => parse_json(&content),
    }
}

/// Loads `agentic_workflow_<id>.json`, `<id>.json`, `<id>.yaml` or `<id>.yml`
pub struct DirectoryLoader {
    root: PathBuf,
}

const PREFIX: &str = "agentic_workflow_";
const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, id: &str) -> Vec<PathBuf> {
        let mut paths = vec![self.root.join(format!("{}{}.json", PREFIX, id))];
        paths.extend(EXTENSIONS.iter().map(|ext| self.root.join(format!("{}.{}", id, ext))));
        paths
    }
}

impl WorkflowLoader for DirectoryLoader {
    fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, FlowError> {
        if id.contains(['/', '\\']) || id.contains("..") {
            log::warn!("Rejecting workflow id with path separators: {}", id);
            return Ok(None);
        }

        for path in self.candidates(id) {
            if path.is_file() {
                log::debug!("Loading workflow '{}' from {}", id, path.display());
                return load_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    fn list(&self) -> Result<Vec<String>, FlowError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            if !EXTENSIONS.contains(&ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                let id = stem.strip_prefix(PREFIX).unwrap_or(stem).to_string();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Definitions registered in code, keyed by id
#[derive(Default)]
pub struct InMemoryLoader {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(definitions: impl IntoIterator<Item = WorkflowDefinition>) -> Self {
        let loader = Self::new();
        for def in definitions {
            loader.insert(def);
        }
        loader
    }

    pub fn insert(&self, definition: WorkflowDefinition) {
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.id.clone(), definition);
    }
}

impl WorkflowLoader for InMemoryLoader {
    fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, FlowError> {
        Ok(self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<String>, FlowError> {
        let mut ids: Vec<String> = self
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}
