// SPDX-License-Identifier: MIT

//! Workflow builder - loads, compiles and runs workflows
//!
//! The builder owns the [`GraphCompiler`]; graphs it hands out resolve
//! sub-workflows through it, so keep the builder alive while they run.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::adk::error::FlowError;
use crate::adk::http::ReqwestTransport;
use crate::adk::model::openai::OpenAIModel;
use crate::config::EngineConfig;
use crate::flow::graph::{CompilerSettings, ExecutableGraph, GraphCompiler, WorkflowCache};
use crate::flow::loader::{load_file, parse_json, DirectoryLoader, WorkflowLoader};
use crate::flow::nodes::{Collaborators, NodeExecutorRegistry};
use crate::flow::state::{InitialState, WorkflowState};
use crate::flow::types::WorkflowDefinition;

/// Final state of a run plus the terminal output mapping
#[derive(Debug, Clone)]
pub struct RunResult {
    pub output: Value,
    pub state: WorkflowState,
}

pub struct Builder {
    compiler: GraphCompiler,
}

impl Builder {
    pub fn new(loader: Arc<dyn WorkflowLoader>, settings: CompilerSettings) -> Self {
        Self {
            compiler: GraphCompiler::new(loader, settings),
        }
    }

    /// Directory loader, `reqwest` transport and, when a key is set, an OpenAI model
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut collaborators = Collaborators::default()
            .with_http(Arc::new(ReqwestTransport::new(config.http_timeout)));

        match &config.openai_api_key {
            Some(key) => {
                log::info!("Using OpenAI-compatible model '{}'", config.default_model);
                collaborators = collaborators.with_model(Arc::new(OpenAIModel::new(
                    key.clone(),
                    config.openai_base_url.clone(),
                    config.default_model.clone(),
                )));
            }
            None => log::warn!("OPENAI_API_KEY not set; agent and llm nodes will fail"),
        }

        let settings = CompilerSettings {
            registry: NodeExecutorRegistry::with_builtins(),
            cache: Arc::new(WorkflowCache::new()),
            collaborators,
            max_steps: config.max_steps,
        };
        Self::new(
            Arc::new(DirectoryLoader::new(config.workflows_dir.clone())),
            settings,
        )
    }

    pub fn compiler(&self) -> &GraphCompiler {
        &self.compiler
    }

    /// Ids the loader can serve
    pub fn list(&self) -> Result<Vec<String>, FlowError> {
        self.compiler.loader().list()
    }

    pub fn build(&self, definition: &WorkflowDefinition) -> Result<Arc<ExecutableGraph>, FlowError> {
        self.compiler.compile(definition)
    }

    pub fn build_by_id(&self, id: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        self.compiler.compile_by_id(id)
    }

    pub fn build_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Arc<ExecutableGraph>, FlowError> {
        let definition = load_file(path)?;
        self.build(&definition)
    }

    pub fn build_from_json(&self, json: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        let definition = parse_json(json)?;
        self.build(&definition)
    }

    /// Treat `workflow` as a file path if one exists, otherwise as an id
    pub fn build_workflow(&self, workflow: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        if Path::new(workflow).is_file() {
            self.build_from_file(workflow)
        } else {
            self.build_by_id(workflow)
        }
    }

    /// Run a graph for a user query
    pub async fn run(
        &self,
        graph: &ExecutableGraph,
        query: &str,
        overrides: InitialState,
    ) -> Result<RunResult, FlowError> {
        let started = Instant::now();
        let done = graph
            .execute(WorkflowState::for_user_query(query, overrides))
            .await?;
        log::info!(
            "Workflow '{}' finished at {} after {} steps in {:?}",
            graph.id(),
            done.output_node.as_deref().unwrap_or("END"),
            done.state.iteration_count(),
            started.elapsed()
        );
        Ok(RunResult {
            output: done.output,
            state: done.state,
        })
    }
}
