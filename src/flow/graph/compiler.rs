// SPDX-License-Identifier: MIT

//! Graph compiler - turns a workflow definition into an executable graph
//!
//! Compilation validates the definition, decides which nodes become graph
//! vertices, instantiates their executors through the registry, wires the
//! edges and compiles every referenced sub-workflow eagerly so that unknown
//! ids and cycles surface before anything runs.
//!
//! Start and output nodes are never vertices. The first start node runs as
//! a prologue before the entry vertex. Edges into an output node end the run
//! through a named exit, and that node's mapping is resolved afterwards; a
//! run that ends any other way reports the first output node.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use serde_json::{json, Value};

use super::cache::WorkflowCache;
use super::engine::{CompiledGraph, Next, NodeFn, RouterFn, StateGraph, DEFAULT_MAX_STEPS};
use crate::adk::error::{CompileError, FlowError};
use crate::flow::condition::evaluate_rules;
use crate::flow::loader::WorkflowLoader;
use crate::flow::nodes::workflow::referenced_workflow;
use crate::flow::nodes::{
    Collaborators, ExecutorServices, NodeExecutor, NodeExecutorRegistry, NodeKind,
};
use crate::flow::state::WorkflowState;
use crate::flow::types::{
    EdgeDefinition, EdgeKind, NodeDefinition, Rule, WorkflowDefinition, OUTPUT_SENTINEL,
    START_SENTINEL,
};

const HANDOFF: &str = "handoff";
const HANDOFF_TOOL_ID: &str = "tool-handoff";

/// Everything the compiler needs besides the loader
pub struct CompilerSettings {
    pub registry: NodeExecutorRegistry,
    pub cache: Arc<WorkflowCache>,
    pub collaborators: Collaborators,
    pub max_steps: usize,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            registry: NodeExecutorRegistry::with_builtins(),
            cache: Arc::new(WorkflowCache::new()),
            collaborators: Collaborators::default(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

struct CompilerInner {
    loader: Arc<dyn WorkflowLoader>,
    registry: NodeExecutorRegistry,
    cache: Arc<WorkflowCache>,
    collaborators: Collaborators,
    max_steps: usize,
}

#[derive(Clone)]
pub struct GraphCompiler {
    inner: Arc<CompilerInner>,
}

/// Non-owning reference to a compiler, held by workflow executors
///
/// Compiled graphs live in the compiler's cache, so executors must not keep
/// the compiler alive themselves.
#[derive(Clone)]
pub struct CompilerHandle(Weak<CompilerInner>);

impl CompilerHandle {
    /// A handle that is not attached to any compiler
    pub fn detached() -> Self {
        Self(Weak::new())
    }

    pub fn compile_by_id(&self, id: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        let inner = self
            .0
            .upgrade()
            .ok_or_else(|| FlowError::other("Graph compiler is no longer available"))?;
        GraphCompiler { inner }.compile_by_id(id)
    }
}

/// Workflow ids currently being compiled, outermost first
#[derive(Debug, Default)]
struct CompileSession {
    in_progress: Vec<String>,
}

impl CompileSession {
    fn check(&self, id: &str) -> Result<(), CompileError> {
        if self.in_progress.iter().any(|p| p == id) {
            let mut chain = self.in_progress.clone();
            chain.push(id.to_string());
            return Err(CompileError::CircularDependency(chain));
        }
        Ok(())
    }

    fn enter(&mut self, id: &str) -> Result<(), CompileError> {
        self.check(id)?;
        self.in_progress.push(id.to_string());
        Ok(())
    }

    fn exit(&mut self) {
        self.in_progress.pop();
    }
}

impl GraphCompiler {
    pub fn new(loader: Arc<dyn WorkflowLoader>, settings: CompilerSettings) -> Self {
        Self {
            inner: Arc::new(CompilerInner {
                loader,
                registry: settings.registry,
                cache: settings.cache,
                collaborators: settings.collaborators,
                max_steps: settings.max_steps,
            }),
        }
    }

    pub fn handle(&self) -> CompilerHandle {
        CompilerHandle(Arc::downgrade(&self.inner))
    }

    pub fn cache(&self) -> &Arc<WorkflowCache> {
        &self.inner.cache
    }

    pub fn loader(&self) -> &Arc<dyn WorkflowLoader> {
        &self.inner.loader
    }

    pub fn registry(&self) -> &NodeExecutorRegistry {
        &self.inner.registry
    }

    fn services(&self) -> ExecutorServices {
        ExecutorServices {
            collaborators: self.inner.collaborators.clone(),
            compiler: self.handle(),
        }
    }

    /// Registered node types with the output schema of each
    pub fn node_types(&self) -> Vec<(String, Value)> {
        let services = self.services();
        self.inner
            .registry
            .tags()
            .into_iter()
            .filter_map(|tag| {
                let executor = self.inner.registry.create(&tag, &services).ok()?;
                let schema = executor.output_schema().clone();
                Some((tag, schema))
            })
            .collect()
    }

    /// Fetch a definition through the definition cache
    pub fn load_definition(&self, id: &str) -> Result<Arc<WorkflowDefinition>, FlowError> {
        if let Some(def) = self.inner.cache.definition(id) {
            return Ok(def);
        }
        let def = self
            .inner
            .loader
            .load(id)?
            .ok_or_else(|| CompileError::WorkflowNotFound(id.to_string()))?;
        if def.id != id {
            log::warn!("Workflow file for '{}' declares id '{}'", id, def.id);
        }
        Ok(self.inner.cache.insert_definition(WorkflowDefinition {
            id: id.to_string(),
            ..def
        }))
    }

    /// Compile a definition, caching by id
    ///
    /// When a graph is already cached under the definition's id, that graph
    /// is returned and the definition is not compiled again.
    pub fn compile(&self, definition: &WorkflowDefinition) -> Result<Arc<ExecutableGraph>, FlowError> {
        let mut session = CompileSession::default();
        session.check(&definition.id)?;
        if let Some(graph) = self.inner.cache.graph(&definition.id) {
            log::debug!("Workflow '{}' already compiled", definition.id);
            return Ok(graph);
        }
        self.inner.cache.insert_definition(definition.clone());
        self.compile_definition(definition, &mut session)
    }

    /// Load and compile a workflow by id, reusing the cached graph
    pub fn compile_by_id(&self, id: &str) -> Result<Arc<ExecutableGraph>, FlowError> {
        let mut session = CompileSession::default();
        self.compile_id(id, &mut session)
    }

    fn compile_id(
        &self,
        id: &str,
        session: &mut CompileSession,
    ) -> Result<Arc<ExecutableGraph>, FlowError> {
        session.check(id)?;
        if let Some(graph) = self.inner.cache.graph(id) {
            return Ok(graph);
        }
        let def = self.load_definition(id)?;
        self.compile_definition(&def, session)
    }

    fn compile_definition(
        &self,
        def: &WorkflowDefinition,
        session: &mut CompileSession,
    ) -> Result<Arc<ExecutableGraph>, FlowError> {
        session.enter(&def.id)?;
        let result = self.build(def, session);
        session.exit();

        let graph = self.inner.cache.insert_graph(Arc::new(result?));
        log::info!(
            "Compiled workflow '{}' ({} vertices)",
            def.id,
            graph.graph.node_ids().len()
        );
        Ok(graph)
    }

    fn build(
        &self,
        def: &WorkflowDefinition,
        session: &mut CompileSession,
    ) -> Result<ExecutableGraph, FlowError> {
        log::debug!(
            "Compiling workflow '{}': {} nodes, {} edges",
            def.id,
            def.nodes.len(),
            def.edges.len()
        );
        let layout = Layout::analyze(def, &self.inner.registry)?;
        let services = self.services();
        let registry = &self.inner.registry;

        let mut graph = StateGraph::new(def.id.clone());
        let mut prologue = None;
        let mut outputs = Vec::new();

        for node in &def.nodes {
            let kind = layout.kind(&node.id);
            match kind {
                NodeKind::Start if prologue.is_none() => {
                    let executor = registry.create(&node.node_type, &services)?;
                    prologue = Some(BoundNode::new(node.clone(), executor));
                }
                NodeKind::Output => {
                    let executor = registry.create(&node.node_type, &services)?;
                    outputs.push(BoundNode::new(node.clone(), executor));
                }
                _ if layout.is_scheduled(&node.id) => {
                    if kind == NodeKind::Workflow {
                        if let Some(child) = referenced_workflow(node) {
                            self.compile_id(child, session)?;
                        }
                    }
                    let executor = registry.create(&node.node_type, &services)?;
                    let bound = BoundNode::new(node.clone(), executor);
                    graph.add_node(node.id.clone(), bound.into_node_fn())?;
                }
                _ => log::debug!("Node '{}' is not a graph vertex", node.id),
            }
        }

        for (source, edges) in layout.edges_by_source(def) {
            if !graph.has_node(source) {
                log::debug!("Ignoring edges from '{}', which is not a vertex", source);
                continue;
            }
            let Some(node) = def.node(source) else {
                continue;
            };

            if layout.kind(source) == NodeKind::Rule {
                let rules = node.rules().map_err(|e| CompileError::InvalidConfig {
                    node: source.to_string(),
                    message: e.to_string(),
                })?;
                let routes: Vec<(String, Next)> = edges
                    .iter()
                    .map(|e| (e.handle().to_string(), layout.next_for(&e.target)))
                    .collect();
                let targets = routes.iter().map(|(_, next)| next.clone()).collect();
                graph.add_conditional_edges(source, rule_router(source, rules, routes), targets);
                continue;
            }

            for edge in edges.iter().filter(|e| e.kind() == EdgeKind::Handoff) {
                graph.add_edge(source, layout.next_for(&edge.target));
            }

            let regular: Vec<&EdgeDefinition> = edges
                .iter()
                .copied()
                .filter(|e| e.kind() == EdgeKind::Normal)
                .collect();
            let chosen = match regular.as_slice() {
                [] => None,
                [only] => Some(*only),
                [first, ..] => {
                    let pick = regular
                        .iter()
                        .copied()
                        .find(|e| layout.kind(&e.target) == NodeKind::Rule)
                        .unwrap_or(*first);
                    log::debug!(
                        "'{}' has {} outgoing edges; following '{}'",
                        source,
                        regular.len(),
                        pick.target
                    );
                    Some(pick)
                }
            };
            if let Some(edge) = chosen {
                graph.add_edge(source, layout.next_for(&edge.target));
            }
        }

        let entry = def
            .edges
            .iter()
            .find(|e| layout.is_start_source(&e.source))
            .map(|e| layout.next_for(&e.target))
            .ok_or_else(|| CompileError::MissingEntryPoint(def.id.clone()))?;
        graph.set_entry_point(entry);

        Ok(ExecutableGraph {
            id: def.id.clone(),
            name: def.display_name().to_string(),
            graph: graph.compile(self.inner.max_steps)?,
            prologue,
            outputs,
        })
    }
}

/// Structural view of a definition used while wiring
struct Layout {
    kinds: HashMap<String, NodeKind>,
    scheduled: HashSet<String>,
}

impl Layout {
    fn analyze(
        def: &WorkflowDefinition,
        registry: &NodeExecutorRegistry,
    ) -> Result<Self, CompileError> {
        if def.id.trim().is_empty() {
            return Err(CompileError::InvalidDefinition(
                "workflow id must not be empty".to_string(),
            ));
        }

        let mut kinds = HashMap::new();
        for node in &def.nodes {
            if !registry.is_registered(&node.node_type) {
                return Err(CompileError::UnknownNodeType {
                    node: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
            }
            if kinds
                .insert(node.id.clone(), NodeKind::from_tag(&node.node_type))
                .is_some()
            {
                return Err(CompileError::DuplicateNode(node.id.clone()));
            }
        }

        for edge in &def.edges {
            if edge.source != START_SENTINEL && !kinds.contains_key(&edge.source) {
                return Err(CompileError::UnknownSource(edge.source.clone()));
            }
            if edge.target != OUTPUT_SENTINEL && !kinds.contains_key(&edge.target) {
                return Err(CompileError::UnknownTarget {
                    source_id: edge.source.clone(),
                    target: edge.target.clone(),
                });
            }
        }

        let handoff_targets: HashSet<&str> = def
            .edges
            .iter()
            .filter(|e| e.kind() == EdgeKind::Handoff)
            .map(|e| e.target.as_str())
            .collect();

        let scheduled = def
            .nodes
            .iter()
            .filter(|node| match kinds.get(&node.id) {
                Some(NodeKind::Start) | Some(NodeKind::Output) | None => false,
                Some(NodeKind::Workflow) => {
                    handoff_targets.contains(node.id.as_str())
                        || node.config_str("type") == Some(HANDOFF)
                        || node.config_str("nodeType") == Some(HANDOFF)
                }
                Some(NodeKind::Tool) => {
                    handoff_targets.contains(node.id.as_str())
                        || node.config_str("type") == Some(HANDOFF)
                        || node.config_str("toolId") == Some(HANDOFF_TOOL_ID)
                }
                Some(_) => true,
            })
            .map(|node| node.id.clone())
            .collect();

        Ok(Self { kinds, scheduled })
    }

    fn kind(&self, id: &str) -> NodeKind {
        self.kinds
            .get(id)
            .cloned()
            .unwrap_or_else(|| NodeKind::Custom(id.to_string()))
    }

    fn is_scheduled(&self, id: &str) -> bool {
        self.scheduled.contains(id)
    }

    fn is_start_source(&self, id: &str) -> bool {
        id == START_SENTINEL || self.kinds.get(id) == Some(&NodeKind::Start)
    }

    fn next_for(&self, target: &str) -> Next {
        if target == OUTPUT_SENTINEL {
            Next::End
        } else if self.kinds.get(target) == Some(&NodeKind::Output) {
            Next::Exit(target.to_string())
        } else {
            Next::Node(target.to_string())
        }
    }

    /// Non-start edges grouped by source, both in definition order
    fn edges_by_source<'a>(
        &self,
        def: &'a WorkflowDefinition,
    ) -> Vec<(&'a str, Vec<&'a EdgeDefinition>)> {
        let mut grouped: Vec<(&str, Vec<&EdgeDefinition>)> = Vec::new();
        for edge in &def.edges {
            if self.is_start_source(&edge.source) {
                continue;
            }
            match grouped.iter_mut().find(|(s, _)| *s == edge.source) {
                Some((_, edges)) => edges.push(edge),
                None => grouped.push((edge.source.as_str(), vec![edge])),
            }
        }
        grouped
    }
}

/// Pick the route for a matched rule id
///
/// A handle matches when it contains the id or its `r-` prefixed form, so
/// a rule with an empty id takes the first route. Otherwise the first handle
/// containing `else` or `default` is taken.
pub fn route_for(matched: &str, routes: &[(String, Next)]) -> Next {
    let prefixed = if matched.starts_with("r-") {
        matched.to_string()
    } else {
        format!("r-{}", matched)
    };
    if let Some((_, next)) = routes
        .iter()
        .find(|(handle, _)| handle.contains(&prefixed) || handle.contains(matched))
    {
        return next.clone();
    }

    routes
        .iter()
        .find(|(handle, _)| {
            let handle = handle.to_ascii_lowercase();
            handle.contains("else") || handle.contains("default")
        })
        .map(|(_, next)| next.clone())
        .unwrap_or(Next::End)
}

fn rule_router(node_id: &str, rules: Vec<Rule>, routes: Vec<(String, Next)>) -> RouterFn {
    let node_id = node_id.to_string();
    Arc::new(move |state: &WorkflowState| {
        let matched = evaluate_rules(&rules, state);
        let next = route_for(&matched, &routes);
        log::debug!("Rule '{}' matched '{}', routing to {}", node_id, matched, next);
        next
    })
}

/// A node definition paired with its executor
struct BoundNode {
    node: Arc<NodeDefinition>,
    executor: Arc<dyn NodeExecutor>,
}

impl BoundNode {
    fn new(node: NodeDefinition, executor: Arc<dyn NodeExecutor>) -> Self {
        Self {
            node: Arc::new(node),
            executor,
        }
    }

    fn into_node_fn(self) -> NodeFn {
        Arc::new(move |state: WorkflowState| {
            let node = self.node.clone();
            let executor = self.executor.clone();
            async move { execute_contained(&node, executor.as_ref(), state).await }.boxed()
        })
    }

    async fn run(&self, state: WorkflowState) -> WorkflowState {
        execute_contained(&self.node, self.executor.as_ref(), state).await
    }
}

/// Run an executor, recording its output under `nodes[<id>]`
///
/// An executor error becomes `{error, status: "error"}` and the incoming
/// state is kept.
pub async fn execute_contained(
    node: &NodeDefinition,
    executor: &dyn NodeExecutor,
    state: WorkflowState,
) -> WorkflowState {
    match executor.execute(node, state.clone()).await {
        Ok(outcome) => {
            let mut state = outcome.state;
            state.set_node_output(&node.id, outcome.output);
            state
        }
        Err(e) => {
            log::error!("Node '{}' ({}) failed: {}", node.id, node.node_type, e);
            let mut state = state;
            state.set_node_output(&node.id, json!({ "error": e.to_string(), "status": "error" }));
            state
        }
    }
}

/// Final state of one run and the mapping of the output node it ended at
#[derive(Debug, Clone)]
pub struct Completion {
    pub state: WorkflowState,
    /// Resolved `outputMapping`, `{}` when the workflow has no output node
    pub output: Value,
    pub output_node: Option<String>,
}

/// A compiled workflow, runnable any number of times
pub struct ExecutableGraph {
    id: String,
    name: String,
    graph: CompiledGraph,
    prologue: Option<BoundNode>,
    outputs: Vec<BoundNode>,
}

impl fmt::Debug for ExecutableGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableGraph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("vertices", &self.graph.node_ids())
            .field("entry", self.graph.entry())
            .field("outputs", &self.output_node_ids())
            .finish()
    }
}

impl ExecutableGraph {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the scheduled vertices, sorted
    pub fn vertices(&self) -> Vec<&str> {
        self.graph.node_ids()
    }

    pub fn entry(&self) -> &Next {
        self.graph.entry()
    }

    /// Output node ids in definition order
    pub fn output_node_ids(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.node.id.as_str()).collect()
    }

    fn output_for(&self, end: &Next) -> Option<&BoundNode> {
        let reached = match end {
            Next::Exit(id) => self.outputs.iter().find(|o| &o.node.id == id),
            _ => None,
        };
        reached.or_else(|| self.outputs.first())
    }

    /// Run the workflow to completion
    pub async fn execute(&self, state: WorkflowState) -> Result<Completion, FlowError> {
        log::info!("Invoking workflow '{}'", self.id);
        let mut state = state;
        if let Some(start) = &self.prologue {
            state = start.run(state).await;
        }

        let (mut state, end) = self.graph.run(state).await?;

        let (output, output_node) = match self.output_for(&end) {
            Some(terminal) => {
                state = terminal.run(state).await;
                let id = terminal.node.id.clone();
                let output = state.node_output(&id).cloned().unwrap_or_else(|| json!({}));
                (output, Some(id))
            }
            None => (json!({}), None),
        };
        Ok(Completion {
            state,
            output,
            output_node,
        })
    }

    /// Run the workflow to completion, keeping only the final state
    pub async fn invoke(&self, state: WorkflowState) -> Result<WorkflowState, FlowError> {
        self.execute(state).await.map(|done| done.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::loader::InMemoryLoader;

    fn def(value: Value) -> WorkflowDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn compiler_with(defs: Vec<WorkflowDefinition>) -> GraphCompiler {
        GraphCompiler::new(
            Arc::new(InMemoryLoader::with(defs)),
            CompilerSettings::default(),
        )
    }

    fn routing_workflow() -> WorkflowDefinition {
        def(json!({
            "id": "router",
            "nodes": [
                {"id": "s", "type": "start", "config": {}},
                {"id": "R", "type": "rule", "config": {"rules": [{
                    "ruleId": "r1",
                    "conditions": [{"field": "{{flow.choice}}", "operator": "equals", "value": "a"}]
                }]}},
                {"id": "T1", "type": "variable-update", "config": {
                    "variableUpdates": [{"fieldName": "flow.path", "value": "T1"}]
                }},
                {"id": "T2", "type": "variable update", "config": {
                    "variableUpdates": [{"fieldName": "flow.path", "value": "T2"}]
                }},
                {"id": "out", "type": "output", "config": {
                    "outputMapping": {"path": {"value": "{{flow.path}}"}}
                }}
            ],
            "edges": [
                {"source": "s", "target": "R"},
                {"source": "R", "target": "T1", "sourceHandle": "r-r1"},
                {"source": "R", "target": "T2", "sourceHandle": "else"},
                {"source": "T1", "target": "out"},
                {"source": "T2", "target": "out"}
            ]
        }))
    }

    fn with_choice(choice: &str) -> WorkflowState {
        let mut state = WorkflowState::initial();
        state.scope_mut("flow").insert("choice".into(), json!(choice));
        state
    }

    #[tokio::test]
    async fn test_rule_routing() {
        let compiler = compiler_with(vec![]);
        let graph = compiler.compile(&routing_workflow()).unwrap();

        let a = graph.execute(with_choice("a")).await.unwrap();
        assert_eq!(a.output, json!({"path": "T1"}));
        assert!(a.state.node_output("T2").is_none());

        let z = graph.execute(with_choice("z")).await.unwrap();
        assert_eq!(z.output, json!({"path": "T2"}));
        assert_eq!(z.state.node_output("R").unwrap()["matchedRuleId"], "default");
    }

    #[tokio::test]
    async fn test_each_branch_reports_its_own_output_node() {
        let compiler = compiler_with(vec![]);
        let graph = compiler
            .compile(&def(json!({
                "id": "answers",
                "nodes": [
                    {"id": "R", "type": "rule", "config": {"rules": [{
                        "ruleId": "r1",
                        "conditions": [{"field": "{{flow.choice}}", "operator": "equals", "value": "a"}]
                    }]}},
                    {"id": "outA", "type": "output", "config": {"outputMapping": {"answer": "A-branch"}}},
                    {"id": "outB", "type": "output", "config": {"outputMapping": {"answer": "B-branch"}}}
                ],
                "edges": [
                    {"source": "start", "target": "R"},
                    {"source": "R", "target": "outA", "sourceHandle": "r-r1"},
                    {"source": "R", "target": "outB", "sourceHandle": "else"}
                ]
            })))
            .unwrap();
        assert_eq!(graph.output_node_ids(), vec!["outA", "outB"]);

        let a = graph.execute(with_choice("a")).await.unwrap();
        assert_eq!(a.output, json!({"answer": "A-branch"}));
        assert_eq!(a.output_node.as_deref(), Some("outA"));

        let z = graph.execute(with_choice("z")).await.unwrap();
        assert_eq!(z.output, json!({"answer": "B-branch"}));
        assert_eq!(z.output_node.as_deref(), Some("outB"));
        assert!(z.state.node_output("outA").is_none());
    }

    #[tokio::test]
    async fn test_router_sees_rule_node_updates() {
        let compiler = compiler_with(vec![]);
        let graph = compiler
            .compile(&def(json!({
                "id": "reroute",
                "nodes": [
                    {"id": "R", "type": "rule", "config": {
                        "rules": [{
                            "ruleId": "r1",
                            "conditions": [{"field": "{{flow.choice}}", "operator": "equals", "value": "a"}]
                        }],
                        "variableUpdates": [{"fieldName": "flow.choice", "value": "b"}]
                    }},
                    {"id": "T1", "type": "variable-update"},
                    {"id": "T2", "type": "variable-update"}
                ],
                "edges": [
                    {"source": "start", "target": "R"},
                    {"source": "R", "target": "T1", "sourceHandle": "r-r1"},
                    {"source": "R", "target": "T2", "sourceHandle": "default"}
                ]
            })))
            .unwrap();

        let state = graph.invoke(with_choice("a")).await.unwrap();
        assert_eq!(state.node_output("R").unwrap()["matchedRuleId"], "r1");
        assert!(state.node_output("T1").is_none());
        assert!(state.node_output("T2").is_some());
    }

    #[test]
    fn test_route_for_handles() {
        let routes = vec![
            ("r-r1".to_string(), Next::Node("a".into())),
            ("handle-ELSE".to_string(), Next::Node("b".into())),
        ];
        assert_eq!(route_for("r1", &routes), Next::Node("a".into()));
        assert_eq!(route_for("r-r1", &routes), Next::Node("a".into()));
        assert_eq!(route_for("default", &routes), Next::Node("b".into()));
        assert_eq!(route_for("r2", &routes[..1]), Next::End);
        assert_eq!(route_for("", &routes), Next::Node("a".into()));
    }

    #[test]
    fn test_self_reference_is_structural() {
        let selfish = def(json!({
            "id": "loop",
            "nodes": [
                {"id": "s", "type": "start"},
                {"id": "w", "type": "workflow", "config": {"agenticWorkflowId": "loop", "type": "handoff"}}
            ],
            "edges": [{"source": "s", "target": "w"}, {"source": "w", "target": "output"}]
        }));
        let compiler = compiler_with(vec![selfish.clone()]);

        let err = compiler.compile(&selfish).unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(
            err,
            FlowError::Compile(CompileError::CircularDependency(ref chain)) if chain == &["loop", "loop"]
        ));
    }

    #[test]
    fn test_mutual_reference_is_structural() {
        let a = def(json!({
            "id": "a",
            "nodes": [
                {"id": "s", "type": "start"},
                {"id": "to_b", "type": "workflow", "config": {"agenticWorkflowId": "b"}}
            ],
            "edges": [{"source": "s", "target": "to_b", "type": "handoff"}]
        }));
        let b = def(json!({
            "id": "b",
            "nodes": [
                {"id": "s", "type": "start"},
                {"id": "to_a", "type": "workflow", "config": {"nodeType": "handoff", "agenticWorkflowId": "a"}}
            ],
            "edges": [{"source": "s", "target": "to_a"}]
        }));
        let compiler = compiler_with(vec![a, b]);

        let err = compiler.compile_by_id("a").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compile error: Circular dependency detected: a -> b -> a"
        );
        assert!(compiler.cache().graph("a").is_none());
    }

    #[test]
    fn test_structural_errors() {
        let compiler = compiler_with(vec![]);

        let missing = compiler.compile_by_id("nope").unwrap_err();
        assert!(matches!(
            missing,
            FlowError::Compile(CompileError::WorkflowNotFound(_))
        ));

        let no_entry = def(json!({
            "id": "x",
            "nodes": [{"id": "v", "type": "variable-update"}],
            "edges": []
        }));
        assert!(matches!(
            compiler.compile(&no_entry).unwrap_err(),
            FlowError::Compile(CompileError::MissingEntryPoint(_))
        ));

        let unknown_type = def(json!({
            "id": "y",
            "nodes": [{"id": "v", "type": "teleport"}],
            "edges": [{"source": "start", "target": "v"}]
        }));
        assert!(matches!(
            compiler.compile(&unknown_type).unwrap_err(),
            FlowError::Compile(CompileError::UnknownNodeType { .. })
        ));

        let dangling = def(json!({
            "id": "z",
            "nodes": [{"id": "v", "type": "variable-update"}],
            "edges": [{"source": "start", "target": "v"}, {"source": "v", "target": "ghost"}]
        }));
        assert!(matches!(
            compiler.compile(&dangling).unwrap_err(),
            FlowError::Compile(CompileError::UnknownTarget { .. })
        ));

        let unknown_ref = def(json!({
            "id": "w",
            "nodes": [{"id": "sub", "type": "workflow", "config": {"agenticWorkflowId": "ghost"}}],
            "edges": [{"source": "start", "target": "sub", "type": "handoff"}]
        }));
        assert!(matches!(
            compiler.compile(&unknown_ref).unwrap_err(),
            FlowError::Compile(CompileError::WorkflowNotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn test_non_handoff_nodes_are_not_vertices() {
        let compiler = compiler_with(vec![]);
        let graph = compiler
            .compile(&def(json!({
                "id": "tools",
                "nodes": [
                    {"id": "s", "type": "start"},
                    {"id": "a", "type": "variable-update"},
                    {"id": "inline_tool", "type": "tool", "config": {"toolId": "search"}},
                    {"id": "handoff_tool", "type": "tool", "config": {"toolId": "tool-handoff"}},
                    {"id": "out", "type": "output"}
                ],
                "edges": [
                    {"source": "s", "target": "a"},
                    {"source": "inline_tool", "target": "a"},
                    {"source": "a", "target": "handoff_tool", "type": "handoff"},
                    {"source": "handoff_tool", "target": "out"}
                ]
            })))
            .unwrap();

        assert_eq!(graph.vertices(), vec!["a", "handoff_tool"]);
        assert_eq!(graph.entry(), &Next::Node("a".into()));
        assert_eq!(graph.output_node_ids(), vec!["out"]);
    }

    #[tokio::test]
    async fn test_multi_edge_prefers_rule_target() {
        let compiler = compiler_with(vec![]);
        let graph = compiler
            .compile(&def(json!({
                "id": "fanout",
                "nodes": [
                    {"id": "a", "type": "variable-update"},
                    {"id": "b", "type": "variable-update", "config": {
                        "variableUpdates": [{"fieldName": "flow.hit", "value": "b"}]
                    }},
                    {"id": "r", "type": "rule", "config": {"rules": []}}
                ],
                "edges": [
                    {"source": "start", "target": "a"},
                    {"source": "a", "target": "b"},
                    {"source": "a", "target": "r"}
                ]
            })))
            .unwrap();

        let state = graph.invoke(WorkflowState::initial()).await.unwrap();
        assert!(state.node_output("r").is_some());
        assert!(state.node_output("b").is_none());
    }

    #[tokio::test]
    async fn test_node_errors_are_contained() {
        let compiler = compiler_with(vec![]);
        let graph = compiler
            .compile(&def(json!({
                "id": "contained",
                "nodes": [
                    {"id": "think", "type": "agent"},
                    {"id": "after", "type": "variable-update", "config": {
                        "variableUpdates": [{"fieldName": "flow.err", "value": "{{nodes.think.status}}"}]
                    }}
                ],
                "edges": [
                    {"source": "start", "target": "think"},
                    {"source": "think", "target": "after"},
                    {"source": "after", "target": "output"}
                ]
            })))
            .unwrap();

        let state = graph.invoke(WorkflowState::initial()).await.unwrap();
        assert_eq!(state.node_output("think").unwrap()["status"], "error");
        assert_eq!(state.get_path("flow.err"), Some(&json!("error")));
        assert_eq!(state.iteration_count(), 2);
    }

    #[test]
    fn test_compiled_graphs_are_cached() {
        let compiler = compiler_with(vec![routing_workflow()]);
        let first = compiler.compile_by_id("router").unwrap();
        let second = compiler.compile_by_id("router").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.cache().graph_count(), 1);
        assert_eq!(compiler.cache().definition_count(), 1);
    }

    #[test]
    fn test_compile_reuses_cached_graph() {
        let compiler = compiler_with(vec![]);
        let first = routing_workflow();
        let again = compiler.compile(&first).unwrap();
        assert!(Arc::ptr_eq(&again, &compiler.compile(&first).unwrap()));

        let mut renamed = first.clone();
        renamed.name = Some("second".into());
        let kept = compiler.compile(&renamed).unwrap();
        assert!(Arc::ptr_eq(&kept, &again));
        assert!(Arc::ptr_eq(&kept, &compiler.compile_by_id("router").unwrap()));
        assert_eq!(compiler.cache().graph_count(), 1);
    }

    #[test]
    fn test_node_types_expose_schemas() {
        let compiler = compiler_with(vec![]);
        let types = compiler.node_types();
        let rule = types.iter().find(|(tag, _)| tag == "rule").unwrap();
        assert_eq!(rule.1["properties"]["matchedRuleId"]["type"], "string");
    }
}
