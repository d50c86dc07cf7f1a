// SPDX-License-Identifier: MIT

//! HTTP API over the workflow builder

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::adk::error::{CompileError, FlowError};
use crate::flow::builder::Builder;
use crate::flow::state::InitialState;

type ApiError = (StatusCode, Json<Value>);

pub fn router(builder: Arc<Builder>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/workflows/{id}/invoke", post(invoke_workflow))
        .route("/api/node-types", get(list_node_types))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(builder)
}

pub async fn serve(
    builder: Arc<Builder>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(builder);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(e: FlowError) -> ApiError {
    let status = match &e {
        FlowError::Compile(CompileError::WorkflowNotFound(_)) => StatusCode::NOT_FOUND,
        FlowError::Compile(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_workflows(State(builder): State<Arc<Builder>>) -> Result<Json<Value>, ApiError> {
    let ids = builder.list().map_err(error_response)?;
    let workflows: Vec<Value> = ids.into_iter().map(|id| json!({ "id": id })).collect();
    Ok(Json(json!(workflows)))
}

async fn get_workflow(
    State(builder): State<Arc<Builder>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let definition = builder
        .compiler()
        .load_definition(&id)
        .map_err(error_response)?;
    let value = serde_json::to_value(definition.as_ref())
        .map_err(|e| error_response(e.into()))?;
    Ok(Json(value))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    flow: Map<String, Value>,
    #[serde(default)]
    system: Map<String, Value>,
    #[serde(default)]
    interface_inputs: Map<String, Value>,
}

async fn invoke_workflow(
    State(builder): State<Arc<Builder>>,
    Path(id): Path<String>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<Value>, ApiError> {
    let run_id = Uuid::new_v4().to_string();
    log::info!("Run {} of workflow '{}'", run_id, id);

    let graph = builder.build_by_id(&id).map_err(error_response)?;
    let overrides = InitialState {
        flow: request.flow,
        system: request.system,
        interface_inputs: request.interface_inputs,
        ..Default::default()
    };
    let result = builder
        .run(&graph, &request.query, overrides)
        .await
        .map_err(|e| {
            log::error!("Run {} failed: {}", run_id, e);
            error_response(e)
        })?;

    Ok(Json(json!({
        "runId": run_id,
        "status": "completed",
        "output": result.output,
        "state": result.state,
    })))
}

async fn list_node_types(State(builder): State<Arc<Builder>>) -> Json<Value> {
    let types: Vec<Value> = builder
        .compiler()
        .node_types()
        .into_iter()
        .map(|(tag, schema)| json!({ "type": tag, "outputSchema": schema }))
        .collect();
    Json(json!(types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::graph::CompilerSettings;
    use crate::flow::loader::{parse_json, InMemoryLoader};

    fn builder() -> Arc<Builder> {
        let echo = parse_json(
            r#"{
                "id": "echo",
                "nodes": [
                    {"id": "out", "type": "output", "config": {
                        "outputMapping": {"said": "{{interface.inputs.message}}"}
                    }}
                ],
                "edges": [{"source": "start", "target": "out"}]
            }"#,
        )
        .unwrap();
        Arc::new(Builder::new(
            Arc::new(InMemoryLoader::with([echo])),
            CompilerSettings::default(),
        ))
    }

    #[tokio::test]
    async fn test_invoke_returns_terminal_output() {
        let request = InvokeRequest {
            query: "ping".into(),
            ..Default::default()
        };
        let Json(body) = invoke_workflow(State(builder()), Path("echo".into()), Json(request))
            .await
            .unwrap();

        assert_eq!(body["status"], "completed");
        assert_eq!(body["output"], json!({"said": "ping"}));
        assert!(Uuid::parse_str(body["runId"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_workflow_is_not_found() {
        let (status, Json(body)) = invoke_workflow(
            State(builder()),
            Path("missing".into()),
            Json(InvokeRequest::default()),
        )
        .await
        .unwrap_err();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_listing_endpoints() {
        let Json(workflows) = list_workflows(State(builder())).await.unwrap();
        assert_eq!(workflows, json!([{"id": "echo"}]));

        let Json(types) = list_node_types(State(builder())).await;
        assert_eq!(types.as_array().unwrap().len(), 9);

        let Json(def) = get_workflow(State(builder()), Path("echo".into())).await.unwrap();
        assert_eq!(def["nodes"][0]["id"], "out");
    }
}
