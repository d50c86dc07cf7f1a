// SPDX-License-Identifier: MIT

//! HTTP request node
//!
//! The request runs on its own tokio task so a slow endpoint never holds up
//! other invocations. Failures of any kind become an output of the form
//! `{error, statusCode: 500}`; this executor does not return errors for
//! transport or upstream problems.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use url::Url;

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::adk::http::{HttpRequest, HttpTransport};
use crate::flow::resolver::{resolve_deep, resolve_map, resolve_to_string, stringify};
use crate::flow::state::WorkflowState;
use crate::flow::types::NodeDefinition;

/// Status reported for any failed request
pub const FAILURE_STATUS: u16 = 500;

static HTTP_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "statusCode": {"type": "integer"},
            "headers": {"type": "object"},
            "body": {"type": "object"},
            "error": {"type": "string"}
        }
    })
});

pub struct HttpRequestExecutor {
    transport: Arc<dyn HttpTransport>,
}

impl HttpRequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn build_request(node: &NodeDefinition, state: &WorkflowState) -> Result<HttpRequest, String> {
        let raw_url = node.config_value("url").cloned().unwrap_or_default();
        let url = resolve_to_string(&raw_url, state);
        Url::parse(&url).map_err(|e| format!("Invalid URL '{}': {}", url, e))?;

        let method = node
            .config_str("method")
            .unwrap_or("GET")
            .trim()
            .to_ascii_uppercase();

        let headers = resolve_map(&node.config_map("headers"), state)
            .into_iter()
            .map(|(k, v)| (k, stringify(&v)))
            .collect();

        let body = match node.config_value("body") {
            None | Some(Value::Null) => None,
            Some(body) => Some(resolve_deep(body, state)),
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    async fn send(&self, request: HttpRequest) -> Value {
        let transport = self.transport.clone();
        let handle = tokio::spawn(async move { transport.send(request).await });

        match handle.await {
            Ok(Ok(resp)) if resp.is_success() => json!({
                "statusCode": resp.status,
                "headers": resp.headers,
                "body": resp.body,
            }),
            Ok(Ok(resp)) => failure(
                format!("Upstream responded with status {}", resp.status),
                Some(resp.status),
            ),
            Ok(Err(e)) => failure(e.to_string(), None),
            Err(e) => failure(format!("HTTP task failed: {}", e), None),
        }
    }
}

fn failure(message: String, upstream: Option<u16>) -> Value {
    let mut output = json!({
        "error": message,
        "statusCode": FAILURE_STATUS,
    });
    if let Some(status) = upstream {
        output["upstreamStatus"] = json!(status);
    }
    output
}

#[async_trait]
impl NodeExecutor for HttpRequestExecutor {
    fn output_schema(&self) -> &Value {
        &HTTP_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let output = match Self::build_request(node, &state) {
            Ok(request) => {
                log::info!("HTTP node '{}': {} {}", node.id, request.method, request.url);
                self.send(request).await
            }
            Err(message) => failure(message, None),
        };

        if let Some(error) = output.get("error") {
            log::warn!("HTTP node '{}' failed: {}", node.id, error);
        }

        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::nodes::test_support::MockTransport;

    fn http_node(config: Value) -> NodeDefinition {
        NodeDefinition::new("fetch", "http-request", config)
    }

    fn state() -> WorkflowState {
        WorkflowState::from_value(json!({
            "flow": {"userId": 7, "token": "abc"}
        }))
    }

    #[tokio::test]
    async fn test_success_resolves_templates() {
        let transport = Arc::new(MockTransport::responding(200, json!({"name": "Ada"})));
        let executor = HttpRequestExecutor::new(transport.clone());
        let node = http_node(json!({
            "url": "https://api.example.com/users/{{flow.userId}}",
            "method": "post",
            "headers": {"Authorization": "Bearer {{flow.token}}"},
            "body": {"id": "{{flow.userId}}", "tags": ["{{flow.token}}"]}
        }));

        let outcome = executor.execute(&node, state()).await.unwrap();
        assert_eq!(outcome.output["statusCode"], 200);
        assert_eq!(outcome.output["body"], json!({"name": "Ada"}));

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://api.example.com/users/7");
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            requests[0].headers,
            vec![("Authorization".to_string(), "Bearer abc".to_string())]
        );
        assert_eq!(requests[0].body, Some(json!({"id": 7, "tags": ["abc"]})));
    }

    #[tokio::test]
    async fn test_non_2xx_becomes_failure_output() {
        let executor = HttpRequestExecutor::new(Arc::new(MockTransport::responding(
            404,
            json!({"text": "missing"}),
        )));
        let node = http_node(json!({"url": "https://api.example.com/x"}));

        let outcome = executor.execute(&node, state()).await.unwrap();
        assert_eq!(outcome.output["statusCode"], 500);
        assert_eq!(outcome.output["upstreamStatus"], 404);
        assert!(outcome.output["error"].as_str().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_transport_error_becomes_failure_output() {
        let executor = HttpRequestExecutor::new(Arc::new(MockTransport::failing()));
        let node = http_node(json!({
            "url": "https://api.example.com/x",
            "variableUpdates": [{"fieldName": "flow.lastStatus", "value": "{{nodeOutput.statusCode}}"}]
        }));

        let outcome = executor.execute(&node, state()).await.unwrap();
        assert_eq!(outcome.output["statusCode"], 500);
        assert!(outcome.output.get("upstreamStatus").is_none());
        assert_eq!(outcome.state.get_path("flow.lastStatus"), Some(&json!(500)));
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_transport() {
        let transport = Arc::new(MockTransport::responding(200, json!({})));
        let executor = HttpRequestExecutor::new(transport.clone());
        let node = http_node(json!({"url": "{{flow.missing}}"}));

        let outcome = executor.execute(&node, state()).await.unwrap();
        assert_eq!(outcome.output["statusCode"], 500);
        assert!(transport.requests.lock().unwrap().is_empty());
    }
}
