// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{apply_updates, NodeExecutor, NodeOutcome};
use crate::adk::error::FlowError;
use crate::flow::condition::evaluate_rules;
use crate::flow::state::WorkflowState;
use crate::flow::types::NodeDefinition;

static RULE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "matchedRuleId": {"type": "string"},
            "rules": {"type": "array"}
        }
    })
});

/// Evaluates its rule list and reports the matched rule id
pub struct RuleExecutor;

#[async_trait]
impl NodeExecutor for RuleExecutor {
    fn output_schema(&self) -> &Value {
        &RULE_SCHEMA
    }

    async fn execute(
        &self,
        node: &NodeDefinition,
        state: WorkflowState,
    ) -> Result<NodeOutcome, FlowError> {
        let rules = node.rules()?;
        let matched = evaluate_rules(&rules, &state);
        log::debug!("Rule node '{}' matched '{}'", node.id, matched);

        let output = json!({
            "matchedRuleId": matched,
            "rules": node.config_value("rules").cloned().unwrap_or_else(|| json!([])),
        });
        let state = apply_updates(node, &output, state)?;
        Ok(NodeOutcome::new(output, state).with_route(matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::condition::DEFAULT_ROUTE;

    fn rule_node() -> NodeDefinition {
        NodeDefinition::new(
            "router",
            "rule",
            json!({
                "rules": [{
                    "ruleId": "r1",
                    "conditions": [{"field": "{{flow.choice}}", "operator": "equals", "value": "a"}]
                }],
                "variableUpdates": [
                    {"fieldName": "flow.route", "value": "{{nodeOutput.matchedRuleId}}"}
                ]
            }),
        )
    }

    #[tokio::test]
    async fn test_rule_reports_match_and_applies_updates() {
        let state = WorkflowState::from_value(json!({"flow": {"choice": "a"}}));
        let outcome = RuleExecutor.execute(&rule_node(), state).await.unwrap();

        assert_eq!(outcome.matched_rule_id.as_deref(), Some("r1"));
        assert_eq!(outcome.output["matchedRuleId"], "r1");
        assert_eq!(outcome.state.get_path("flow.route"), Some(&json!("r1")));
    }

    #[tokio::test]
    async fn test_rule_falls_back_to_default() {
        let state = WorkflowState::from_value(json!({"flow": {"choice": "z"}}));
        let outcome = RuleExecutor.execute(&rule_node(), state).await.unwrap();

        assert_eq!(outcome.matched_rule_id.as_deref(), Some(DEFAULT_ROUTE));
    }
}
