// SPDX-License-Identifier: MIT

//! Engine configuration read from the environment
//!
//! | Variable | Default |
//! |---|---|
//! | `FLOW_WORKFLOWS_DIR` | `workflows` |
//! | `FLOW_MAX_STEPS` | `100` |
//! | `FLOW_HTTP_TIMEOUT_SECS` | `30` |
//! | `OPENAI_API_KEY` | unset, agent and llm nodes then fail |
//! | `OPENAI_BASE_URL` | `https://api.openai.com/v1` |
//! | `FLOW_DEFAULT_MODEL` | `gpt-4.1` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::adk::error::FlowError;
use crate::flow::graph::DEFAULT_MAX_STEPS;

pub const DEFAULT_WORKFLOWS_DIR: &str = "workflows";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub workflows_dir: PathBuf,
    pub max_steps: usize,
    pub http_timeout: Duration,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub default_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflows_dir: PathBuf::from(DEFAULT_WORKFLOWS_DIR),
            max_steps: DEFAULT_MAX_STEPS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Read the process environment; call `dotenv().ok()` first to honour `.env`
    pub fn from_env() -> Result<Self, FlowError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            workflows_dir: get("FLOW_WORKFLOWS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workflows_dir),
            max_steps: parse_var("FLOW_MAX_STEPS", get("FLOW_MAX_STEPS"))?
                .unwrap_or(defaults.max_steps),
            http_timeout: parse_var::<u64>("FLOW_HTTP_TIMEOUT_SECS", get("FLOW_HTTP_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            default_model: get("FLOW_DEFAULT_MODEL").unwrap_or(defaults.default_model),
        })
    }

    pub fn with_workflows_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workflows_dir = dir.into();
        self
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>, FlowError> {
    raw.map(|value| {
        value
            .parse::<T>()
            .map_err(|_| FlowError::config(format!("{} must be a number, got '{}'", key, value)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_steps, 100);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("FLOW_WORKFLOWS_DIR", "/srv/flows"),
            ("FLOW_MAX_STEPS", "12"),
            ("FLOW_HTTP_TIMEOUT_SECS", "5"),
            ("OPENAI_API_KEY", "sk-test"),
            ("FLOW_DEFAULT_MODEL", "  "),
        ]))
        .unwrap();

        assert_eq!(config.workflows_dir, PathBuf::from("/srv/flows"));
        assert_eq!(config.max_steps, 12);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_bad_number_is_a_config_error() {
        let err = EngineConfig::from_lookup(lookup(&[("FLOW_MAX_STEPS", "lots")])).unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }
}
