//! Service configuration
//!
//! Loaded from YAML, e.g.:
//!
//! ```yaml
//! api_key: THE_API_KEY
//! unknown_params: warn
//! max_depth: 32
//! ```

use crate::graph::AnalysisResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Nesting limit for definitions when none is configured
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What to do with params an analysis type does not declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownParamPolicy {
    /// Filter them out and log at debug level
    #[default]
    Drop,
    /// Filter them out and log a warning
    Warn,
    /// Fail the construction
    Reject,
}

/// Settings shared by every graph a service builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Propagated onto every node as `apiKey`
    #[serde(alias = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Propagated onto every node as `authToken`
    #[serde(alias = "authToken", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub unknown_params: UnknownParamPolicy,
    /// Deepest nesting of definitions accepted in one construction
    pub max_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            auth_token: None,
            unknown_params: UnknownParamPolicy::Drop,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    pub fn with_unknown_params(mut self, policy: UnknownParamPolicy) -> Self {
        self.unknown_params = policy;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> AnalysisResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        read_document(path.as_ref())
    }

    /// Default config location (~/.config/analysis-graph/config.yaml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("analysis-graph").join("config.yaml"))
    }
}

/// Read a JSON (`.json`) or YAML (anything else) document
pub fn read_document<T: DeserializeOwned>(path: &Path) -> AnalysisResult<T> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_json {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.api_key, None);
        assert_eq!(config.unknown_params, UnknownParamPolicy::Drop);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ServiceConfig::from_yaml_str("unknown_params: reject\n").unwrap();
        assert_eq!(config.unknown_params, UnknownParamPolicy::Reject);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn test_camel_case_credentials() {
        let config =
            ServiceConfig::from_yaml_str("apiKey: THE_API_KEY\nauthToken: THE_AUTH_TOKEN\n").unwrap();
        assert_eq!(config.api_key.as_deref(), Some("THE_API_KEY"));
        assert_eq!(config.auth_token.as_deref(), Some("THE_AUTH_TOKEN"));
    }

    #[test]
    fn test_unknown_policy_is_an_error() {
        assert!(ServiceConfig::from_yaml_str("unknown_params: ignore\n").is_err());
    }
}
