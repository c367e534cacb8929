//! Visualization documents
//!
//! A document lists the analyses of a map together with the layers and
//! dataviews that consume them. Member sources are either the id of an
//! analysis or an inline definition.
//!
//! ```yaml
//! analyses:
//!   - id: a1
//!     type: trade-area
//!     params:
//!       kind: walk
//!       time: 300
//!       source: { id: a0, type: source, params: { query: "SELECT * FROM stops" } }
//! layers:
//!   - { id: stops, source: a0 }
//!   - { id: walkable, source: a1 }
//! dataviews:
//!   - { id: stops-histogram, source: a0 }
//! ```

use crate::config::read_document;
use crate::graph::AnalysisResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A layer or dataview entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

/// Analyses, layers and dataviews of one map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationDefinition {
    pub analyses: Vec<Value>,
    pub layers: Vec<MemberDefinition>,
    pub dataviews: Vec<MemberDefinition>,
}

impl VisualizationDefinition {
    pub fn from_yaml_str(yaml: &str) -> AnalysisResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        read_document(path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_document() {
        let yaml = r#"
analyses:
  - id: a0
    type: source
    params: { query: "SELECT * FROM stops" }
layers:
  - { id: stops, source: a0 }
  - { id: basemap }
"#;
        let vis = VisualizationDefinition::from_yaml_str(yaml).unwrap();

        assert_eq!(vis.analyses.len(), 1);
        assert_eq!(vis.analyses[0]["params"]["query"], "SELECT * FROM stops");
        assert_eq!(vis.layers[0].source, Some(Value::String("a0".to_string())));
        assert_eq!(vis.layers[1].source, None);
        assert!(vis.dataviews.is_empty());
    }
}
