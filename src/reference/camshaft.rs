//! Table-driven analysis-type reference
//!
//! Serialized as a map from type name to its params:
//!
//! ```yaml
//! trade-area:
//!   params:
//!     source: { type: node }
//!     kind: { type: enum, values: [walk, car] }
//!     time: { type: number }
//!     isolines: { type: number, optional: true }
//! ```

use super::traits::AnalysisReference;
use crate::config::read_document;
use crate::graph::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Kind of value a param holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Another analysis; these params are the type's source names
    Node,
    String,
    Number,
    Boolean,
    Enum,
    Array,
    Sql,
    Object,
}

/// Declaration of one param
///
/// Only `kind` drives construction. `optional` and `values` are carried for
/// callers that inspect the reference; nodes never check them, and an absent
/// optional source still leaves a node incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    /// Informational; not enforced
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    /// Accepted values for `enum` params; informational, not enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            optional: false,
            values: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Declaration of one analysis type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTypeSpec {
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
}

impl AnalysisTypeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required source param
    pub fn source(self, name: impl Into<String>) -> Self {
        self.param(name, ParamSpec::new(ParamKind::Node))
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn source_names(&self) -> Vec<String> {
        self.names_where(|spec| spec.kind == ParamKind::Node)
    }

    pub fn param_names(&self) -> Vec<String> {
        self.names_where(|spec| spec.kind != ParamKind::Node)
    }

    fn names_where(&self, keep: impl Fn(&ParamSpec) -> bool) -> Vec<String> {
        self.params
            .iter()
            .filter(|(_, spec)| keep(spec))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Reference backed by a table of type declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CamshaftReference {
    types: BTreeMap<String, AnalysisTypeSpec>,
}

impl CamshaftReference {
    /// An empty reference; every type is unknown
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, spec: AnalysisTypeSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: AnalysisTypeSpec) -> Option<AnalysisTypeSpec> {
        self.types.insert(name.into(), spec)
    }

    pub fn type_spec(&self, name: &str) -> Option<&AnalysisTypeSpec> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_yaml_str(yaml: &str) -> AnalysisResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a `.json` file, or YAML for any other extension
    pub fn load(path: impl AsRef<Path>) -> AnalysisResult<Self> {
        read_document(path.as_ref())
    }

    /// The common camshaft analysis types
    pub fn builtin() -> Self {
        use ParamKind::{Array, Boolean, Enum, Number, Sql};
        let required = ParamSpec::new;
        let optional = |kind| ParamSpec::new(kind).optional();

        Self::new()
            .with_type("source", AnalysisTypeSpec::new().param("query", required(Sql)))
            .with_type(
                "buffer",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("radius", required(Number))
                    .param("isolines", optional(Number))
                    .param("dissolved", optional(Boolean)),
            )
            .with_type(
                "trade-area",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("kind", required(Enum).with_values(["walk", "car"]))
                    .param("time", required(Number))
                    .param("isolines", optional(Number))
                    .param("dissolved", optional(Boolean)),
            )
            .with_type(
                "estimated-population",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("columnName", required(ParamKind::String)),
            )
            .with_type(
                "point-in-polygon",
                AnalysisTypeSpec::new()
                    .source("points_source")
                    .source("polygons_source"),
            )
            .with_type(
                "sql-function",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("target", optional(ParamKind::Node))
                    .param("function_name", required(ParamKind::String))
                    .param("function_args", optional(Array)),
            )
            .with_type(
                "intersection",
                AnalysisTypeSpec::new().source("source").source("target"),
            )
            .with_type(
                "aggregate-intersection",
                AnalysisTypeSpec::new()
                    .source("source")
                    .source("target")
                    .param(
                        "aggregate_function",
                        required(Enum).with_values(["avg", "count", "max", "min", "sum"]),
                    )
                    .param("aggregate_column", required(ParamKind::String)),
            )
            .with_type(
                "filter-category",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("column", required(ParamKind::String))
                    .param("accept", optional(Array))
                    .param("reject", optional(Array)),
            )
            .with_type(
                "filter-range",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("column", required(ParamKind::String))
                    .param("min", optional(Number))
                    .param("max", optional(Number)),
            )
            .with_type(
                "kmeans",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("clusters", required(Number)),
            )
            .with_type(
                "moran",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("numerator_column", required(ParamKind::String))
                    .param("denominator_column", optional(ParamKind::String))
                    .param("significance", required(Number))
                    .param("neighbours", optional(Number))
                    .param("permutations", optional(Number))
                    .param("w_type", optional(Enum).with_values(["knn", "queen"])),
            )
            .with_type(
                "weighted-centroid",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("weight_column", required(ParamKind::String))
                    .param("category_column", required(ParamKind::String))
                    .param(
                        "aggregation",
                        required(Enum).with_values(["avg", "count", "max", "min", "sum"]),
                    )
                    .param("aggregation_column", optional(ParamKind::String)),
            )
            .with_type(
                "line-to-single-point",
                AnalysisTypeSpec::new()
                    .source("source")
                    .param("destination_longitude", required(Number))
                    .param("destination_latitude", required(Number)),
            )
    }
}

impl AnalysisReference for CamshaftReference {
    fn source_names(&self, analysis_type: &str) -> Option<Vec<String>> {
        self.types.get(analysis_type).map(AnalysisTypeSpec::source_names)
    }

    fn param_names(&self, analysis_type: &str) -> Option<Vec<String>> {
        self.types.get(analysis_type).map(AnalysisTypeSpec::param_names)
    }

    fn analysis_types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_splits_sources_and_params() {
        let reference = CamshaftReference::builtin();

        assert_eq!(reference.source_names("source"), Some(vec![]));
        assert_eq!(reference.param_names("source"), Some(vec!["query".to_string()]));
        assert_eq!(
            reference.source_names("sql-function"),
            Some(vec!["source".to_string(), "target".to_string()])
        );
        assert_eq!(
            reference.source_names("point-in-polygon"),
            Some(vec!["points_source".to_string(), "polygons_source".to_string()])
        );
        assert!(reference.is_known_type("moran"));
        assert!(!reference.is_known_type("georeference-city"));
        assert_eq!(reference.analysis_types().len(), reference.len());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
trade-area:
  params:
    source: { type: node }
    kind: { type: enum, values: [walk, car] }
    time: { type: number }
source:
  params:
    query: { type: sql }
"#;
        let reference = CamshaftReference::from_yaml_str(yaml).unwrap();

        assert_eq!(reference.len(), 2);
        assert_eq!(reference.source_names("trade-area"), Some(vec!["source".to_string()]));
        assert_eq!(
            reference.param_names("trade-area"),
            Some(vec!["kind".to_string(), "time".to_string()])
        );
        let kind = &reference.type_spec("trade-area").unwrap().params["kind"];
        assert_eq!(kind.values.as_deref(), Some(&["walk".to_string(), "car".to_string()][..]));
    }

    #[test]
    fn test_from_json_rejects_unknown_kind() {
        let json = r#"{ "buffer": { "params": { "radius": { "type": "distance" } } } }"#;
        assert!(CamshaftReference::from_json_str(json).is_err());
    }

    #[test]
    fn test_yaml_roundtrip_keeps_optional_flag() {
        let reference = CamshaftReference::new().with_type(
            "buffer",
            AnalysisTypeSpec::new()
                .source("source")
                .param("radius", ParamSpec::new(ParamKind::Number))
                .param("dissolved", ParamSpec::new(ParamKind::Boolean).optional()),
        );

        let yaml = serde_yaml::to_string(&reference).unwrap();
        assert!(yaml.contains("optional: true"));
        assert_eq!(CamshaftReference::from_yaml_str(&yaml).unwrap(), reference);
    }
}
