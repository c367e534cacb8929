//! Common test utilities for analysis graph integration tests
//!
//! Provides a reference matching the one the map client's own test-suite
//! fakes, plus the definitions those tests build.

#![allow(dead_code)]

use analysis_graph::{AnalysisReference, AnalysisService};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Reference with four analysis types: source, trade-area,
/// estimated-population and sql-function
#[derive(Debug)]
pub struct FakeCamshaftReference {
    sources: HashMap<&'static str, Vec<&'static str>>,
    params: HashMap<&'static str, Vec<&'static str>>,
}

impl FakeCamshaftReference {
    pub fn new() -> Self {
        Self {
            sources: HashMap::from([
                ("source", vec![]),
                ("trade-area", vec!["source"]),
                ("estimated-population", vec!["source"]),
                ("sql-function", vec!["source", "target"]),
            ]),
            params: HashMap::from([
                ("source", vec!["query"]),
                ("trade-area", vec!["kind", "time"]),
                ("estimated-population", vec!["columnName"]),
            ]),
        }
    }
}

impl AnalysisReference for FakeCamshaftReference {
    fn source_names(&self, analysis_type: &str) -> Option<Vec<String>> {
        self.sources
            .get(analysis_type)
            .map(|names| names.iter().map(|name| name.to_string()).collect())
    }

    fn param_names(&self, analysis_type: &str) -> Option<Vec<String>> {
        self.params
            .get(analysis_type)
            .map(|names| names.iter().map(|name| name.to_string()).collect())
    }
}

pub fn service() -> AnalysisService {
    AnalysisService::new(FakeCamshaftReference::new())
}

/// Flat source definition: the query sits next to `id` and `type`
pub fn subway_stops(id: &str) -> Value {
    json!({
        "id": id,
        "type": "source",
        "query": "SELECT * FROM subway_stops"
    })
}

pub fn bus_stops(id: &str) -> Value {
    json!({
        "id": id,
        "type": "source",
        "params": { "query": "SELECT * FROM bus_stops" }
    })
}

/// a2 (estimated-population) -> a1 (trade-area) -> a0 (source)
pub fn estimated_population_chain() -> Value {
    json!({
        "id": "a2",
        "type": "estimated-population",
        "params": {
            "columnName": "estimated_people",
            "source": {
                "id": "a1",
                "type": "trade-area",
                "params": {
                    "kind": "walk",
                    "time": 300,
                    "source": {
                        "id": "a0",
                        "type": "source",
                        "params": {
                            "query": "SELECT * FROM subway_stops"
                        }
                    }
                }
            }
        }
    })
}
