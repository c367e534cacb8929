//! Analysis Graph: dependency graph of map analyses
//!
//! Layers and dataviews on a thematic map are fed by *analyses*: a source
//! query, a trade-area buffer around it, a population estimate over the
//! buffer, and so on. Each step is a node whose parameters may reference
//! other nodes, forming a DAG that is later evaluated in batch.
//!
//! # Core Concepts
//!
//! - **Nodes**: one typed analysis step with parameters and source links
//! - **Collection**: the per-service registry that keeps node ids unique
//! - **Factory**: recursive construction from nested definitions, filtered
//!   through an analysis-type reference
//! - **Service**: the coordinator used by layers and dataviews
//!
//! # Example
//!
//! ```
//! use analysis_graph::{AnalysisService, CamshaftReference};
//! use serde_json::json;
//!
//! let service = AnalysisService::new(CamshaftReference::builtin());
//! let node = service
//!     .create_analysis_from_value(&json!({
//!         "id": "a1",
//!         "type": "buffer",
//!         "params": {
//!             "radius": 300,
//!             "source": { "id": "a0", "type": "source", "params": { "query": "SELECT * FROM stops" } }
//!         }
//!     }))
//!     .unwrap();
//!
//! assert_eq!(node.source("source").unwrap().id(), "a0");
//! assert!(service.find_node_by_id("a0").is_some());
//! ```

pub mod config;
mod graph;
pub mod layer;
pub mod reference;
pub mod vis;

pub use config::{ServiceConfig, UnknownParamPolicy};
pub use graph::{
    AnalysisDefinition, AnalysisError, AnalysisFactory, AnalysisInput, AnalysisNode,
    AnalysisNodeCollection, AnalysisParam, AnalysisResult, AnalysisService, AnalysisServiceBuilder,
    AttributeValue, Attributes, NodeState, API_KEY_ATTRIBUTE, AUTH_TOKEN_ATTRIBUTE, ID_ATTRIBUTE,
    TYPE_ATTRIBUTE,
};
pub use layer::{AnalysisSourced, Dataview, Layer};
pub use reference::{AnalysisReference, AnalysisTypeSpec, CamshaftReference, ParamKind, ParamSpec};
pub use vis::{MemberDefinition, VisualizationDefinition};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
