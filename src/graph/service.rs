//! AnalysisService: the per-visualization entry point for analysis graphs

use super::collection::AnalysisNodeCollection;
use super::factory::{AnalysisFactory, AnalysisInput};
use super::node::AnalysisNode;
use crate::config::ServiceConfig;
use crate::layer::{AnalysisSourced, Dataview, Layer};
use crate::reference::AnalysisReference;
use crate::vis::{MemberDefinition, VisualizationDefinition};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while building or editing analysis graphs
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No analysis-type reference configured")]
    MissingReference,

    #[error("Unknown analysis type: {0}")]
    UnknownAnalysisType(String),

    #[error("Source node not found: {0}")]
    UnknownSourceNode(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Node {id} is already registered as `{existing}`, cannot redefine it as `{requested}`")]
    ConflictingDefinition {
        id: String,
        existing: String,
        requested: String,
    },

    #[error("Params not declared for `{analysis_type}`: {}", params.join(", "))]
    UnknownParams {
        analysis_type: String,
        params: Vec<String>,
    },

    #[error("Cycle detected: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Analysis definitions nested deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("Invalid analysis definition: {0}")]
    InvalidDefinition(String),

    #[error("Attribute `{0}` cannot be changed")]
    ImmutableAttribute(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Builder for [`AnalysisService`]
#[derive(Debug, Default)]
pub struct AnalysisServiceBuilder {
    reference: Option<Arc<dyn AnalysisReference>>,
    config: ServiceConfig,
}

impl AnalysisServiceBuilder {
    pub fn reference(mut self, reference: impl AnalysisReference + 'static) -> Self {
        self.reference = Some(Arc::new(reference));
        self
    }

    pub fn shared_reference(mut self, reference: Arc<dyn AnalysisReference>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.config.auth_token = Some(auth_token.into());
        self
    }

    /// Fails without a reference: no graph can be validated without one
    pub fn build(self) -> AnalysisResult<AnalysisService> {
        let reference = self.reference.ok_or(AnalysisError::MissingReference)?;
        Ok(AnalysisService {
            reference,
            config: self.config,
            nodes: Arc::new(AnalysisNodeCollection::new()),
            layers: Vec::new(),
            dataviews: Vec::new(),
        })
    }
}

/// The analysis service
///
/// Owns the node collection shared by every graph it builds, so separate
/// services (separate map views) never see each other's nodes.
#[derive(Debug)]
pub struct AnalysisService {
    reference: Arc<dyn AnalysisReference>,
    config: ServiceConfig,
    nodes: Arc<AnalysisNodeCollection>,
    layers: Vec<Layer>,
    dataviews: Vec<Dataview>,
}

impl AnalysisService {
    /// Create a service with the default configuration
    pub fn new(reference: impl AnalysisReference + 'static) -> Self {
        Self {
            reference: Arc::new(reference),
            config: ServiceConfig::default(),
            nodes: Arc::new(AnalysisNodeCollection::new()),
            layers: Vec::new(),
            dataviews: Vec::new(),
        }
    }

    pub fn builder() -> AnalysisServiceBuilder {
        AnalysisServiceBuilder::default()
    }

    pub fn factory(&self) -> AnalysisFactory<'_> {
        AnalysisFactory::new(self.reference.as_ref(), &self.nodes, &self.config)
    }

    /// Build (or reuse) the graph for a definition and return its root
    pub fn create_analysis(&self, input: impl Into<AnalysisInput>) -> AnalysisResult<Arc<AnalysisNode>> {
        self.factory().analyse(input)
    }

    /// Same as [`create_analysis`](Self::create_analysis) for raw JSON
    pub fn create_analysis_from_value(&self, value: &Value) -> AnalysisResult<Arc<AnalysisNode>> {
        self.create_analysis(AnalysisInput::from_value(value)?)
    }

    /// Look up any node registered through this service
    pub fn find_node_by_id(&self, id: &str) -> Option<Arc<AnalysisNode>> {
        self.nodes.get(id)
    }

    /// Source nodes of the given layers and dataviews, deduplicated
    ///
    /// One node per layer in layer order, then one per dataview in dataview
    /// order, skipping dataview nodes whose id a layer already contributed.
    /// Layers are not deduplicated against each other. Members without a
    /// source contribute nothing.
    pub fn get_unique_analysis_nodes<'a, L, D>(
        layers: impl IntoIterator<Item = &'a L>,
        dataviews: impl IntoIterator<Item = &'a D>,
    ) -> Vec<Arc<AnalysisNode>>
    where
        L: AnalysisSourced + 'a,
        D: AnalysisSourced + 'a,
    {
        let mut unique: Vec<Arc<AnalysisNode>> = layers
            .into_iter()
            .filter_map(|layer| layer.source().cloned())
            .collect();
        let layer_ids: HashSet<String> = unique.iter().map(|node| node.id().to_string()).collect();

        unique.extend(
            dataviews
                .into_iter()
                .filter_map(|dataview| dataview.source())
                .filter(|node| !layer_ids.contains(node.id()))
                .cloned(),
        );
        unique
    }

    /// [`get_unique_analysis_nodes`](Self::get_unique_analysis_nodes) over
    /// this service's own layers and dataviews
    pub fn unique_analysis_nodes(&self) -> Vec<Arc<AnalysisNode>> {
        Self::get_unique_analysis_nodes(&self.layers, &self.dataviews)
    }

    /// Attach a layer, building its source first
    pub fn add_layer(
        &mut self,
        id: impl Into<String>,
        source: impl Into<AnalysisInput>,
    ) -> AnalysisResult<Arc<AnalysisNode>> {
        let node = self.create_analysis(source)?;
        self.layers.push(Layer::new(id, Arc::clone(&node)));
        Ok(node)
    }

    /// Attach a dataview, building its source first
    pub fn add_dataview(
        &mut self,
        id: impl Into<String>,
        source: impl Into<AnalysisInput>,
    ) -> AnalysisResult<Arc<AnalysisNode>> {
        let node = self.create_analysis(source)?;
        self.dataviews.push(Dataview::new(id, Arc::clone(&node)));
        Ok(node)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn dataviews(&self) -> &[Dataview] {
        &self.dataviews
    }

    /// Create the document's analyses, then its layers, then its dataviews
    ///
    /// Layers and dataviews are attached only once every member resolved.
    /// Analyses registered before a failure stay in the collection.
    pub fn load_visualization(&mut self, vis: &VisualizationDefinition) -> AnalysisResult<()> {
        for analysis in &vis.analyses {
            self.create_analysis_from_value(analysis)?;
        }
        let layers = vis
            .layers
            .iter()
            .map(|member| {
                Ok(Layer {
                    id: member.id.clone(),
                    source: self.member_source(member)?,
                })
            })
            .collect::<AnalysisResult<Vec<_>>>()?;
        let dataviews = vis
            .dataviews
            .iter()
            .map(|member| {
                Ok(Dataview {
                    id: member.id.clone(),
                    source: self.member_source(member)?,
                })
            })
            .collect::<AnalysisResult<Vec<_>>>()?;

        self.layers.extend(layers);
        self.dataviews.extend(dataviews);
        debug!(
            nodes = self.nodes.len(),
            layers = self.layers.len(),
            dataviews = self.dataviews.len(),
            "loaded visualization"
        );
        Ok(())
    }

    pub fn nodes(&self) -> &Arc<AnalysisNodeCollection> {
        &self.nodes
    }

    pub fn reference(&self) -> &Arc<dyn AnalysisReference> {
        &self.reference
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn member_source(&self, member: &MemberDefinition) -> AnalysisResult<Option<Arc<AnalysisNode>>> {
        member
            .source
            .as_ref()
            .map(|source| self.create_analysis_from_value(source))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CamshaftReference;
    use serde_json::json;

    #[test]
    fn test_builder_requires_reference() {
        let err = AnalysisService::builder().api_key("KEY").build().unwrap_err();
        assert!(matches!(err, AnalysisError::MissingReference));
    }

    #[test]
    fn test_builder_credentials() {
        let service = AnalysisService::builder()
            .reference(CamshaftReference::builtin())
            .api_key("KEY")
            .auth_token("TOKEN")
            .build()
            .unwrap();

        assert_eq!(service.config().api_key.as_deref(), Some("KEY"));
        assert_eq!(service.config().auth_token.as_deref(), Some("TOKEN"));
    }

    #[test]
    fn test_services_do_not_share_nodes() {
        let first = AnalysisService::new(CamshaftReference::builtin());
        let second = AnalysisService::new(CamshaftReference::builtin());
        first
            .create_analysis_from_value(&json!({ "id": "a0", "type": "source", "query": "SELECT 1" }))
            .unwrap();

        assert!(first.find_node_by_id("a0").is_some());
        assert!(second.find_node_by_id("a0").is_none());
    }

    #[test]
    fn test_add_layer_and_dataview() {
        let mut service = AnalysisService::new(CamshaftReference::builtin());
        let a0 = service
            .add_layer(
                "layer0",
                AnalysisInput::from_value(&json!({ "id": "a0", "type": "source", "query": "SELECT 1" }))
                    .unwrap(),
            )
            .unwrap();
        service.add_dataview("histogram", "a0").unwrap();

        assert_eq!(service.layers().len(), 1);
        assert_eq!(service.dataviews().len(), 1);
        let unique = service.unique_analysis_nodes();
        assert_eq!(unique.len(), 1);
        assert!(Arc::ptr_eq(&unique[0], &a0));
    }

    #[test]
    fn test_add_layer_with_unknown_id_fails() {
        let mut service = AnalysisService::new(CamshaftReference::builtin());
        let err = service.add_layer("layer0", "missing").unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownSourceNode(id) if id == "missing"));
        assert!(service.layers().is_empty());
    }

    #[test]
    fn test_error_messages() {
        let err = AnalysisError::CycleDetected {
            path: vec!["a0".to_string(), "a1".to_string(), "a0".to_string()],
        };
        assert_eq!(err.to_string(), "Cycle detected: a0 -> a1 -> a0");

        let err = AnalysisError::UnknownParams {
            analysis_type: "buffer".to_string(),
            params: vec!["color".to_string(), "width".to_string()],
        };
        assert_eq!(err.to_string(), "Params not declared for `buffer`: color, width");
    }
}
