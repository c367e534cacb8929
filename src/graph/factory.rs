//! AnalysisFactory: recursive construction of analysis graphs
//!
//! Definitions arrive as nested JSON (or are assembled in code). Each one is
//! resolved bottom-up: declared sources are built (or looked up) first, then
//! declared scalar params are copied through, and anything the analysis type
//! does not declare is filtered out before the node is registered.

use super::collection::AnalysisNodeCollection;
use super::node::{
    AnalysisNode, AttributeValue, Attributes, NodeParts, API_KEY_ATTRIBUTE, AUTH_TOKEN_ATTRIBUTE,
};
use super::service::{AnalysisError, AnalysisResult};
use crate::config::{ServiceConfig, UnknownParamPolicy};
use crate::reference::AnalysisReference;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

const ID_KEY: &str = "id";
const TYPE_KEY: &str = "type";
const PARAMS_KEY: &str = "params";

/// Parameter value inside a definition
#[derive(Debug, Clone)]
pub enum AnalysisParam {
    /// Literal JSON: a scalar, or for source params an id string or a
    /// nested definition object
    Value(Value),
    /// An already constructed node
    Node(Arc<AnalysisNode>),
    /// A nested definition assembled in code
    Definition(Box<AnalysisDefinition>),
}

impl AnalysisParam {
    fn into_input(self) -> AnalysisResult<AnalysisInput> {
        match self {
            Self::Value(value) => AnalysisInput::from_value(&value),
            Self::Node(node) => Ok(AnalysisInput::Node(node)),
            Self::Definition(definition) => Ok(AnalysisInput::Definition(*definition)),
        }
    }

    fn into_attribute(self) -> AttributeValue {
        match self {
            Self::Value(value) => AttributeValue::from(value),
            Self::Node(node) => AttributeValue::Node(node),
            Self::Definition(definition) => AttributeValue::from(definition.to_value()),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Node(node) => node.to_definition(),
            Self::Definition(definition) => definition.to_value(),
        }
    }
}

impl From<Value> for AnalysisParam {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<AnalysisInput> for AnalysisParam {
    fn from(input: AnalysisInput) -> Self {
        match input {
            AnalysisInput::Node(node) => Self::Node(node),
            AnalysisInput::Id(id) => Self::Value(Value::String(id)),
            AnalysisInput::Definition(definition) => Self::Definition(Box::new(definition)),
        }
    }
}

/// Raw description of one analysis node: `{ id?, type, params }`
#[derive(Debug, Clone)]
pub struct AnalysisDefinition {
    pub id: Option<String>,
    pub analysis_type: String,
    pub params: BTreeMap<String, AnalysisParam>,
}

impl AnalysisDefinition {
    pub fn new(analysis_type: impl Into<String>) -> Self {
        Self {
            id: None,
            analysis_type: analysis_type.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a literal param
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), AnalysisParam::Value(value.into()));
        self
    }

    /// Add a source param: a node, an id, or a nested definition
    pub fn with_source(mut self, name: impl Into<String>, source: impl Into<AnalysisInput>) -> Self {
        self.params.insert(name.into(), AnalysisParam::from(source.into()));
        self
    }

    /// Parse a definition object
    ///
    /// Top-level keys other than `id`, `type` and `params` are read as
    /// params (the flat form). Keys inside `params` win over flat keys.
    pub fn from_value(value: &Value) -> AnalysisResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            AnalysisError::InvalidDefinition(format!("expected an object, got {}", value))
        })?;

        let analysis_type = object
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AnalysisError::InvalidDefinition("missing string field `type`".to_string()))?
            .to_string();

        let id = match object.get(ID_KEY) {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(other) => {
                return Err(AnalysisError::InvalidDefinition(format!(
                    "field `id` must be a string, got {}",
                    other
                )))
            }
        };

        let mut params: BTreeMap<String, AnalysisParam> = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), ID_KEY | TYPE_KEY | PARAMS_KEY))
            .map(|(key, value)| (key.clone(), AnalysisParam::Value(value.clone())))
            .collect();

        match object.get(PARAMS_KEY) {
            None | Some(Value::Null) => {}
            Some(Value::Object(nested)) => {
                for (key, value) in nested {
                    params.insert(key.clone(), AnalysisParam::Value(value.clone()));
                }
            }
            Some(other) => {
                return Err(AnalysisError::InvalidDefinition(format!(
                    "field `params` must be an object, got {}",
                    other
                )))
            }
        }

        Ok(Self {
            id,
            analysis_type,
            params,
        })
    }

    /// JSON form, with params nested under `params`
    pub fn to_value(&self) -> Value {
        let params: Map<String, Value> = self
            .params
            .iter()
            .map(|(name, param)| (name.clone(), param.to_value()))
            .collect();
        let mut value = json!({ "type": self.analysis_type, "params": params });
        if let Some(id) = &self.id {
            value[ID_KEY] = Value::String(id.clone());
        }
        value
    }
}

/// What a caller may hand to the factory
#[derive(Debug, Clone)]
pub enum AnalysisInput {
    /// Returned unchanged
    Node(Arc<AnalysisNode>),
    /// A node already registered in the service's collection
    Id(String),
    /// Built recursively
    Definition(AnalysisDefinition),
}

impl AnalysisInput {
    /// Classify a JSON value: strings are ids, objects are definitions
    pub fn from_value(value: &Value) -> AnalysisResult<Self> {
        match value {
            Value::String(id) => Ok(Self::Id(id.clone())),
            Value::Object(_) => AnalysisDefinition::from_value(value).map(Self::Definition),
            other => Err(AnalysisError::InvalidDefinition(format!(
                "expected a node id or a definition object, got {}",
                other
            ))),
        }
    }
}

impl From<Arc<AnalysisNode>> for AnalysisInput {
    fn from(node: Arc<AnalysisNode>) -> Self {
        Self::Node(node)
    }
}

impl From<&Arc<AnalysisNode>> for AnalysisInput {
    fn from(node: &Arc<AnalysisNode>) -> Self {
        Self::Node(Arc::clone(node))
    }
}

impl From<AnalysisDefinition> for AnalysisInput {
    fn from(definition: AnalysisDefinition) -> Self {
        Self::Definition(definition)
    }
}

impl From<&str> for AnalysisInput {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for AnalysisInput {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

/// Attributes of a definition after sources are built and params filtered
#[derive(Debug)]
pub(crate) struct ResolvedAttributes {
    pub analysis_type: String,
    pub source_names: Vec<String>,
    pub attributes: Attributes,
    pub dropped_params: Vec<String>,
}

/// Builds nodes into a shared collection, validated against a reference
#[derive(Debug, Clone, Copy)]
pub struct AnalysisFactory<'a> {
    reference: &'a dyn AnalysisReference,
    nodes: &'a Arc<AnalysisNodeCollection>,
    config: &'a ServiceConfig,
}

impl<'a> AnalysisFactory<'a> {
    pub fn new(
        reference: &'a dyn AnalysisReference,
        nodes: &'a Arc<AnalysisNodeCollection>,
        config: &'a ServiceConfig,
    ) -> Self {
        Self {
            reference,
            nodes,
            config,
        }
    }

    /// Resolve an input to a registered node
    pub fn analyse(&self, input: impl Into<AnalysisInput>) -> AnalysisResult<Arc<AnalysisNode>> {
        let mut stack = Vec::new();
        self.analyse_within(input.into(), &mut stack)
    }

    /// `stack` holds the ids of definitions still under construction
    fn analyse_within(
        &self,
        input: AnalysisInput,
        stack: &mut Vec<String>,
    ) -> AnalysisResult<Arc<AnalysisNode>> {
        match input {
            AnalysisInput::Node(node) => {
                check_not_in_progress(stack, node.id())?;
                Ok(node)
            }
            AnalysisInput::Id(id) => {
                check_not_in_progress(stack, &id)?;
                self.nodes
                    .get(&id)
                    .ok_or(AnalysisError::UnknownSourceNode(id))
            }
            AnalysisInput::Definition(definition) => self.build(definition, stack),
        }
    }

    fn build(
        &self,
        definition: AnalysisDefinition,
        stack: &mut Vec<String>,
    ) -> AnalysisResult<Arc<AnalysisNode>> {
        if stack.len() >= self.config.max_depth {
            return Err(AnalysisError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        let id = definition.id.clone().unwrap_or_else(generate_node_id);
        check_not_in_progress(stack, &id)?;

        trace!(id = %id, analysis_type = %definition.analysis_type, depth = stack.len(), "analysing definition");
        stack.push(id.clone());
        let resolved = self.resolve_attributes(definition, stack);
        stack.pop();

        self.register(id, resolved?)
    }

    /// Build declared sources, copy declared params, filter the rest
    pub(crate) fn resolve_attributes(
        &self,
        definition: AnalysisDefinition,
        stack: &mut Vec<String>,
    ) -> AnalysisResult<ResolvedAttributes> {
        let analysis_type = definition.analysis_type;
        let source_names = self.reference.source_names(&analysis_type);
        let param_names = self.reference.param_names(&analysis_type);
        if source_names.is_none() && param_names.is_none() {
            return Err(AnalysisError::UnknownAnalysisType(analysis_type));
        }
        let source_names = source_names.unwrap_or_default();
        let param_names = param_names.unwrap_or_default();

        let mut params = definition.params;
        let unknown: Vec<String> = params
            .keys()
            .filter(|name| !source_names.contains(*name) && !param_names.contains(*name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            match self.config.unknown_params {
                UnknownParamPolicy::Drop => {
                    debug!(analysis_type = %analysis_type, params = ?unknown, "dropping undeclared params");
                }
                UnknownParamPolicy::Warn => {
                    warn!(analysis_type = %analysis_type, params = ?unknown, "dropping undeclared params");
                }
                UnknownParamPolicy::Reject => {
                    return Err(AnalysisError::UnknownParams {
                        analysis_type,
                        params: unknown,
                    });
                }
            }
        }

        let mut attributes = Attributes::new();
        for name in &source_names {
            match params.remove(name) {
                None | Some(AnalysisParam::Value(Value::Null)) => {}
                Some(param) => {
                    let node = self.analyse_within(param.into_input()?, stack)?;
                    attributes.insert(name.clone(), AttributeValue::Node(node));
                }
            }
        }
        for name in &param_names {
            if let Some(param) = params.remove(name) {
                attributes.insert(name.clone(), param.into_attribute());
            }
        }

        if let Some(api_key) = &self.config.api_key {
            attributes.insert(API_KEY_ATTRIBUTE.to_string(), AttributeValue::from(api_key.as_str()));
        }
        if let Some(auth_token) = &self.config.auth_token {
            attributes.insert(
                AUTH_TOKEN_ATTRIBUTE.to_string(),
                AttributeValue::from(auth_token.as_str()),
            );
        }

        Ok(ResolvedAttributes {
            analysis_type,
            source_names,
            attributes,
            dropped_params: unknown,
        })
    }

    /// Reuse the live node holding `id`, or register a new one
    fn register(&self, id: String, resolved: ResolvedAttributes) -> AnalysisResult<Arc<AnalysisNode>> {
        if let Some(existing) = self.nodes.get(&id) {
            if existing.analysis_type() != resolved.analysis_type {
                return Err(AnalysisError::ConflictingDefinition {
                    id,
                    existing: existing.analysis_type().to_string(),
                    requested: resolved.analysis_type,
                });
            }
            existing.merge(resolved.attributes, resolved.dropped_params)?;
            return Ok(existing);
        }

        let node = AnalysisNode::from_parts(
            NodeParts {
                id,
                analysis_type: resolved.analysis_type,
                source_names: resolved.source_names,
                attributes: resolved.attributes,
                dropped_params: resolved.dropped_params,
            },
            Arc::downgrade(self.nodes),
        );
        self.nodes.add(Arc::clone(&node))?;
        Ok(node)
    }
}

fn check_not_in_progress(stack: &[String], id: &str) -> AnalysisResult<()> {
    if stack.iter().any(|ancestor| ancestor == id) {
        let mut path = stack.to_vec();
        path.push(id.to_string());
        return Err(AnalysisError::CycleDetected { path });
    }
    Ok(())
}

fn generate_node_id() -> String {
    Uuid::new_v4().to_string()
}
