//! Node representation in the analysis graph

use super::collection::AnalysisNodeCollection;
use super::service::{AnalysisError, AnalysisResult};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::debug;
use uuid::Uuid;

/// Attribute name answered by the node's fixed identifier
pub const ID_ATTRIBUTE: &str = "id";
/// Attribute name answered by the node's analysis type
pub const TYPE_ATTRIBUTE: &str = "type";
/// Credential attribute propagated from the service
pub const API_KEY_ATTRIBUTE: &str = "apiKey";
/// Credential attribute propagated from the service
pub const AUTH_TOKEN_ATTRIBUTE: &str = "authToken";

/// Attribute values held by a node
///
/// Scalars mirror JSON. `Node` holds a resolved source or target; equality
/// on it is identity, not structure.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<AttributeValue>),
    Object(BTreeMap<String, AttributeValue>),
    Node(Arc<AnalysisNode>),
}

/// Attribute map of a node, ordered by name
pub type Attributes = BTreeMap<String, AttributeValue>;

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Arc<AnalysisNode>> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// JSON form of the value; nodes become nested definitions
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Node(node) => node.to_definition(),
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Arc<AnalysisNode>> for AttributeValue {
    fn from(node: Arc<AnalysisNode>) -> Self {
        Self::Node(node)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Lifecycle of a node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Registered,
    Removed,
}

/// Everything the factory resolved for a node before it is registered
#[derive(Debug)]
pub(crate) struct NodeParts {
    pub id: String,
    pub analysis_type: String,
    pub source_names: Vec<String>,
    pub attributes: Attributes,
    pub dropped_params: Vec<String>,
}

/// A single step in the analysis graph
///
/// Nodes are shared (`Arc`) between the registry, the nodes that use them
/// as sources, and the layers or dataviews that render them. Attributes are
/// mutable after construction; `id` and `type` are not.
pub struct AnalysisNode {
    id: String,
    analysis_type: String,
    /// Identity of the construction event
    cid: Uuid,
    created_at: DateTime<Utc>,
    source_names: Vec<String>,
    attributes: RwLock<Attributes>,
    dropped_params: RwLock<Vec<String>>,
    removed: AtomicBool,
    collection: Weak<AnalysisNodeCollection>,
}

impl AnalysisNode {
    pub(crate) fn from_parts(parts: NodeParts, collection: Weak<AnalysisNodeCollection>) -> Arc<Self> {
        Arc::new(Self {
            id: parts.id,
            analysis_type: parts.analysis_type,
            cid: Uuid::new_v4(),
            created_at: Utc::now(),
            source_names: parts.source_names,
            attributes: RwLock::new(parts.attributes),
            dropped_params: RwLock::new(parts.dropped_params),
            removed: AtomicBool::new(false),
            collection,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn analysis_type(&self) -> &str {
        &self.analysis_type
    }

    pub fn cid(&self) -> Uuid {
        self.cid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> NodeState {
        if self.is_removed() {
            NodeState::Removed
        } else {
            NodeState::Registered
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Whether two handles point at the same node instance
    pub fn same_node(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// Current value of an attribute
    ///
    /// `id` and `type` always answer from the node's fixed fields.
    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        match name {
            ID_ATTRIBUTE => Some(AttributeValue::String(self.id.clone())),
            TYPE_ATTRIBUTE => Some(AttributeValue::String(self.analysis_type.clone())),
            _ => self.read_attributes().get(name).cloned(),
        }
    }

    /// Set an attribute, returning the previous value
    ///
    /// Fails for `id`/`type`, and for node values that would close a cycle.
    pub fn set(
        &self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> AnalysisResult<Option<AttributeValue>> {
        let name = name.into();
        if name == ID_ATTRIBUTE || name == TYPE_ATTRIBUTE {
            return Err(AnalysisError::ImmutableAttribute(name));
        }
        let value = value.into();
        self.check_acyclic(&value)?;
        Ok(self.write_attributes().insert(name, value))
    }

    /// Snapshot of all attributes, including `id` and `type`
    pub fn attributes(&self) -> Attributes {
        let mut attributes = self.read_attributes().clone();
        attributes.insert(ID_ATTRIBUTE.to_string(), AttributeValue::String(self.id.clone()));
        attributes.insert(
            TYPE_ATTRIBUTE.to_string(),
            AttributeValue::String(self.analysis_type.clone()),
        );
        attributes
    }

    /// Node held by the named attribute, if it holds one
    pub fn source(&self, name: &str) -> Option<Arc<AnalysisNode>> {
        self.read_attributes()
            .get(name)
            .and_then(AttributeValue::as_node)
            .cloned()
    }

    /// All node-valued attributes, ordered by attribute name
    pub fn sources(&self) -> Vec<(String, Arc<AnalysisNode>)> {
        self.read_attributes()
            .iter()
            .filter_map(|(name, value)| value.as_node().map(|n| (name.clone(), Arc::clone(n))))
            .collect()
    }

    /// Source names the analysis type declared when this node was built
    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    /// Declared source names that do not resolve to a node
    pub fn missing_sources(&self) -> Vec<String> {
        let attributes = self.read_attributes();
        self.source_names
            .iter()
            .filter(|name| attributes.get(name.as_str()).and_then(AttributeValue::as_node).is_none())
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_sources().is_empty()
    }

    /// Params filtered out by the type's allow-list at the latest construction
    pub fn dropped_params(&self) -> Vec<String> {
        self.dropped_params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Shared registry this node was registered in
    pub fn get_nodes_collection(&self) -> Option<Arc<AnalysisNodeCollection>> {
        self.collection.upgrade()
    }

    /// Detach this instance from its collection
    ///
    /// Source nodes stay registered. A newer node registered under the same
    /// id is left alone. Returns whether the collection entry was removed.
    pub fn remove(&self) -> bool {
        let detached = self
            .collection
            .upgrade()
            .map(|collection| collection.remove_node(self))
            .unwrap_or(false);
        self.mark_removed();
        detached
    }

    /// Every node reachable through source attributes, sources first,
    /// ending with this node
    pub fn dependency_order(self: &Arc<Self>) -> Vec<Arc<AnalysisNode>> {
        let mut visited = HashSet::from([self.cid]);
        let mut order = Vec::new();
        let mut stack = vec![(Arc::clone(self), self.sources().into_iter())];
        loop {
            let next = match stack.last_mut() {
                Some((_, pending)) => pending.next(),
                None => break,
            };
            match next {
                Some((_, source)) => {
                    if visited.insert(source.cid) {
                        let pending = source.sources().into_iter();
                        stack.push((source, pending));
                    }
                }
                None => {
                    if let Some((node, _)) = stack.pop() {
                        order.push(node);
                    }
                }
            }
        }
        order
    }

    /// Whether `other` is this node or reachable through its sources
    pub fn depends_on(self: &Arc<Self>, other: &AnalysisNode) -> bool {
        self.dependency_order()
            .iter()
            .any(|node| std::ptr::eq(Arc::as_ptr(node), other))
    }

    /// Nested definition form: `{ "id", "type", "params" }`
    ///
    /// Credentials are left out. Sources nest recursively, so the output
    /// depth follows the longest source chain.
    pub fn to_definition(&self) -> Value {
        let params: Map<String, Value> = self
            .read_attributes()
            .iter()
            .filter(|(name, _)| !is_credential(name))
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        json!({
            "id": self.id,
            "type": self.analysis_type,
            "params": params,
        })
    }

    pub(crate) fn merge(&self, attributes: Attributes, dropped_params: Vec<String>) -> AnalysisResult<()> {
        for value in attributes.values() {
            self.check_acyclic(value)?;
        }
        self.write_attributes().extend(attributes);
        *self
            .dropped_params
            .write()
            .unwrap_or_else(PoisonError::into_inner) = dropped_params;
        debug!(id = %self.id, analysis_type = %self.analysis_type, "merged attributes into analysis node");
        Ok(())
    }

    /// Returns true the first time the node is marked removed
    pub(crate) fn mark_removed(&self) -> bool {
        let first = !self.removed.swap(true, Ordering::SeqCst);
        if first {
            debug!(id = %self.id, cid = %self.cid, "analysis node removed");
        }
        first
    }

    fn check_acyclic(&self, value: &AttributeValue) -> AnalysisResult<()> {
        if let AttributeValue::Node(target) = value {
            if target.depends_on(self) {
                return Err(AnalysisError::CycleDetected {
                    path: vec![self.id.clone(), target.id.clone(), self.id.clone()],
                });
            }
        }
        Ok(())
    }

    fn read_attributes(&self) -> RwLockReadGuard<'_, Attributes> {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_attributes(&self) -> RwLockWriteGuard<'_, Attributes> {
        self.attributes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for AnalysisNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisNode")
            .field("id", &self.id)
            .field("type", &self.analysis_type)
            .field("cid", &self.cid)
            .field("state", &self.state())
            .finish()
    }
}

impl std::fmt::Display for AnalysisNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.analysis_type)
    }
}

impl Serialize for AnalysisNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_definition().serialize(serializer)
    }
}

fn is_credential(name: &str) -> bool {
    name == API_KEY_ATTRIBUTE || name == AUTH_TOKEN_ATTRIBUTE
}
