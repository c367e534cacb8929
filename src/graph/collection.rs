//! AnalysisNodeCollection: the id-keyed node registry shared by one service

use super::node::AnalysisNode;
use super::service::{AnalysisError, AnalysisResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of live analysis nodes, keyed by node id
///
/// Every graph created by a service registers into the same collection, so
/// two analyses naming the same id alias one node. At most one live node
/// exists per id.
#[derive(Debug, Default)]
pub struct AnalysisNodeCollection {
    nodes: DashMap<String, Arc<AnalysisNode>>,
}

impl AnalysisNodeCollection {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Register a node
    ///
    /// Fails if another live node already holds the id.
    pub fn add(&self, node: Arc<AnalysisNode>) -> AnalysisResult<()> {
        match self.nodes.entry(node.id().to_string()) {
            Entry::Occupied(_) => Err(AnalysisError::DuplicateNodeId(node.id().to_string())),
            Entry::Vacant(slot) => {
                debug!(id = %node.id(), analysis_type = %node.analysis_type(), "registered analysis node");
                slot.insert(node);
                Ok(())
            }
        }
    }

    /// Look up a node by id
    pub fn get(&self, id: &str) -> Option<Arc<AnalysisNode>> {
        self.nodes.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Deregister whichever node holds the id
    pub fn remove(&self, id: &str) -> Option<Arc<AnalysisNode>> {
        let (_, node) = self.nodes.remove(id)?;
        node.mark_removed();
        Some(node)
    }

    /// Deregister `node` only if it is the instance registered under its id
    pub fn remove_node(&self, node: &AnalysisNode) -> bool {
        let removed = self
            .nodes
            .remove_if(node.id(), |_, live| std::ptr::eq(Arc::as_ptr(live), node))
            .is_some();
        if removed {
            node.mark_removed();
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.nodes.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Registered nodes, sorted by id
    pub fn nodes(&self) -> Vec<Arc<AnalysisNode>> {
        let mut nodes: Vec<Arc<AnalysisNode>> = self
            .nodes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        nodes.sort_by(|a, b| a.id().cmp(b.id()));
        nodes
    }

    /// Deregister every node
    pub fn clear(&self) {
        for node in self.nodes() {
            self.remove_node(&node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Attributes, NodeParts};
    use std::sync::Weak;

    fn node_in(collection: &Arc<AnalysisNodeCollection>, id: &str) -> Arc<AnalysisNode> {
        AnalysisNode::from_parts(
            NodeParts {
                id: id.to_string(),
                analysis_type: "source".to_string(),
                source_names: Vec::new(),
                attributes: Attributes::new(),
                dropped_params: Vec::new(),
            },
            Arc::downgrade(collection),
        )
    }

    #[test]
    fn test_add_and_get() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        let node = node_in(&collection, "a0");
        collection.add(Arc::clone(&node)).unwrap();

        assert_eq!(collection.len(), 1);
        assert!(collection.contains("a0"));
        assert!(Arc::ptr_eq(&collection.get("a0").unwrap(), &node));
        assert!(collection.get("missing").is_none());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        collection.add(node_in(&collection, "a0")).unwrap();

        let err = collection.add(node_in(&collection, "a0")).unwrap_err();
        assert!(matches!(err, AnalysisError::DuplicateNodeId(id) if id == "a0"));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_remove_marks_node() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        let node = node_in(&collection, "a0");
        collection.add(Arc::clone(&node)).unwrap();

        let removed = collection.remove("a0").unwrap();
        assert!(Arc::ptr_eq(&removed, &node));
        assert!(node.is_removed());
        assert!(collection.is_empty());
        assert!(collection.remove("a0").is_none());
    }

    #[test]
    fn test_stale_handle_does_not_remove_newer_node() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        let first = node_in(&collection, "a0");
        collection.add(Arc::clone(&first)).unwrap();
        assert!(first.remove());

        let second = node_in(&collection, "a0");
        collection.add(Arc::clone(&second)).unwrap();

        assert!(!first.remove());
        assert!(!second.is_removed());
        assert!(Arc::ptr_eq(&collection.get("a0").unwrap(), &second));
    }

    #[test]
    fn test_ids_sorted() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        for id in ["b0", "a1", "a0"] {
            collection.add(node_in(&collection, id)).unwrap();
        }
        assert_eq!(collection.ids(), vec!["a0", "a1", "b0"]);

        collection.clear();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_node_outlives_collection() {
        let collection = Arc::new(AnalysisNodeCollection::new());
        let node = node_in(&collection, "a0");
        collection.add(Arc::clone(&node)).unwrap();
        drop(collection);

        assert!(node.get_nodes_collection().is_none());
        let orphan = AnalysisNode::from_parts(
            NodeParts {
                id: "b0".to_string(),
                analysis_type: "source".to_string(),
                source_names: Vec::new(),
                attributes: Attributes::new(),
                dropped_params: Vec::new(),
            },
            Weak::new(),
        );
        assert!(!orphan.remove());
    }
}
