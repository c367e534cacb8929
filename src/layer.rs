//! Layers and dataviews as seen by the analysis graph
//!
//! Rendering and widget behaviour live elsewhere; here a layer or dataview
//! is an id plus the analysis node it reads from.

use crate::graph::AnalysisNode;
use std::sync::Arc;

/// Anything that draws its data from an analysis node
pub trait AnalysisSourced {
    fn source(&self) -> Option<&Arc<AnalysisNode>>;
}

impl AnalysisSourced for Arc<AnalysisNode> {
    fn source(&self) -> Option<&Arc<AnalysisNode>> {
        Some(self)
    }
}

/// A map layer
#[derive(Debug, Clone)]
pub struct Layer {
    pub id: String,
    pub source: Option<Arc<AnalysisNode>>,
}

impl Layer {
    pub fn new(id: impl Into<String>, source: Arc<AnalysisNode>) -> Self {
        Self {
            id: id.into(),
            source: Some(source),
        }
    }

    /// A layer not backed by an analysis (e.g. a tiled basemap)
    pub fn without_source(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
        }
    }
}

impl AnalysisSourced for Layer {
    fn source(&self) -> Option<&Arc<AnalysisNode>> {
        self.source.as_ref()
    }
}

/// A dataview (histogram, category list, formula...) feeding a widget
#[derive(Debug, Clone)]
pub struct Dataview {
    pub id: String,
    pub source: Option<Arc<AnalysisNode>>,
}

impl Dataview {
    pub fn new(id: impl Into<String>, source: Arc<AnalysisNode>) -> Self {
        Self {
            id: id.into(),
            source: Some(source),
        }
    }

    pub fn without_source(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: None,
        }
    }
}

impl AnalysisSourced for Dataview {
    fn source(&self) -> Option<&Arc<AnalysisNode>> {
        self.source.as_ref()
    }
}
