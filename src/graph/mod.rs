//! Core analysis graph data structures

mod collection;
mod factory;
mod node;
mod service;


pub use collection::AnalysisNodeCollection;
pub use factory::{AnalysisDefinition, AnalysisFactory, AnalysisInput, AnalysisParam};
pub use node::{
    AnalysisNode, AttributeValue, Attributes, NodeState, API_KEY_ATTRIBUTE, AUTH_TOKEN_ATTRIBUTE,
    ID_ATTRIBUTE, TYPE_ATTRIBUTE,
};
pub use service::{AnalysisError, AnalysisResult, AnalysisService, AnalysisServiceBuilder};
