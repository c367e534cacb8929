//! Reference trait definitions

use std::fmt::Debug;

/// Schema authority mapping an analysis type to its param names
///
/// Returning `None` from both lookups means the type is unknown.
pub trait AnalysisReference: Send + Sync + Debug {
    /// Params of `analysis_type` that reference other analyses
    fn source_names(&self, analysis_type: &str) -> Option<Vec<String>>;

    /// Params of `analysis_type` that hold plain values
    fn param_names(&self, analysis_type: &str) -> Option<Vec<String>>;

    fn is_known_type(&self, analysis_type: &str) -> bool {
        self.source_names(analysis_type).is_some() || self.param_names(analysis_type).is_some()
    }

    /// Every type this reference knows, if it can enumerate them
    fn analysis_types(&self) -> Vec<String> {
        Vec::new()
    }
}
