//! Analysis-type references
//!
//! A reference is the schema authority for analysis types: for each type it
//! names the params that must be other analyses (sources) and the params
//! that are plain values. The factory consults it through the
//! `AnalysisReference` trait; `CamshaftReference` is the table-driven
//! implementation, loadable from YAML or JSON.

mod camshaft;
mod traits;

pub use camshaft::{AnalysisTypeSpec, CamshaftReference, ParamKind, ParamSpec};
pub use traits::AnalysisReference;
