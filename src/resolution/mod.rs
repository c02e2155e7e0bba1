//! Reference resolution across documents and projects.
//!
//! Holds the project-wide index of enumerated targets and the passes that
//! resolve cross-references against it, locally or in external projects.

mod crossrefs;
mod index;
mod remote;

pub use crossrefs::{children_from_target_node, resolve_cross_references};
pub use index::{ProjectIndexBuilder, ProjectReferenceIndex, StateProvider};
pub use remote::{fetch_remote_document, nodes_from_remote_document, transform_remote_xrefs};
