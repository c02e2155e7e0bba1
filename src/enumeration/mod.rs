//! Per-document numbering and target registration.
//!
//! The enumerator walks a content tree in document order, numbers targets by
//! kind and heading depth, assigns anchors, and records every target in the
//! document's `ReferenceState`.

mod enumerator;
mod label;
mod state;

pub use enumerator::enumerate_targets;
pub use label::{html_id_for, normalize_label, NormalizedLabel};
pub use state::ReferenceState;
