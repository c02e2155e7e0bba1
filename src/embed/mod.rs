//! Embed resolution.
//!
//! An embed node names content elsewhere (a node, a section or a whole
//! document, in this project or in an external MyST project) and is filled
//! with a filtered copy of it. After every embed of a document resolves, the
//! lifting pass collapses redundant embed and container wrappers.

mod lift;
mod resolver;

pub use lift::{lift_elided, lift_embeds};
pub use resolver::{embed_transform, mutate_embed, EmbedContext};
