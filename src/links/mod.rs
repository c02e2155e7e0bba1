//! Link transformers and the registry that dispatches to them.
//!
//! Each transformer owns one link syntax. The registry hands a link to the
//! first transformer whose `test` accepts its uri; links nobody claims are
//! left for downstream url handling.

mod internal;
mod myst;

pub use internal::{resolve_relative_path, InternalLinkTransformer};
pub use myst::{
    find_xref, parse_xref_uri, remove_myst_prefix, MystTransformer, XrefUri, MYST_PROTOCOL,
};

use crate::diagnostics::Diagnostics;
use crate::tree::walk_mut;
use crate::types::node_types::LINK;
use crate::types::Node;

/// Trait for protocol-specific link resolution.
pub trait LinkTransformer: Send + Sync {
    /// Protocol tag written onto links this transformer resolves.
    fn protocol(&self) -> &str;

    /// Returns `true` if this transformer owns `uri`.
    fn test(&self, uri: &str) -> bool;

    /// Rewrites `link` in place. Returns `false`, after recording a
    /// diagnostic, when the link cannot be resolved.
    fn transform(&self, link: &mut Node, diagnostics: &mut Diagnostics) -> bool;
}

impl<T: LinkTransformer + ?Sized> LinkTransformer for &T {
    fn protocol(&self) -> &str {
        (**self).protocol()
    }

    fn test(&self, uri: &str) -> bool {
        (**self).test(uri)
    }

    fn transform(&self, link: &mut Node, diagnostics: &mut Diagnostics) -> bool {
        (**self).transform(link, diagnostics)
    }
}

/// Outcome of offering one link to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Resolved,
    Failed,
    /// No transformer claimed the link.
    Unhandled,
}

/// Counts of link outcomes over a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkSummary {
    pub resolved: usize,
    pub failed: usize,
    pub unhandled: usize,
}

/// Ordered set of link transformers. Earlier registrations take precedence.
#[derive(Default)]
pub struct LinkTransformerRegistry<'a> {
    transformers: Vec<Box<dyn LinkTransformer + 'a>>,
}

impl<'a> LinkTransformerRegistry<'a> {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Appends a transformer, builder style.
    pub fn with(mut self, transformer: impl LinkTransformer + 'a) -> Self {
        self.register(Box::new(transformer));
        self
    }

    pub fn register(&mut self, transformer: Box<dyn LinkTransformer + 'a>) {
        self.transformers.push(transformer);
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Returns the first transformer that owns `uri`.
    pub fn transformer_for(&self, uri: &str) -> Option<&dyn LinkTransformer> {
        self.transformers
            .iter()
            .find(|t| t.test(uri))
            .map(|t| t.as_ref() as &dyn LinkTransformer)
    }

    /// Offers a single link to the registry.
    ///
    /// The link's original url is preserved in `url_source`; a successful
    /// transform also stamps the transformer's protocol onto the link.
    pub fn transform_link(&self, link: &mut Node, diagnostics: &mut Diagnostics) -> LinkOutcome {
        let Some(uri) = link.url_source.clone().or_else(|| link.url.clone()) else {
            return LinkOutcome::Unhandled;
        };
        let Some(transformer) = self.transformer_for(&uri) else {
            return LinkOutcome::Unhandled;
        };
        if link.url_source.is_none() {
            link.url_source = Some(uri);
        }
        if transformer.transform(link, diagnostics) {
            link.protocol = Some(transformer.protocol().to_string());
            LinkOutcome::Resolved
        } else {
            LinkOutcome::Failed
        }
    }

    /// Offers every link node in `tree` to the registry.
    pub fn transform_links(&self, tree: &mut Node, diagnostics: &mut Diagnostics) -> LinkSummary {
        let mut summary = LinkSummary::default();
        walk_mut(tree, &mut |node| {
            if !node.is(LINK) {
                return;
            }
            match self.transform_link(node, diagnostics) {
                LinkOutcome::Resolved => summary.resolved += 1,
                LinkOutcome::Failed => summary.failed += 1,
                LinkOutcome::Unhandled => summary.unhandled += 1,
            }
        });
        tracing::debug!(
            file = diagnostics.file(),
            resolved = summary.resolved,
            failed = summary.failed,
            unhandled = summary.unhandled,
            "transformed links"
        );
        summary
    }
}
