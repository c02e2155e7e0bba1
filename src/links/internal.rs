use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::enumeration::normalize_label;
use crate::resolution::ProjectReferenceIndex;
use crate::types::node_types::CROSS_REFERENCE;
use crate::types::Node;

use super::LinkTransformer;

const TRANSFORM_SOURCE: &str = "LinkTransform:InternalLinkTransformer";

/// Resolves a project-relative path against the document linking to it.
///
/// Paths starting with `/` are taken from the project root; `.` and `..`
/// segments are collapsed.
pub fn resolve_relative_path(current_file: &str, target: &str) -> String {
    let mut parts: Vec<&str> = if target.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = current_file.split('/').collect();
        dir.pop();
        dir
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            segment => parts.push(segment),
        }
    }
    parts.join("/")
}

/// Returns `true` if the uri starts with a scheme such as `https:`.
fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(colon) => !uri[..colon].contains(['/', '#', '?']),
        None => false,
    }
}

/// Resolves links between documents of the same project, such as
/// `chapter.md#intro` or `#intro`.
///
/// Only links whose path names an indexed document, or bare fragments, are
/// claimed. A fragment upgrades the link to a cross-reference.
pub struct InternalLinkTransformer<'a> {
    index: &'a ProjectReferenceIndex,
    file_path: &'a str,
}

impl<'a> InternalLinkTransformer<'a> {
    /// Creates a transformer for links found in the document at `file_path`.
    pub fn new(index: &'a ProjectReferenceIndex, file_path: &'a str) -> Self {
        Self { index, file_path }
    }

    fn target_file(&self, path: &str) -> String {
        if path.is_empty() {
            self.file_path.to_string()
        } else {
            resolve_relative_path(self.file_path, path)
        }
    }
}

impl LinkTransformer for InternalLinkTransformer<'_> {
    fn protocol(&self) -> &str {
        "file"
    }

    fn test(&self, uri: &str) -> bool {
        if uri.is_empty() || has_scheme(uri) {
            return false;
        }
        let path = uri.split_once('#').map_or(uri, |(path, _)| path);
        if path.is_empty() {
            return uri.len() > 1;
        }
        self.index.state(&self.target_file(path)).is_some()
    }

    fn transform(&self, link: &mut Node, diagnostics: &mut Diagnostics) -> bool {
        let uri = link
            .url_source
            .clone()
            .or_else(|| link.url.clone())
            .unwrap_or_default();
        let (path, fragment) = match uri.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (uri.as_str(), None),
        };
        let target_file = self.target_file(path);

        let Some(state) = self.index.state(&target_file) else {
            diagnostics.push(
                Diagnostic::error(
                    format!("Link target document not found: {}", target_file),
                    RuleId::LinkResolves,
                )
                .with_source(TRANSFORM_SOURCE)
                .with_node(link),
            );
            return false;
        };

        let identifier = fragment
            .and_then(normalize_label)
            .map(|normalized| normalized.identifier);
        let Some(identifier) = identifier else {
            link.internal = Some(true);
            link.url = Some(state.url().to_string());
            return true;
        };

        let Some(target) = state.resolve_local(&identifier) else {
            diagnostics.push(
                Diagnostic::error(
                    format!("Link target \"{}\" not found in {}", uri, target_file),
                    RuleId::LinkResolves,
                )
                .with_source(TRANSFORM_SOURCE)
                .with_node(link),
            );
            return false;
        };

        link.internal = Some(true);
        if state.get_file_target(&target.identifier) {
            link.url = Some(state.url().to_string());
            return true;
        }

        link.node_type = CROSS_REFERENCE.to_string();
        link.identifier = Some(target.identifier.clone());
        link.label = Some(target.identifier.clone());
        link.html_id = Some(target.html_id.clone());
        link.kind = Some(target.kind.as_str().to_string());
        link.enumerator = target.enumerator.clone();
        link.url = Some(if target_file == self.file_path {
            format!("#{}", target.html_id)
        } else {
            target.url.clone()
        });
        true
    }
}
