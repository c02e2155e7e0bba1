use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::enumeration::normalize_label;
use crate::tree::walk_mut;
use crate::types::node_types::{CROSS_REFERENCE, HEADING};
use crate::types::{Node, TargetKind};

use super::index::ProjectReferenceIndex;

const TRANSFORM_SOURCE: &str = "CrossReferenceResolver";

/// Resolves every local cross-reference in `tree` against the project.
///
/// Identifiers are looked up in the current document first, then in the rest
/// of the project. Resolved nodes gain the target's anchor, kind, number and
/// url; nodes without text also get generated text. Remote cross-references
/// are skipped. Returns the number of references resolved.
pub fn resolve_cross_references(
    tree: &mut Node,
    file_path: &str,
    index: &ProjectReferenceIndex,
    diagnostics: &mut Diagnostics,
) -> usize {
    let mut resolved = 0;
    walk_mut(tree, &mut |node| {
        if !node.is(CROSS_REFERENCE) || node.remote == Some(true) {
            return;
        }
        let identifier = node.identifier.clone().or_else(|| {
            node.label
                .as_deref()
                .and_then(normalize_label)
                .map(|n| n.identifier)
        });
        let Some(identifier) = identifier else {
            return;
        };

        let found = index
            .resolve_target(&identifier, Some(file_path))
            .or_else(|| index.resolve_target(&identifier, None));
        let Some((owner, target)) = found else {
            diagnostics.push(
                Diagnostic::warning(
                    format!("Cross reference target was not found: {}", identifier),
                    RuleId::ReferenceTargetResolves,
                )
                .with_source(TRANSFORM_SOURCE)
                .with_node(node),
            );
            return;
        };

        node.identifier = Some(target.identifier.clone());
        node.html_id = Some(target.html_id.clone());
        node.kind = Some(target.kind.as_str().to_string());
        node.enumerator = target.enumerator.clone();
        node.url = Some(if owner == file_path {
            format!("#{}", target.html_id)
        } else {
            target.url.clone()
        });
        if node.children.is_empty() {
            if let Some(text) = target.link_text() {
                node.children = vec![Node::text(text)];
            }
        }
        resolved += 1;
    });
    tracing::debug!(file = file_path, resolved, "resolved cross references");
    resolved
}

/// Builds link text for a reference to `target`, a node copied out of some
/// document: its numbered label when it has one, otherwise a heading's own
/// content or a caption's text.
pub fn children_from_target_node(target: &Node) -> Option<Vec<Node>> {
    if let (Some(kind), Some(enumerator)) = (TargetKind::for_node(target), &target.enumerator) {
        if let Some(text) = kind.format_enumerator(enumerator) {
            return Some(vec![Node::text(text)]);
        }
    }
    if target.is(HEADING) && !target.children.is_empty() {
        return Some(target.children.clone());
    }
    let text = target.to_plain_text();
    let text = text.trim();
    (!text.is_empty()).then(|| vec![Node::text(text)])
}
