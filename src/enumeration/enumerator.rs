use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::tree::is_target_identifier_node;
use crate::types::node_types::{CAPTION, CONTAINER, HEADING};
use crate::types::{Node, TargetDescriptor, TargetKind};

use super::label::{html_id_for, normalize_label};
use super::state::ReferenceState;

const TRANSFORM_SOURCE: &str = "Enumerator";

/// Numbers and registers every target in `tree`, in document order.
///
/// Writes `enumerator`, `identifier` (from a bare `label`) and `html_id` onto
/// the nodes it visits. A duplicate identifier is reported as an error and the
/// later node is left out of `state`; the tree itself is not restructured.
///
/// Returns the number of targets registered.
pub fn enumerate_targets(
    tree: &mut Node,
    state: &mut ReferenceState,
    diagnostics: &mut Diagnostics,
) -> usize {
    let mut registered = 0;
    visit(tree, state, diagnostics, &mut registered);
    tracing::debug!(
        file = state.file_path(),
        targets = registered,
        "enumerated targets"
    );
    registered
}

fn visit(
    node: &mut Node,
    state: &mut ReferenceState,
    diagnostics: &mut Diagnostics,
    registered: &mut usize,
) {
    assign_enumerator(node, state);
    if register_target(node, state, diagnostics) {
        *registered += 1;
    }
    for child in &mut node.children {
        visit(child, state, diagnostics, registered);
    }
}

fn assign_enumerator(node: &mut Node, state: &mut ReferenceState) {
    let Some(kind) = TargetKind::for_node(node) else {
        return;
    };
    if node.enumerated == Some(false) {
        return;
    }
    let enumerator = if kind == TargetKind::Heading {
        state.next_heading_enumerator(node.depth.unwrap_or(1))
    } else if state.numbers(kind) {
        Some(state.next_enumerator(kind))
    } else {
        None
    };
    if enumerator.is_some() {
        node.enumerator = enumerator;
    }
}

fn register_target(
    node: &mut Node,
    state: &mut ReferenceState,
    diagnostics: &mut Diagnostics,
) -> bool {
    if !is_target_identifier_node(node) {
        return false;
    }
    if node.identifier.is_none() {
        if let Some(normalized) = node.label.as_deref().and_then(normalize_label) {
            node.identifier = Some(normalized.identifier);
            node.label = Some(normalized.label);
        }
    }
    let Some(identifier) = node.identifier.clone() else {
        return false;
    };

    if state.contains(&identifier) {
        diagnostics.push(
            Diagnostic::error(
                format!(
                    "Duplicate identifier \"{}\" in {}",
                    identifier,
                    state.file_path()
                ),
                RuleId::ReferenceTargetUnique,
            )
            .with_note("The first target with this identifier is kept")
            .with_source(TRANSFORM_SOURCE)
            .with_node(node),
        );
        return false;
    }

    let html_id = node
        .html_id
        .clone()
        .unwrap_or_else(|| html_id_for(&identifier));
    node.html_id = Some(html_id.clone());

    let url = state.target_url(&html_id);
    state.register(TargetDescriptor {
        url,
        identifier,
        kind: TargetKind::for_node(node).unwrap_or(TargetKind::Generic),
        enumerator: node.enumerator.clone(),
        html_id,
        data_url: None,
        title: target_title(node),
    })
}

/// Plain-text title of a heading, or of a container's caption.
fn target_title(node: &Node) -> Option<String> {
    let text = match node.node_type.as_str() {
        HEADING => node.to_plain_text(),
        CONTAINER => node
            .children
            .iter()
            .find(|child| child.is(CAPTION))
            .map(|caption| caption.to_plain_text())?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
