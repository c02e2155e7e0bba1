use std::sync::Arc;

use futures::future::join_all;

use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::fetch::ExternalReferenceCache;
use crate::links::MYST_PROTOCOL;
use crate::tree::{collect_paths, node_at, node_at_mut, select_target_nodes, NodePath};
use crate::types::node_types::{CROSS_REFERENCE, LINK};
use crate::types::{Node, RemoteDocument};

use super::crossrefs::children_from_target_node;

const TRANSFORM_SOURCE: &str = "RemoteCrossReferences";

/// Fetches remote page data for a reference, warning when it is unavailable.
pub async fn fetch_remote_document(
    cache: &ExternalReferenceCache,
    data_url: &str,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Arc<RemoteDocument>> {
    let document = cache.fetch(data_url).await;
    if document.is_none() {
        diagnostics.push(
            Diagnostic::warning(
                format!(
                    "Unable to resolve link text from external MyST reference: {}",
                    label
                ),
                RuleId::MystLinkValid,
            )
            .with_note("Could not load data from external project")
            .with_source(TRANSFORM_SOURCE),
        );
    }
    document
}

/// Copies the nodes `identifier` denotes out of a fetched document, warning
/// when the identifier is absent.
pub fn nodes_from_remote_document(
    document: &RemoteDocument,
    identifier: &str,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Option<Vec<Node>> {
    let nodes = select_target_nodes(&document.mdast, identifier);
    if nodes.is_empty() {
        diagnostics.push(
            Diagnostic::warning(
                format!(
                    "Unable to resolve content from external MyST reference: {}",
                    label
                ),
                RuleId::MystLinkValid,
            )
            .with_note(format!(
                "Could not locate identifier {} in page content",
                identifier
            ))
            .with_source(TRANSFORM_SOURCE),
        );
        return None;
    }
    Some(nodes)
}

struct TextRequest {
    data_url: String,
    identifier: Option<String>,
    label: String,
}

struct TextUpdate {
    children: Vec<Node>,
    enumerator: Option<String>,
}

/// Claimed `xref:` links, plus cross-references an embed copied in from a
/// remote page.
fn needs_remote_text(node: &Node) -> bool {
    let remote = node.protocol.as_deref() == Some(MYST_PROTOCOL)
        || (node.is(CROSS_REFERENCE) && node.remote == Some(true));
    (node.is(LINK) || node.is(CROSS_REFERENCE))
        && remote
        && node.data_url.is_some()
        && (node.children.is_empty() || node.identifier.is_some())
}

/// Fills in the text of references into other MyST projects.
///
/// Page links without text get the remote page's title; references with an
/// identifier get text from the remote target and its number. Every fetch
/// runs concurrently; nodes whose data cannot be loaded keep their text.
/// Returns the number of nodes updated.
pub async fn transform_remote_xrefs(
    cache: &ExternalReferenceCache,
    tree: &mut Node,
    diagnostics: &mut Diagnostics,
) -> usize {
    let requests: Vec<(NodePath, TextRequest)> = collect_paths(tree, &needs_remote_text)
        .into_iter()
        .filter_map(|path| {
            let node = node_at(tree, &path)?;
            let request = TextRequest {
                data_url: node.data_url.clone()?,
                identifier: node.identifier.clone(),
                label: node
                    .url_source
                    .clone()
                    .or_else(|| node.url.clone())
                    .unwrap_or_default(),
            };
            Some((path, request))
        })
        .collect();
    if requests.is_empty() {
        return 0;
    }

    let file = diagnostics.file().to_string();
    let total = requests.len();
    let results = join_all(requests.into_iter().map(|(path, request)| {
        let mut task_diagnostics = Diagnostics::new(file.clone());
        async move {
            let update = remote_text(cache, &request, &mut task_diagnostics).await;
            (path, update, task_diagnostics)
        }
    }))
    .await;

    let mut updated = 0;
    for (path, update, task_diagnostics) in results {
        diagnostics.absorb(task_diagnostics);
        let (Some(update), Some(node)) = (update, node_at_mut(tree, &path)) else {
            continue;
        };
        if node.children.is_empty() && !update.children.is_empty() {
            node.children = update.children;
        }
        if update.enumerator.is_some() {
            node.enumerator = update.enumerator;
        }
        updated += 1;
    }
    tracing::info!(
        file = %file,
        updated,
        total,
        "updated link text for external references"
    );
    updated
}

async fn remote_text(
    cache: &ExternalReferenceCache,
    request: &TextRequest,
    diagnostics: &mut Diagnostics,
) -> Option<TextUpdate> {
    let document =
        fetch_remote_document(cache, &request.data_url, &request.label, diagnostics).await?;
    let Some(identifier) = &request.identifier else {
        let title = document
            .frontmatter
            .title
            .clone()
            .or_else(|| document.slug.clone())
            .unwrap_or_default();
        return Some(TextUpdate {
            children: vec![Node::text(title)],
            enumerator: None,
        });
    };
    let nodes = nodes_from_remote_document(&document, identifier, &request.label, diagnostics)?;
    let target = nodes.first()?;
    Some(TextUpdate {
        children: children_from_target_node(target).unwrap_or_default(),
        enumerator: target.enumerator.clone(),
    })
}
