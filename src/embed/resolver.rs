use futures::future::join_all;

use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::documents::{DependencyGraph, DocumentCache};
use crate::enumeration::normalize_label;
use crate::fetch::ExternalReferenceCache;
use crate::links::{resolve_relative_path, LinkTransformer, MystTransformer};
use crate::resolution::{fetch_remote_document, nodes_from_remote_document, ProjectReferenceIndex};
use crate::tree::{
    collect_paths, filter_tree, is_target_identifier_node, node_at, node_at_mut,
    select_target_nodes, walk_mut, NodePath,
};
use crate::types::node_types::{BLOCK, CODE, CROSS_REFERENCE, EMBED, LINK, OUTPUT};
use crate::types::{push_unique_dependency, Dependency, Node};

use super::lift::lift_embeds;

const TRANSFORM_SOURCE: &str = "EmbedTransform";

/// Everything embed resolution reads while processing one document.
pub struct EmbedContext<'a> {
    /// Project-relative path of the document being processed.
    pub file_path: &'a str,
    pub index: &'a ProjectReferenceIndex,
    pub documents: &'a dyn DocumentCache,
    pub cache: &'a ExternalReferenceCache,
    pub myst: &'a MystTransformer,
}

struct EmbedRequest {
    label: String,
}

struct EmbedResolution {
    target: Node,
    source: Dependency,
    /// Set for embeds of another document in this project.
    local_file: Option<String>,
}

fn embed_label(node: &Node) -> Option<&str> {
    node.source
        .as_ref()?
        .label
        .as_deref()
        .filter(|label| !label.is_empty())
}

/// Resolves every embed in `tree` and simplifies the result.
///
/// Each embed with a `source.label` is resolved concurrently; resolved embeds
/// get a filtered copy of their target as children and a completed `source`,
/// which is also recorded in `dependencies` (once per url). Embeds of other
/// documents in the project add an edge to `graph`. Embeds that cannot be
/// resolved are left untouched. Returns the number of embeds resolved.
pub async fn embed_transform(
    ctx: &EmbedContext<'_>,
    tree: &mut Node,
    dependencies: &mut Vec<Dependency>,
    graph: &mut dyn DependencyGraph,
    diagnostics: &mut Diagnostics,
) -> usize {
    let requests: Vec<(NodePath, EmbedRequest)> = collect_paths(tree, &|node: &Node| {
        node.is(EMBED) && embed_label(node).is_some()
    })
    .into_iter()
    .filter_map(|path| {
        let node = node_at(tree, &path)?;
        let request = EmbedRequest {
            label: embed_label(node)?.to_string(),
        };
        Some((path, request))
    })
    .collect();

    let total = requests.len();
    let results = join_all(requests.into_iter().map(|(path, request)| {
        let mut task_diagnostics = Diagnostics::new(ctx.file_path);
        async move {
            let resolution = resolve_embed(ctx, &request, &mut task_diagnostics).await;
            (path, resolution, task_diagnostics)
        }
    }))
    .await;

    let mut resolved = 0;
    for (path, resolution, task_diagnostics) in results {
        diagnostics.absorb(task_diagnostics);
        let (Some(resolution), Some(node)) = (resolution, node_at_mut(tree, &path)) else {
            continue;
        };
        mutate_embed(node, Some(resolution.target));
        push_unique_dependency(dependencies, resolution.source.clone());
        node.source = Some(resolution.source);
        if let Some(local_file) = resolution.local_file {
            graph.add_local_dependency(ctx.file_path, &local_file);
        }
        resolved += 1;
    }

    let lifted = lift_embeds(tree);
    tracing::debug!(
        file = ctx.file_path,
        resolved,
        total,
        lifted,
        "resolved embeds"
    );
    resolved
}

async fn resolve_embed(
    ctx: &EmbedContext<'_>,
    request: &EmbedRequest,
    diagnostics: &mut Diagnostics,
) -> Option<EmbedResolution> {
    if ctx.myst.test(&request.label) {
        resolve_remote_embed(ctx, &request.label, diagnostics).await
    } else {
        resolve_local_embed(ctx, &request.label, diagnostics)
    }
}

fn unresolved(diagnostics: &mut Diagnostics, label: &str, note: &str) {
    diagnostics.push(
        Diagnostic::warning(
            format!("Embed target \"{}\" could not be resolved", label),
            RuleId::EmbedTargetResolves,
        )
        .with_note(note)
        .with_source(TRANSFORM_SOURCE),
    );
}

async fn resolve_remote_embed(
    ctx: &EmbedContext<'_>,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Option<EmbedResolution> {
    let mut reference = Node::link(label);
    if !ctx.myst.transform(&mut reference, diagnostics) {
        return None;
    }
    let data_url = reference.data_url.clone()?;
    let document = fetch_remote_document(ctx.cache, &data_url, label, diagnostics).await?;
    let nodes = match &reference.identifier {
        Some(identifier) => nodes_from_remote_document(&document, identifier, label, diagnostics)?,
        None => document.mdast.children.clone(),
    };

    let mut target = Node::new(BLOCK).with_children(nodes);
    rebase_remote_content(&mut target, &reference);

    let source = Dependency {
        url: reference.url.clone(),
        remote_base_url: reference.remote_base_url.clone(),
        label: Some(label.to_string()),
        ..Dependency::default()
    }
    .with_page_details(
        document.kind.as_deref(),
        document.slug.as_deref(),
        document.location.as_deref(),
        &document.frontmatter,
    );
    Some(EmbedResolution {
        target,
        source,
        local_file: None,
    })
}

/// Points references inside remote content back at the remote project.
fn rebase_remote_content(target: &mut Node, reference: &Node) {
    let base = reference.remote_base_url.clone().unwrap_or_default();
    walk_mut(target, &mut |node| {
        if node.is(CROSS_REFERENCE) && node.remote_base_url.is_none() {
            node.remote_base_url = reference.remote_base_url.clone();
            if node.remote != Some(true) {
                node.url = reference.url.clone();
                node.data_url = reference.data_url.clone();
                node.remote = Some(true);
            }
        }
        if node.is(LINK) && node.internal == Some(true) {
            node.internal = Some(false);
            node.url = Some(format!("{}{}", base, node.url.as_deref().unwrap_or_default()));
            if let Some(data_url) = &node.data_url {
                node.data_url = Some(format!("{}{}", base, data_url));
            }
        }
        if let Some(source) = &mut node.source {
            source.remote_base_url = reference.remote_base_url.clone();
        }
    });
}

fn resolve_local_embed(
    ctx: &EmbedContext<'_>,
    label: &str,
    diagnostics: &mut Diagnostics,
) -> Option<EmbedResolution> {
    let (link_file, hash) = match label.split_once('#') {
        Some(("", hash)) => (None, hash),
        Some((path, hash)) => (Some(resolve_relative_path(ctx.file_path, path)), hash),
        None => (None, label),
    };
    let Some(identifier) = normalize_label(hash).map(|n| n.identifier) else {
        unresolved(diagnostics, label, "Embed label has no identifier");
        return None;
    };
    let Some(provider) = ctx
        .index
        .resolve_state_provider(&identifier, link_file.as_deref())
    else {
        unresolved(
            diagnostics,
            label,
            &format!("No document in the project defines \"{}\"", identifier),
        );
        return None;
    };
    let Some(page_tree) = ctx.documents.resolved_tree(provider.file_path) else {
        unresolved(
            diagnostics,
            label,
            &format!("Document {} has not been resolved", provider.file_path),
        );
        return None;
    };

    let nodes = if provider.get_file_target(&identifier) {
        page_tree.children
    } else {
        select_target_nodes(&page_tree, &identifier)
    };
    if nodes.is_empty() {
        unresolved(
            diagnostics,
            label,
            &format!("\"{}\" has no content in {}", identifier, provider.file_path),
        );
        return None;
    }

    let source = match provider.page {
        Some(page) => page.dependency(label),
        None => Dependency {
            url: Some(provider.url().to_string()),
            label: Some(label.to_string()),
            ..Dependency::default()
        },
    };
    let local_file = (provider.file_path != ctx.file_path).then(|| provider.file_path.to_string());
    let mut target = Node::new(BLOCK).with_children(nodes);
    if local_file.is_some() {
        anchor_to_page(&mut target, provider.url());
    }
    Some(EmbedResolution {
        target,
        source,
        local_file,
    })
}

/// Prefixes in-page references (`#anchor`) with the page they were resolved
/// on, since the copy loses its anchors and lands on another page.
fn anchor_to_page(target: &mut Node, page_url: &str) {
    walk_mut(target, &mut |node| {
        if !(node.is(CROSS_REFERENCE) || node.is(LINK)) {
            return;
        }
        if let Some(url) = node.url.as_mut().filter(|url| url.starts_with('#')) {
            url.insert_str(0, page_url);
        }
    });
}

fn is_output(node: &Node) -> bool {
    node.is(OUTPUT) || node.data_type() == Some(OUTPUT)
}

/// Fills an embed node with a copy of `target`.
///
/// Honors the embed's `remove-output` and `remove-input` flags, then strips
/// the identity of every target node in the copy so the page does not carry
/// duplicate anchors. A `block` target contributes its children directly;
/// any other target becomes the embed's only child. With no target, or when
/// the filters remove the target entirely, the embed is emptied.
pub fn mutate_embed(embed: &mut Node, target: Option<Node>) {
    let mut target = target;
    if embed.remove_output == Some(true) {
        target = target.and_then(|t| filter_tree(t, &|n: &Node| !is_output(n)));
    }
    if embed.remove_input == Some(true) {
        target = target.and_then(|t| filter_tree(t, &|n: &Node| !n.is(CODE) || is_output(n)));
    }
    let Some(mut target) = target else {
        embed.children = Vec::new();
        return;
    };
    walk_mut(&mut target, &mut |node| {
        if is_target_identifier_node(node) {
            node.identifier = None;
            node.label = None;
            node.html_id = None;
        }
    });
    embed.children = if target.is(BLOCK) {
        target.children
    } else {
        vec![target]
    };
}
