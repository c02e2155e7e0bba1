use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};
use xrefkit::config::NumberingConfig;
use xrefkit::diagnostics::{Diagnostics, RuleId};
use xrefkit::documents::{LocalDependencyGraph, MemoryDocumentCache};
use xrefkit::embed::*;
use xrefkit::enumeration::{enumerate_targets, ReferenceState};
use xrefkit::errors::{Result, XrefError};
use xrefkit::fetch::{ExternalReferenceCache, Fetch};
use xrefkit::links::MystTransformer;
use xrefkit::resolution::{ProjectIndexBuilder, ProjectReferenceIndex};
use xrefkit::tree::select_all;
use xrefkit::types::node_types::*;
use xrefkit::types::*;

struct StubFetcher {
    responses: HashMap<String, Value>,
}

impl Fetch for StubFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| XrefError::Fetch {
                    message: "404 Not Found".to_string(),
                    url: url.to_string(),
                })
        })
    }
}

fn caption(text: &str) -> Node {
    Node::new(CAPTION).with_children(vec![Node::text(text)])
}

fn heading(depth: u32, label: &str, text: &str) -> Node {
    let mut node = Node::new(HEADING)
        .with_label(label)
        .with_children(vec![Node::text(text)]);
    node.depth = Some(depth);
    node
}

fn embed(label: &str) -> Node {
    let mut node = Node::new(EMBED);
    node.source = Some(Dependency {
        label: Some(label.to_string()),
        ..Dependency::default()
    });
    node
}

fn cell() -> Node {
    let mut notebook_output = Node::new(CODE);
    notebook_output.value = Some("rendered".to_string());
    notebook_output
        .extra
        .insert("data".to_string(), json!({"type": "output"}));
    Node::new(BLOCK).with_label("cell").with_children(vec![
        Node::new(CODE),
        Node::new(OUTPUT),
        notebook_output,
    ])
}

fn source_tree() -> Node {
    let mut xref = Node::new(CROSS_REFERENCE);
    xref.identifier = Some("fig-src".to_string());
    Node::new(ROOT).with_children(vec![
        Node::new(CONTAINER)
            .with_kind("figure")
            .with_label("fig-src")
            .with_children(vec![Node::new("image"), caption("Source caption")]),
        heading(1, "methods", "Methods"),
        Node::new("paragraph").with_children(vec![Node::text("See "), xref]),
        heading(2, "details", "Details"),
        heading(1, "results", "Results"),
        cell(),
    ])
}

struct Fixture {
    index: ProjectReferenceIndex,
    documents: MemoryDocumentCache,
    cache: ExternalReferenceCache,
    myst: MystTransformer,
}

fn fixture() -> Fixture {
    let mut tree = source_tree();
    let mut state = ReferenceState::new("source.md", "/source", NumberingConfig::default())
        .with_file_target("source-page", Some("Source".to_string()));
    let mut diagnostics = Diagnostics::new("source.md");
    enumerate_targets(&mut tree, &mut state, &mut diagnostics);
    assert!(diagnostics.is_empty());

    let mut builder = ProjectIndexBuilder::new();
    builder.add(
        state,
        PageMetadata {
            slug: "source".to_string(),
            url: "/source".to_string(),
            kind: Some("Article".to_string()),
            location: Some("/source.md".to_string()),
            frontmatter: Frontmatter {
                title: Some("Source".to_string()),
                ..Frontmatter::default()
            },
        },
    );
    builder.add(
        ReferenceState::new("main.md", "/main", NumberingConfig::default()),
        PageMetadata {
            slug: "main".to_string(),
            url: "/main".to_string(),
            ..PageMetadata::default()
        },
    );
    let mut documents = MemoryDocumentCache::new();
    documents.insert("source.md", tree);

    let remote_page = json!({
        "mdast": {"type": "root", "children": [
            {"type": "container", "kind": "figure", "identifier": "fig-arch",
             "label": "fig-arch", "html_id": "fig-arch", "children": [
                {"type": "image", "url": "/arch.png"},
                {"type": "caption", "children": [
                    {"type": "crossReference", "identifier": "setup",
                     "children": [{"type": "text", "value": "setup"}]},
                    {"type": "link", "url": "/setup", "internal": true,
                     "children": [{"type": "text", "value": "here"}]}
                ]}
            ]}
        ]},
        "frontmatter": {"title": "Install"},
        "slug": "install",
        "kind": "Article"
    });
    let fetcher = StubFetcher {
        responses: HashMap::from([(
            "https://guide.example.org/install.json".to_string(),
            remote_page,
        )]),
    };
    let references = vec![ExternalReference {
        key: "guide".to_string(),
        url: "https://guide.example.org".to_string(),
        kind: ExternalReferenceKind::Myst,
        value: Some(MystXrefs {
            version: None,
            references: vec![
                MystXref {
                    identifier: None,
                    html_id: None,
                    url: "/install".to_string(),
                    data: "/install.json".to_string(),
                    kind: "page".to_string(),
                    implicit: false,
                },
                MystXref {
                    identifier: Some("fig-arch".to_string()),
                    html_id: Some("fig-arch".to_string()),
                    url: "/install".to_string(),
                    data: "/install.json".to_string(),
                    kind: "figure".to_string(),
                    implicit: false,
                },
            ],
        }),
    }];

    Fixture {
        index: builder.finish(),
        documents,
        cache: ExternalReferenceCache::new(Arc::new(fetcher)),
        myst: MystTransformer::new(&references),
    }
}

struct Outcome {
    dependencies: Vec<Dependency>,
    graph: LocalDependencyGraph,
    diagnostics: Diagnostics,
    resolved: usize,
}

async fn run(fixture: &Fixture, tree: &mut Node) -> Outcome {
    let ctx = EmbedContext {
        file_path: "main.md",
        index: &fixture.index,
        documents: &fixture.documents,
        cache: &fixture.cache,
        myst: &fixture.myst,
    };
    let mut dependencies = Vec::new();
    let mut graph = LocalDependencyGraph::new();
    let mut diagnostics = Diagnostics::new("main.md");
    let resolved = embed_transform(&ctx, tree, &mut dependencies, &mut graph, &mut diagnostics).await;
    Outcome {
        dependencies,
        graph,
        diagnostics,
        resolved,
    }
}

fn count(tree: &Node, node_type: &str) -> usize {
    select_all(tree, |n| n.is(node_type)).len()
}

#[tokio::test]
async fn test_local_embed_of_figure_is_lifted() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("source.md#fig-src")]);
    let outcome = run(&fixture, &mut tree).await;

    assert_eq!(outcome.resolved, 1);
    assert_eq!(count(&tree, EMBED), 0);
    assert_eq!(tree.children.len(), 1);
    let figure = &tree.children[0];
    assert!(figure.is(CONTAINER));
    assert!(figure.identifier.is_none());
    assert!(figure.label.is_none());
    assert!(figure.html_id.is_none());
    let source = figure.source.as_ref().unwrap();
    assert_eq!(source.url.as_deref(), Some("/source"));
    assert_eq!(source.label.as_deref(), Some("source.md#fig-src"));
    assert_eq!(source.title.as_deref(), Some("Source"));
    assert_eq!(source.kind.as_deref(), Some("Article"));
    assert_eq!(
        outcome.graph.dependencies_of("main.md").collect::<Vec<_>>(),
        vec!["source.md"]
    );
}

#[tokio::test]
async fn test_container_with_single_embed_keeps_outer_caption() {
    let fixture = fixture();
    let figure = Node::new(CONTAINER)
        .with_kind("figure")
        .with_children(vec![embed("source.md#fig-src"), caption("Outer caption")]);
    let mut tree = Node::new(ROOT).with_children(vec![figure]);
    run(&fixture, &mut tree).await;

    assert_eq!(tree.children.len(), 1);
    let figure = &tree.children[0];
    assert!(figure.is(CONTAINER));
    assert_eq!(count(&tree, EMBED), 0);
    assert_eq!(count(&tree, CONTAINER), 1);
    let captions = select_all(&tree, |n| n.is(CAPTION));
    assert_eq!(captions.len(), 1);
    assert_eq!(captions[0].to_plain_text(), "Outer caption");
    assert_eq!(
        figure.children.iter().map(|c| c.node_type.as_str()).collect::<Vec<_>>(),
        vec!["image", CAPTION]
    );
    assert_eq!(
        figure.source.as_ref().unwrap().label.as_deref(),
        Some("source.md#fig-src")
    );
}

#[tokio::test]
async fn test_embed_is_idempotent_once_lifted() {
    let fixture = fixture();
    let figure = Node::new(CONTAINER)
        .with_kind("figure")
        .with_children(vec![embed("source.md#fig-src"), caption("Outer caption")]);
    let mut tree = Node::new(ROOT).with_children(vec![figure]);
    run(&fixture, &mut tree).await;
    let once = tree.clone();

    let outcome = run(&fixture, &mut tree).await;
    assert_eq!(outcome.resolved, 0);
    assert!(outcome.dependencies.is_empty());
    assert_eq!(tree, once);
}

#[tokio::test]
async fn test_heading_embed_takes_section() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("source.md#methods")]);
    run(&fixture, &mut tree).await;

    let embedded = &tree.children[0];
    assert!(embedded.is(EMBED));
    let types: Vec<&str> = embedded
        .children
        .iter()
        .map(|c| c.node_type.as_str())
        .collect();
    assert_eq!(types, vec![HEADING, "paragraph", HEADING]);
    assert!(embedded.children[0].identifier.is_none());
    assert!(embedded.children[2].identifier.is_none());
    // References inside the copy keep pointing at their target
    let xrefs = select_all(embedded, |n| n.is(CROSS_REFERENCE));
    assert_eq!(xrefs[0].identifier.as_deref(), Some("fig-src"));
}

#[tokio::test]
async fn test_bare_identifier_searches_project() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("results")]);
    let outcome = run(&fixture, &mut tree).await;
    assert_eq!(outcome.resolved, 1);
    // The results section runs to the end of the document
    let section = &tree.children[0].children;
    assert_eq!(section.len(), 2);
    assert!(section[0].is(HEADING));
    assert!(section[1].is(BLOCK));
}

#[tokio::test]
async fn test_file_target_embeds_whole_document() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("source.md#source-page")]);
    run(&fixture, &mut tree).await;
    assert_eq!(tree.children[0].children.len(), source_tree().children.len());
}

#[tokio::test]
async fn test_dependencies_deduplicated_by_url() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![
        embed("source.md#methods"),
        embed("source.md#results"),
    ]);
    let outcome = run(&fixture, &mut tree).await;
    assert_eq!(outcome.resolved, 2);
    assert_eq!(outcome.dependencies.len(), 1);
    assert_eq!(outcome.dependencies[0].url.as_deref(), Some("/source"));
    assert_eq!(outcome.graph.edge_count(), 1);
}

#[tokio::test]
async fn test_remove_output_and_input() {
    let fixture = fixture();
    let mut without_output = embed("source.md#cell");
    without_output.remove_output = Some(true);
    let mut without_input = embed("source.md#cell");
    without_input.remove_input = Some(true);
    let mut tree = Node::new(ROOT).with_children(vec![without_output, without_input]);
    run(&fixture, &mut tree).await;

    // The cell block is spliced into a block wrapper, so it stays as a child
    let kept_types = |embed: &Node| -> Vec<(String, Option<String>)> {
        embed.children[0]
            .children
            .iter()
            .map(|c| (c.node_type.clone(), c.value.clone()))
            .collect()
    };
    assert_eq!(
        kept_types(&tree.children[0]),
        vec![(CODE.to_string(), None)]
    );
    assert_eq!(
        kept_types(&tree.children[1]),
        vec![
            (OUTPUT.to_string(), None),
            (CODE.to_string(), Some("rendered".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_unresolved_embed_is_left_alone() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("source.md#missing")]);
    let before = tree.clone();
    let outcome = run(&fixture, &mut tree).await;

    assert_eq!(outcome.resolved, 0);
    assert_eq!(tree, before);
    assert!(outcome.dependencies.is_empty());
    let warning = outcome.diagnostics.warnings().next().unwrap();
    assert_eq!(warning.rule_id, RuleId::EmbedTargetResolves);
}

#[tokio::test]
async fn test_remote_embed_rebases_references() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("xref:guide#fig-arch")]);
    let outcome = run(&fixture, &mut tree).await;

    assert_eq!(outcome.resolved, 1);
    assert!(outcome.diagnostics.is_empty());
    assert_eq!(outcome.graph.edge_count(), 0);
    assert_eq!(outcome.dependencies.len(), 1);
    assert_eq!(
        outcome.dependencies[0].remote_base_url.as_deref(),
        Some("https://guide.example.org")
    );
    assert_eq!(outcome.dependencies[0].slug.as_deref(), Some("install"));

    let figure = &tree.children[0];
    assert!(figure.is(CONTAINER));
    assert!(figure.identifier.is_none());
    assert_eq!(
        figure.source.as_ref().unwrap().url.as_deref(),
        Some("https://guide.example.org/install")
    );

    let xref = select_all(figure, |n| n.is(CROSS_REFERENCE))[0];
    assert_eq!(xref.identifier.as_deref(), Some("setup"));
    assert_eq!(xref.remote, Some(true));
    assert_eq!(
        xref.remote_base_url.as_deref(),
        Some("https://guide.example.org")
    );
    assert_eq!(
        xref.data_url.as_deref(),
        Some("https://guide.example.org/install.json")
    );

    let link = select_all(figure, |n| n.is(LINK))[0];
    assert_eq!(link.internal, Some(false));
    assert_eq!(
        link.url.as_deref(),
        Some("https://guide.example.org/setup")
    );
}

#[tokio::test]
async fn test_remote_page_embed_takes_all_children() {
    let fixture = fixture();
    let mut tree = Node::new(ROOT).with_children(vec![embed("xref:guide/install")]);
    let outcome = run(&fixture, &mut tree).await;
    assert_eq!(outcome.resolved, 1);
    assert_eq!(count(&tree, EMBED), 0);
    assert_eq!(count(&tree, CONTAINER), 1);
    assert_eq!(
        outcome.dependencies[0].title.as_deref(),
        Some("Install")
    );
}

#[test]
fn test_mutate_embed_splices_blocks() {
    let mut node = embed("x");
    mutate_embed(
        &mut node,
        Some(Node::new(BLOCK).with_children(vec![Node::text("a"), Node::text("b")])),
    );
    assert_eq!(node.children.len(), 2);

    let mut node = embed("x");
    mutate_embed(&mut node, Some(Node::new("paragraph")));
    assert_eq!(node.children.len(), 1);
    assert!(node.children[0].is("paragraph"));

    mutate_embed(&mut node, None);
    assert!(node.children.is_empty());
}

#[test]
fn test_lift_elided_preserves_order() {
    let mut middle = Node::new("wrapper").with_children(vec![Node::text("b"), Node::text("c")]);
    middle.disposition = Disposition::Elide;
    let mut tree = Node::new(ROOT).with_children(vec![Node::text("a"), middle, Node::text("d")]);
    assert_eq!(lift_elided(&mut tree), 1);
    assert_eq!(tree.to_plain_text(), "abcd");
    assert_eq!(tree.children.len(), 4);
}

#[test]
fn test_remove_output_drops_emptied_wrappers() {
    let outputs = Node::new("outputs").with_children(vec![Node::new(OUTPUT), Node::new(OUTPUT)]);
    let mut node = embed("x");
    node.remove_output = Some(true);
    mutate_embed(
        &mut node,
        Some(Node::new(BLOCK).with_children(vec![Node::new(CODE), outputs.clone()])),
    );
    assert_eq!(node.children.len(), 1);
    assert!(node.children[0].is(CODE));

    let mut node = embed("x");
    node.remove_output = Some(true);
    mutate_embed(&mut node, Some(Node::new(BLOCK).with_children(vec![outputs])));
    assert!(node.children.is_empty());
}

#[test]
fn test_lift_keeps_unexpanded_embed_in_copied_container() {
    let copied = Node::new(CONTAINER)
        .with_kind("figure")
        .with_children(vec![embed("other.md#fig-b")]);
    let mut outer_embed = embed("source.md#fig-a");
    outer_embed.children = vec![copied];
    let mut tree = Node::new(ROOT).with_children(vec![Node::new(CONTAINER)
        .with_kind("figure")
        .with_children(vec![caption("Outer"), outer_embed])]);

    lift_embeds(&mut tree);

    let figure = &tree.children[0];
    assert_eq!(
        figure.source.as_ref().unwrap().label.as_deref(),
        Some("source.md#fig-a")
    );
    assert_eq!(figure.children.len(), 2);
    assert!(figure.children[0].is(CAPTION));
    let kept = &figure.children[1];
    assert!(kept.is(EMBED));
    assert_eq!(
        kept.source.as_ref().unwrap().label.as_deref(),
        Some("other.md#fig-b")
    );
}
