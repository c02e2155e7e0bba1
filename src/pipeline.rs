use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::config::XrefConfig;
use crate::diagnostics::Diagnostics;
use crate::documents::{LocalDependencyGraph, MemoryDocumentCache};
use crate::embed::{embed_transform, EmbedContext};
use crate::enumeration::{enumerate_targets, ReferenceState};
use crate::fetch::{ExternalReferenceCache, Fetch};
use crate::links::{InternalLinkTransformer, LinkTransformerRegistry, MystTransformer};
use crate::resolution::{
    resolve_cross_references, transform_remote_xrefs, ProjectIndexBuilder, ProjectReferenceIndex,
};
use crate::types::{Dependency, ExternalReference, Node, PageMetadata};

/// A parsed document entering resolution.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Project-relative path, used as the document's key.
    pub path: String,
    pub page: PageMetadata,
    pub mdast: Node,
}

/// A document after every resolution pass.
#[derive(Debug)]
pub struct ResolvedDocument {
    pub path: String,
    pub mdast: Node,
    /// Sources this document embeds, one per url.
    pub dependencies: Vec<Dependency>,
    pub diagnostics: Diagnostics,
}

/// Result of resolving a whole project.
#[derive(Debug)]
pub struct ProjectResolution {
    /// Resolved documents, in input order.
    pub documents: Vec<ResolvedDocument>,
    pub index: ProjectReferenceIndex,
    /// Local "depends on" edges for incremental rebuilds.
    pub graph: LocalDependencyGraph,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl ProjectResolution {
    /// Returns `true` if any document reported an error.
    pub fn has_errors(&self) -> bool {
        self.documents.iter().any(|d| d.diagnostics.has_errors())
    }

    pub fn diagnostic_count(&self) -> usize {
        self.documents.iter().map(|d| d.diagnostics.len()).sum()
    }
}

/// Session state shared by every document of one compilation.
pub struct ResolutionContext {
    config: XrefConfig,
    cache: ExternalReferenceCache,
    references: Vec<ExternalReference>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl ResolutionContext {
    /// Creates a context that fetches remote data through `fetcher`.
    ///
    /// No external project is usable until
    /// [`load_external_references`](Self::load_external_references) runs.
    pub fn new(config: XrefConfig, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            config,
            cache: ExternalReferenceCache::new(fetcher),
            references: Vec::new(),
        }
    }

    /// Uses already-loaded external references instead of fetching them.
    pub fn with_references(mut self, references: Vec<ExternalReference>) -> Self {
        self.references = references;
        self
    }

    /// Fetches the reference index of every configured external project.
    ///
    /// Projects whose index cannot be loaded stay registered without one and
    /// their links are left unclaimed. Returns the number of projects loaded.
    pub async fn load_external_references(&mut self) -> usize {
        self.references = self.cache.load_references(&self.config.references).await;
        let loaded = self.references.iter().filter(|r| r.value.is_some()).count();
        tracing::info!(
            configured = self.config.references.len(),
            loaded,
            "loaded external references"
        );
        loaded
    }

    pub fn config(&self) -> &XrefConfig {
        &self.config
    }

    pub fn cache(&self) -> &ExternalReferenceCache {
        &self.cache
    }

    pub fn references(&self) -> &[ExternalReference] {
        &self.references
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

struct WorkingDocument {
    path: String,
    mdast: Node,
    diagnostics: Diagnostics,
}

impl ResolutionContext {
    /// Runs every resolution pass over a project.
    ///
    /// All documents are enumerated before any link, cross-reference or embed
    /// is resolved, so lookups always see the complete project. Failures are
    /// recorded on the owning document's diagnostics and never abort the run.
    pub async fn resolve_project(&self, sources: Vec<SourceDocument>) -> ProjectResolution {
        let start = Instant::now();

        // 1. Enumerate every document and seal the project index
        let mut builder = ProjectIndexBuilder::new();
        let mut working = Vec::with_capacity(sources.len());
        for source in sources {
            let SourceDocument {
                path,
                page,
                mut mdast,
            } = source;
            let mut diagnostics = Diagnostics::new(path.as_str());
            let mut state =
                ReferenceState::new(path.as_str(), page.url.as_str(), self.config.numbering.clone());
            if let Some(label) = &page.frontmatter.label {
                state = state.with_file_target(label, page.frontmatter.title.clone());
            }
            enumerate_targets(&mut mdast, &mut state, &mut diagnostics);
            builder.add(state, page);
            working.push(WorkingDocument {
                path,
                mdast,
                diagnostics,
            });
        }
        let index = builder.finish();

        // 2. Resolve links and local cross-references
        let myst = MystTransformer::new(&self.references);
        for doc in &mut working {
            let registry = LinkTransformerRegistry::new()
                .with(&myst)
                .with(InternalLinkTransformer::new(&index, &doc.path));
            registry.transform_links(&mut doc.mdast, &mut doc.diagnostics);
            resolve_cross_references(&mut doc.mdast, &doc.path, &index, &mut doc.diagnostics);
        }

        // 3. Snapshot resolved trees as embed sources
        let mut documents = MemoryDocumentCache::new();
        for doc in &working {
            documents.insert(doc.path.as_str(), doc.mdast.clone());
        }

        // 4. Embeds and remote text, one task per document
        let results = join_all(working.into_iter().map(|doc| {
            let index = &index;
            let documents = &documents;
            let myst = &myst;
            async move { self.finish_document(doc, index, documents, myst).await }
        }))
        .await;

        let mut graph = LocalDependencyGraph::new();
        let mut resolved = Vec::with_capacity(results.len());
        for (document, document_graph) in results {
            graph.merge(document_graph);
            resolved.push(document);
        }

        let resolution = ProjectResolution {
            documents: resolved,
            index,
            graph,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            documents = resolution.documents.len(),
            diagnostics = resolution.diagnostic_count(),
            edges = resolution.graph.edge_count(),
            duration_ms = resolution.duration_ms,
            "resolved project"
        );
        resolution
    }

    async fn finish_document(
        &self,
        doc: WorkingDocument,
        index: &ProjectReferenceIndex,
        documents: &MemoryDocumentCache,
        myst: &MystTransformer,
    ) -> (ResolvedDocument, LocalDependencyGraph) {
        let WorkingDocument {
            path,
            mut mdast,
            mut diagnostics,
        } = doc;
        let mut dependencies = Vec::new();
        let mut graph = LocalDependencyGraph::new();

        let ctx = EmbedContext {
            file_path: &path,
            index,
            documents,
            cache: &self.cache,
            myst,
        };
        embed_transform(&ctx, &mut mdast, &mut dependencies, &mut graph, &mut diagnostics).await;
        // After embeds, so references copied in from remote pages get text too
        transform_remote_xrefs(&self.cache, &mut mdast, &mut diagnostics).await;

        let document = ResolvedDocument {
            path,
            mdast,
            dependencies,
            diagnostics,
        };
        (document, graph)
    }
}
