//! Reading parsed documents from a project directory and writing the
//! resolved output back out.
//!
//! Each document is a JSON file holding the parser's output: the content
//! tree plus the page's frontmatter.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::{should_include_file, XrefConfig, XREFKIT_DIR};
use crate::errors::{Result, XrefError};
use crate::pipeline::{ProjectResolution, SourceDocument};
use crate::types::{Dependency, Frontmatter, Node, PageMetadata};

/// Name of the dependency manifest written next to resolved documents.
pub const DEPENDENCIES_FILENAME: &str = "dependencies.json";

/// On-disk shape of a parsed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub frontmatter: Frontmatter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub mdast: Node,
}

/// On-disk shape of a resolved document.
#[derive(Debug, Serialize)]
struct ResolvedFile<'a> {
    path: &'a str,
    mdast: &'a Node,
    dependencies: &'a [Dependency],
}

/// Scans the project root for document files, respecting the configured
/// include/exclude patterns. Returned paths are relative and sorted.
pub fn scan_documents(project_root: &Path, config: &XrefConfig) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(project_root)
        .into_iter()
        .filter_entry(|e| {
            // Skip hidden directories and our own metadata
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || (!name.starts_with('.') && name != XREFKIT_DIR)
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(project_root) {
            let rel_str = relative.to_string_lossy().replace('\\', "/");
            if should_include_file(&rel_str, config) {
                files.push(rel_str);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Document key for a file: its relative path without the `.json` suffix,
/// so `chapters/intro.md.json` is addressed as `chapters/intro.md`.
pub fn document_key(relative_path: &str) -> String {
    relative_path
        .strip_suffix(".json")
        .unwrap_or(relative_path)
        .to_string()
}

/// Page slug for a document key: every directory and the file stem
/// slugified and joined with `/`, so `chapters/Data Prep.md` becomes
/// `chapters/data-prep`.
pub fn document_slug(key: &str) -> String {
    let mut segments: Vec<&str> = key.split('/').collect();
    if let Some(name) = segments.pop() {
        segments.push(name.split('.').next().unwrap_or(name));
    }
    let slug = segments
        .into_iter()
        .map(slug::slugify)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if slug.is_empty() {
        "index".to_string()
    } else {
        slug
    }
}

/// Gives `page` a slug no earlier page has taken, appending `-1`, `-2`, ...
/// when two documents map to the same slug (`intro.md` and `intro.ipynb`).
fn claim_slug(page: &mut PageMetadata, taken: &mut HashSet<String>) {
    let base = page.slug.clone();
    let mut candidate = base.clone();
    let mut n = 1;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}-{}", base, n);
        n += 1;
    }
    if candidate != base {
        tracing::debug!(slug = %base, unique = %candidate, "renamed duplicate page slug");
        page.url = format!("/{}", candidate);
        page.slug = candidate;
    }
}

/// Reads one document file.
pub fn load_document(project_root: &Path, relative_path: &str) -> Result<SourceDocument> {
    let full_path = project_root.join(relative_path);
    let contents = fs::read_to_string(&full_path)?;
    let file: SourceFile =
        serde_json::from_str(&contents).map_err(|e| XrefError::Document {
            message: format!("invalid document: {}", e),
            path: relative_path.to_string(),
        })?;

    let path = document_key(relative_path);
    let slug = document_slug(&path);
    let page = PageMetadata {
        url: format!("/{}", slug),
        slug,
        kind: file.kind,
        location: Some(format!("/{}", path)),
        frontmatter: file.frontmatter,
    };
    Ok(SourceDocument {
        path,
        page,
        mdast: file.mdast,
    })
}

/// Scans and reads every document of a project.
pub fn load_documents(project_root: &Path, config: &XrefConfig) -> Result<Vec<SourceDocument>> {
    let files = scan_documents(project_root, config)?;
    let mut documents = Vec::with_capacity(files.len());
    let mut taken = HashSet::new();
    for file in &files {
        let mut document = load_document(project_root, file)?;
        claim_slug(&mut document.page, &mut taken);
        documents.push(document);
    }
    tracing::debug!(
        root = %project_root.display(),
        documents = documents.len(),
        "loaded documents"
    );
    Ok(documents)
}

/// Writes every resolved document, and the project's dependency edges, under
/// `out_dir`. Returns the number of documents written.
pub fn write_resolved(out_dir: &Path, resolution: &ProjectResolution) -> Result<usize> {
    fs::create_dir_all(out_dir)?;
    for document in &resolution.documents {
        let target = out_dir.join(format!("{}.json", document.path));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let resolved = ResolvedFile {
            path: &document.path,
            mdast: &document.mdast,
            dependencies: &document.dependencies,
        };
        fs::write(&target, serde_json::to_string_pretty(&resolved)?)?;
    }
    let graph = serde_json::to_string_pretty(&resolution.graph)?;
    fs::write(out_dir.join(DEPENDENCIES_FILENAME), graph)?;
    Ok(resolution.documents.len())
}
