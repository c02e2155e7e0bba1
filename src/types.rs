use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type names used by the resolution passes.
pub mod node_types {
    pub const ROOT: &str = "root";
    pub const BLOCK: &str = "block";
    pub const TEXT: &str = "text";
    pub const HEADING: &str = "heading";
    pub const CONTAINER: &str = "container";
    pub const CAPTION: &str = "caption";
    pub const LEGEND: &str = "legend";
    pub const MATH: &str = "math";
    pub const CODE: &str = "code";
    pub const OUTPUT: &str = "output";
    pub const LINK: &str = "link";
    pub const CROSS_REFERENCE: &str = "crossReference";
    pub const CITE: &str = "cite";
    pub const FOOTNOTE_DEFINITION: &str = "footnoteDefinition";
    pub const FOOTNOTE_REFERENCE: &str = "footnoteReference";
    pub const EMBED: &str = "embed";
}

use node_types::*;

/// Node types that carry an `identifier` pointing *at* something rather than
/// marking themselves as a target.
pub const NON_TARGET_IDENTIFIER_TYPES: &[&str] = &[
    CROSS_REFERENCE,
    CITE,
    FOOTNOTE_DEFINITION,
    FOOTNOTE_REFERENCE,
];

/// Marks whether a node survives the lifting pass or is replaced by its
/// children. Never serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Disposition {
    #[default]
    Keep,
    Elide,
}

/// An element of a content tree.
///
/// Fields the resolution passes read or write are typed; everything else the
/// parser produced is carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "html_id", skip_serializing_if = "Option::is_none")]
    pub html_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumerator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumerated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Dependency>,
    #[serde(rename = "remove-output", skip_serializing_if = "Option::is_none")]
    pub remove_output: Option<bool>,
    #[serde(rename = "remove-input", skip_serializing_if = "Option::is_none")]
    pub remove_input: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub disposition: Disposition,
}

impl Node {
    /// Creates an empty node of the given type.
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Self::default()
        }
    }

    /// Creates a text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(TEXT)
        }
    }

    /// Creates a link node whose url and url source are both `url`.
    pub fn link(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url_source: Some(url.clone()),
            url: Some(url),
            ..Self::new(LINK)
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Returns `true` if this node has the given type.
    pub fn is(&self, node_type: &str) -> bool {
        self.node_type == node_type
    }

    /// Returns the `data.type` tag parsers attach to notebook cell content.
    pub fn data_type(&self) -> Option<&str> {
        self.extra.get("data")?.get("type")?.as_str()
    }

    /// Concatenates the text of every descendant leaf.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(node: &Node, out: &mut String) {
    if let Some(value) = &node.value {
        out.push_str(value);
    }
    for child in &node.children {
        collect_text(child, out);
    }
}

/// A resolved external or cross-document source an output depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "short_title", skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
}

impl Dependency {
    /// Copies page-level details (kind, slug, location, titles) onto this dependency.
    pub fn with_page_details(
        mut self,
        kind: Option<&str>,
        slug: Option<&str>,
        location: Option<&str>,
        frontmatter: &Frontmatter,
    ) -> Self {
        self.kind = kind.map(str::to_string);
        self.slug = slug.map(str::to_string);
        self.location = location.map(str::to_string);
        self.title = frontmatter.title.clone();
        self.short_title = frontmatter.short_title.clone();
        self
    }
}

/// Appends `dependency` unless one with the same url is already present.
///
/// Returns `true` if the dependency was added.
pub fn push_unique_dependency(dependencies: &mut Vec<Dependency>, dependency: Dependency) -> bool {
    if dependencies.iter().any(|d| d.url == dependency.url) {
        return false;
    }
    dependencies.push(dependency);
    true
}

/// Kinds of referenceable targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Page,
    Heading,
    Figure,
    Table,
    Code,
    Equation,
    Generic,
}

#[allow(clippy::should_implement_trait)]
impl TargetKind {
    /// Returns the string representation of this target kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Page => "page",
            TargetKind::Heading => "heading",
            TargetKind::Figure => "figure",
            TargetKind::Table => "table",
            TargetKind::Code => "code",
            TargetKind::Equation => "equation",
            TargetKind::Generic => "generic",
        }
    }

    /// Parses a string into a `TargetKind`, returning `None` for unrecognized values.
    pub fn from_str(s: &str) -> Option<TargetKind> {
        match s {
            "page" => Some(TargetKind::Page),
            "heading" => Some(TargetKind::Heading),
            "figure" => Some(TargetKind::Figure),
            "table" => Some(TargetKind::Table),
            "code" => Some(TargetKind::Code),
            "equation" => Some(TargetKind::Equation),
            "generic" => Some(TargetKind::Generic),
            _ => None,
        }
    }

    /// Classifies a node, returning `None` when the node type is never numbered.
    pub fn for_node(node: &Node) -> Option<TargetKind> {
        match node.node_type.as_str() {
            HEADING => Some(TargetKind::Heading),
            MATH => Some(TargetKind::Equation),
            CONTAINER => match node.kind.as_deref() {
                Some("table") => Some(TargetKind::Table),
                Some("code") => Some(TargetKind::Code),
                _ => Some(TargetKind::Figure),
            },
            _ => None,
        }
    }

    /// Formats an enumerator the way cross-reference text shows it.
    pub fn format_enumerator(&self, enumerator: &str) -> Option<String> {
        match self {
            TargetKind::Heading => Some(format!("Section {}", enumerator)),
            TargetKind::Figure => Some(format!("Figure {}", enumerator)),
            TargetKind::Table => Some(format!("Table {}", enumerator)),
            TargetKind::Code => Some(format!("Program {}", enumerator)),
            TargetKind::Equation => Some(format!("({})", enumerator)),
            TargetKind::Page | TargetKind::Generic => None,
        }
    }
}

/// The resolved-form projection of a referenceable node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub identifier: String,
    pub kind: TargetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumerator: Option<String>,
    #[serde(rename = "html_id")]
    pub html_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TargetDescriptor {
    /// Text a cross-reference without children should display.
    pub fn link_text(&self) -> Option<String> {
        self.enumerator
            .as_deref()
            .and_then(|n| self.kind.format_enumerator(n))
            .or_else(|| self.title.clone())
    }
}

/// Frontmatter fields the resolution passes consult.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Frontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Page-level metadata for one document of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub slug: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub frontmatter: Frontmatter,
}

impl PageMetadata {
    /// Builds a dependency pointing at this page.
    pub fn dependency(&self, label: &str) -> Dependency {
        Dependency {
            url: Some(self.url.clone()),
            label: Some(label.to_string()),
            ..Dependency::default()
        }
        .with_page_details(
            self.kind.as_deref(),
            Some(&self.slug),
            self.location.as_deref(),
            &self.frontmatter,
        )
    }
}

/// One entry of a remote project's reference index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MystXref {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub data: String,
    pub kind: String,
    #[serde(default)]
    pub implicit: bool,
}

/// A remote project's reference index as served in `myst.xref.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MystXrefs {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub references: Vec<MystXref>,
}

/// Flavour of an external reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalReferenceKind {
    #[default]
    Myst,
    Generic,
}

/// A configured external project, with its index once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalReference {
    pub key: String,
    pub url: String,
    pub kind: ExternalReferenceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<MystXrefs>,
}

/// Page data fetched from a remote project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub mdast: Node,
    #[serde(default)]
    pub frontmatter: Frontmatter,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}
