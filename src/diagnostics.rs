//! Per-document diagnostics.
//!
//! Resolution never aborts on a broken reference. Failures are attached to the
//! document they originate from, tagged with a stable rule id, and the passes
//! carry on with the next node.

use serde::{Deserialize, Serialize};

use crate::types::Node;

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Non-blocking; the document still builds.
    Warning,
    /// Blocks this document's output, but not the rest of the run.
    Error,
}

/// Stable identifiers for the rules a diagnostic reports against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    MystLinkValid,
    ReferenceTargetUnique,
    ReferenceTargetResolves,
    LinkResolves,
    EmbedTargetResolves,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MystLinkValid => "myst-link-valid",
            Self::ReferenceTargetUnique => "reference-target-unique",
            Self::ReferenceTargetResolves => "reference-target-resolves",
            Self::LinkResolves => "link-resolves",
            Self::EmbedTargetResolves => "embed-target-resolves",
        }
    }
}

/// A single warning or error attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub rule_id: RuleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Component that raised the diagnostic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Short description of the failing node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, rule_id: RuleId) -> Self {
        Self::new(Severity::Warning, message.into(), rule_id)
    }

    pub fn error(message: impl Into<String>, rule_id: RuleId) -> Self {
        Self::new(Severity::Error, message.into(), rule_id)
    }

    fn new(severity: Severity, message: String, rule_id: RuleId) -> Self {
        Self {
            severity,
            message,
            rule_id,
            note: None,
            source: None,
            node: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Records which node failed, as `type` plus its identifier or url.
    pub fn with_node(mut self, node: &Node) -> Self {
        let detail = node
            .identifier
            .as_deref()
            .or(node.url_source.as_deref())
            .or(node.url.as_deref());
        self.node = Some(match detail {
            Some(detail) => format!("{}({})", node.node_type, detail),
            None => node.node_type.clone(),
        });
        self
    }
}

/// Diagnostics collected for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    file: String,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            entries: Vec::new(),
        }
    }

    /// Path of the document these diagnostics belong to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Records a diagnostic and mirrors it to the log.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                file = %self.file,
                rule = diagnostic.rule_id.as_str(),
                "{}",
                diagnostic.message
            ),
            Severity::Error => tracing::error!(
                file = %self.file,
                rule = diagnostic.rule_id.as_str(),
                "{}",
                diagnostic.message
            ),
        }
        self.entries.push(diagnostic);
    }

    /// Moves every entry of `other` into this collection without logging again.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
