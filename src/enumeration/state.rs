use std::collections::BTreeMap;

use crate::config::NumberingConfig;
use crate::types::{TargetDescriptor, TargetKind};

use super::label::{html_id_for, normalize_label};

/// Deepest heading level that keeps its own counter.
const MAX_HEADING_DEPTH: usize = 6;

/// Targets and numbering counters for a single document.
///
/// Created fresh for every resolution pass. Identifiers are unique: the first
/// registration of an identifier wins and later ones are refused.
#[derive(Debug, Clone)]
pub struct ReferenceState {
    file_path: String,
    url: String,
    numbering: NumberingConfig,
    targets: BTreeMap<String, TargetDescriptor>,
    file_target: Option<String>,
    counters: BTreeMap<TargetKind, u32>,
    heading_counters: [u32; MAX_HEADING_DEPTH],
}

impl ReferenceState {
    /// Creates an empty state for the document at `file_path`, served at `url`.
    pub fn new(
        file_path: impl Into<String>,
        url: impl Into<String>,
        numbering: NumberingConfig,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            url: url.into(),
            numbering,
            targets: BTreeMap::new(),
            file_target: None,
            counters: BTreeMap::new(),
            heading_counters: [0; MAX_HEADING_DEPTH],
        }
    }

    /// Registers the whole document as a target under `label`.
    pub fn with_file_target(mut self, label: &str, title: Option<String>) -> Self {
        if let Some(normalized) = normalize_label(label) {
            let identifier = normalized.identifier;
            let descriptor = TargetDescriptor {
                identifier: identifier.clone(),
                kind: TargetKind::Page,
                enumerator: None,
                html_id: html_id_for(&identifier),
                url: self.url.clone(),
                data_url: None,
                title,
            };
            self.targets.insert(identifier.clone(), descriptor);
            self.file_target = Some(identifier);
        }
        self
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Url of the page this document renders to.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn numbering(&self) -> &NumberingConfig {
        &self.numbering
    }

    /// Looks up a target by identifier, falling back to its anchor id.
    pub fn resolve_local(&self, identifier: &str) -> Option<&TargetDescriptor> {
        self.targets.get(identifier).or_else(|| {
            self.targets
                .values()
                .find(|target| target.html_id == identifier)
        })
    }

    /// Returns `true` if an identifier is already registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.targets.contains_key(identifier)
    }

    /// Returns `true` when `identifier` names the document itself rather than
    /// a node inside it.
    pub fn get_file_target(&self, identifier: &str) -> bool {
        self.file_target.as_deref() == Some(identifier)
    }

    /// All registered targets, ordered by identifier.
    pub fn targets(&self) -> impl Iterator<Item = &TargetDescriptor> {
        self.targets.values()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Url of an anchor on this document's page.
    pub fn target_url(&self, html_id: &str) -> String {
        format!("{}#{}", self.url, html_id)
    }

    /// Records a target. Returns `false`, leaving the state untouched, if the
    /// identifier is already taken.
    pub(crate) fn register(&mut self, descriptor: TargetDescriptor) -> bool {
        if self.targets.contains_key(&descriptor.identifier) {
            return false;
        }
        self.targets
            .insert(descriptor.identifier.clone(), descriptor);
        true
    }

    /// Whether nodes of `kind` receive numbers. Headings are governed by
    /// `next_heading_enumerator` instead.
    pub fn numbers(&self, kind: TargetKind) -> bool {
        match kind {
            TargetKind::Figure => self.numbering.figure,
            TargetKind::Table => self.numbering.table,
            TargetKind::Code => self.numbering.code,
            TargetKind::Equation => self.numbering.equation,
            TargetKind::Heading => self.numbering.headings,
            TargetKind::Page | TargetKind::Generic => false,
        }
    }

    /// Advances the counter for `kind` and returns the new ordinal.
    pub(crate) fn next_enumerator(&mut self, kind: TargetKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        counter.to_string()
    }

    /// Advances the heading counter at `depth`, resetting every deeper one,
    /// and returns the dotted label (`"1.2.1"`).
    ///
    /// Returns `None`, touching no counter, when headings are not numbered or
    /// `depth` is shallower than the configured start.
    pub(crate) fn next_heading_enumerator(&mut self, depth: u32) -> Option<String> {
        if !self.numbering.headings {
            return None;
        }
        let start = self.numbering.heading_start.clamp(1, MAX_HEADING_DEPTH as u32) as usize;
        let depth = depth.clamp(1, MAX_HEADING_DEPTH as u32) as usize;
        if depth < start {
            return None;
        }

        self.heading_counters[depth - 1] += 1;
        for deeper in &mut self.heading_counters[depth..] {
            *deeper = 0;
        }

        let label = self.heading_counters[start - 1..depth]
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Some(label)
    }
}
