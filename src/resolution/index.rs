use std::collections::BTreeMap;

use crate::enumeration::ReferenceState;
use crate::types::{PageMetadata, TargetDescriptor};

/// Collects per-document reference states while documents are enumerated.
///
/// Only a finished builder yields a `ProjectReferenceIndex`, so no lookup can
/// run against a partially enumerated project.
#[derive(Debug, Default)]
pub struct ProjectIndexBuilder {
    states: BTreeMap<String, ReferenceState>,
    pages: BTreeMap<String, PageMetadata>,
}

impl ProjectIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enumerated document. A second state for the same path replaces
    /// the first.
    pub fn add(&mut self, state: ReferenceState, page: PageMetadata) {
        let path = state.file_path().to_string();
        self.pages.insert(path.clone(), page);
        self.states.insert(path, state);
    }

    /// Seals the index once every document of the project has been added.
    pub fn finish(self) -> ProjectReferenceIndex {
        ProjectReferenceIndex {
            states: self.states,
            pages: self.pages,
        }
    }
}

/// Read-only view over the reference states of every document in a project.
#[derive(Debug, Default)]
pub struct ProjectReferenceIndex {
    states: BTreeMap<String, ReferenceState>,
    pages: BTreeMap<String, PageMetadata>,
}

/// The document that owns a looked-up identifier.
#[derive(Debug, Clone, Copy)]
pub struct StateProvider<'a> {
    pub file_path: &'a str,
    pub state: &'a ReferenceState,
    pub page: Option<&'a PageMetadata>,
}

impl<'a> StateProvider<'a> {
    /// Returns `true` if `identifier` names the whole document.
    pub fn get_file_target(&self, identifier: &str) -> bool {
        self.state.get_file_target(identifier)
    }

    /// Page url of the owning document.
    pub fn url(&self) -> &'a str {
        self.state.url()
    }

    pub fn target(&self, identifier: &str) -> Option<&'a TargetDescriptor> {
        self.state.resolve_local(identifier)
    }
}

impl ProjectReferenceIndex {
    pub fn state(&self, file_path: &str) -> Option<&ReferenceState> {
        self.states.get(file_path)
    }

    pub fn page(&self, file_path: &str) -> Option<&PageMetadata> {
        self.pages.get(file_path)
    }

    /// Project-relative paths of every indexed document, sorted.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Finds the document that owns `identifier`.
    ///
    /// With `file_path`, only that document is consulted. Without it, documents
    /// are searched in path order and the first one holding the identifier wins.
    pub fn resolve_state_provider(
        &self,
        identifier: &str,
        file_path: Option<&str>,
    ) -> Option<StateProvider<'_>> {
        let (path, state) = match file_path {
            Some(path) => {
                let (path, state) = self.states.get_key_value(path)?;
                state.resolve_local(identifier)?;
                (path, state)
            }
            None => self
                .states
                .iter()
                .find(|(_, state)| state.resolve_local(identifier).is_some())?,
        };
        Some(StateProvider {
            file_path: path,
            state,
            page: self.pages.get(path),
        })
    }

    /// Resolves an identifier to its owning document and target.
    pub fn resolve_target(
        &self,
        identifier: &str,
        file_path: Option<&str>,
    ) -> Option<(&str, &TargetDescriptor)> {
        let provider = self.resolve_state_provider(identifier, file_path)?;
        let target = provider.target(identifier)?;
        Some((provider.file_path, target))
    }
}
