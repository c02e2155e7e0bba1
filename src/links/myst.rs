use crate::diagnostics::{Diagnostic, Diagnostics, RuleId};
use crate::errors::{Result, XrefError};
use crate::types::node_types::CROSS_REFERENCE;
use crate::types::{ExternalReference, ExternalReferenceKind, MystXref, Node};

use super::LinkTransformer;

/// Protocol tag for links into other MyST projects.
pub const MYST_PROTOCOL: &str = "xref:myst";

const TRANSFORM_SOURCE: &str = "LinkTransform:MystTransformer";
const XREF_SCHEME: &str = "xref:";
const DEPRECATED_SCHEME: &str = "myst:";

/// Rewrites the deprecated `myst:` scheme to `xref:`.
///
/// When `diagnostics` is given, a warning is recorded for every rewrite.
pub fn remove_myst_prefix(
    uri: &str,
    diagnostics: Option<&mut Diagnostics>,
    link: Option<&Node>,
) -> String {
    let Some(rest) = uri.strip_prefix(DEPRECATED_SCHEME) else {
        return uri.to_string();
    };
    let normalized = format!("{}{}", XREF_SCHEME, rest);
    if let Some(diagnostics) = diagnostics {
        let mut warning = Diagnostic::warning(
            format!(
                "\"myst:\" prefix is deprecated for external reference \"{}\"",
                uri
            ),
            RuleId::MystLinkValid,
        )
        .with_note(format!("Use \"{}\" instead.", normalized))
        .with_source(TRANSFORM_SOURCE);
        if let Some(link) = link {
            warning = warning.with_node(link);
        }
        diagnostics.push(warning);
    }
    normalized
}

/// The parts of an `xref:<key>/<page>#<identifier>` uri.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrefUri {
    pub key: String,
    /// Page path including its leading slash, or empty.
    pub page: String,
    pub identifier: Option<String>,
}

/// Parses an `xref:` uri. Query strings are ignored.
pub fn parse_xref_uri(uri: &str) -> Result<XrefUri> {
    let invalid = |message: &str| XrefError::InvalidUri {
        message: message.to_string(),
        uri: uri.to_string(),
    };
    let rest = uri
        .strip_prefix(XREF_SCHEME)
        .ok_or_else(|| invalid("expected an \"xref:\" scheme"))?;
    if rest.chars().any(char::is_whitespace) {
        return Err(invalid("whitespace is not allowed"));
    }

    let (path, hash) = match rest.split_once('#') {
        Some((path, hash)) => (path, Some(hash)),
        None => (rest, None),
    };
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    let (key, page) = match path.find('/') {
        Some(slash) => path.split_at(slash),
        None => (path, ""),
    };
    if key.is_empty() {
        return Err(invalid("missing project key"));
    }

    Ok(XrefUri {
        key: key.to_string(),
        page: page.to_string(),
        identifier: hash.filter(|h| !h.is_empty()).map(str::to_string),
    })
}

/// Finds the entry of a remote index that a page/identifier pair denotes.
///
/// With an identifier, entries match on `identifier` or `html_id`; a given
/// page must equal the entry's url, and implicit entries are only reachable
/// through an explicit page. Without an identifier only page entries match,
/// and an empty page means the project root.
pub fn find_xref<'r>(
    references: &'r [MystXref],
    page: &str,
    identifier: Option<&str>,
) -> Option<&'r MystXref> {
    match identifier {
        Some(identifier) => references.iter().find(|entry| {
            if !page.is_empty() && entry.url != page {
                return false;
            }
            if page.is_empty() && entry.implicit {
                return false;
            }
            entry.identifier.as_deref() == Some(identifier)
                || entry.html_id.as_deref() == Some(identifier)
        }),
        None => references.iter().find(|entry| {
            if entry.kind != "page" {
                return false;
            }
            if page.is_empty() && entry.url == "/" {
                return true;
            }
            entry.url == page
        }),
    }
}

#[derive(Debug, Clone)]
struct MystProject {
    key: String,
    url: String,
    references: Vec<MystXref>,
}

/// Resolves `xref:<key>/<page>#<identifier>` links against the loaded
/// indices of external MyST projects.
#[derive(Debug, Clone, Default)]
pub struct MystTransformer {
    projects: Vec<MystProject>,
}

impl MystTransformer {
    /// Keeps only MyST references whose index has been loaded.
    pub fn new(references: &[ExternalReference]) -> Self {
        let projects = references
            .iter()
            .filter(|r| r.kind == ExternalReferenceKind::Myst)
            .filter_map(|r| {
                let value = r.value.as_ref()?;
                Some(MystProject {
                    key: r.key.clone(),
                    url: r.url.clone(),
                    references: value.references.clone(),
                })
            })
            .collect();
        Self { projects }
    }

    /// Keys of the projects this transformer can resolve into.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.projects.iter().map(|p| p.key.as_str())
    }

    fn fail(diagnostics: &mut Diagnostics, link: &Node, message: String) -> bool {
        diagnostics.push(
            Diagnostic::error(message, RuleId::MystLinkValid)
                .with_source(TRANSFORM_SOURCE)
                .with_node(link),
        );
        false
    }
}

impl LinkTransformer for MystTransformer {
    fn protocol(&self) -> &str {
        MYST_PROTOCOL
    }

    fn test(&self, uri: &str) -> bool {
        let normalized = remove_myst_prefix(uri, None, None);
        self.projects.iter().any(|p| {
            !p.key.is_empty() && normalized.starts_with(&format!("{}{}", XREF_SCHEME, p.key))
        })
    }

    fn transform(&self, link: &mut Node, diagnostics: &mut Diagnostics) -> bool {
        let original = link
            .url_source
            .clone()
            .or_else(|| link.url.clone())
            .unwrap_or_default();
        let url_source = remove_myst_prefix(&original, Some(&mut *diagnostics), Some(&*link));

        let parsed = match parse_xref_uri(&url_source) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Self::fail(
                    diagnostics,
                    link,
                    format!("Could not parse url for \"{}\"", url_source),
                );
            }
        };

        let Some(project) = self.projects.iter().find(|p| p.key == parsed.key) else {
            let err = XrefError::UnknownProject {
                key: parsed.key.clone(),
                uri: url_source.clone(),
            };
            return Self::fail(diagnostics, link, err.to_string());
        };

        let Some(found) = find_xref(
            &project.references,
            &parsed.page,
            parsed.identifier.as_deref(),
        ) else {
            return Self::fail(
                diagnostics,
                link,
                format!(
                    "\"{}\" not found in MyST project {} ({})",
                    url_source, project.key, project.url
                ),
            );
        };

        link.internal = Some(false);
        link.url = Some(format!("{}{}", project.url, found.url));
        link.data_url = Some(format!("{}{}", project.url, found.data));
        link.remote_base_url = Some(project.url.clone());
        if found.kind != "page" {
            link.node_type = CROSS_REFERENCE.to_string();
            link.remote = Some(true);
            link.identifier = found.identifier.clone();
            link.label = found.identifier.clone();
            link.html_id = found.html_id.clone();
        }
        true
    }
}
