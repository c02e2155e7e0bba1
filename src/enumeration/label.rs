/// A label with its derived identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLabel {
    /// Label with whitespace runs collapsed and trimmed.
    pub label: String,
    /// Lower-cased label, used as the lookup key.
    pub identifier: String,
}

/// Normalizes a user-facing label into a label/identifier pair.
///
/// Returns `None` for labels that are empty after trimming.
pub fn normalize_label(label: &str) -> Option<NormalizedLabel> {
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");
    if label.is_empty() {
        return None;
    }
    Some(NormalizedLabel {
        identifier: label.to_lowercase(),
        label,
    })
}

/// Derives a stable anchor id from an identifier.
///
/// Lower-cases and collapses every run of non-alphanumerics into a single
/// hyphen. Identifiers with no alphanumerics at all are used verbatim.
pub fn html_id_for(identifier: &str) -> String {
    let slug = slug::slugify(identifier);
    if slug.is_empty() {
        identifier.to_string()
    } else {
        slug
    }
}
