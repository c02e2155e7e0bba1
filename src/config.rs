use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, XrefError};
use crate::types::{ExternalReference, ExternalReferenceKind};

/// Name of the configuration file stored inside the `.xrefkit` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store xrefkit metadata.
pub const XREFKIT_DIR: &str = ".xrefkit";

/// Which node kinds receive ordinal numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub figure: bool,
    pub table: bool,
    pub code: bool,
    pub equation: bool,
    /// Whether headings are numbered at all.
    pub headings: bool,
    /// Shallowest heading depth that is numbered; deeper levels nest under it.
    pub heading_start: u32,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            figure: true,
            table: true,
            code: true,
            equation: true,
            headings: false,
            heading_start: 1,
        }
    }
}

/// An external project that `xref:` links may point into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReferenceConfig {
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub kind: ExternalReferenceKind,
}

impl ExternalReferenceConfig {
    /// Url of the remote reference index for this project.
    pub fn index_url(&self) -> String {
        format!("{}/myst.xref.json", self.url.trim_end_matches('/'))
    }

    /// An unloaded record for this project.
    pub fn unloaded(&self) -> ExternalReference {
        ExternalReference {
            key: self.key.clone(),
            url: self.url.trim_end_matches('/').to_string(),
            kind: self.kind,
            value: None,
        }
    }
}

/// Configuration for an xrefkit project.
///
/// Controls which files are treated as documents, how targets are numbered,
/// and which external projects can be referenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrefConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Root directory of the project being resolved.
    pub root_dir: String,
    /// Glob patterns for document files to include.
    pub include: Vec<String>,
    /// Glob patterns for document files to exclude.
    pub exclude: Vec<String>,
    pub numbering: NumberingConfig,
    /// External projects addressable through `xref:<key>` links.
    pub references: Vec<ExternalReferenceConfig>,
    /// Timeout applied to every remote fetch, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for XrefConfig {
    fn default() -> Self {
        Self {
            version: 1,
            root_dir: String::new(),
            include: vec!["**/*.json".to_string()],
            exclude: vec![
                "_build/**".to_string(),
                ".xrefkit/**".to_string(),
                "node_modules/**".to_string(),
            ],
            numbering: NumberingConfig::default(),
            references: Vec::new(),
            fetch_timeout_secs: 10,
        }
    }
}

/// Returns the path to the `.xrefkit` directory within the given project root.
pub fn get_xrefkit_dir(project_root: &Path) -> PathBuf {
    project_root.join(XREFKIT_DIR)
}

/// Returns the path to the configuration file within the `.xrefkit` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_xrefkit_dir(project_root).join(CONFIG_FILENAME)
}

fn config_error(action: &str, path: &Path, err: impl std::fmt::Display) -> XrefError {
    XrefError::Config {
        message: format!("cannot {} {}: {}", action, path.display(), err),
    }
}

/// Reads the project's configuration, or the defaults (rooted at
/// `project_root`) when it has none.
pub fn load_config(project_root: &Path) -> Result<XrefConfig> {
    let config_path = get_config_path(project_root);
    if !config_path.is_file() {
        return Ok(XrefConfig {
            root_dir: project_root.to_string_lossy().into_owned(),
            ..XrefConfig::default()
        });
    }
    let contents =
        fs::read_to_string(&config_path).map_err(|e| config_error("read", &config_path, e))?;
    serde_json::from_str(&contents).map_err(|e| config_error("parse", &config_path, e))
}

/// Writes `config` into the project's `.xrefkit` directory, creating it if
/// needed.
pub fn save_config(project_root: &Path, config: &XrefConfig) -> Result<()> {
    let config_path = get_config_path(project_root);
    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir).map_err(|e| config_error("create", dir, e))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, json).map_err(|e| config_error("write", &config_path, e))
}

fn matches_any(patterns: &[String], file_path: &str) -> bool {
    let options = glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .any(|p| p.matches_with(file_path, options))
}

/// Returns `true` if `file_path` (project-relative, `/`-separated) is a
/// document: it matches an include pattern and no exclude pattern.
pub fn should_include_file(file_path: &str, config: &XrefConfig) -> bool {
    !matches_any(&config.exclude, file_path) && matches_any(&config.include, file_path)
}
