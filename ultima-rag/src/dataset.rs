//! Dataset identity.
//!
//! A dataset is the vector index built from one data source with one pair of
//! chunking parameters. Its identity is derived deterministically so the same
//! source chunked the same way is embedded once and reused afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

static UNSAFE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]+").expect("unreachable error: invalid dataset name pattern")
});

/// Where models run and where datasets are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Hosted model API and hosted vector index.
    #[default]
    Api,
    /// In-process model and on-disk vector index.
    Local,
}

impl Mode {
    /// Both modes, API first.
    pub const ALL: [Mode; 2] = [Mode::Api, Mode::Local];

    /// Lowercase name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Api => "api",
            Mode::Local => "local",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(Mode::Api),
            "local" => Ok(Mode::Local),
            _ => Err(RagError::ConfigError(format!("unknown mode '{s}', expected api or local"))),
        }
    }
}

/// Location of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetPath {
    /// A dataset on the index service: `hub://{org}/{name}`.
    Hub {
        /// Organization owning the dataset.
        org: String,
        /// Dataset name.
        name: String,
    },
    /// A dataset directory on the local filesystem.
    Local(PathBuf),
}

impl DatasetPath {
    /// The dataset name, without organization or parent directory.
    pub fn name(&self) -> &str {
        match self {
            DatasetPath::Hub { name, .. } => name,
            DatasetPath::Local(path) => {
                path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
            }
        }
    }

    /// Collection name used by the vector store backing this dataset.
    ///
    /// Hub datasets become `{org}__{name}`; local datasets use their name.
    pub fn collection_name(&self) -> String {
        match self {
            DatasetPath::Hub { org, name } => format!("{org}__{name}"),
            DatasetPath::Local(_) => self.name().to_string(),
        }
    }
}

impl fmt::Display for DatasetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetPath::Hub { org, name } => write!(f, "hub://{org}/{name}"),
            DatasetPath::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reduce a data source to a string usable as a dataset name.
///
/// Runs of characters outside `[A-Za-z0-9_-]` become a single `-`, and
/// leading or trailing dashes are removed.
pub fn clean_string_for_storing(source: &str) -> String {
    UNSAFE_RUN.replace_all(source, "-").trim_matches('-').to_string()
}

/// Compute the identity of the dataset for `source` split with the given parameters.
///
/// Sources that clean to the same string share an identity: `notes.txt` and
/// `notes-txt` name the same dataset, and whichever is indexed first is
/// reused for the other.
///
/// # Example
///
/// ```rust,ignore
/// use ultima_rag::dataset::{Mode, get_dataset_path};
///
/// let source = "https://example.com/a.pdf";
/// let path = get_dataset_path(source, 1536, 128, Mode::Api, "acme", data_dir);
/// assert_eq!(path.to_string(), "hub://acme/https-example-com-a-pdf-1536-128");
/// ```
pub fn get_dataset_path(
    source: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    mode: Mode,
    org: &str,
    data_dir: &Path,
) -> DatasetPath {
    let name = format!("{}-{chunk_size}-{chunk_overlap}", clean_string_for_storing(source));
    match mode {
        Mode::Local => DatasetPath::Local(data_dir.join(name)),
        Mode::Api => DatasetPath::Hub { org: org.to_string(), name },
    }
}
