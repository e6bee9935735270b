//! Error types for variant index builds

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for variant index operations
pub type Result<T> = std::result::Result<T, VariantError>;

/// Variant index errors
#[derive(Error, Debug)]
pub enum VariantError {
    #[error("the swagger spec dir must be the specification folder, e.g. /home/me/azure-rest-api-specs/specification (got {})", .0.display())]
    InvalidSpecRoot(PathBuf),

    #[error("retrieving spec list from {}: {source}", path.display())]
    Readme {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a swagger document (top level must be an object)", .0.display())]
    NotADocument(PathBuf),

    #[error("unsupported reference {reference:?} in {}", file.display())]
    UnsupportedReference { file: PathBuf, reference: String },

    #[error("cannot resolve reference {reference:?} in {}", file.display())]
    UnresolvedReference { file: PathBuf, reference: String },

    #[error("definition {name:?} not found in {}", file.display())]
    MissingDefinition { file: PathBuf, name: String },

    #[error("timeout while scanning specs (deadline {0:?})")]
    Timeout(Duration),

    #[error("build cancelled")]
    Cancelled,

    #[error("a build worker panicked")]
    WorkerPanicked,

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl VariantError {
    /// True for the deadline failure, so operators can tell "too much input"
    /// apart from "broken input".
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// The file an input error is attributed to, if any
    pub fn file(&self) -> Option<&std::path::Path> {
        match self {
            Self::Readme { path, .. }
            | Self::Read { path, .. }
            | Self::Parse { path, .. } => Some(path.as_path()),
            Self::NotADocument(path) | Self::InvalidSpecRoot(path) => Some(path.as_path()),
            Self::UnsupportedReference { file, .. }
            | Self::UnresolvedReference { file, .. }
            | Self::MissingDefinition { file, .. } => Some(file.as_path()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguished() {
        assert!(VariantError::Timeout(Duration::from_secs(600)).is_timeout());
        assert!(!VariantError::Cancelled.is_timeout());
    }

    #[test]
    fn test_file_attribution() {
        let err = VariantError::MissingDefinition {
            file: PathBuf::from("/specs/a.json"),
            name: "Pet".to_string(),
        };
        assert_eq!(err.file(), Some(std::path::Path::new("/specs/a.json")));
        assert!(err.to_string().contains("\"Pet\""));
        assert_eq!(VariantError::Cancelled.file(), None);
    }
}
