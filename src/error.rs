//! Error taxonomy for the release pipeline.
//!
//! Fatal conditions are variants of [`ReleaseError`]. Per-cell build failures
//! and per-target publish outcomes are ordinary values (see
//! [`crate::types::artifact::BuildFailure`] and
//! [`crate::types::publish::PublishOutcome`]) because they never abort
//! sibling work.

use {std::path::PathBuf, thiserror::Error};

#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A version string or tag name could not be parsed.
    #[error("invalid version `{input}`: {reason}")]
    Parse { input: String, reason: String },

    /// Incrementing a component would overflow `u64`.
    #[error("cannot bump {version}: {component} component would overflow")]
    VersionOverflow {
        version: String,
        component: &'static str,
    },

    /// No configured manifest location yielded a version token.
    #[error("no version found in any configured manifest ({searched} location(s) searched)")]
    NotFound { searched: usize },

    /// Manifest locations disagree about the current version.
    #[error("manifests are out of sync: {details}")]
    OutOfSync { details: String },

    /// A manifest exists but its extraction pattern did not match.
    #[error("{path}: pattern `{pattern}` did not match any version token")]
    Rewrite { path: PathBuf, pattern: String },

    /// The working tree has pending changes and the policy forbids committing them.
    #[error("working tree is dirty and auto-commit is disabled:\n{}", .paths.join("\n"))]
    DirtyWorkingTree { paths: Vec<String> },

    /// Cargo could not re-pin a lock file after the manifests changed.
    #[error("failed to refresh {path}: {message}")]
    Lockfile { path: PathBuf, message: String },

    #[error("git {operation} failed: {message}")]
    Git {
        operation: String,
        message: String,
    },

    /// Two build cells produced an artifact with the same filename.
    #[error("artifact `{file_name}` was produced by both {first} and {second}")]
    DuplicateArtifact {
        file_name: String,
        first: String,
        second: String,
    },

    #[error("required build cell(s) failed: {}", .cells.join(", "))]
    RequiredCellsFailed { cells: Vec<String> },

    #[error("publishing failed for target(s): {}", .targets.join(", "))]
    PublishFailed { targets: Vec<String> },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    pub(crate) fn parse(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Git {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    #[test]
    fn test_dirty_tree_lists_paths() {
        let err = ReleaseError::DirtyWorkingTree {
            paths: vec!["Cargo.toml".to_string(), "src/lib.rs".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "working tree is dirty and auto-commit is disabled:\nCargo.toml\nsrc/lib.rs"
        );
    }

    #[test]
    fn test_duplicate_artifact_message() {
        let err = ReleaseError::DuplicateArtifact {
            file_name: "hfd-1.2.4-linux.whl".to_string(),
            first: "linux/3.8".to_string(),
            second: "linux/3.9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "artifact `hfd-1.2.4-linux.whl` was produced by both linux/3.8 and linux/3.9"
        );
    }
}
