use std::path::PathBuf;
use thiserror::Error;

/// Filesystem step of the archive workspace that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStage {
    CreateContainer,
    WriteContainer,
    ClearExtractionDir,
    CreateExtractionDir,
    OpenContainer,
    WriteEntry,
    ReadExtractionDir,
}

impl std::fmt::Display for WorkspaceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            WorkspaceStage::CreateContainer => "create temp file",
            WorkspaceStage::WriteContainer => "write temp file",
            WorkspaceStage::ClearExtractionDir => "remove temp dir",
            WorkspaceStage::CreateExtractionDir => "make temp dir",
            WorkspaceStage::OpenContainer => "open temp file",
            WorkspaceStage::WriteEntry => "write extracted file",
            WorkspaceStage::ReadExtractionDir => "read dir",
        };
        f.write_str(step)
    }
}

/// Request-level failures. Any of these aborts the import.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("please login before import")]
    Unauthorized,

    #[error("{0}")]
    Input(String),

    #[error("invalid owner key: {0}")]
    InvalidOwnerKey(String),

    #[error("{stage} [{path}] failed: {source}")]
    Workspace {
        stage: WorkspaceStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unzip [{path}] failed: {source}")]
    Unpack {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive entry [{entry}] escapes the extraction directory")]
    UnsafeEntry { entry: String },

    #[error("archive exceeds limit: {0}")]
    LimitExceeded(String),

    #[error("import cancelled")]
    Cancelled,

    #[error("unpack task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ImportError {
    pub fn workspace(stage: WorkspaceStage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ImportError::Workspace {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Message safe to show the caller: names the failing step, never a path.
    pub fn public_message(&self) -> String {
        match self {
            ImportError::Unauthorized => self.to_string(),
            ImportError::Input(msg) => msg.clone(),
            ImportError::InvalidOwnerKey(_) => "invalid session".to_string(),
            ImportError::Workspace { stage, .. } => format!("{} failed", stage),
            ImportError::Unpack { .. } | ImportError::UnsafeEntry { .. } => {
                "unzip failed".to_string()
            }
            ImportError::LimitExceeded(msg) => format!("unzip failed: {}", msg),
            ImportError::Cancelled => "import cancelled".to_string(),
            ImportError::Task(_) => "import failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_message_hides_paths() {
        let err = ImportError::workspace(
            WorkspaceStage::WriteContainer,
            "/tmp/alice-import.zip",
            std::io::Error::other("disk full"),
        );
        assert!(err.to_string().contains("/tmp/alice-import.zip"));
        assert_eq!(err.public_message(), "write temp file failed");
    }

    #[test]
    fn test_security_error_reads_as_unzip_failure() {
        let err = ImportError::UnsafeEntry {
            entry: "../../evil.txt".to_string(),
        };
        assert_eq!(err.public_message(), "unzip failed");
        assert!(err.to_string().contains("../../evil.txt"));
    }
}
