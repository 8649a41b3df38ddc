use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Checks that an owner key can be used as a single path component of the
/// scratch root. Returns the key unchanged on success.
pub fn validate_owner_key(owner_key: &str) -> Result<&str, ValidationError> {
    let invalid = |message: &str| ValidationError {
        code: "INVALID_OWNER_KEY",
        message: message.to_string(),
    };

    if owner_key.trim().is_empty() {
        return Err(invalid("Owner key cannot be empty"));
    }

    if owner_key == "." || owner_key == ".." {
        return Err(invalid("Owner key cannot be a relative directory"));
    }

    if owner_key
        .chars()
        .any(|c| c == '/' || c == '\\' || c == ':' || c.is_control())
    {
        tracing::warn!("Rejected owner key with path characters: {:?}", owner_key);
        return Err(invalid("Owner key contains path separators or control characters"));
    }

    if owner_key.len() > 128 {
        return Err(invalid("Owner key is longer than 128 bytes"));
    }

    Ok(owner_key)
}

/// Resolves an archive entry name to a path relative to the extraction
/// directory. Absolute names, drive prefixes and `..` components are rejected,
/// so joining the result onto the extraction directory never leaves it.
/// Names such as `./` that resolve to the directory itself yield `None`.
pub fn archive_entry_path(name: &str) -> Result<Option<PathBuf>, ValidationError> {
    let unsafe_entry = || ValidationError {
        code: "UNSAFE_ARCHIVE_ENTRY",
        message: format!("Archive entry '{}' escapes the extraction directory", name),
    };

    if name.contains('\0') {
        return Err(unsafe_entry());
    }

    // Zip names use '/', but some writers emit '\' separators.
    let normalized = name.replace('\\', "/");
    let candidate = Path::new(&normalized);

    let mut relative = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry());
            }
        }
    }

    // Windows drive letters are plain components on unix
    if normalized.len() >= 2 && normalized.as_bytes()[1] == b':' {
        return Err(unsafe_entry());
    }

    if relative.as_os_str().is_empty() {
        return Ok(None);
    }

    Ok(Some(relative))
}
