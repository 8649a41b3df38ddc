use anyhow::Context;
use std::env;
use std::path::PathBuf;

/// Configuration for the markdown import pipeline
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Maximum size of an uploaded archive in bytes (default: 64 MB)
    pub max_upload_size: usize,

    /// Directory holding per-owner archive workspaces (default: OS temp dir)
    pub scratch_root: PathBuf,

    /// Maximum number of entries in one archive (default: 10000)
    pub max_archive_entries: usize,

    /// Maximum total uncompressed size of an archive in bytes (default: 512 MB)
    pub max_extracted_size: u64,

    /// Number of documents persisted concurrently (default: 4)
    pub persist_concurrency: usize,

    /// Place nested archive entries at the top level by file name (default: false)
    pub flatten_directories: bool,

    /// JWT Secret Key
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 64 * 1024 * 1024, // 64 MB
            scratch_root: env::temp_dir(),
            max_archive_entries: 10_000,
            max_extracted_size: 512 * 1024 * 1024, // 512 MB
            persist_concurrency: 4,
            flatten_directories: false,
            jwt_secret: "secret".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl ImportConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            scratch_root: env::var("IMPORT_SCRATCH_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.scratch_root),

            max_archive_entries: env::var("MAX_ARCHIVE_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_archive_entries),

            max_extracted_size: env::var("MAX_EXTRACTED_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_extracted_size),

            persist_concurrency: env::var("IMPORT_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|v| v.max(1))
                .unwrap_or(default.persist_concurrency),

            flatten_directories: env::var("IMPORT_FLATTEN_DIRS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.flatten_directories),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (relaxed limits, serial persistence)
    pub fn development() -> Self {
        Self {
            max_upload_size: 256 * 1024 * 1024,
            persist_concurrency: 1,
            ..Self::default()
        }
    }

    /// Create config for production. `JWT_SECRET` must be set.
    pub fn production() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set in production")?;
        let mut config = Self::from_env();
        config.jwt_secret = jwt_secret;
        Ok(config)
    }
}
