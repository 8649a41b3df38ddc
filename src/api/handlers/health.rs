use crate::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::path::Path;
use utoipa::ToSchema;

/// Readiness of the pieces an import needs: the content database and a
/// writable scratch root for workspaces.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` when every check passes, `degraded` otherwise
    pub status: String,
    pub database: String,
    pub scratch: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Ready to import", body = HealthResponse),
        (status = 503, description = "Database or scratch root unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.db.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check database ping failed: {}", e);
            "disconnected"
        }
    };
    let scratch = scratch_status(&state.config.scratch_root).await;

    let healthy = database == "connected" && scratch == "writable";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" }.to_string(),
            database: database.to_string(),
            scratch: scratch.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Writes and removes a marker file, the same operations a workspace needs.
async fn scratch_status(root: &Path) -> &'static str {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) | Err(_) => return "missing",
    }

    let marker = root.join(format!(".health-{}", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&marker, b"").await {
        tracing::warn!("Scratch root [{}] is not writable: {}", root.display(), e);
        return "read-only";
    }
    if let Err(e) = tokio::fs::remove_file(&marker).await {
        tracing::warn!("Health marker [{}] not removed: {}", marker.display(), e);
    }
    "writable"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_status() {
        let scratch = tempfile::tempdir().unwrap();
        assert_eq!(scratch_status(scratch.path()).await, "writable");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        assert_eq!(scratch_status(&scratch.path().join("gone")).await, "missing");

        let file = scratch.path().join("plain-file");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(scratch_status(&file).await, "missing");
    }
}
