use crate::AppState;
use crate::api::error::AppError;
use crate::services::import::{ImportContext, ImportError, ImportOutcome, UploadHandle};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart field carrying the archive.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    /// 0 on success
    pub code: i32,
    pub msg: String,
    pub data: Option<ImportOutcome>,
}

/// Multipart form accepted by the import endpoint.
#[derive(ToSchema)]
pub struct ImportUpload {
    /// Zip archive of markdown files. Only the first `file` part is used.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/api/console/import/md",
    request_body(content = ImportUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Import completed, possibly with per-file failures", body = ImportResponse),
        (status = 400, description = "Missing or malformed upload"),
        (status = 401, description = "No valid session"),
        (status = 422, description = "Archive is corrupt, unsafe or too large"),
        (status = 500, description = "Import workspace failure")
    ),
    tag = "import",
    security(
        ("jwt" = [])
    )
)]
pub async fn import_markdown(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, AppError> {
    let context = ImportContext {
        owner_id: claims.sub.clone(),
        bucket_id: claims.bid.clone(),
    };
    let cancel = state.shutdown.child_token();
    let mut result: Option<Result<ImportOutcome, ImportError>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if result.is_some() => {
                tracing::warn!("Ignoring malformed trailing multipart data: {}", e);
                break;
            }
            Err(e) => return Err(multipart_error(e)),
        };

        // Later parts, including further `file` parts, are skipped unread
        if result.is_some() || field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("import.zip").to_string();
        let reader = StreamReader::new(field.map_err(std::io::Error::other));

        result = Some(
            state
                .import_service
                .import(
                    &claims.uname,
                    context.clone(),
                    UploadHandle::new(filename, reader),
                    &cancel,
                )
                .await,
        );
    }

    let outcome = result.ok_or_else(|| ImportError::Input("no upload file".to_string()))??;

    Ok(Json(ImportResponse {
        code: 0,
        msg: format!(
            "imported {} of {} markdown files",
            outcome.imported,
            outcome.imported + outcome.failures.len()
        ),
        data: Some(outcome),
    }))
}

fn multipart_error(err: MultipartError) -> AppError {
    let detail = err.body_text();
    if detail.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        tracing::error!("parse upload file header failed: {}", detail);
        AppError::from(ImportError::Input(
            "parse upload file header failed".to_string(),
        ))
    }
}
