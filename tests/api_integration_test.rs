use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use markdown_import::config::ImportConfig;
use markdown_import::entities::prelude::*;
use markdown_import::infrastructure::database;
use markdown_import::services::content_store::DatabaseContentStore;
use markdown_import::services::import::ImportService;
use markdown_import::utils::auth::create_jwt;
use markdown_import::{AppState, create_app};
use sea_orm::{Database, DatabaseConnection, EntityTrait};
use serde_json::Value;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zip::write::FileOptions;

const BOUNDARY: &str = "---------------------------918273645501234";

async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

async fn setup_state(scratch: &Path) -> AppState {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("markdown_import=debug,tower_http=debug"))
        .with(fmt::layer().with_test_writer())
        .try_init();

    let db = setup_test_db().await;
    let mut config = ImportConfig::development();
    config.scratch_root = scratch.to_path_buf();

    let store = Arc::new(DatabaseContentStore::new(db.clone()));
    AppState {
        db,
        import_service: Arc::new(ImportService::new(store, &config)),
        config,
        shutdown: CancellationToken::new(),
    }
}

fn token_for(state: &AppState, owner_key: &str) -> String {
    create_jwt(
        "user-1",
        "blog-1",
        owner_key,
        &state.config.jwt_secret,
        chrono::Duration::hours(1),
    )
    .unwrap()
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Builds a multipart body from `(field name, file name, bytes)` parts.
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/zip\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn import_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/console/import/md")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_import_archive_flow() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state.clone());

    let archive = zip_bytes(&[
        ("hello.md", b"# Hello\n\nbody"),
        ("world.md", b"---\ntitle: World\n---\ntext"),
    ]);
    let body = multipart_body(&[("file", Some("posts.zip"), &archive)]);

    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", json);
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["attempted"], 2);
    assert_eq!(json["data"]["imported"], 2);
    assert_eq!(json["data"]["article_ids"].as_array().unwrap().len(), 2);

    let rows = Articles::find().all(&state.db).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|a| a.author_id == "user-1" && a.blog_id == "blog-1"));

    assert!(!scratch.path().join("alice-import.zip").exists());
    assert!(!scratch.path().join("alice-import").exists());
}

#[tokio::test]
async fn test_token_accepted_from_query() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state);

    let archive = zip_bytes(&[("a.md", b"alpha")]);
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/console/import/md?token={}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(&[(
            "file",
            Some("a.zip"),
            &archive,
        )])))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["imported"], 1);
}

#[tokio::test]
async fn test_import_requires_session() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let app = create_app(state.clone());
    let archive = zip_bytes(&[("a.md", b"alpha")]);

    let (status, json) = send(
        &app,
        import_request(None, multipart_body(&[("file", Some("a.zip"), &archive)])),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], -1);
    assert_eq!(json["msg"], "please login before import");

    let forged = create_jwt(
        "user-1",
        "blog-1",
        "alice",
        "not-the-secret",
        chrono::Duration::hours(1),
    )
    .unwrap();
    let (status, _) = send(
        &app,
        import_request(
            Some(&forged),
            multipart_body(&[("file", Some("a.zip"), &archive)]),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(Articles::find().all(&state.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file_field() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state);

    let body = multipart_body(&[("comment", None, b"no archive attached")]);
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], -1);
    assert_eq!(json["msg"], "no upload file");
}

#[tokio::test]
async fn test_malformed_multipart_body() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state);

    let body = b"this is not multipart at all".to_vec();
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["msg"], "parse upload file header failed");
}

#[tokio::test]
async fn test_only_first_file_part_is_imported() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state.clone());

    let first = zip_bytes(&[("first.md", b"one")]);
    let second = zip_bytes(&[("second.md", b"two"), ("third.md", b"three")]);
    let body = multipart_body(&[
        ("comment", None, b"ignored"),
        ("file", Some("first.zip"), &first),
        ("file", Some("second.zip"), &second),
    ]);

    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["attempted"], 1);

    let rows = Articles::find().all(&state.db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].source_name, "first.md");
}

#[tokio::test]
async fn test_corrupt_archive_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state);

    let body = multipart_body(&[("file", Some("posts.zip"), b"definitely not a zip")]);
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], -1);
    assert_eq!(json["msg"], "unzip failed");
    assert!(!scratch.path().join("alice-import").exists());
}

#[tokio::test]
async fn test_partial_failures_reported_in_envelope() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    let app = create_app(state);

    let archive = zip_bytes(&[("good.md", b"fine"), ("blank.md", b"   \n")]);
    let body = multipart_body(&[("file", Some("posts.zip"), &archive)]);
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["code"], 0);
    assert_eq!(json["msg"], "imported 1 of 2 markdown files");
    assert_eq!(json["data"]["failures"][0]["name"], "blank.md");
}

#[tokio::test]
async fn test_import_during_shutdown() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let token = token_for(&state, "alice");
    state.shutdown.cancel();
    let app = create_app(state.clone());

    let archive = zip_bytes(&[("a.md", b"alpha")]);
    let body = multipart_body(&[("file", Some("a.zip"), &archive)]);
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["msg"], "import cancelled");
    assert!(Articles::find().all(&state.db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_check() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(scratch.path()).await;
    let app = create_app(state);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["scratch"], "writable");
}

#[tokio::test]
async fn test_health_reports_missing_scratch_root() {
    let scratch = tempfile::tempdir().unwrap();
    let state = setup_state(&scratch.path().join("not-created")).await;
    let app = create_app(state);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["scratch"], "missing");
}

#[tokio::test]
async fn test_flattened_duplicates_reported_as_failures() {
    let scratch = tempfile::tempdir().unwrap();
    let mut state = setup_state(scratch.path()).await;
    state.config.flatten_directories = true;
    let store = Arc::new(DatabaseContentStore::new(state.db.clone()));
    state.import_service = Arc::new(ImportService::new(store, &state.config));
    let token = token_for(&state, "alice");
    let app = create_app(state.clone());

    let archive = zip_bytes(&[
        ("2019/post.md", b"old"),
        ("2020/post.md", b"new"),
        ("intro.md", b"---\nIntro paragraph\n---\nbody"),
    ]);
    let body = multipart_body(&[("file", Some("posts.zip"), &archive)]);
    let (status, json) = send(&app, import_request(Some(&token), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["attempted"], 2);
    assert_eq!(json["data"]["imported"], 2);
    assert_eq!(json["data"]["failures"][0]["name"], "2020/post.md");

    let rows = Articles::find().all(&state.db).await.unwrap();
    assert_eq!(rows.len(), 2);
    let post = rows.iter().find(|a| a.source_name == "post.md").unwrap();
    assert_eq!(post.content, "old");
    let intro = rows.iter().find(|a| a.source_name == "intro.md").unwrap();
    assert!(intro.content.starts_with("---\nIntro paragraph"));
}
