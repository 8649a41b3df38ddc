use crate::entities::articles;
use crate::services::import::markdown::ParsedDocument;
use crate::services::import::types::ImportContext;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use uuid::Uuid;

/// A document ready to be written, owned by the importing account.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub owner_id: String,
    pub bucket_id: String,
    pub title: String,
    pub slug: String,
    pub path: String,
    pub tags: Vec<String>,
    pub content: String,
    pub source_name: String,
    /// `None` lets the store stamp the creation time
    pub created_at: Option<DateTime<Utc>>,
}

impl ArticleRecord {
    pub fn new(parsed: ParsedDocument, context: &ImportContext, source_name: &str) -> Self {
        Self {
            owner_id: context.owner_id.clone(),
            bucket_id: context.bucket_id.clone(),
            title: parsed.title,
            slug: parsed.slug,
            path: parsed.path,
            tags: parsed.tags,
            content: parsed.body,
            source_name: source_name.to_string(),
            created_at: parsed.created_at,
        }
    }
}

/// Destination of imported documents. One call per record; no transaction
/// spans several records.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persists one record and returns its id.
    async fn persist(&self, record: ArticleRecord) -> Result<String>;
}

pub struct DatabaseContentStore {
    db: DatabaseConnection,
}

impl DatabaseContentStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContentStore for DatabaseContentStore {
    async fn persist(&self, record: ArticleRecord) -> Result<String> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let tags = if record.tags.is_empty() {
            None
        } else {
            Some(record.tags.join(","))
        };

        let article = articles::ActiveModel {
            id: Set(id.clone()),
            author_id: Set(record.owner_id),
            blog_id: Set(record.bucket_id),
            title: Set(record.title),
            slug: Set(record.slug),
            path: Set(record.path),
            tags: Set(tags),
            content: Set(record.content),
            source_name: Set(record.source_name),
            commentable: Set(true),
            created_at: Set(record.created_at.unwrap_or(now)),
            updated_at: Set(Some(now)),
        };

        article.insert(&self.db).await?;

        Ok(id)
    }
}
