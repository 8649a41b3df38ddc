use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use thiserror::Error;

use super::types::DocumentCandidate;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,

    #[error("front matter is invalid: {0}")]
    FrontMatter(#[from] serde_yaml::Error),
}

/// Fields derived from a markdown file before ownership is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub title: String,
    pub slug: String,
    pub path: String,
    pub tags: Vec<String>,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Recognised keys of a front matter mapping. Scalars of any YAML type are
/// read as text so `title: 2024` or `tags: [1, 2]` still import.
#[derive(Debug, Default)]
struct FrontMatter {
    title: Option<String>,
    slug: Option<String>,
    permalink: Option<String>,
    date: Option<Value>,
    tags: Vec<String>,
}

impl FrontMatter {
    fn from_mapping(map: &Mapping) -> Self {
        Self {
            title: map.get("title").and_then(scalar_text),
            slug: map.get("slug").and_then(scalar_text),
            permalink: map.get("permalink").and_then(scalar_text),
            date: map.get("date").cloned(),
            tags: map.get("tags").map(tag_list).unwrap_or_default(),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

/// Accepts a list of scalars or one comma-separated string. Duplicates and
/// blanks are dropped, first occurrence wins.
fn tag_list(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(joined) => joined.split(',').map(str::to_string).collect(),
        other => scalar_text(other).into_iter().collect(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Derives title, slug, path and body from a candidate. Front matter, when
/// present, overrides what the file name gives.
pub fn parse_document(candidate: &DocumentCandidate) -> Result<ParsedDocument, ParseError> {
    if candidate.content.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let (front, body) = match split_front_matter(&candidate.content) {
        Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
        // A block that is not a mapping is a pair of thematic breaks, not metadata
        Some((yaml, body)) => match serde_yaml::from_str::<Value>(yaml)? {
            Value::Mapping(map) => (FrontMatter::from_mapping(&map), body),
            _ => (FrontMatter::default(), candidate.content.as_str()),
        },
        None => (FrontMatter::default(), candidate.content.as_str()),
    };

    let stem = file_stem(&candidate.name);

    let title = front.title.unwrap_or_else(|| stem.to_string());

    let slug = front
        .slug
        .as_deref()
        .map(slugify)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| {
            let slug = slugify(stem);
            if slug.is_empty() { "untitled".to_string() } else { slug }
        });

    let path = match front.permalink.as_deref().map(str::trim) {
        Some(link) if !link.is_empty() => {
            if link.starts_with('/') {
                link.to_string()
            } else {
                format!("/{}", link)
            }
        }
        _ => format!("/{}", slug),
    };

    Ok(ParsedDocument {
        title,
        slug,
        path,
        tags: front.tags,
        body: body.trim().to_string(),
        created_at: front.date.as_ref().and_then(parse_date),
    })
}

/// Splits `---\n<yaml>\n---\n<body>`. Returns `None` when the text does not
/// open with a delimiter line or the block is never closed.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Lowercases and joins alphanumeric runs with `-`. Non-ASCII letters are kept.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let text = scalar_text(value)?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    tracing::debug!("Ignoring unrecognised front matter date {:?}", text);
    None
}
