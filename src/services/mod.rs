pub mod content_store;
pub mod import;
