pub use super::articles::Entity as Articles;
