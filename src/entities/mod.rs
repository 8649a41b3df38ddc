pub mod prelude;

pub mod articles;
