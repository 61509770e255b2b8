//! Database models and queries

pub mod init;
pub mod models;
pub mod vocabularies;

pub use init::*;
pub use models::*;
pub use vocabularies::*;
