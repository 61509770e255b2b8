//! # Vocabulary Common Library
//!
//! Shared code for the vocabulary import tooling:
//! - Vocabulary catalogue models and SQLite schema
//! - Import event types (ImportEvent enum) and the event bus
//! - TOML configuration loading and path resolution
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
