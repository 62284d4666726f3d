//! # boardsync common library
//!
//! Shared code for the boardsync workspace including:
//! - Board, card and proposal data model
//! - Event types (SyncEvent enum) and the EventBus
//! - Configuration loading
//! - SQLite bootstrap
//! - SSE helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{Error, Result};
