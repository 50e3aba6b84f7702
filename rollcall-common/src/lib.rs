//! # Rollcall Common Library
//!
//! Shared code for the rollcall attendance service:
//! - Common error type
//! - Bootstrap configuration (TOML, root folder resolution)
//! - SQLite schema initialization and the settings table
//! - Attendance lifecycle events (EventBus)
//! - Time and identifier helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
