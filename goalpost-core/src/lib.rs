//! Core library for Goalpost.
//!
//! This crate provides the domain models and database operations for Goalpost,
//! independent of the HTTP layer that renders them.
//!
//! # Usage
//!
//! ```no_run
//! use goalpost_core::db::Database;
//! use goalpost_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let goals = db.with_connection(|conn| Goal::list_all(conn))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod db;
pub mod models;

// Re-export commonly used types at crate root
pub use db::Database;
