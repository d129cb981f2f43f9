//! Goalpost: a personal goal and milestone tracker served as HTML.
//!
//! The HTTP layer lives in [`api`]; persistence comes from `goalpost-core`.

pub mod api;
pub mod config;
pub mod password;
pub mod views;

pub use goalpost_core::{db, models};
