//! medcite-common — Shared error type and configuration used across all
//! Medcite crates.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{MedciteError, Result};
