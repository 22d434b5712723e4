// Core modules
pub mod api;
pub mod config;
pub mod db;
pub mod entry;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod regime;
pub mod risk;
pub mod signal;

// Re-export commonly used types
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
