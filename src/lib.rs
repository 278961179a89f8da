pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod repo;
pub mod storage; // image folder + camera

// Re-export commonly used items for tests / external users
pub use commands::{execute, AppState, Cli, Command};
pub use repo::{Registry, RepoError, StatusChange};
