//! FrameDeck server
//!
//! Serves url catalogs and stores each user's last active url.

pub mod config;
pub mod server;

pub use config::ServerConfig;
pub use server::{router, serve, ApiError, AppState};
