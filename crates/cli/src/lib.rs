//! FrameDeck CLI
//!
//! Command-line interface for FrameDeck catalogs, stored active urls and
//! scripted headless sessions.

pub mod commands;
pub mod output;
