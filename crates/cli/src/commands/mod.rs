//! CLI Commands

pub mod active;
pub mod catalog;
pub mod session;
