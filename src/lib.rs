// ABOUTME: Library root for outrider - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod actions;
pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod ssh;
pub mod store;
pub mod transport;
pub mod types;
