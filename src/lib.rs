// ABOUTME: Library root for appdeploy - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod artifact;
pub mod config;
pub mod connection;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod remote;
pub mod targets;
pub mod types;
