//! clipvault - self-hosted video archive service.
//!
//! This library crate exposes the archive orchestration and HTTP surface
//! for integration testing; the binary in `main.rs` is a thin CLI on top.

pub mod archive;
pub mod server;
