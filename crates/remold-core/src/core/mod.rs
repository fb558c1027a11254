//! Internal implementation modules for `remold-core`.
//!
//! Callers normally go through the re-exports at the crate root.

pub mod archive;
pub mod assets;
pub mod commands;
pub mod config;
pub mod fetch;
pub mod fs;
pub mod jar;
pub mod migration;
pub mod net;
pub mod patch;
pub mod pipeline;
pub mod runtime;
pub mod tooling;
pub mod tools;
pub mod update;
