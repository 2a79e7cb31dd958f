//! Project configuration and on-disk layout for kiln.
//!
//! This crate defines the schema layer: the `.kiln/conf.toml` project config
//! (`ProjectConfig`), the `SiteLayout` export choice, the `ProjectLayout` path
//! helpers, and the server state file written by a running preview server.

pub mod config;
pub mod layout;
pub mod server;

pub use config::{
    parse_config_file, parse_config_str, BuildSection, ExportSection, ProjectConfig,
    ServerSection, SiteLayout, SiteSection,
};
pub use layout::{find_project_root, ProjectLayout};
pub use server::{ServerEnvironment, ServerState};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read project config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse project config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("site.title must not be empty")]
    EmptyTitle,
    #[error("build.gradle must not be empty")]
    EmptyToolchain,
    #[error("export.poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("invalid server state file {path}: {reason}")]
    InvalidServerState { path: String, reason: String },
}
