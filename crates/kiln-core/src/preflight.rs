//! Checks that run before any export starts.

use crate::CoreError;
use kiln_schema::{find_project_root, ProjectConfig, ProjectLayout, ServerState};
use std::path::Path;
use tracing::debug;

/// A validated project: its on-disk layout and parsed config.
#[derive(Debug, Clone)]
pub struct Project {
    pub layout: ProjectLayout,
    pub config: ProjectConfig,
}

/// Walk up from `start` to the nearest directory holding `.kiln/conf.toml`.
pub fn find_project(start: &Path) -> Result<Project, CoreError> {
    let root = find_project_root(start)
        .ok_or_else(|| CoreError::NotAProject(start.display().to_string()))?;
    let layout = ProjectLayout::new(root);
    let config = layout.load_config()?;
    debug!("project root: {}", layout.root().display());
    Ok(Project { layout, config })
}

/// Fail if a preview server recorded for this project is still alive.
pub fn ensure_server_not_running(layout: &ProjectLayout) -> Result<(), CoreError> {
    match ServerState::running(layout)? {
        Some(state) => Err(CoreError::ServerAlreadyRunning {
            pid: state.pid,
            port: state.port,
            env: state.env.to_string(),
        }),
        None => Ok(()),
    }
}

/// Both checks, in the order a user should fix them.
pub fn preflight(start: &Path) -> Result<Project, CoreError> {
    let project = find_project(start)?;
    ensure_server_not_running(&project.layout)?;
    Ok(project)
}
