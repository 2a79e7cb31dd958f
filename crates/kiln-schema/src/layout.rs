use crate::config::{parse_config_file, ProjectConfig};
use crate::SchemaError;
use std::path::{Path, PathBuf};

const KILN_DIR: &str = ".kiln";
const CONFIG_FILE: &str = "conf.toml";

/// Directory layout of a kiln project.
///
/// Everything kiln owns lives under `<root>/.kiln`; the rest of the tree
/// belongs to the build toolchain.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn kiln_dir(&self) -> PathBuf {
        self.root.join(KILN_DIR)
    }

    #[inline]
    pub fn config_file(&self) -> PathBuf {
        self.kiln_dir().join(CONFIG_FILE)
    }

    /// Written by the preview server while it is running.
    #[inline]
    pub fn server_state_file(&self) -> PathBuf {
        self.kiln_dir().join("server").join("state.toml")
    }

    #[inline]
    pub fn export_lock_file(&self) -> PathBuf {
        self.kiln_dir().join("export.lock")
    }

    pub fn is_project(&self) -> bool {
        self.config_file().is_file()
    }

    pub fn load_config(&self) -> Result<ProjectConfig, SchemaError> {
        parse_config_file(self.config_file())
    }
}

/// Walk up from `start` to the nearest directory containing `.kiln/conf.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| ProjectLayout::new(*dir).is_project())
        .map(Path::to_path_buf)
}
