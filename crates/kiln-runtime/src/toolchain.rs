use crate::process::{ChildProcess, CommandSpec, ProcessHandle};
use crate::RuntimeError;
use kiln_schema::{BuildSection, SiteLayout};
use std::path::{Path, PathBuf};

/// The external build toolchain, seen only through the two commands the
/// export pipeline needs.
pub trait Toolchain: Send + Sync {
    fn name(&self) -> &str;

    /// Start a production export of the site.
    fn export(&self, layout: SiteLayout) -> Result<Box<dyn ProcessHandle>, RuntimeError>;

    /// Start the command that stops any server the toolchain launched.
    fn stop_server(&self) -> Result<Box<dyn ProcessHandle>, RuntimeError>;
}

/// Drives a Gradle build configured by the `[build]` section of the project config.
pub struct GradleToolchain {
    root: PathBuf,
    build: BuildSection,
}

impl GradleToolchain {
    pub fn new(root: impl Into<PathBuf>, build: BuildSection) -> Self {
        Self {
            root: root.into(),
            build,
        }
    }

    /// The program to run. A bare name is looked up on `PATH`; anything with a
    /// path separator is taken relative to the project root.
    pub fn program(&self) -> PathBuf {
        resolve_program(&self.root, &self.build.gradle)
    }

    fn base_command(&self) -> CommandSpec {
        CommandSpec::new(self.program())
            .current_dir(&self.root)
            .args(["--console=plain"])
            .args(self.build.args.iter().cloned())
    }

    pub fn export_command(&self, layout: SiteLayout) -> CommandSpec {
        // Exporting is a production-only action, and must never piggyback on
        // a dev server that happens to be up.
        self.base_command()
            .args([
                "-PkilnEnv=PROD".to_owned(),
                format!("-PkilnExportLayout={}", layout.property_value()),
                "-PkilnReuseServer=false".to_owned(),
            ])
            .args([self.build.export_task.clone()])
    }

    pub fn stop_command(&self) -> CommandSpec {
        self.base_command().args([self.build.stop_task.clone()])
    }
}

impl Toolchain for GradleToolchain {
    fn name(&self) -> &'static str {
        "gradle"
    }

    fn export(&self, layout: SiteLayout) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        let process = ChildProcess::spawn(&self.export_command(layout))?;
        Ok(Box::new(process))
    }

    fn stop_server(&self) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        let process = ChildProcess::spawn(&self.stop_command())?;
        Ok(Box::new(process))
    }
}

pub(crate) fn resolve_program(root: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() || !program.contains('/') {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
