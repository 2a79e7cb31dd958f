use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// How the toolchain should package the exported site.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SiteLayout {
    /// Plain files only, servable by any static host.
    Static,
    /// Static files plus the server runtime for API routes.
    #[default]
    Fullstack,
}

impl SiteLayout {
    /// Value passed to the toolchain as a project property.
    pub fn property_value(self) -> &'static str {
        match self {
            SiteLayout::Static => "STATIC",
            SiteLayout::Fullstack => "FULLSTACK",
        }
    }
}

impl fmt::Display for SiteLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteLayout::Static => write!(f, "static"),
            SiteLayout::Fullstack => write!(f, "fullstack"),
        }
    }
}

impl FromStr for SiteLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(SiteLayout::Static),
            "fullstack" => Ok(SiteLayout::Fullstack),
            other => Err(format!(
                "unknown site layout '{other}', expected 'static' or 'fullstack'"
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub site: SiteSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub export: ExportSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Toolchain program. Paths containing a separator resolve against the project root.
    #[serde(default = "default_gradle")]
    pub gradle: String,
    #[serde(default = "default_export_task")]
    pub export_task: String,
    #[serde(default = "default_stop_task")]
    pub stop_task: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            gradle: default_gradle(),
            export_task: default_export_task(),
            stop_task: default_stop_task(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExportSection {
    #[serde(default)]
    pub layout: SiteLayout,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Zero disables the export timeout.
    #[serde(default)]
    pub max_wait_secs: u64,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            layout: SiteLayout::default(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: 0,
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_gradle() -> String {
    "./gradlew".to_owned()
}

fn default_export_task() -> String {
    "kilnExport".to_owned()
}

fn default_stop_task() -> String {
    "kilnStop".to_owned()
}

fn default_poll_interval_ms() -> u64 {
    300
}

impl ProjectConfig {
    fn validate(self) -> Result<Self, SchemaError> {
        if self.site.title.trim().is_empty() {
            return Err(SchemaError::EmptyTitle);
        }
        if self.build.gradle.trim().is_empty() {
            return Err(SchemaError::EmptyToolchain);
        }
        if self.export.poll_interval_ms == 0 {
            return Err(SchemaError::ZeroPollInterval);
        }
        Ok(self)
    }
}

pub fn parse_config_str(input: &str) -> Result<ProjectConfig, SchemaError> {
    let config: ProjectConfig = toml::from_str(input)?;
    config.validate()
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ProjectConfig, SchemaError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
