use crate::layout::ProjectLayout;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerEnvironment {
    Dev,
    Prod,
}

impl fmt::Display for ServerEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerEnvironment::Dev => write!(f, "dev"),
            ServerEnvironment::Prod => write!(f, "prod"),
        }
    }
}

/// Contents of `.kiln/server/state.toml`, written by a running preview server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerState {
    pub pid: u32,
    pub port: u16,
    pub env: ServerEnvironment,
}

impl ServerState {
    /// Read the state file. A missing file means no server was started.
    pub fn load(path: &Path) -> Result<Option<Self>, SchemaError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&content)
            .map(Some)
            .map_err(|e| SchemaError::InvalidServerState {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(self).map_err(|e| SchemaError::InvalidServerState {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The server recorded for this project, if its process is still alive.
    /// A stale state file left behind by a crashed server counts as not running.
    pub fn running(layout: &ProjectLayout) -> Result<Option<Self>, SchemaError> {
        Ok(Self::load(&layout.server_state_file())?.filter(ServerState::is_alive))
    }

    pub fn is_alive(&self) -> bool {
        pid_alive(self.pid)
    }
}

#[allow(unsafe_code)]
fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill() with signal 0 performs only the existence and permission
    // check; no signal is delivered. pid was validated as a positive i32.
    let ret = unsafe { libc::kill(pid, 0) };
    if ret == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to another user.
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
