use crate::toolchain::resolve_program;
use kiln_schema::BuildSection;
use std::fmt;
use std::path::Path;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Check everything the Gradle toolchain needs to run in `root`.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_toolchain_prereqs(root: &Path, build: &BuildSection) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    let program = resolve_program(root, &build.gradle);
    let found = if program.components().count() > 1 {
        is_executable(&program)
    } else {
        command_exists(&build.gradle)
    };
    if !found {
        missing.push(MissingPrereq {
            name: "gradle",
            purpose: "building and exporting the site",
            install_hint: "commit the Gradle wrapper (./gradlew, chmod +x) or set build.gradle in .kiln/conf.toml",
        });
    }

    if !command_exists("java") {
        missing.push(MissingPrereq {
            name: "java",
            purpose: "running the Gradle build",
            install_hint:
                "apt install openjdk-17-jdk | dnf install java-17-openjdk | pacman -S jdk17-openjdk",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nkiln drives the site build through Gradle and needs these tools.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "java",
            purpose: "running builds",
            install_hint: "apt install openjdk-17-jdk",
        };
        let s = format!("{m}");
        assert!(s.contains("java"));
        assert!(s.contains("running builds"));
        assert!(s.contains("apt install openjdk-17-jdk"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![
            MissingPrereq {
                name: "gradle",
                purpose: "exports",
                install_hint: "add the wrapper",
            },
            MissingPrereq {
                name: "java",
                purpose: "builds",
                install_hint: "install a JDK",
            },
        ];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("gradle"));
        assert!(output.contains("java"));
    }

    #[test]
    fn missing_wrapper_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = check_toolchain_prereqs(dir.path(), &BuildSection::default());
        assert!(missing.iter().any(|m| m.name == "gradle"));
    }

    #[test]
    fn executable_wrapper_is_accepted() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let wrapper = dir.path().join("gradlew");
        std::fs::write(&wrapper, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();

        let missing = check_toolchain_prereqs(dir.path(), &BuildSection::default());
        assert!(!missing.iter().any(|m| m.name == "gradle"));
    }
}
