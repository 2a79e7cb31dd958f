//! Classification of raw toolchain output into alerts.
//!
//! Gradle and the Kotlin compiler mark diagnostics with a handful of stable
//! prefixes. Anything that does not match stays a plain log line: failing to
//! classify only costs the alert view an entry, never the export.

use kiln_runtime::OutputLine;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A classified diagnostic. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    severity: Severity,
    message: String,
}

/// Deduplication identity of an alert: severity plus whitespace-normalised message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    severity: Severity,
    message: String,
}

impl Alert {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn key(&self) -> AlertKey {
        AlertKey {
            severity: self.severity,
            message: self.message.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

const PREFIX_MARKERS: &[(&str, Severity)] = &[
    // Kotlin compiler
    ("e: ", Severity::Error),
    ("w: ", Severity::Warning),
    ("i: ", Severity::Info),
    // Gradle and JVM tooling
    ("FAILURE: ", Severity::Error),
    ("ERROR: ", Severity::Error),
    ("error: ", Severity::Error),
    ("WARNING: ", Severity::Warning),
    ("warning: ", Severity::Warning),
];

/// Turn one output line into at most one alert. Total: never fails.
pub fn classify(line: &OutputLine) -> Option<Alert> {
    let text = line.text.trim_end();
    if text.trim().is_empty() {
        return None;
    }

    for (prefix, severity) in PREFIX_MARKERS {
        if let Some(rest) = text.strip_prefix(prefix) {
            let rest = rest.trim();
            return (!rest.is_empty()).then(|| Alert::new(*severity, rest));
        }
    }

    if text.starts_with("BUILD FAILED") {
        return Some(Alert::new(Severity::Error, text.trim()));
    }

    if let Some(task) = text
        .strip_prefix("> Task ")
        .and_then(|t| t.strip_suffix(" FAILED"))
    {
        return Some(Alert::new(Severity::Error, format!("Task {task} failed")));
    }

    if text.starts_with("Deprecated Gradle features were used") {
        return Some(Alert::new(Severity::Warning, text.trim()));
    }

    if line.is_error() && text.starts_with("Exception in thread") {
        return Some(Alert::new(Severity::Error, text.trim()));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(text: &str) -> Option<Alert> {
        classify(&OutputLine::stdout(text))
    }

    #[test]
    fn kotlin_compiler_markers() {
        assert_eq!(
            out("e: file:///site/src/Index.kt:12:5 Unresolved reference: foo"),
            Some(Alert::new(
                Severity::Error,
                "file:///site/src/Index.kt:12:5 Unresolved reference: foo"
            ))
        );
        assert_eq!(
            out("w: Parameter 'ctx' is never used"),
            Some(Alert::new(Severity::Warning, "Parameter 'ctx' is never used"))
        );
        assert_eq!(
            out("i: compiling 3 files"),
            Some(Alert::new(Severity::Info, "compiling 3 files"))
        );
    }

    #[test]
    fn gradle_failure_markers() {
        assert_eq!(
            out("FAILURE: Build failed with an exception."),
            Some(Alert::new(Severity::Error, "Build failed with an exception."))
        );
        assert_eq!(
            out("BUILD FAILED in 12s"),
            Some(Alert::new(Severity::Error, "BUILD FAILED in 12s"))
        );
        assert_eq!(
            out("> Task :site:compileKotlinJs FAILED"),
            Some(Alert::new(Severity::Error, "Task :site:compileKotlinJs failed"))
        );
    }

    #[test]
    fn deprecation_notice_is_warning() {
        let alert = out("Deprecated Gradle features were used in this build, making it incompatible with Gradle 9.0.").unwrap();
        assert_eq!(alert.severity(), Severity::Warning);
    }

    #[test]
    fn exception_only_counts_on_error_stream() {
        let line = "Exception in thread \"main\" java.lang.IllegalStateException";
        assert!(out(line).is_none());
        let alert = classify(&OutputLine::stderr(line)).unwrap();
        assert_eq!(alert.severity(), Severity::Error);
    }

    #[test]
    fn plain_lines_are_not_alerts() {
        assert!(out("> Task :site:kobwebExport").is_none());
        assert!(out("BUILD SUCCESSFUL in 40s").is_none());
        assert!(out("").is_none());
        assert!(out("   ").is_none());
        assert!(classify(&OutputLine::stderr("Downloading https://services.gradle.org")).is_none());
    }

    #[test]
    fn bare_marker_is_not_an_alert() {
        assert!(out("e: ").is_none());
        assert!(out("WARNING:    ").is_none());
    }

    #[test]
    fn classification_is_total_over_odd_input() {
        let odd = [
            "\u{1b}[31me: colored\u{1b}[0m",
            "e:missing-space",
            "\u{0}\u{0}",
            "ünïcödé w: inside",
            "> Task  FAILED",
            "> Task FAILED",
        ];
        for text in odd {
            let _ = classify(&OutputLine::stdout(text));
            let _ = classify(&OutputLine::stderr(text));
        }
    }

    #[test]
    fn key_normalises_whitespace() {
        let a = Alert::new(Severity::Warning, "unused  variable\t'x'");
        let b = Alert::new(Severity::Warning, " unused variable 'x' ");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Alert::new(Severity::Error, "unused variable 'x'").key());
    }
}
