//! Terminal view for interactive kiln exports.
//!
//! The view is a ratatui inline viewport: build output is inserted above a
//! pinned status block that shows the export state, the deduplicated alerts
//! and the key hints. Keys are read on a separate crossterm thread and sent
//! into the export event channel.

mod keys;
mod ui;
mod view;

pub use keys::{map_key, KeyReader};
pub use ui::{draw, status_lines, VIEW_HEIGHT};
pub use view::InlineView;

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
    use kiln_core::{
        Alert, AlertBundle, ExportSession, ExportState, ExportView, Key, SessionSnapshot,
        Severity,
    };
    use kiln_runtime::OutputLine;
    use kiln_schema::SiteLayout;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn snapshot(state: ExportState) -> SessionSnapshot {
        let mut snap = ExportSession::new(SiteLayout::Fullstack, true)
            .snapshot(&AlertBundle::new(), Duration::from_millis(1300));
        snap.state = state;
        snap
    }

    fn screen(snapshot: &SessionSnapshot) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, VIEW_HEIGHT)).unwrap();
        terminal.draw(|f| draw(f, snapshot)).unwrap();
        buffer_text(terminal.backend())
    }

    fn buffer_text(backend: &TestBackend) -> String {
        let buffer = backend.buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(ratatui::buffer::Cell::symbol).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn quit_keys_cancel() {
        assert_eq!(map_key(&press(KeyCode::Char('q'))), Some(Key::Cancel));
        assert_eq!(map_key(&press(KeyCode::Char('Q'))), Some(Key::Cancel));
        assert_eq!(
            map_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Key::Cancel)
        );
    }

    #[test]
    fn navigation_keys() {
        assert_eq!(map_key(&press(KeyCode::Up)), Some(Key::Up));
        assert_eq!(map_key(&press(KeyCode::Char('k'))), Some(Key::Up));
        assert_eq!(map_key(&press(KeyCode::Char('j'))), Some(Key::Down));
        assert_eq!(map_key(&press(KeyCode::PageDown)), Some(Key::PageDown));
        assert_eq!(map_key(&press(KeyCode::Char('g'))), Some(Key::Home));
        assert_eq!(map_key(&press(KeyCode::End)), Some(Key::End));
        assert_eq!(map_key(&press(KeyCode::Enter)), Some(Key::Toggle));
    }

    #[test]
    fn unrelated_keys_are_ignored() {
        assert_eq!(map_key(&press(KeyCode::Char('x'))), None);
        assert_eq!(map_key(&press(KeyCode::Esc)), None);
        assert_eq!(
            map_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            None
        );
    }

    #[test]
    fn key_release_is_ignored() {
        let mut release = press(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(&release), None);
    }

    #[test]
    fn status_headlines() {
        assert!(screen(&snapshot(ExportState::Exporting)).contains("Exporting"));
        assert!(screen(&snapshot(ExportState::Exporting)).contains("[q] cancel"));
        assert!(screen(&snapshot(ExportState::Finishing)).contains("Finishing up"));
        assert!(screen(&snapshot(ExportState::Finished)).contains("Export finished successfully"));
    }

    #[test]
    fn cancelled_shows_reason() {
        let mut snap = snapshot(ExportState::Cancelled);
        snap.cancel_reason = Some("user requested cancellation".to_owned());
        assert!(screen(&snap).contains("Export cancelled: user requested cancellation"));

        snap.state = ExportState::Cancelling;
        assert!(screen(&snap).contains("Cancelling export: user requested cancellation"));
    }

    #[test]
    fn interrupted_shows_fault_chain() {
        let mut snap = snapshot(ExportState::Interrupted);
        snap.fault = Some(
            "failed to launch `./gradlew`\n  caused by: No such file or directory".to_owned(),
        );
        let text = screen(&snap);
        assert!(text.contains("Interrupted by exception:"));
        assert!(text.contains("failed to launch `./gradlew`"));
        assert!(text.contains("caused by: No such file or directory"));
    }

    #[test]
    fn alerts_are_listed_with_counts() {
        let mut bundle = AlertBundle::new();
        bundle.append(Alert::new(Severity::Error, "Unresolved reference: foo"));
        bundle.append(Alert::new(Severity::Warning, "Variable 'x' is never used"));
        bundle.append(Alert::new(Severity::Warning, "Variable 'x' is never used"));
        let snap = ExportSession::new(SiteLayout::Static, true)
            .snapshot(&bundle, Duration::from_secs(3));

        let text = screen(&snap);
        assert!(text.contains("1 errors, 2 warnings"));
        assert!(text.contains("e: Unresolved reference: foo"));
        assert!(text.contains("w: Variable 'x' is never used (x2)"));
    }

    #[test]
    fn expanded_alert_wraps_to_the_terminal_width() {
        let long = format!("{} tail-marker", "x".repeat(80));
        let mut bundle = AlertBundle::new();
        bundle.append(Alert::new(Severity::Info, "Using cached build"));
        bundle.append(Alert::new(Severity::Error, &long));
        bundle.handle_key(Key::Toggle);
        let snap = ExportSession::new(SiteLayout::Fullstack, true)
            .snapshot(&bundle, Duration::from_secs(1));
        assert!(snap.alerts.rows[1].expanded);

        let mut terminal = Terminal::new(TestBackend::new(40, VIEW_HEIGHT)).unwrap();
        terminal.draw(|f| draw(f, &snap)).unwrap();
        let text = buffer_text(terminal.backend());
        assert!(text.contains("tail-marker"), "{text}");
        assert!(text.contains("1 errors, 0 warnings, 1 infos"), "{text}");
    }

    #[test]
    fn ellipsis_animates_with_time() {
        let mut early = snapshot(ExportState::Exporting);
        early.elapsed = Duration::from_millis(0);
        let mut later = early.clone();
        later.elapsed = Duration::from_millis(900);
        assert_ne!(status_lines(&early), status_lines(&later));
    }

    #[test]
    fn inline_view_renders_into_backend() {
        let mut view = InlineView::with_backend(TestBackend::new(80, 24)).unwrap();
        view.log(&OutputLine::stdout("> Task :site:kilnExport"));
        view.render(&snapshot(ExportState::Exporting));
        assert!(buffer_text(view.backend()).contains("Exporting"));
        view.finish().unwrap();
    }
}
