use crate::ui::{self, VIEW_HEIGHT};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use kiln_core::{ExportView, SessionSnapshot};
use kiln_runtime::OutputLine;
use ratatui::{
    prelude::*,
    widgets::{Paragraph, Wrap},
    TerminalOptions, Viewport,
};
use std::io;

/// Inline export view: build output scrolls above a live status block that
/// stays pinned at the bottom of the terminal.
pub struct InlineView<B: Backend> {
    terminal: Terminal<B>,
    raw_mode: bool,
    finished: bool,
}

impl InlineView<CrosstermBackend<io::Stdout>> {
    /// Take over stdout. Raw mode is held until [`InlineView::finish`] or drop.
    pub fn stdout() -> Result<Self, String> {
        enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {e}"))?;
        match Self::with_backend(CrosstermBackend::new(io::stdout())) {
            Ok(mut view) => {
                view.raw_mode = true;
                Ok(view)
            }
            Err(e) => {
                let _ = disable_raw_mode();
                Err(e)
            }
        }
    }
}

impl<B: Backend> InlineView<B> {
    pub fn with_backend(backend: B) -> Result<Self, String> {
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(VIEW_HEIGHT),
            },
        )
        .map_err(|e| format!("terminal init: {e}"))?;
        Ok(Self {
            terminal,
            raw_mode: false,
            finished: false,
        })
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    /// Leave the final frame on screen and give the terminal back.
    pub fn finish(&mut self) -> Result<(), String> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if self.raw_mode {
            self.raw_mode = false;
            disable_raw_mode().map_err(|e| format!("failed to disable raw mode: {e}"))?;
        }
        self.terminal
            .show_cursor()
            .map_err(|e| format!("show cursor: {e}"))?;
        Ok(())
    }
}

impl<B: Backend> ExportView for InlineView<B> {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        let _ = self.terminal.draw(|f| ui::draw(f, snapshot));
    }

    fn log(&mut self, line: &OutputLine) {
        let width = self.terminal.size().map_or(80, |s| s.width.max(1));
        let rows = line.text.chars().count().div_ceil(width as usize).max(1) as u16;
        let style = if line.is_error() {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        let text = line.text.clone();
        let _ = self.terminal.insert_before(rows, |buf| {
            Paragraph::new(text)
                .style(style)
                .wrap(Wrap { trim: false })
                .render(buf.area, buf);
        });
    }
}

impl<B: Backend> Drop for InlineView<B> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
