use kiln_core::{AlertRow, BundleView, ExportState, SessionSnapshot, Severity};
use ratatui::{prelude::*, widgets::Paragraph};
use std::time::Duration;

/// Rows reserved for the live status block below the scrolling log.
pub const VIEW_HEIGHT: u16 = 12;

pub fn draw(f: &mut Frame<'_>, snapshot: &SessionSnapshot) {
    let status = status_lines(snapshot);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(status.len() as u16),
        ])
        .split(f.area());

    draw_alerts(f, &snapshot.alerts, chunks[0]);
    f.render_widget(Paragraph::new(status), chunks[1]);
}

fn draw_alerts(f: &mut Frame<'_>, alerts: &BundleView, area: Rect) {
    if alerts.rows.is_empty() {
        return;
    }

    let dim = Style::default().fg(Color::DarkGray);
    let totals = &alerts.totals;
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!(" {} errors", totals.errors),
            severity_style(Severity::Error).add_modifier(Modifier::BOLD),
        ),
        Span::raw(", "),
        Span::styled(
            format!("{} warnings", totals.warnings),
            severity_style(Severity::Warning).add_modifier(Modifier::BOLD),
        ),
        Span::raw(", "),
        Span::styled(format!("{} infos", totals.infos), severity_style(Severity::Info)),
        Span::styled("   [↑/↓] select  [Enter] expand", dim),
    ])];

    if alerts.hidden_above > 0 {
        lines.push(Line::styled(format!("   ↑ {} more", alerts.hidden_above), dim));
    }
    for row in &alerts.rows {
        lines.extend(alert_lines(row, area.width));
    }
    if alerts.hidden_below > 0 {
        lines.push(Line::styled(format!("   ↓ {} more", alerts.hidden_below), dim));
    }

    // Keep the newest rows when the area is short.
    let skip = lines.len().saturating_sub(area.height as usize);
    let lines: Vec<Line<'_>> = lines.into_iter().skip(skip).collect();
    f.render_widget(Paragraph::new(lines), area);
}

/// Width of the ` › e: ` prefix in front of every alert message.
const ROW_PREFIX_WIDTH: usize = 6;

/// One line for a collapsed row; an expanded row is split over as many
/// lines as its message needs at `width`.
fn alert_lines(row: &AlertRow, width: u16) -> Vec<Line<'static>> {
    let marker = if row.selected { "›" } else { " " };
    let label = match row.severity {
        Severity::Error => "e",
        Severity::Warning => "w",
        Severity::Info => "i",
    };
    let chunks: Vec<String> = if row.expanded {
        let room = usize::from(width).saturating_sub(ROW_PREFIX_WIDTH).max(1);
        let chars: Vec<char> = row.message.chars().collect();
        chars
            .chunks(room)
            .map(|c| c.iter().collect::<String>())
            .collect()
    } else {
        vec![row.message.clone()]
    };

    let last = chunks.len().saturating_sub(1);
    let mut lines = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut spans = if i == 0 {
            vec![
                Span::raw(format!(" {marker} ")),
                Span::styled(format!("{label}: "), severity_style(row.severity)),
            ]
        } else {
            vec![Span::raw(" ".repeat(ROW_PREFIX_WIDTH))]
        };
        spans.push(Span::raw(chunk));
        if i == last && row.count > 1 {
            spans.push(Span::styled(
                format!(" (x{})", row.count),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        let line = Line::from(spans);
        lines.push(if row.selected {
            line.style(Style::default().add_modifier(Modifier::REVERSED))
        } else {
            line
        });
    }
    lines
}

/// The status block: one headline plus any fault detail or key hint.
pub fn status_lines(snapshot: &SessionSnapshot) -> Vec<Line<'static>> {
    let dots = ellipsis(snapshot.elapsed);
    let reason = snapshot.cancel_reason.as_deref().unwrap_or("unknown reason");
    let mut lines = match snapshot.state {
        ExportState::Exporting => vec![
            Line::styled(format!("Exporting{dots}"), state_style(snapshot.state)),
            Line::styled(
                format!("  {}s elapsed  [q] cancel", snapshot.elapsed.as_secs()),
                Style::default().fg(Color::DarkGray),
            ),
        ],
        ExportState::Finishing => vec![Line::styled(
            format!("Finishing up{dots}"),
            state_style(snapshot.state),
        )],
        ExportState::Finished => vec![Line::styled(
            "Export finished successfully",
            state_style(snapshot.state),
        )],
        ExportState::Cancelling => vec![Line::styled(
            format!("Cancelling export: {reason}{dots}"),
            state_style(snapshot.state),
        )],
        ExportState::Cancelled => vec![Line::styled(
            format!("Export cancelled: {reason}"),
            state_style(snapshot.state),
        )],
        ExportState::Interrupted => {
            let mut lines = vec![Line::styled(
                "Interrupted by exception:",
                state_style(snapshot.state),
            )];
            if let Some(fault) = &snapshot.fault {
                lines.extend(fault.lines().map(|l| Line::raw(format!("  {l}"))));
            }
            lines
        }
    };

    if let Some(fault) = &snapshot.cleanup_fault {
        lines.push(Line::styled(
            format!("Server could not be stopped: {}", fault.replace('\n', " ")),
            severity_style(Severity::Warning),
        ));
    }
    lines
}

fn ellipsis(elapsed: Duration) -> &'static str {
    match (elapsed.as_millis() / 400) % 3 {
        0 => ".",
        1 => "..",
        _ => "...",
    }
}

fn state_style(state: ExportState) -> Style {
    match state {
        ExportState::Exporting | ExportState::Finishing => Style::default().fg(Color::Cyan),
        ExportState::Cancelling => Style::default().fg(Color::Yellow),
        ExportState::Finished => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        ExportState::Cancelled | ExportState::Interrupted => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD),
    }
}

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Error => Style::default().fg(Color::Red),
        Severity::Warning => Style::default().fg(Color::Yellow),
        Severity::Info => Style::default().fg(Color::Blue),
    }
}
