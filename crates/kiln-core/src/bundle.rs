//! Deduplicating alert accumulator with a paged, keyboard-driven projection.
//!
//! Entries are kept in display order (oldest first). Appending an alert that
//! is already present bumps its count and moves it to the bottom, so the most
//! recent occurrence is always where the eye lands. Keyboard input only moves
//! the cursor; counts are owned by [`AlertBundle::append`].

use crate::alert::{Alert, AlertKey, Severity};
use crate::events::Key;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Collapsed rows are cut to this many characters.
pub const COLLAPSED_WIDTH: usize = 96;

#[derive(Debug)]
struct Entry {
    alert: Alert,
    key: AlertKey,
    count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRow {
    pub severity: Severity,
    pub message: String,
    pub count: u64,
    pub selected: bool,
    pub expanded: bool,
}

/// Occurrence totals per severity, repeats included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertTotals {
    pub errors: u64,
    pub warnings: u64,
    pub infos: u64,
}

impl AlertTotals {
    pub fn total(&self) -> u64 {
        self.errors + self.warnings + self.infos
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleView {
    pub rows: Vec<AlertRow>,
    pub totals: AlertTotals,
    pub hidden_above: usize,
    pub hidden_below: usize,
}

#[derive(Debug)]
pub struct AlertBundle {
    index: HashMap<AlertKey, u64>,
    entries: BTreeMap<u64, Entry>,
    next_seq: u64,
    totals: AlertTotals,
    // Cursor and window top are sequence keys, so moving an alert to the
    // end never requires counting positions.
    selected: Option<u64>,
    top: Option<u64>,
    hidden_above: usize,
    page_size: usize,
    expanded: Option<AlertKey>,
    // Cursor tracks the newest entry until the user moves it away.
    follow: bool,
}

impl Default for AlertBundle {
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl AlertBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            index: HashMap::new(),
            entries: BTreeMap::new(),
            next_seq: 0,
            totals: AlertTotals::default(),
            selected: None,
            top: None,
            hidden_above: 0,
            page_size: page_size.max(1),
            expanded: None,
            follow: true,
        }
    }

    /// Record one occurrence of `alert`. O(log n) plus one page of cursor work.
    pub fn append(&mut self, alert: Alert) {
        let key = alert.key();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.totals.add(alert.severity());

        let existing = self
            .index
            .get(&key)
            .copied()
            .and_then(|old_seq| self.entries.remove(&old_seq).map(|entry| (old_seq, entry)));

        let entry = match existing {
            Some((old_seq, mut entry)) => {
                entry.count += 1;
                self.unlink(old_seq, seq);
                entry
            }
            None => Entry {
                alert,
                key: key.clone(),
                count: 1,
            },
        };

        self.index.insert(key, seq);
        self.entries.insert(seq, entry);

        if self.top.is_none() {
            self.top = Some(seq);
        }
        if self.follow || self.selected.is_none() {
            self.selected = Some(seq);
        }
        self.scroll_to_selection();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Occurrences of `alert` so far (0 if never seen).
    pub fn count_of(&self, alert: &Alert) -> u64 {
        self.index
            .get(&alert.key())
            .and_then(|seq| self.entries.get(seq))
            .map_or(0, |e| e.count)
    }

    /// Alerts with their counts, in display order.
    pub fn entries(&self) -> impl Iterator<Item = (&Alert, u64)> {
        self.entries.values().map(|e| (&e.alert, e.count))
    }

    pub fn totals(&self) -> AlertTotals {
        self.totals
    }

    /// Apply a navigation key. Returns false for keys the bundle does not own.
    pub fn handle_key(&mut self, key: Key) -> bool {
        let Some(current) = self.selected else {
            return !matches!(key, Key::Cancel);
        };
        let target = match key {
            Key::Cancel => return false,
            Key::Up => self.step_back(current, 1),
            Key::Down => self.step_forward(current, 1),
            Key::PageUp => self.step_back(current, self.page_size),
            Key::PageDown => self.step_forward(current, self.page_size),
            Key::Home => self.first_seq().unwrap_or(current),
            Key::End => self.last_seq().unwrap_or(current),
            Key::Toggle => {
                let key = self.entries.get(&current).map(|e| e.key.clone());
                self.expanded = match (key, self.expanded.take()) {
                    (Some(key), Some(open)) if key == open => None,
                    (key, _) => key,
                };
                current
            }
        };
        self.selected = Some(target);
        self.follow = self.last_seq() == Some(target);
        self.scroll_to_selection();
        true
    }

    pub fn render(&self) -> BundleView {
        let rows: Vec<AlertRow> = match self.top {
            Some(top) => self
                .entries
                .range(top..)
                .take(self.page_size)
                .map(|(seq, entry)| {
                    let expanded = self.expanded.as_ref() == Some(&entry.key);
                    AlertRow {
                        severity: entry.alert.severity(),
                        message: if expanded {
                            entry.alert.message().to_owned()
                        } else {
                            truncate(entry.alert.message(), COLLAPSED_WIDTH)
                        },
                        count: entry.count,
                        selected: self.selected == Some(*seq),
                        expanded,
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        BundleView {
            hidden_below: self
                .entries
                .len()
                .saturating_sub(self.hidden_above + rows.len()),
            rows,
            totals: self.totals,
            hidden_above: self.hidden_above,
        }
    }

    /// Fix up cursor and window after the entry at `old_seq` was removed
    /// ahead of being reinserted as `new_seq`.
    fn unlink(&mut self, old_seq: u64, new_seq: u64) {
        if self.selected == Some(old_seq) {
            self.selected = Some(new_seq);
        }
        match self.top {
            Some(top) if old_seq < top => self.hidden_above -= 1,
            Some(top) if old_seq == top => {
                let next = self.entries.range(old_seq..).next().map(|(seq, _)| *seq);
                self.top = Some(next.unwrap_or(new_seq));
            }
            _ => {}
        }
    }

    fn first_seq(&self) -> Option<u64> {
        self.entries.keys().next().copied()
    }

    fn last_seq(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    fn step_back(&self, from: u64, steps: usize) -> u64 {
        self.entries
            .range(..from)
            .rev()
            .take(steps)
            .last()
            .map_or(from, |(seq, _)| *seq)
    }

    fn step_forward(&self, from: u64, steps: usize) -> u64 {
        self.entries
            .range(from..)
            .skip(1)
            .take(steps)
            .last()
            .map_or(from, |(seq, _)| *seq)
    }

    /// Move the window so it contains the cursor. Every branch walks at most
    /// the distance the cursor moved or one page.
    fn scroll_to_selection(&mut self) {
        let (Some(selected), Some(top)) = (self.selected, self.top) else {
            return;
        };
        if Some(selected) == self.last_seq() {
            let visible = self.page_size.min(self.entries.len());
            self.top = self.entries.keys().rev().nth(visible - 1).copied();
            self.hidden_above = self.entries.len() - visible;
        } else if Some(selected) == self.first_seq() {
            self.top = Some(selected);
            self.hidden_above = 0;
        } else if selected < top {
            self.hidden_above -= self.entries.range(selected..top).count();
            self.top = Some(selected);
        } else if let Some((&past_window, _)) = self.entries.range(top..).nth(self.page_size) {
            if selected >= past_window {
                let new_top = self
                    .entries
                    .range(..=selected)
                    .rev()
                    .nth(self.page_size - 1)
                    .map_or(selected, |(seq, _)| *seq);
                self.hidden_above += self.entries.range(top..new_top).count();
                self.top = Some(new_top);
            }
        }
    }
}

impl AlertTotals {
    fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Info => self.infos += 1,
        }
    }
}

fn truncate(message: &str, width: usize) -> String {
    if message.chars().count() <= width {
        return message.to_owned();
    }
    let mut cut: String = message.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
