//! Live terminal desk: the four application tables, sidebar badges, toasts
//! and a modal pane, driven by a running engine.
//!
//! The engine thread writes into a shared [`DeskScreen`] through the host
//! collaborator traits; the UI loop here reads it, renders with `crossterm`
//! and turns keys and focus changes into engine commands. Focus gained and
//! lost map to window visibility.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::cursor::MoveTo;
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use parking_lot::Mutex;
use serde_json::Value;

use crate::core::errors::Result;
use crate::engine::badges::BadgeBoard;
use crate::engine::host::{ModalHost, ToastLevel, ToastSink, ViewSink};
use crate::engine::runtime::EngineHandle;
#[cfg(feature = "signals")]
use crate::engine::signals::SignalHandler;
use crate::model::application::ApplicationDetail;
use crate::model::section::Section;
use crate::table::view::{Busy, SectionBody, SectionView};

/// How long a toast stays on the status line.
const TOAST_TTL: Duration = Duration::from_secs(4);
const MAX_TOASTS: usize = 3;

// ──────────────────── shared screen state ────────────────────

/// Content of the modal pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    NewApplication { draft: Option<String> },
    Details { title: String, lines: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub at: Instant,
    pub level: ToastLevel,
    pub message: String,
}

/// Everything the terminal shows, as last published by the engine.
#[derive(Debug)]
pub struct DeskScreen {
    pub user_label: String,
    pub active: Section,
    pub sections: [SectionView; 4],
    pub badges: BadgeBoard,
    pub toasts: VecDeque<Toast>,
    pub modal: Option<Modal>,
    pub dirty: bool,
}

impl Default for DeskScreen {
    fn default() -> Self {
        Self {
            user_label: String::new(),
            active: Section::Pending,
            sections: Default::default(),
            badges: BadgeBoard::new(),
            toasts: VecDeque::with_capacity(MAX_TOASTS),
            modal: None,
            dirty: false,
        }
    }
}

pub type SharedScreen = Arc<Mutex<DeskScreen>>;

impl DeskScreen {
    #[must_use]
    pub fn shared(user_label: &str) -> SharedScreen {
        Arc::new(Mutex::new(Self {
            user_label: user_label.to_string(),
            dirty: true,
            ..Self::default()
        }))
    }

    fn push_toast(&mut self, level: ToastLevel, message: &str) {
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            at: Instant::now(),
            level,
            message: message.to_string(),
        });
        self.dirty = true;
    }

    fn expire_toasts(&mut self, now: Instant) {
        let before = self.toasts.len();
        self.toasts
            .retain(|toast| now.saturating_duration_since(toast.at) < TOAST_TTL);
        if self.toasts.len() != before {
            self.dirty = true;
        }
    }
}

// ──────────────────── collaborators ────────────────────

/// [`ViewSink`] writing into the shared screen.
pub struct TerminalView(pub SharedScreen);

impl ViewSink for TerminalView {
    fn section_changed(&mut self, section: Section, view: &SectionView) {
        let mut screen = self.0.lock();
        screen.sections[section.index()] = view.clone();
        screen.dirty = true;
    }

    fn badges_changed(&mut self, badges: &BadgeBoard) {
        let mut screen = self.0.lock();
        screen.badges = badges.clone();
        screen.dirty = true;
    }

    fn active_section_changed(&mut self, section: Section) {
        let mut screen = self.0.lock();
        screen.active = section;
        screen.dirty = true;
    }
}

/// [`ModalHost`] rendering forms and detail views in the modal pane.
pub struct TerminalModals(pub SharedScreen);

impl ModalHost for TerminalModals {
    fn open_new_application(&mut self, app_number: Option<&str>) -> Result<()> {
        let mut screen = self.0.lock();
        screen.modal = Some(Modal::NewApplication {
            draft: app_number.map(str::to_string),
        });
        screen.dirty = true;
        Ok(())
    }

    fn open_application_view(&mut self, detail: &ApplicationDetail) -> Result<()> {
        let mut screen = self.0.lock();
        screen.modal = Some(Modal::Details {
            title: format!("Application {}", detail.app_number),
            lines: detail_lines(detail),
        });
        screen.dirty = true;
        Ok(())
    }
}

/// [`ToastSink`] feeding the status line.
pub struct TerminalToasts(pub SharedScreen);

impl ToastSink for TerminalToasts {
    fn toast(&mut self, level: ToastLevel, message: &str) {
        self.0.lock().push_toast(level, message);
    }
}

/// `key: value` lines for the details pane, status fields first.
#[must_use]
pub fn detail_lines(detail: &ApplicationDetail) -> Vec<String> {
    let mut lines = Vec::with_capacity(detail.fields.len() + 2);
    if let Some(status) = &detail.status {
        lines.push(format!("status: {status}"));
    }
    if let Some(completion) = &detail.completion_status {
        lines.push(format!("completionStatus: {completion}"));
    }
    let mut fields: Vec<(&String, &Value)> = detail.fields.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in fields {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Null => "N/A".to_string(),
            other => other.to_string(),
        };
        lines.push(format!("{key}: {value}"));
    }
    lines
}

// ──────────────────── frame model ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Title,
    Dim,
    Highlight,
    Selected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub tone: Tone,
    pub text: String,
}

impl Line {
    fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

const COLUMN_WIDTHS: [usize; 5] = [14, 24, 14, 12, 18];

fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count > width {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    } else {
        format!("{text:<width$}")
    }
}

fn table_row(cells: [&str; 5]) -> String {
    cells
        .iter()
        .zip(COLUMN_WIDTHS)
        .map(|(cell, width)| fit(cell, width))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lay out one frame. `selected` is the cursor row in the active table.
#[must_use]
pub fn render_lines(screen: &DeskScreen, selected: usize) -> Vec<Line> {
    let mut lines = Vec::new();

    let user_badge = screen.badges.user();
    let user_suffix = if user_badge.visible {
        format!("  [{} awaiting you]", user_badge.text)
    } else {
        String::new()
    };
    lines.push(Line::new(
        Tone::Title,
        format!("Loan Desk | {}{user_suffix}", screen.user_label),
    ));

    let tabs: Vec<String> = Section::ALL
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let badge = screen.badges.section(*section);
            let count = if badge.visible {
                format!(" ({})", badge.text)
            } else {
                String::new()
            };
            let label = format!("{} {}{count}", i + 1, section.title());
            if *section == screen.active {
                format!("[{label}]")
            } else {
                format!(" {label} ")
            }
        })
        .collect();
    lines.push(Line::new(Tone::Normal, tabs.join("  ")));

    if let Some(modal) = &screen.modal {
        lines.push(Line::new(Tone::Normal, ""));
        match modal {
            Modal::NewApplication { draft } => {
                let title = draft.as_ref().map_or_else(
                    || "New Application".to_string(),
                    |n| format!("New Application (draft {n})"),
                );
                lines.push(Line::new(Tone::Title, title));
                lines.push(Line::new(
                    Tone::Dim,
                    "Form editing happens in the web desk; Esc closes this pane.",
                ));
            }
            Modal::Details { title, lines: body } => {
                lines.push(Line::new(Tone::Title, title.clone()));
                lines.extend(body.iter().map(|l| Line::new(Tone::Normal, l.clone())));
            }
        }
        lines.push(Line::new(Tone::Dim, "Esc close"));
        return lines;
    }

    let view = &screen.sections[screen.active.index()];
    let mut status = String::new();
    if view.header_spinner {
        status.push_str(" loading...");
    }
    match view.busy {
        Busy::Dimmed => status.push_str(" refreshing..."),
        Busy::Quiet => status.push_str(" syncing"),
        Busy::Idle => {}
    }
    lines.push(Line::new(
        Tone::Title,
        format!("{}{status}", screen.active.title()),
    ));
    lines.push(Line::new(
        Tone::Dim,
        format!(
            "  {}",
            table_row(["App Number", "Applicant", "Amount", "Date", "Action By"])
        ),
    ));

    match &view.body {
        SectionBody::Loading => lines.push(Line::new(Tone::Dim, "  Loading applications...")),
        SectionBody::Error(message) => {
            lines.push(Line::new(Tone::Error, format!("  Error: {message}")));
        }
        SectionBody::Rows(rows) if rows.is_empty() => {
            lines.push(Line::new(Tone::Dim, "  No applications"));
        }
        SectionBody::Rows(rows) => {
            for (i, row) in rows.iter().enumerate() {
                let cursor = if i == selected { '>' } else { ' ' };
                let opening = if view.opening.as_deref() == Some(row.key.as_str()) {
                    " ..."
                } else {
                    ""
                };
                let tone = if i == selected {
                    Tone::Selected
                } else if row.highlighted {
                    Tone::Highlight
                } else {
                    Tone::Normal
                };
                let v = &row.view;
                lines.push(Line::new(
                    tone,
                    format!(
                        "{cursor} {}{opening}",
                        table_row([
                            &v.app_number,
                            &v.applicant_name,
                            &v.amount,
                            &v.date,
                            &v.action_by
                        ])
                    ),
                ));
            }
        }
    }

    lines.push(Line::new(Tone::Normal, ""));
    for toast in &screen.toasts {
        let tone = match toast.level {
            ToastLevel::Error | ToastLevel::Warning => Tone::Error,
            ToastLevel::Info | ToastLevel::Success => Tone::Highlight,
        };
        lines.push(Line::new(tone, format!("[{}] {}", toast.level, toast.message)));
    }
    lines.push(Line::new(
        Tone::Dim,
        "1-4 section  r refresh  j/k move  Enter open  n new  q quit",
    ));
    lines
}

// ──────────────────── main loop ────────────────────

/// Run the desk until the user quits or a shutdown signal arrives.
pub fn run(
    handle: &EngineHandle,
    screen: &SharedScreen,
    #[cfg(feature = "signals")] signals: &SignalHandler,
) -> io::Result<()> {
    let mut stdout = io::stdout();
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;

    let result = run_inner(
        &mut stdout,
        handle,
        screen,
        #[cfg(feature = "signals")]
        signals,
    );

    let _ = execute!(stdout, DisableFocusChange, LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    result
}

fn run_inner(
    stdout: &mut io::Stdout,
    handle: &EngineHandle,
    screen: &SharedScreen,
    #[cfg(feature = "signals")] signals: &SignalHandler,
) -> io::Result<()> {
    let mut selected = [0_usize; 4];

    loop {
        #[cfg(feature = "signals")]
        {
            if signals.should_shutdown() {
                return Ok(());
            }
            if signals.should_refresh() {
                let active = screen.lock().active;
                let _ = handle.refresh(active);
            }
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    let active = screen.lock().active;
                    let row_count = screen.lock().sections[active.index()].rows().len();
                    let cursor = &mut selected[active.index()];
                    match key.code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(());
                        }
                        KeyCode::Esc => {
                            let mut s = screen.lock();
                            if s.modal.take().is_none() {
                                return Ok(());
                            }
                            s.dirty = true;
                        }
                        KeyCode::Char(c @ '1'..='4') => {
                            let index = usize::from(c as u8 - b'1');
                            let _ = handle.show_section(Section::ALL[index]);
                        }
                        KeyCode::Char('r') => {
                            let _ = handle.refresh(active);
                        }
                        KeyCode::Char('n') => {
                            let _ = handle.open_new_application();
                        }
                        KeyCode::Char('j') | KeyCode::Down => {
                            *cursor = (*cursor + 1).min(row_count.saturating_sub(1));
                            screen.lock().dirty = true;
                        }
                        KeyCode::Char('k') | KeyCode::Up => {
                            *cursor = cursor.saturating_sub(1);
                            screen.lock().dirty = true;
                        }
                        KeyCode::Enter => {
                            let app_number = screen.lock().sections[active.index()]
                                .rows()
                                .get(*cursor)
                                .map(|row| row.key.clone())
                                .unwrap_or_default();
                            let _ = handle.on_application_number_activated(&app_number);
                        }
                        _ => {}
                    }
                }
                Event::FocusGained => {
                    let _ = handle.set_visibility(true);
                }
                Event::FocusLost => {
                    let _ = handle.set_visibility(false);
                }
                Event::Resize(..) => screen.lock().dirty = true,
                _ => {}
            }
        }

        let frame = {
            let mut s = screen.lock();
            s.expire_toasts(Instant::now());
            if !s.dirty {
                continue;
            }
            s.dirty = false;
            let active = s.active.index();
            let rows = s.sections[active].rows().len();
            selected[active] = selected[active].min(rows.saturating_sub(1));
            render_lines(&s, selected[active])
        };
        draw(stdout, &frame)?;
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Normal => Color::Reset,
        Tone::Title => Color::Cyan,
        Tone::Dim => Color::DarkGrey,
        Tone::Highlight => Color::Yellow,
        Tone::Selected => Color::Green,
        Tone::Error => Color::Red,
    }
}

fn draw(stdout: &mut io::Stdout, frame: &[Line]) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    queue!(stdout, Clear(ClearType::All))?;
    for (row, line) in frame.iter().take(usize::from(rows)).enumerate() {
        let text: String = line.text.chars().take(usize::from(cols)).collect();
        let y = u16::try_from(row).unwrap_or(u16::MAX);
        queue!(stdout, MoveTo(0, y), SetForegroundColor(tone_color(line.tone)))?;
        if line.tone == Tone::Title {
            queue!(stdout, SetAttribute(Attribute::Bold))?;
        }
        write!(stdout, "{text}")?;
        queue!(stdout, SetAttribute(Attribute::Reset))?;
    }
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::application::{ApplicationCounts, ApplicationRecord};
    use crate::table::reconcile::{RowIds, reconcile};

    fn screen_with_rows(records: &[ApplicationRecord]) -> DeskScreen {
        let mut screen = DeskScreen {
            user_label: "alice (Approver)".to_string(),
            ..DeskScreen::default()
        };
        let mut ids = RowIds::new();
        screen.sections[Section::Pending.index()].body =
            SectionBody::Rows(reconcile(Vec::new(), records, &mut ids).rows);
        screen
    }

    #[test]
    fn tabs_show_counts_and_active_marker() {
        let mut screen = screen_with_rows(&[]);
        screen.badges.apply_counts(&ApplicationCounts {
            pending: 5,
            ..ApplicationCounts::default()
        });
        let lines = render_lines(&screen, 0);
        assert!(lines[0].text.contains("alice (Approver)"));
        assert!(lines[1].text.contains("[2 Pending (5)]"));
        assert!(lines[1].text.contains(" 1 New "));
    }

    #[test]
    fn selected_row_wins_over_highlight() {
        let screen = screen_with_rows(&[
            ApplicationRecord::new("A1").with_amount(1000.5),
            ApplicationRecord::new("A2"),
        ]);
        let lines = render_lines(&screen, 1);
        let a1 = lines.iter().find(|l| l.text.contains("A1")).unwrap();
        let a2 = lines.iter().find(|l| l.text.contains("A2")).unwrap();
        assert_eq!(a1.tone, Tone::Highlight);
        assert!(a1.text.contains("1,000.50"));
        assert_eq!(a2.tone, Tone::Selected);
        assert!(a2.text.starts_with('>'));
    }

    #[test]
    fn error_body_renders_message() {
        let mut screen = screen_with_rows(&[]);
        screen.sections[Section::Pending.index()].body = SectionBody::Error("Sheet locked".into());
        let lines = render_lines(&screen, 0);
        assert!(
            lines
                .iter()
                .any(|l| l.tone == Tone::Error && l.text.contains("Error: Sheet locked"))
        );
    }

    #[test]
    fn modal_replaces_table() {
        let shared = DeskScreen::shared("bob");
        let mut modals = TerminalModals(Arc::clone(&shared));
        modals.open_new_application(Some("APP-7")).unwrap();
        let lines = render_lines(&shared.lock(), 0);
        assert!(lines.iter().any(|l| l.text == "New Application (draft APP-7)"));
        assert!(!lines.iter().any(|l| l.text.contains("App Number")));
    }

    #[test]
    fn toasts_are_capped_and_expire() {
        let mut screen = DeskScreen::default();
        for i in 0..5 {
            screen.push_toast(ToastLevel::Error, &format!("t{i}"));
        }
        assert_eq!(screen.toasts.len(), MAX_TOASTS);
        assert_eq!(screen.toasts[0].message, "t2");
        screen.expire_toasts(Instant::now() + TOAST_TTL);
        assert!(screen.toasts.is_empty());
    }

    #[test]
    fn fit_truncates_long_cells() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdefgh", 5), "abcd~");
    }
}
