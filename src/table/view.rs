//! View model for one application list section.

#![allow(missing_docs)]

use serde::Serialize;

use crate::table::reconcile::{DisplayedRow, RowId};
use crate::table::row::{error_markup, loading_markup, row_markup};

/// What occupies the list body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SectionBody {
    Rows(Vec<DisplayedRow>),
    /// Full "Loading applications..." placeholder.
    #[default]
    Loading,
    /// Inline error row with the server-provided message.
    Error(String),
}

/// Busy indication that keeps the current rows visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Busy {
    #[default]
    Idle,
    /// Manual refresh without placeholder: rows dimmed.
    Dimmed,
    /// Background poll: marked busy for assistive tech only.
    Quiet,
}

/// How a section fetch presents itself while in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetchOptions {
    /// Replace the body with the loading placeholder (manual fetches only).
    pub show_loading: bool,
    /// Background poll: quiet busy state, failures are logged only.
    pub auto_refresh: bool,
}

impl FetchOptions {
    pub const MANUAL: Self = Self {
        show_loading: true,
        auto_refresh: false,
    };
    pub const AUTO: Self = Self {
        show_loading: false,
        auto_refresh: true,
    };
}

/// Everything a host needs to draw one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SectionView {
    pub body: SectionBody,
    pub busy: Busy,
    /// "Updating..." spinner in the section header.
    pub header_spinner: bool,
    /// Application whose details are being fetched (inline spinner).
    pub opening: Option<String>,
}

impl SectionView {
    /// Enter the in-flight state for a fetch. Only a manual fetch with the
    /// placeholder drops the rows; everything else keeps them visible.
    pub fn begin_fetch(&mut self, options: FetchOptions) {
        if options.show_loading && !options.auto_refresh {
            self.body = SectionBody::Loading;
            self.busy = Busy::Idle;
            self.header_spinner = true;
        } else if options.auto_refresh {
            self.busy = Busy::Quiet;
        } else {
            self.busy = Busy::Dimmed;
        }
    }

    /// Rows currently displayed; empty while a placeholder is shown.
    #[must_use]
    pub fn rows(&self) -> &[DisplayedRow] {
        match &self.body {
            SectionBody::Rows(rows) => rows,
            SectionBody::Loading | SectionBody::Error(_) => &[],
        }
    }

    /// Take the displayed rows out for reconciliation, leaving a placeholder.
    pub fn take_rows(&mut self) -> Vec<DisplayedRow> {
        match std::mem::take(&mut self.body) {
            SectionBody::Rows(rows) => rows,
            SectionBody::Loading | SectionBody::Error(_) => Vec::new(),
        }
    }

    /// Remove the highlight marker from a row. Returns `false` if the row is
    /// gone or was not highlighted.
    pub fn clear_highlight(&mut self, id: RowId) -> bool {
        let SectionBody::Rows(rows) = &mut self.body else {
            return false;
        };
        match rows.iter_mut().find(|row| row.id == id) {
            Some(row) if row.highlighted => {
                row.highlighted = false;
                true
            }
            _ => false,
        }
    }

    /// Whether any row with this key is displayed.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.rows().iter().any(|row| row.key == key)
    }

    /// `<tbody>` inner markup.
    #[must_use]
    pub fn to_markup(&self) -> String {
        match &self.body {
            SectionBody::Rows(rows) => rows
                .iter()
                .map(|row| row_markup(&row.view, row.highlighted))
                .collect::<Vec<_>>()
                .join("\n"),
            SectionBody::Loading => loading_markup(),
            SectionBody::Error(message) => error_markup(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::application::ApplicationRecord;
    use crate::table::reconcile::{RowIds, reconcile};

    fn view_with(keys: &[&str]) -> SectionView {
        let mut ids = RowIds::new();
        let records: Vec<ApplicationRecord> =
            keys.iter().map(|k| ApplicationRecord::new(*k)).collect();
        SectionView {
            body: SectionBody::Rows(reconcile(Vec::new(), &records, &mut ids).rows),
            ..SectionView::default()
        }
    }

    #[test]
    fn default_view_is_loading_placeholder() {
        let view = SectionView::default();
        assert!(view.rows().is_empty());
        assert!(view.to_markup().contains("Loading applications..."));
    }

    #[test]
    fn clear_highlight_is_best_effort() {
        let mut view = view_with(&["A1", "A2"]);
        let id = view.rows()[0].id;
        assert!(view.clear_highlight(id));
        assert!(!view.clear_highlight(id), "second removal is a no-op");

        view.body = SectionBody::Error("boom".into());
        assert!(!view.clear_highlight(id));
    }

    #[test]
    fn take_rows_leaves_placeholder() {
        let mut view = view_with(&["A1"]);
        assert_eq!(view.take_rows().len(), 1);
        assert_eq!(view.body, SectionBody::Loading);
        view.body = SectionBody::Error("x".into());
        assert!(view.take_rows().is_empty());
    }

    #[test]
    fn fetch_presentation_follows_options() {
        let mut view = view_with(&["A1"]);
        view.begin_fetch(FetchOptions::AUTO);
        assert_eq!(view.busy, Busy::Quiet);
        assert_eq!(view.rows().len(), 1);
        assert!(!view.header_spinner);

        view.begin_fetch(FetchOptions {
            show_loading: false,
            auto_refresh: false,
        });
        assert_eq!(view.busy, Busy::Dimmed);
        assert_eq!(view.rows().len(), 1);

        // A poll never blanks the table, whatever it asks for.
        view.begin_fetch(FetchOptions {
            show_loading: true,
            auto_refresh: true,
        });
        assert_eq!(view.busy, Busy::Quiet);
        assert_eq!(view.rows().len(), 1);

        view.begin_fetch(FetchOptions::MANUAL);
        assert_eq!(view.body, SectionBody::Loading);
        assert_eq!(view.busy, Busy::Idle);
        assert!(view.header_spinner);
    }

    #[test]
    fn markup_renders_every_row() {
        let view = view_with(&["A1", "A2"]);
        let html = view.to_markup();
        assert_eq!(html.matches("<tr").count(), 2);
        assert!(view.contains_key("A2"));
        assert!(!view.contains_key("A3"));
    }
}
