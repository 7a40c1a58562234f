//! Row rendering: application record → display strings, plus HTML fragments.
//!
//! Rendering is pure. Every free-text value is escaped before it is embedded in
//! markup; applicant names come straight from whoever filled in the form.

#![allow(missing_docs)]

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::model::application::ApplicationRecord;

/// Placeholder for absent text fields and dates.
pub const NOT_AVAILABLE: &str = "N/A";

/// Number of table columns; used by placeholder rows.
pub const COLUMN_COUNT: usize = 5;

/// Formatted, display-ready row contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub app_number: String,
    pub applicant_name: String,
    pub amount: String,
    pub date: String,
    pub action_by: String,
}

/// Tracked columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowField {
    ApplicantName,
    Amount,
    Date,
    ActionBy,
}

impl RowView {
    /// Text of one tracked column.
    #[must_use]
    pub fn field(&self, field: RowField) -> &str {
        match field {
            RowField::ApplicantName => &self.applicant_name,
            RowField::Amount => &self.amount,
            RowField::Date => &self.date,
            RowField::ActionBy => &self.action_by,
        }
    }

    fn field_mut(&mut self, field: RowField) -> &mut String {
        match field {
            RowField::ApplicantName => &mut self.applicant_name,
            RowField::Amount => &mut self.amount,
            RowField::Date => &mut self.date,
            RowField::ActionBy => &mut self.action_by,
        }
    }

    /// Copy over only the columns whose text differs. Returns the columns
    /// that were rewritten.
    pub fn patch_from(&mut self, target: &Self) -> Vec<RowField> {
        const FIELDS: [RowField; 4] = [
            RowField::ApplicantName,
            RowField::Amount,
            RowField::Date,
            RowField::ActionBy,
        ];
        let mut touched = Vec::new();
        for field in FIELDS {
            if self.field(field) != target.field(field) {
                target.field(field).clone_into(self.field_mut(field));
                touched.push(field);
            }
        }
        touched
    }
}

/// Render a record into display strings.
#[must_use]
pub fn render(record: &ApplicationRecord) -> RowView {
    RowView {
        app_number: record.app_number.clone(),
        applicant_name: text_or_na(record.applicant_name.as_deref()),
        amount: format_amount(record.amount),
        date: format_date(record.date.as_deref()),
        action_by: text_or_na(record.action_by.as_deref()),
    }
}

fn text_or_na(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// en-US currency-style amount: thousands separators, exactly two decimals,
/// half-cent ties rounded away from zero. Absent amounts render as `0.00`.
#[must_use]
pub fn format_amount(amount: Option<f64>) -> String {
    let value = match amount {
        Some(v) if v.is_finite() => v,
        _ => return "0.00".to_string(),
    };
    let fixed = round_cents(value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.bytes().all(|b| b == b'0');
    let sign = if value < 0.0 && !is_zero { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

/// Two-decimal text of a non-negative amount. Rounds the shortest decimal
/// that reads back as `value`, so `1.005` is a tie like it looks.
fn round_cents(value: f64) -> String {
    Decimal::from_str(&value.to_string()).map_or_else(
        |_| format!("{value:.2}"),
        |exact| {
            let cents = exact.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            format!("{cents:.2}")
        },
    )
}

/// Short en-US date (`M/D/YYYY`) of the timestamp's UTC calendar day.
///
/// Absent or empty dates render as `N/A`; text that is not a recognizable
/// timestamp is shown as-is.
#[must_use]
pub fn format_date(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    parse_date(raw).map_or_else(
        || raw.to_string(),
        |date| date.format("%-m/%-d/%Y").to_string(),
    )
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.date());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if raw.len() >= 10 && raw.bytes().all(|b| b.is_ascii_digit()) {
        let millis: i64 = raw.parse().ok()?;
        return DateTime::<Utc>::from_timestamp_millis(millis).map(|ts| ts.date_naive());
    }
    None
}

/// Escape `& < > " '` for embedding into HTML text or attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// `<tr>` markup for one application row.
#[must_use]
pub fn row_markup(view: &RowView, highlighted: bool) -> String {
    let class = if highlighted { " class=\"row-updated\"" } else { "" };
    let key = escape_html(&view.app_number);
    format!(
        "<tr data-app-number=\"{key}\"{class}>\
         <td class=\"app-number\"><a href=\"javascript:void(0)\" class=\"app-number-link\">{key}</a></td>\
         <td class=\"applicant-name\">{}</td>\
         <td class=\"amount\">{}</td>\
         <td class=\"date\">{}</td>\
         <td class=\"action-by\">{}</td></tr>",
        escape_html(&view.applicant_name),
        escape_html(&view.amount),
        escape_html(&view.date),
        escape_html(&view.action_by),
    )
}

/// Full-width placeholder shown while a list loads.
#[must_use]
pub fn loading_markup() -> String {
    format!("<tr><td colspan=\"{COLUMN_COUNT}\" class=\"loading\">Loading applications...</td></tr>")
}

/// Full-width inline error row carrying the server's message.
#[must_use]
pub fn error_markup(message: &str) -> String {
    format!(
        "<tr><td colspan=\"{COLUMN_COUNT}\" class=\"error\">Error: {}</td></tr>",
        escape_html(message)
    )
}
