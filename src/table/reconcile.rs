//! Keyed list reconciliation.
//!
//! Transforms the rows currently on screen into the rows for the latest fetch
//! with the fewest changes: rows whose key survives keep their identity and
//! are patched column by column, new keys get fresh rows, vanished keys are
//! dropped. Output order always follows the fetch, so this is a reorder, not
//! a stable merge.
//!
//! Row identity is a [`RowId`] handed out by [`RowIds`]. Hosts attach their
//! own per-row UI state (focus, animations, inline spinners) to that id.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::model::application::ApplicationRecord;
use crate::table::row::{RowView, render};

/// Identity of a displayed row, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowId(u64);

impl RowId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

/// Monotonic [`RowId`] allocator.
#[derive(Debug, Default)]
pub struct RowIds {
    next: u64,
}

impl RowIds {
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    pub fn allocate(&mut self) -> RowId {
        self.next += 1;
        RowId(self.next)
    }
}

/// A live row keyed by application number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayedRow {
    pub id: RowId,
    pub key: String,
    pub view: RowView,
    /// Transient "just changed" marker; cleared by the highlight expiry.
    pub highlighted: bool,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Rows in target order.
    pub rows: Vec<DisplayedRow>,
    /// Rows that were created or had at least one column rewritten.
    pub changed: Vec<RowId>,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

impl Reconciliation {
    /// Rows that came through untouched.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.rows.len() - self.changed.len()
    }
}

/// Reconcile `existing` rows against the latest fetched `targets`.
///
/// When `existing` holds the same key more than once, the first occurrence
/// wins and the rest are discarded. Callers must supply unique keys; nothing
/// here tries to merge duplicates.
#[must_use]
pub fn reconcile(
    existing: Vec<DisplayedRow>,
    targets: &[ApplicationRecord],
    ids: &mut RowIds,
) -> Reconciliation {
    let mut index: HashMap<String, DisplayedRow> = HashMap::with_capacity(existing.len());
    let mut duplicates = 0usize;
    for row in existing {
        if index.contains_key(&row.key) {
            duplicates += 1;
        } else {
            index.insert(row.key.clone(), row);
        }
    }

    let mut out = Reconciliation {
        rows: Vec::with_capacity(targets.len()),
        ..Reconciliation::default()
    };

    for record in targets {
        let target = render(record);
        match index.remove(&record.app_number) {
            Some(mut row) => {
                if !row.view.patch_from(&target).is_empty() {
                    row.highlighted = true;
                    out.changed.push(row.id);
                    out.updated += 1;
                }
                out.rows.push(row);
            }
            None => {
                let row = DisplayedRow {
                    id: ids.allocate(),
                    key: record.app_number.clone(),
                    view: target,
                    highlighted: true,
                };
                out.changed.push(row.id);
                out.created += 1;
                out.rows.push(row);
            }
        }
    }

    out.removed = index.len() + duplicates;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(key: &str, amount: f64) -> ApplicationRecord {
        ApplicationRecord::new(key)
            .with_applicant(format!("Applicant {key}"))
            .with_amount(amount)
    }

    fn settle(mut rows: Vec<DisplayedRow>) -> Vec<DisplayedRow> {
        for row in &mut rows {
            row.highlighted = false;
        }
        rows
    }

    #[test]
    fn unchanged_record_keeps_row_without_marker() {
        let mut ids = RowIds::new();
        let first = reconcile(Vec::new(), &[rec("A1", 1000.5)], &mut ids);
        assert_eq!(first.created, 1);
        let id = first.rows[0].id;

        let second = reconcile(settle(first.rows), &[rec("A1", 1000.5)], &mut ids);
        assert!(second.changed.is_empty());
        assert_eq!(second.rows[0].id, id);
        assert!(!second.rows[0].highlighted);

        let third = reconcile(second.rows, &[rec("A1", 2000.0)], &mut ids);
        assert_eq!(third.changed, vec![id]);
        assert_eq!(third.rows[0].view.amount, "2,000.00");
        assert!(third.rows[0].highlighted);
        assert_eq!(third.updated, 1);
    }

    #[test]
    fn rows_follow_target_order_and_drop_missing_keys() {
        let mut ids = RowIds::new();
        let first = reconcile(
            Vec::new(),
            &[rec("A1", 1.0), rec("A2", 2.0), rec("A3", 3.0)],
            &mut ids,
        );
        let a3 = first.rows[2].id;
        let a1 = first.rows[0].id;

        let second = reconcile(
            settle(first.rows),
            &[rec("A3", 3.0), rec("A1", 1.0)],
            &mut ids,
        );
        let keys: Vec<&str> = second.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A3", "A1"]);
        assert_eq!(second.rows[0].id, a3);
        assert_eq!(second.rows[1].id, a1);
        assert_eq!(second.removed, 1);
        assert!(second.changed.is_empty());
    }

    #[test]
    fn key_readded_after_gap_gets_fresh_identity() {
        let mut ids = RowIds::new();
        let first = reconcile(Vec::new(), &[rec("A1", 1.0)], &mut ids);
        let original = first.rows[0].id;
        let gone = reconcile(first.rows, &[], &mut ids);
        assert!(gone.rows.is_empty());
        assert_eq!(gone.removed, 1);

        let back = reconcile(gone.rows, &[rec("A1", 1.0)], &mut ids);
        assert_ne!(back.rows[0].id, original);
        assert_eq!(back.changed, vec![back.rows[0].id]);
    }

    #[test]
    fn duplicate_existing_keys_keep_first_occurrence() {
        let mut ids = RowIds::new();
        let a = reconcile(Vec::new(), &[rec("A1", 1.0)], &mut ids).rows;
        let b = reconcile(Vec::new(), &[rec("A1", 9.0)], &mut ids).rows;
        let first_id = a[0].id;
        let existing = vec![a[0].clone(), b[0].clone()];

        let out = reconcile(settle(existing), &[rec("A1", 1.0)], &mut ids);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].id, first_id);
        assert!(out.changed.is_empty());
        assert_eq!(out.removed, 1);
    }

    #[test]
    fn unchanged_row_keeps_pending_marker_until_expiry() {
        let mut ids = RowIds::new();
        let first = reconcile(Vec::new(), &[rec("A1", 1.0)], &mut ids);
        let second = reconcile(first.rows, &[rec("A1", 1.0)], &mut ids);
        assert!(second.changed.is_empty());
        assert!(second.rows[0].highlighted, "marker removal belongs to the expiry timer");
    }

    fn arb_records() -> impl Strategy<Value = Vec<ApplicationRecord>> {
        prop::collection::btree_map("[A-F][0-9]", (0u32..5000, proptest::option::of("[a-z]{1,6}")), 0..12)
            .prop_map(|entries| {
                entries
                    .into_iter()
                    .map(|(key, (cents, name))| {
                        let mut r = ApplicationRecord::new(key).with_amount(f64::from(cents) / 100.0);
                        r.applicant_name = name;
                        r
                    })
                    .collect()
            })
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn reconciling_same_list_twice_marks_nothing(targets in arb_records(), seed in arb_records()) {
            let mut ids = RowIds::new();
            let start = reconcile(Vec::new(), &seed, &mut ids).rows;
            let once = reconcile(start, &targets, &mut ids);
            let twice = reconcile(once.rows, &targets, &mut ids);
            prop_assert!(twice.changed.is_empty());
            prop_assert_eq!(twice.created, 0);
            prop_assert_eq!(twice.removed, 0);
        }

        #[test]
        fn output_matches_targets_and_preserves_identity(before in arb_records(), after in arb_records()) {
            let mut ids = RowIds::new();
            let start = reconcile(Vec::new(), &before, &mut ids).rows;
            let old_ids: HashMap<String, RowId> =
                start.iter().map(|r| (r.key.clone(), r.id)).collect();

            let out = reconcile(start, &after, &mut ids);
            prop_assert_eq!(out.rows.len(), after.len());
            for (row, record) in out.rows.iter().zip(&after) {
                prop_assert_eq!(&row.key, &record.app_number);
                prop_assert_eq!(&row.view, &render(record));
                if let Some(old) = old_ids.get(&row.key) {
                    prop_assert_eq!(row.id, *old);
                } else {
                    prop_assert!(out.changed.contains(&row.id));
                }
            }
            let kept = after.iter().filter(|r| old_ids.contains_key(&r.app_number)).count();
            prop_assert_eq!(out.removed, old_ids.len() - kept);
        }
    }
}
