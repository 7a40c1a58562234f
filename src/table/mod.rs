//! Application tables: row rendering, keyed reconciliation, section view model.

pub mod reconcile;
pub mod row;
pub mod view;
