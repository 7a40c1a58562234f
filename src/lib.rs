#![forbid(unsafe_code)]

//! Loan Desk (ldk): a desk client for a loan application approval service.
//!
//! The desk keeps four application tables (New, Pending, Pending Approvals,
//! Approved) in sync with the service:
//! 1. **Reconciliation** patches displayed rows in place by application
//!    number and highlights only rows whose content changed
//! 2. **Fetch sequencing** drops responses superseded by a newer fetch
//! 3. **Refresh engine** polls the active section while the window is
//!    visible, debounces manual refreshes and watches for new assignments
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use loan_desk::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use loan_desk::core::config::Config;
//! use loan_desk::table::reconcile::{RowIds, reconcile};
//! ```

pub mod prelude;

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod engine;
pub mod logger;
pub mod model;
pub mod sync;
pub mod table;
