//! Activity logging: append-only JSONL fed by a dedicated logger thread.

pub mod activity;
pub mod jsonl;
