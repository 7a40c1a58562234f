//! Domain records: applications, sections, users.

pub mod application;
pub mod section;
pub mod users;
