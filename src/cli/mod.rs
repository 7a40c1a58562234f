//! Terminal front end for the desk.
#![allow(missing_docs)]

pub mod watch;
