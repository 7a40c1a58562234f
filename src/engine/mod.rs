//! Refresh engine: the deterministic controller and the thread that drives it.

pub mod alerts;
pub mod badges;
pub mod controller;
pub mod desktop;
pub mod host;
pub mod jobs;
pub mod runtime;
#[cfg(feature = "signals")]
pub mod signals;
