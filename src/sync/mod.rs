//! Request sequencing and deadline timers used by the refresh engine.

pub mod sequencer;
pub mod timers;
