//! Per-section request sequencing.
//!
//! Every fetch for a section takes a [`FetchToken`] carrying the section's new
//! generation. A completion may only be applied while its token is still the
//! latest one issued for that section; anything older is inert, success or
//! failure. Nothing is cancelled: superseded requests run to completion and
//! are simply ignored.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::model::section::Section;

/// Ticket tying a completion back to the fetch that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FetchToken {
    pub section: Section,
    pub generation: u64,
}

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.section, self.generation)
    }
}

/// Sequencing state for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SectionState {
    pub generation: u64,
    pub loading: bool,
}

/// Owner of all per-section generation counters.
#[derive(Debug, Default)]
pub struct Sequencer {
    states: HashMap<Section, SectionState>,
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch: bump the generation, mark loading, hand out the token.
    pub fn begin_fetch(&mut self, section: Section) -> FetchToken {
        let state = self.states.entry(section).or_default();
        state.generation += 1;
        state.loading = true;
        FetchToken {
            section,
            generation: state.generation,
        }
    }

    /// Whether `token` is still the latest fetch for `section`.
    #[must_use]
    pub fn is_current(&self, section: Section, token: FetchToken) -> bool {
        token.section == section
            && self
                .states
                .get(&section)
                .is_some_and(|state| state.generation == token.generation)
    }

    /// Mark the fetch behind `token` as finished. Only the current token may
    /// clear the loading flag; a stale one leaves it to the newer fetch.
    /// Returns whether the token was current.
    pub fn settle(&mut self, token: FetchToken) -> bool {
        match self.states.get_mut(&token.section) {
            Some(state) if state.generation == token.generation => {
                state.loading = false;
                true
            }
            _ => false,
        }
    }

    /// Supersede every outstanding fetch. Used on session teardown so late
    /// completions cannot touch the next session's tables.
    pub fn invalidate_all(&mut self) {
        for state in self.states.values_mut() {
            state.generation += 1;
            state.loading = false;
        }
    }

    /// Snapshot of one section's state.
    #[must_use]
    pub fn state(&self, section: Section) -> SectionState {
        self.states.get(&section).copied().unwrap_or_default()
    }

    /// Whether the latest fetch for `section` is still in flight.
    #[must_use]
    pub fn is_loading(&self, section: Section) -> bool {
        self.state(section).loading
    }
}
