//! Sidebar badges: one per section plus the signed-in user's pending count.

#![allow(missing_docs)]

use serde::Serialize;

use crate::model::application::ApplicationCounts;
use crate::model::section::Section;

/// Largest user count shown verbatim; anything above renders as `99+`.
pub const USER_BADGE_CAP: u64 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Badge {
    pub text: String,
    pub visible: bool,
}

impl Badge {
    fn count(n: u64) -> Self {
        Self {
            text: n.to_string(),
            visible: n > 0,
        }
    }

    fn capped(n: u64) -> Self {
        let text = if n > USER_BADGE_CAP {
            format!("{USER_BADGE_CAP}+")
        } else {
            n.to_string()
        };
        Self {
            text,
            visible: n > 0,
        }
    }
}

/// Current badge state. Counts are applied as they arrive; the last
/// response wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BadgeBoard {
    sections: [Badge; 4],
    user: Badge,
}

impl BadgeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every section badge; zero hides the badge.
    pub fn apply_counts(&mut self, counts: &ApplicationCounts) {
        for section in Section::ALL {
            self.sections[section.index()] = Badge::count(counts.for_section(section));
        }
    }

    /// Set the user badge; zero hides it, above 99 shows `99+`.
    pub fn apply_user_count(&mut self, count: u64) {
        self.user = Badge::capped(count);
    }

    #[must_use]
    pub fn section(&self, section: Section) -> &Badge {
        &self.sections[section.index()]
    }

    #[must_use]
    pub const fn user(&self) -> &Badge {
        &self.user
    }

    /// Short `new=1 pending=5 ...` summary for the activity log.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Section::ALL
            .iter()
            .map(|s| format!("{}={}", s.id(), self.section(*s).text))
            .collect();
        parts.push(format!("user={}", self.user.text));
        parts.join(" ")
    }
}
