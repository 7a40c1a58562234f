//! Units of API work the controller hands to worker threads, and the
//! completions they post back.

#![allow(missing_docs)]

use serde::Serialize;

use crate::api::ApplicationApi;
use crate::core::errors::Result;
use crate::model::application::{
    ApiResponse, ApplicationCounts, ApplicationDetail, ApplicationRecord,
};
use crate::model::section::Stage;
use crate::sync::sequencer::FetchToken;

pub use crate::table::view::FetchOptions;

/// What a user pending-count fetch feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPurpose {
    /// The sidebar user badge.
    Badge,
    /// Silent notification baseline.
    Baseline,
    /// Periodic new-assignment check.
    DeltaCheck,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Section {
        token: FetchToken,
        stage: Stage,
        options: FetchOptions,
    },
    Counts,
    UserCount {
        user: String,
        purpose: CountPurpose,
    },
    Details {
        app_number: String,
        user: String,
    },
}

/// A job tagged with the session epoch it was issued in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub epoch: u64,
    pub kind: JobKind,
}

#[derive(Debug)]
pub enum OutcomeKind {
    Section {
        token: FetchToken,
        options: FetchOptions,
        result: Result<Vec<ApplicationRecord>>,
    },
    Counts(Result<ApplicationCounts>),
    UserCount {
        purpose: CountPurpose,
        result: Result<u64>,
    },
    Details {
        app_number: String,
        result: Result<ApiResponse<ApplicationDetail>>,
    },
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub epoch: u64,
    pub kind: OutcomeKind,
}

/// What the controller did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDisposition {
    Applied,
    Failed,
    /// Superseded by a newer fetch or a teardown; nothing was touched.
    Stale,
}

/// Message shown when the server rejects a list fetch without saying why.
pub const UNKNOWN_ERROR: &str = "Unknown error";

impl FetchJob {
    /// Run the job against `api`. Blocking.
    pub fn execute(self, api: &dyn ApplicationApi) -> FetchOutcome {
        let kind = match self.kind {
            JobKind::Section {
                token,
                stage,
                options,
            } => OutcomeKind::Section {
                token,
                options,
                result: api.fetch_applications(&stage).and_then(|resp| {
                    resp.into_result("applications", UNKNOWN_ERROR)
                        .map(Option::unwrap_or_default)
                }),
            },
            JobKind::Counts => OutcomeKind::Counts(api.fetch_application_counts().and_then(
                |resp| {
                    resp.into_result("applications/counts", UNKNOWN_ERROR)
                        .map(Option::unwrap_or_default)
                },
            )),
            JobKind::UserCount { user, purpose } => OutcomeKind::UserCount {
                purpose,
                result: api.fetch_user_pending_count(&user).map(|c| c.count),
            },
            JobKind::Details { app_number, user } => {
                let result = api.fetch_application_details(&app_number, &user);
                OutcomeKind::Details { app_number, result }
            }
        };
        FetchOutcome {
            epoch: self.epoch,
            kind,
        }
    }
}
