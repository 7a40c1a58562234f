//! Remote application service client.
//!
//! [`ApplicationApi`] is the seam the engine and CLI talk through; [`http::HttpApi`]
//! is the production implementation. Tests substitute in-memory fakes.

pub mod http;

use serde_json::Value;

use crate::core::errors::Result;
use crate::model::application::{
    ApiResponse, ApplicationCounts, ApplicationDetail, ApplicationRecord, UserPendingCount,
};
use crate::model::section::Stage;
use crate::model::users::{LoginResponse, NewUser, UserAccount};

/// Every call the desk makes against the application service.
///
/// Implementations block; the engine runs them on worker threads.
pub trait ApplicationApi: Send + Sync {
    fn login(&self, name: &str) -> Result<LoginResponse>;

    /// Applications currently at `stage`.
    fn fetch_applications(&self, stage: &Stage) -> Result<ApiResponse<Vec<ApplicationRecord>>>;

    fn fetch_application_counts(&self) -> Result<ApiResponse<ApplicationCounts>>;

    /// Applications awaiting `user`'s action.
    fn fetch_user_pending_count(&self, user: &str) -> Result<UserPendingCount>;

    fn fetch_application_details(
        &self,
        app_number: &str,
        user: &str,
    ) -> Result<ApiResponse<ApplicationDetail>>;

    fn list_users(&self) -> Result<ApiResponse<Vec<UserAccount>>>;

    fn add_user(&self, user: &NewUser) -> Result<ApiResponse<Value>>;

    fn delete_user(&self, name: &str) -> Result<ApiResponse<Value>>;
}
