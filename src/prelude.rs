//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use loan_desk::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{DeskError, Result};

// API
pub use crate::api::ApplicationApi;
pub use crate::api::http::HttpApi;

// Model
pub use crate::model::application::{
    ApiResponse, ApplicationCounts, ApplicationDetail, ApplicationRecord,
};
pub use crate::model::section::{Section, Stage};
pub use crate::model::users::{NewUser, Role, Session, UserAccount};

// Table
pub use crate::table::reconcile::{DisplayedRow, Reconciliation, RowIds, reconcile};
pub use crate::table::row::{RowView, render};
pub use crate::table::view::{Busy, SectionBody, SectionView};

// Sync
pub use crate::sync::sequencer::{FetchToken, Sequencer};

// Engine
pub use crate::engine::badges::BadgeBoard;
pub use crate::engine::controller::{Controller, ControllerSettings};
pub use crate::engine::host::{Collaborators, ModalHost, Notifier, ToastLevel, ToastSink, ViewSink};
pub use crate::engine::jobs::FetchDisposition;
pub use crate::engine::runtime::{Engine, EngineHandle};

// Logger
pub use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
