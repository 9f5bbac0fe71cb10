//! Mirrors scraped to-do items into a Todoist project.
//!
//! Scraped rows are encoded to single lines by [`title_codec`], stored one per
//! line by [`storage`], and reconciled against the remote project by
//! [`reconcile`].

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod remote;
pub mod scrape;
pub mod storage;
pub mod title_codec;

pub use error::{Result, SyncError};
pub use models::{Priority, RawObservedTask, RemoteTask, TaskSource};
pub use reconcile::{
    ClosureMatch, ReconciliationPlan, Reconciler, SyncSettings, SyncSummary, apply, plan,
};
pub use remote::{NewTask, TaskService};
