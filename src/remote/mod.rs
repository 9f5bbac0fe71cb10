pub mod todoist;

use crate::error::Result;
use crate::models::{Priority, RemoteLabel, RemoteProject, RemoteTask};

/// Create request for one remote task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTask {
    pub content: String,
    /// ISO `YYYY-MM-DD`.
    pub due_date: Option<String>,
    pub priority: Priority,
    pub labels: Vec<String>,
}

/// Operations the reconciler needs from the remote to-do service.
///
/// Every call may fail with `SyncError::RemoteUnavailable`.
pub trait TaskService {
    fn list_projects(&self) -> Result<Vec<RemoteProject>>;
    fn create_project(&self, name: &str) -> Result<RemoteProject>;
    /// Active (not completed) tasks only.
    fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>>;
    fn create_task(&self, project_id: &str, task: &NewTask) -> Result<RemoteTask>;
    fn complete_task(&self, task_id: &str) -> Result<()>;
    fn list_labels(&self) -> Result<Vec<RemoteLabel>>;
    fn create_label(&self, name: &str) -> Result<RemoteLabel>;
}
