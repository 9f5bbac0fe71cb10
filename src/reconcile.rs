//! Diff scraped task lines against the remote project and apply the result.
//!
//! # Invariants
//! - `plan` is pure: it only reads the lines and one snapshot of remote tasks.
//! - A cleaned title already present remotely is never planned for creation.
//! - `apply` never aborts on a single item; failures are collected.
//! - Setup (project, task snapshot, labels) fails the whole run before any
//!   create or close is issued.

use crate::error::{Result, SyncError};
use crate::models::{Priority, RawObservedTask, RemoteProject, RemoteTask};
use crate::remote::{NewTask, TaskService};
use crate::title_codec;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a remote task is judged to still be present in the latest scrape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureMatch {
    /// Exact match against the decoded cleaned titles of all scrape lines.
    #[default]
    CleanedTitle,
    /// Remote content appears as a substring of any raw scrape line. Only this
    /// mode keeps a remote task open when its content is a fragment of a line.
    Substring,
}

impl ClosureMatch {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "cleaned_title" | "title" | "exact" => Some(ClosureMatch::CleanedTitle),
            "substring" => Some(ClosureMatch::Substring),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SyncSettings {
    pub remote_token: String,
    pub project_name: String,
    pub required_labels: Vec<String>,
    pub closure_match: ClosureMatch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedTask {
    /// Encoded line as read from the scrape output.
    pub line: String,
    pub decoded: RawObservedTask,
    pub request: NewTask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPresent,
    DuplicateInBatch,
    EmptyTitle,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::AlreadyPresent => "already_present",
            SkipReason::DuplicateInBatch => "duplicate_in_batch",
            SkipReason::EmptyTitle => "empty_title",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedTask {
    pub line: String,
    pub title: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<PlannedTask>,
    pub to_close: Vec<RemoteTask>,
    pub skipped: Vec<SkippedTask>,
}

impl ReconciliationPlan {
    /// Label names referenced by planned creations, in first-use order.
    pub fn referenced_labels(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for planned in &self.to_create {
            for label in &planned.request.labels {
                if seen.insert(label.as_str()) {
                    labels.push(label.clone());
                }
            }
        }
        labels
    }

    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_close.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Close,
}

impl SyncAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Close => "close",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFailure {
    pub title: String,
    pub action: SyncAction,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub closed: usize,
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
}

impl SyncSummary {
    pub fn summary(&self) -> String {
        format!(
            "Added {} | Closed {} | Skipped {} | Failed {}",
            self.created,
            self.closed,
            self.skipped,
            self.failures.len()
        )
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Computes creates and closes for one run from a single remote snapshot.
pub fn plan(
    lines: &[String],
    remote_tasks: &[RemoteTask],
    closure_match: ClosureMatch,
) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();
    let remote_titles: HashSet<&str> = remote_tasks
        .iter()
        .filter(|task| !task.is_completed)
        .map(|task| task.content.as_str())
        .collect();
    let mut scraped_titles: HashSet<String> = HashSet::new();

    for line in lines {
        let decoded = title_codec::decode(line);
        let title = decoded.base_title.clone();

        let reason = if title.is_empty() {
            Some(SkipReason::EmptyTitle)
        } else if remote_titles.contains(title.as_str()) {
            Some(SkipReason::AlreadyPresent)
        } else if scraped_titles.contains(&title) {
            Some(SkipReason::DuplicateInBatch)
        } else {
            None
        };
        if !title.is_empty() {
            scraped_titles.insert(title.clone());
        }

        match reason {
            Some(reason) => plan.skipped.push(SkippedTask {
                line: line.clone(),
                title,
                reason,
            }),
            None => {
                let request = create_request(&decoded);
                plan.to_create.push(PlannedTask {
                    line: line.clone(),
                    decoded,
                    request,
                });
            }
        }
    }

    for task in remote_tasks.iter().filter(|task| !task.is_completed) {
        let still_present = match closure_match {
            ClosureMatch::CleanedTitle => scraped_titles.contains(&task.content),
            ClosureMatch::Substring => lines.iter().any(|line| line.contains(&task.content)),
        };
        if !still_present {
            plan.to_close.push(task.clone());
        }
    }

    plan
}

fn create_request(decoded: &RawObservedTask) -> NewTask {
    NewTask {
        content: decoded.base_title.clone(),
        due_date: decoded
            .due_date
            .map(|date| date.format("%Y-%m-%d").to_string()),
        priority: Priority::for_importance(decoded.important),
        labels: decoded
            .source
            .label()
            .map(|label| vec![label.to_string()])
            .unwrap_or_default(),
    }
}

/// Issues every create and close in `plan`, continuing past failures.
pub fn apply<S: TaskService + ?Sized>(
    plan: &ReconciliationPlan,
    project_id: &str,
    service: &S,
) -> SyncSummary {
    let mut summary = SyncSummary {
        skipped: plan.skipped.len(),
        ..SyncSummary::default()
    };

    for skipped in &plan.skipped {
        info!(
            "event=task_skip reason={} title={:?}",
            skipped.reason.as_str(),
            skipped.title
        );
    }

    for planned in &plan.to_create {
        match service.create_task(project_id, &planned.request) {
            Ok(created) => {
                info!(
                    "event=task_create status=ok id={} title={:?}",
                    created.id, planned.request.content
                );
                summary.created += 1;
            }
            Err(err) => {
                warn!(
                    "event=task_create status=error title={:?} error={}",
                    planned.request.content, err
                );
                summary.failures.push(ItemFailure {
                    title: planned.request.content.clone(),
                    action: SyncAction::Create,
                    reason: err.to_string(),
                });
            }
        }
    }

    for task in &plan.to_close {
        match service.complete_task(&task.id) {
            Ok(()) => {
                info!(
                    "event=task_close status=ok id={} title={:?}",
                    task.id, task.content
                );
                summary.closed += 1;
            }
            Err(err) => {
                warn!(
                    "event=task_close status=error id={} title={:?} error={}",
                    task.id, task.content, err
                );
                summary.failures.push(ItemFailure {
                    title: task.content.clone(),
                    action: SyncAction::Close,
                    reason: err.to_string(),
                });
            }
        }
    }

    summary
}

/// Runs project/label setup around `plan` and `apply` for one remote project.
///
/// Not safe to run concurrently against the same project; callers serialize runs.
pub struct Reconciler<S: TaskService> {
    service: S,
    settings: SyncSettings,
}

impl<S: TaskService> Reconciler<S> {
    pub fn new(service: S, settings: SyncSettings) -> Self {
        Self { service, settings }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn find_project(&self) -> Result<Option<RemoteProject>> {
        let projects = self.service.list_projects()?;
        Ok(projects
            .into_iter()
            .find(|project| project.name == self.settings.project_name))
    }

    /// Looks the project up by exact name, creating it on a miss.
    pub fn resolve_project(&self) -> Result<RemoteProject> {
        if let Some(project) = self.find_project()? {
            info!(
                "event=project_resolve status=found id={} name={:?}",
                project.id, project.name
            );
            return Ok(project);
        }

        info!(
            "event=project_resolve status=missing name={:?}",
            self.settings.project_name
        );
        let project = self.service.create_project(&self.settings.project_name)?;
        info!(
            "event=project_create status=ok id={} name={:?}",
            project.id, project.name
        );
        Ok(project)
    }

    /// Ensures every named label exists; returns name -> id.
    ///
    /// A created label must come back under the requested name, otherwise
    /// later creates would reference a label that does not exist.
    pub fn ensure_labels(&self, names: &[String]) -> Result<HashMap<String, String>> {
        let existing = self.service.list_labels()?;
        let mut by_name: HashMap<String, String> = existing
            .into_iter()
            .map(|label| (label.name, label.id))
            .collect();

        let mut resolved = HashMap::new();
        for name in names {
            if let Some(id) = by_name.get(name) {
                resolved.insert(name.clone(), id.clone());
                continue;
            }
            info!("event=label_create name={name:?}");
            let label = self.service.create_label(name)?;
            if label.name != *name {
                return Err(SyncError::remote(
                    "create label",
                    format!("requested {name:?} but service returned {:?}", label.name),
                ));
            }
            by_name.insert(label.name.clone(), label.id.clone());
            resolved.insert(name.clone(), label.id);
        }
        Ok(resolved)
    }

    /// Plans against the live project without writing anything.
    ///
    /// A missing project is treated as empty.
    pub fn preview(&self, lines: &[String]) -> Result<ReconciliationPlan> {
        let remote_tasks = match self.find_project()? {
            Some(project) => self.service.list_tasks(&project.id)?,
            None => Vec::new(),
        };
        Ok(plan(lines, &remote_tasks, self.settings.closure_match))
    }

    pub fn sync(&self, lines: &[String]) -> Result<SyncSummary> {
        if lines.iter().all(|line| line.trim().is_empty()) {
            info!("event=sync_skip reason=empty_input");
            return Ok(SyncSummary::default());
        }

        let project = self.resolve_project()?;
        let remote_tasks = self.service.list_tasks(&project.id)?;
        info!(
            "event=sync_snapshot project_id={} active_tasks={} input_lines={}",
            project.id,
            remote_tasks.len(),
            lines.len()
        );

        let plan = plan(lines, &remote_tasks, self.settings.closure_match);

        let mut labels: Vec<String> = Vec::new();
        for label in self
            .settings
            .required_labels
            .iter()
            .cloned()
            .chain(plan.referenced_labels())
        {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        self.ensure_labels(&labels)?;

        let summary = apply(&plan, &project.id, &self.service);
        info!(
            "event=sync_done created={} closed={} skipped={} failed={}",
            summary.created,
            summary.closed,
            summary.skipped,
            summary.failures.len()
        );
        Ok(summary)
    }
}
