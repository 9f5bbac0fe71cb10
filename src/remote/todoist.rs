use crate::error::{Result, SyncError};
use crate::models::{RemoteLabel, RemoteProject, RemoteTask};
use crate::remote::{NewTask, TaskService};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.todoist.com/rest/v2";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_CHARS: usize = 240;

#[derive(Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct TaskCreateRequest<'a> {
    content: &'a str,
    project_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<&'a str>,
    priority: u8,
    #[serde(skip_serializing_if = "no_labels")]
    labels: &'a [String],
}

fn no_labels(labels: &&[String]) -> bool {
    labels.is_empty()
}

/// Blocking client for the Todoist REST API.
pub struct TodoistClient {
    client: Client,
    api_base: String,
    token: String,
}

impl TodoistClient {
    pub fn new(api_base: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::remote("client setup", e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response> {
        let resp = request
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| SyncError::remote(operation, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(SyncError::remote(operation, format_http_error(status, &body)));
        }
        Ok(resp)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        self.send(operation, request)?
            .json()
            .map_err(|e| SyncError::remote(operation, e.to_string()))
    }
}

impl TaskService for TodoistClient {
    fn list_projects(&self) -> Result<Vec<RemoteProject>> {
        self.send_json("list projects", self.client.get(self.url("projects")))
    }

    fn create_project(&self, name: &str) -> Result<RemoteProject> {
        let request = self
            .client
            .post(self.url("projects"))
            .json(&NameRequest { name });
        self.send_json("create project", request)
    }

    fn list_tasks(&self, project_id: &str) -> Result<Vec<RemoteTask>> {
        let request = self
            .client
            .get(self.url("tasks"))
            .query(&[("project_id", project_id)]);
        let mut tasks: Vec<RemoteTask> = self.send_json("list tasks", request)?;
        tasks.retain(|task| !task.is_completed);
        Ok(tasks)
    }

    fn create_task(&self, project_id: &str, task: &NewTask) -> Result<RemoteTask> {
        let body = TaskCreateRequest {
            content: &task.content,
            project_id,
            due_date: task.due_date.as_deref(),
            priority: task.priority.as_level(),
            labels: &task.labels,
        };
        let request = self.client.post(self.url("tasks")).json(&body);
        self.send_json("create task", request)
    }

    fn complete_task(&self, task_id: &str) -> Result<()> {
        let request = self.client.post(self.url(&format!("tasks/{task_id}/close")));
        self.send("complete task", request)?;
        Ok(())
    }

    fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        self.send_json("list labels", self.client.get(self.url("labels")))
    }

    fn create_label(&self, name: &str) -> Result<RemoteLabel> {
        let request = self
            .client
            .post(self.url("labels"))
            .json(&NameRequest { name });
        self.send_json("create label", request)
    }
}

fn format_http_error(status: reqwest::StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    format!("HTTP {status}: {}", truncate_error(trimmed))
}

fn truncate_error(message: &str) -> String {
    let mut out = message.replace(['\n', '\r'], " ");
    if out.chars().count() > MAX_ERROR_CHARS {
        out = out.chars().take(MAX_ERROR_CHARS).collect();
        out.push_str("...");
    }
    out
}
