use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which logical list a scraped task came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    #[default]
    None,
    FlaggedEmail,
    AssignedToMe,
}

impl TaskSource {
    pub fn all() -> Vec<TaskSource> {
        vec![
            TaskSource::None,
            TaskSource::FlaggedEmail,
            TaskSource::AssignedToMe,
        ]
    }

    /// Title prefix token written by the codec, including the trailing space.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            TaskSource::None => None,
            TaskSource::FlaggedEmail => Some("Flagged: "),
            TaskSource::AssignedToMe => Some("Assigned: "),
        }
    }

    /// Remote label attached to tasks from this source.
    pub fn label(self) -> Option<&'static str> {
        match self {
            TaskSource::None => None,
            TaskSource::FlaggedEmail => Some("Flagged"),
            TaskSource::AssignedToMe => Some("Assigned"),
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "" | "none" | "tasks" => Some(TaskSource::None),
            "flagged" | "flagged_email" => Some(TaskSource::FlaggedEmail),
            "assigned" | "assigned_to_me" => Some(TaskSource::AssignedToMe),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawObservedTask {
    pub base_title: String,
    pub due_date: Option<NaiveDate>,
    pub important: bool,
    pub source: TaskSource,
}

impl RawObservedTask {
    pub fn new(base_title: impl Into<String>) -> Self {
        Self {
            base_title: base_title.into(),
            ..Self::default()
        }
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn important(mut self) -> Self {
        self.important = true;
        self
    }

    pub fn from_source(mut self, source: TaskSource) -> Self {
        self.source = source;
        self
    }
}

/// Todoist priority scale: 1 is the default, 4 is "urgent".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Normal,
    Urgent,
}

impl Priority {
    pub fn for_importance(important: bool) -> Self {
        if important {
            Priority::Urgent
        } else {
            Priority::Normal
        }
    }

    pub fn as_level(self) -> u8 {
        match self {
            Priority::Normal => 1,
            Priority::Urgent => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RemoteLabel {
    pub id: String,
    pub name: String,
}
