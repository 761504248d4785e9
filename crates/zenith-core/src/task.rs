use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "К выполнению")]
    Todo,
    #[serde(alias = "В работе")]
    InProgress,
    #[serde(alias = "На проверке")]
    Review,
    #[serde(alias = "Готово")]
    Done,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Review, Status::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Review => "review",
            Status::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Todo => "To-Do",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s
            .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join("-")
            .to_ascii_lowercase();
        match key.as_str() {
            "todo" | "to-do" => Ok(Status::Todo),
            "in-progress" | "progress" | "doing" => Ok(Status::InProgress),
            "review" => Ok(Status::Review),
            "done" => Ok(Status::Done),
            _ => Err(anyhow!("unknown status: {}", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "Низкий")]
    Low,
    #[serde(alias = "Средний")]
    Normal,
    #[serde(alias = "Высокий")]
    High,
    #[serde(alias = "Срочно")]
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Normal => "Normal",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "n" | "m" | "normal" | "medium" => Ok(Priority::Normal),
            "h" | "high" => Ok(Priority::High),
            "u" | "urgent" => Ok(Priority::Urgent),
            other => Err(anyhow!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: Status,

    pub priority: Priority,

    pub due_date: NaiveDate,

    /// Epoch milliseconds.
    pub created_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

impl Task {
    pub fn new(id: String, title: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title,
            description: String::new(),
            status: Status::Todo,
            priority: Priority::Normal,
            due_date: now.date_naive(),
            created_at: now.timestamp_millis(),
            tokens_used: None,
        }
    }

    /// Merges the supplied fields; `id` and `created_at` are never touched.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }

    pub fn add_tokens(&mut self, tokens: u64) {
        let total = self.tokens_used.unwrap_or(0).saturating_add(tokens);
        self.tokens_used = Some(total);
    }
}

/// Partial task submitted by an edit form. Absent fields keep prior values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl TaskPatch {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

pub fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn serializes_with_camel_case_fields() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 2, 9, 30, 0)
            .single()
            .expect("valid now");
        let task = Task::new("abc".to_string(), "Write docs".to_string(), now);
        let value = serde_json::to_value(&task).expect("serialize");

        assert_eq!(value["dueDate"], "2026-03-02");
        assert_eq!(value["createdAt"], now.timestamp_millis());
        assert_eq!(value["status"], "todo");
        assert_eq!(value["priority"], "normal");
        assert!(value.get("tokensUsed").is_none());
    }

    #[test]
    fn reads_legacy_display_labels() {
        let raw = r#"{
            "id": "k3j2h1g0f",
            "title": "Купить молоко",
            "description": "- [x] магазин",
            "status": "В работе",
            "priority": "Срочно",
            "dueDate": "2025-01-15",
            "createdAt": 1736899200000,
            "tokensUsed": 412
        }"#;
        let task: Task = serde_json::from_str(raw).expect("legacy payload");
        assert_eq!(task.status, Status::InProgress);
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.tokens_used, Some(412));
    }

    #[test]
    fn patch_keeps_identity_fields() {
        let now = Utc::now();
        let mut task = Task::new("fixed".to_string(), "Old".to_string(), now);
        let created = task.created_at;
        task.apply_patch(TaskPatch {
            id: Some("other".to_string()),
            title: Some("New".to_string()),
            ..TaskPatch::default()
        });
        assert_eq!(task.id, "fixed");
        assert_eq!(task.created_at, created);
        assert_eq!(task.title, "New");
        assert_eq!(task.priority, Priority::Normal);
    }

    #[test]
    fn status_parses_cli_spellings() {
        assert_eq!("In-Progress".parse::<Status>().expect("status"), Status::InProgress);
        assert_eq!("u".parse::<Priority>().expect("priority"), Priority::Urgent);
        assert!("later".parse::<Status>().is_err());
    }

    #[test]
    fn displayed_labels_parse_back() {
        for status in Status::ALL {
            assert_eq!(status.to_string().parse::<Status>().expect("status"), status);
            assert_eq!(status.as_str().parse::<Status>().expect("status"), status);
        }
        for priority in Priority::ALL {
            assert_eq!(
                priority.to_string().parse::<Priority>().expect("priority"),
                priority
            );
        }
        assert_eq!("in  progress".parse::<Status>().expect("status"), Status::InProgress);
        assert_eq!("in_progress".parse::<Status>().expect("status"), Status::InProgress);
    }
}
