//! Explicit view and edit state.
//!
//! `ViewState` is the active view plus the search query. `EditContext` is the
//! draft of one task being edited, including the AI suggestion round trip and
//! its in-flight flag.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;

use crate::advisor::Suggestions;
use crate::checklist::{self, ChecklistItem, StatusPolicy};
use crate::error::{AdvisorError, AdvisorResult};
use crate::store::TaskStore;
use crate::task::{Priority, Status, Task, TaskPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Board,
    List,
    Calendar,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Board => "board",
            View::List => "list",
            View::Calendar => "calendar",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "board" | "kanban" => Ok(View::Board),
            "list" => Ok(View::List),
            "calendar" => Ok(View::Calendar),
            other => Err(anyhow!("unknown view: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub view: View,
    pub query: String,
}

impl ViewState {
    pub fn new(view: View) -> Self {
        Self {
            view,
            query: String::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Tasks the active view shows, after the search query.
    pub fn visible<'a>(&self, store: &'a TaskStore) -> Vec<&'a Task> {
        store.search(&self.query)
    }
}

/// Draft of a task inside the edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditContext {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub status: Status,
    pub priority: Priority,
    pub due_date: NaiveDate,
    suggestions: Vec<String>,
    tokens: u64,
    last_error: Option<AdvisorError>,
    in_flight: bool,
}

impl EditContext {
    pub fn for_new(today: NaiveDate) -> Self {
        Self {
            id: None,
            title: String::new(),
            description: String::new(),
            status: Status::Todo,
            priority: Priority::Normal,
            due_date: today,
            suggestions: Vec::new(),
            tokens: 0,
            last_error: None,
            in_flight: false,
        }
    }

    pub fn for_task(task: &Task) -> Self {
        Self {
            id: Some(task.id.clone()),
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            suggestions: Vec::new(),
            tokens: 0,
            last_error: None,
            in_flight: false,
        }
    }

    pub fn checklist(&self) -> Vec<ChecklistItem> {
        checklist::parse(&self.description)
    }

    pub fn toggle(&mut self, index: usize, policy: StatusPolicy) {
        self.description = checklist::toggle(&self.description, index);
        self.status = policy.apply(&self.description, self.status);
    }

    /// Marks a suggestion call as started. Returns false while another call
    /// is outstanding or when there is no title to plan from.
    pub fn begin_suggest(&mut self) -> bool {
        if self.in_flight || self.title.trim().is_empty() {
            return false;
        }
        self.in_flight = true;
        self.last_error = None;
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn finish_suggest(&mut self, result: AdvisorResult<Suggestions>) {
        self.in_flight = false;
        match result {
            Ok(suggestions) => {
                self.tokens = self.tokens.saturating_add(suggestions.tokens);
                self.suggestions = suggestions.items;
            }
            Err(err) => {
                self.suggestions.clear();
                self.last_error = Some(err);
            }
        }
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn last_error(&self) -> Option<&AdvisorError> {
        self.last_error.as_ref()
    }

    /// Tokens consumed by suggestion calls made from this draft.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Moves pending suggestions into the description as checklist lines.
    pub fn accept_suggestions(&mut self) -> usize {
        let count = self.suggestions.len();
        self.description = checklist::append_suggestions(&self.description, &self.suggestions);
        self.suggestions.clear();
        count
    }

    pub fn into_patch(self) -> TaskPatch {
        TaskPatch {
            id: self.id,
            title: Some(self.title),
            description: Some(self.description),
            status: Some(self.status),
            priority: Some(self.priority),
            due_date: Some(self.due_date),
        }
    }
}
