use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::checklist::{self, StatusPolicy};
use crate::datastore::SlotStore;
use crate::error::{StoreError, StoreResult};
use crate::task::{Status, Task, TaskPatch, new_task_id};

pub const DEFAULT_STORAGE_KEY: &str = "zenith_tasks_v2";

/// What `TaskStore::open` found in the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Missing,
    Loaded(usize),
    /// The payload was unreadable or malformed; the store starts empty.
    Corrupt(String),
}

#[derive(Debug)]
pub struct TaskStore {
    slots: SlotStore,
    key: String,
    tasks: Vec<Task>,
    load_outcome: LoadOutcome,
}

impl TaskStore {
    #[instrument(skip(slots))]
    pub fn open(slots: SlotStore, key: &str) -> Self {
        let (tasks, load_outcome) = match slots.read(key) {
            Ok(None) => (Vec::new(), LoadOutcome::Missing),
            Ok(Some(payload)) if payload.trim().is_empty() => (Vec::new(), LoadOutcome::Missing),
            Ok(Some(payload)) => match serde_json::from_str::<Vec<Task>>(&payload) {
                Ok(tasks) => {
                    let count = tasks.len();
                    (tasks, LoadOutcome::Loaded(count))
                }
                Err(err) => {
                    warn!(key, error = %err, "stored tasks are corrupt; starting empty");
                    match slots.set_aside(key) {
                        Ok(backup) => {
                            warn!(key, backup = %backup.display(), "kept corrupt payload")
                        }
                        Err(move_err) => {
                            warn!(key, error = %move_err, "could not keep corrupt payload")
                        }
                    }
                    (Vec::new(), LoadOutcome::Corrupt(err.to_string()))
                }
            },
            Err(err) => {
                warn!(key, error = %err, "stored tasks are unreadable; starting empty");
                (Vec::new(), LoadOutcome::Corrupt(format!("{err:#}")))
            }
        };

        info!(key, count = tasks.len(), outcome = ?load_outcome, "opened task store");

        Self {
            slots,
            key: key.to_string(),
            tasks,
            load_outcome,
        }
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Updates the task named by `patch.id`, or creates a new one at the head
    /// of the list when the id is absent or unknown.
    #[instrument(skip(self, patch, now), fields(id = ?patch.id))]
    pub fn save(&mut self, patch: TaskPatch, now: DateTime<Utc>) -> StoreResult<Task> {
        let existing = patch
            .id
            .as_deref()
            .and_then(|id| self.tasks.iter().position(|task| task.id == id));

        let mut patch = patch;
        if let Some(title) = patch.title.take() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(StoreError::Validation("title cannot be empty".to_string()));
            }
            patch.title = Some(trimmed.to_string());
        }

        let before = self.tasks.clone();
        let saved = match existing {
            Some(idx) => {
                let task = &mut self.tasks[idx];
                task.apply_patch(patch);
                debug!(id = %task.id, "task updated");
                task.clone()
            }
            None => {
                let title = patch
                    .title
                    .clone()
                    .ok_or_else(|| StoreError::Validation("title is required".to_string()))?;
                let mut task = Task::new(self.fresh_id(), title, now);
                task.apply_patch(patch);
                debug!(id = %task.id, "task created");
                self.tasks.insert(0, task.clone());
                task
            }
        };

        self.commit(before)?;
        Ok(saved)
    }

    pub fn search(&self, query: &str) -> Vec<&Task> {
        let needle = query.to_lowercase();
        self.tasks
            .iter()
            .filter(|task| {
                needle.is_empty()
                    || task.title.to_lowercase().contains(&needle)
                    || task.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn by_status(&self, status: Status) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.status == status).collect()
    }

    pub fn by_due_date(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.due_date == date).collect()
    }

    /// Flips one checklist item in the task description and, depending on
    /// `policy`, re-derives the status from the checklist.
    #[instrument(skip(self))]
    pub fn toggle_checklist(
        &mut self,
        id: &str,
        index: usize,
        policy: StatusPolicy,
    ) -> StoreResult<Task> {
        let before = self.tasks.clone();
        let task = self.find_mut(id)?;
        task.description = checklist::toggle(&task.description, index);
        task.status = policy.apply(&task.description, task.status);
        let updated = task.clone();
        debug!(id, index, status = %updated.status, "checklist item toggled");

        self.commit(before)?;
        Ok(updated)
    }

    /// Merges advisor suggestions into the description and records the
    /// tokens the call consumed.
    #[instrument(skip(self, suggestions))]
    pub fn apply_suggestions(
        &mut self,
        id: &str,
        suggestions: &[String],
        tokens: u64,
    ) -> StoreResult<Task> {
        let before = self.tasks.clone();
        let task = self.find_mut(id)?;
        task.description = checklist::append_suggestions(&task.description, suggestions);
        task.add_tokens(tokens);
        let updated = task.clone();
        debug!(id, added = suggestions.len(), tokens, "suggestions applied");

        self.commit(before)?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub fn record_tokens(&mut self, id: &str, tokens: u64) -> StoreResult<Task> {
        let before = self.tasks.clone();
        let task = self.find_mut(id)?;
        task.add_tokens(tokens);
        let updated = task.clone();

        self.commit(before)?;
        Ok(updated)
    }

    fn find_mut(&mut self, id: &str) -> StoreResult<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = new_task_id();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Persists the whole collection, restoring `before` if the write fails.
    fn commit(&mut self, before: Vec<Task>) -> StoreResult<()> {
        if let Err(err) = self.persist() {
            self.tasks = before;
            return Err(StoreError::Persist(err));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn persist(&self) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&self.tasks)?;
        self.slots.write(&self.key, &payload)?;
        debug!(key = %self.key, count = self.tasks.len(), "tasks persisted");
        Ok(())
    }
}
