//! Task persistence behind the [`TaskStore`] trait.
//!
//! Two implementations: [`SqliteStore`] (the on-disk store the binary uses) and
//! [`MemoryStore`] (an in-process fake with an operation log and failure injection).
//! Both push a fresh snapshot to every live [`Subscription`] of a user after each
//! successful write.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

use chrono::NaiveDate;
use crossbeam_channel::{Receiver, Sender};
use std::cell::RefCell;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{NewTask, Priority, SubTask, Task};
use crate::ordering::PositionUpdate;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to encode column: {0}")]
    EncodingError(#[from] serde_json::Error),
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: u64 },
}

pub trait TaskStore {
    /// One-shot read of a user's tasks for `date`, position ascending
    fn query_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    /// Live query; the current snapshot is delivered immediately
    fn subscribe(&self, user_id: &str, date: NaiveDate) -> Result<Subscription, StoreError>;

    /// Every task of a user ordered by date then position
    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, StoreError>;

    fn create(&self, user_id: &str, task: NewTask) -> Result<String, StoreError>;

    /// Create all tasks or none
    fn create_many(&self, user_id: &str, tasks: Vec<NewTask>) -> Result<Vec<String>, StoreError>;

    fn patch(&self, user_id: &str, task_id: &str, patch: &TaskPatch) -> Result<(), StoreError>;

    /// Bulk position rewrite, applied atomically. Targets that no longer exist are skipped.
    fn patch_many(&self, user_id: &str, updates: &[PositionUpdate]) -> Result<(), StoreError>;

    fn delete(&self, user_id: &str, task_id: &str) -> Result<(), StoreError>;
}

/// Partial update of one task. `None` fields are left untouched.
///
/// Subtasks are patched individually: `upsert_subtasks` inserts or replaces the named
/// subtasks and `remove_subtasks` deletes by id, siblings are never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub time_spent: Option<u64>,
    pub description: Option<Option<String>>,
    pub links: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<Option<Priority>>,
    pub upsert_subtasks: Vec<SubTask>,
    pub remove_subtasks: Vec<String>,
}

impl TaskPatch {
    pub fn time_spent(seconds: u64) -> Self {
        Self {
            time_spent: Some(seconds),
            ..Default::default()
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn upsert_subtask(subtask: SubTask) -> Self {
        Self {
            upsert_subtasks: vec![subtask],
            ..Default::default()
        }
    }

    pub fn remove_subtask(subtask_id: &str) -> Self {
        Self {
            remove_subtasks: vec![subtask_id.to_string()],
            ..Default::default()
        }
    }

    /// Apply the patch to an in-memory task
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(ref title) = self.title {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(time_spent) = self.time_spent {
            task.time_spent = time_spent;
        }
        if let Some(ref description) = self.description {
            task.description = description.clone();
        }
        if let Some(ref links) = self.links {
            task.links = links.clone();
        }
        if let Some(ref tags) = self.tags {
            task.tags = tags.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        for subtask in &self.upsert_subtasks {
            match task.sub_tasks.iter_mut().find(|s| s.id == subtask.id) {
                Some(existing) => *existing = subtask.clone(),
                None => task.sub_tasks.push(subtask.clone()),
            }
        }
        if !self.remove_subtasks.is_empty() {
            task.sub_tasks.retain(|s| !self.remove_subtasks.contains(&s.id));
        }
    }
}

/// Push-based stream of snapshots for one (user, date) query.
/// Dropping it unsubscribes.
pub struct Subscription {
    user_id: String,
    date: NaiveDate,
    receiver: Receiver<Vec<Task>>,
}

impl Subscription {
    /// Drain pending snapshots and return the newest one, if any arrived
    pub fn try_latest(&self) -> Option<Vec<Task>> {
        let mut latest = None;
        while let Ok(snapshot) = self.receiver.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }

    pub fn unsubscribe(self) {
        debug!(user_id = %self.user_id, date = %self.date, "unsubscribed");
    }
}

struct Subscriber {
    user_id: String,
    date: NaiveDate,
    sender: Sender<Vec<Task>>,
}

/// Registry of live subscriptions shared by the store implementations
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: RefCell<Vec<Subscriber>>,
}

impl Subscribers {
    pub(crate) fn register(&self, user_id: &str, date: NaiveDate, initial: Vec<Task>) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        // The receiver is still alive here, so the initial send cannot fail
        let _ = sender.send(initial);
        self.entries.borrow_mut().push(Subscriber {
            user_id: user_id.to_string(),
            date,
            sender,
        });
        debug!(user_id, %date, "subscribed");
        Subscription {
            user_id: user_id.to_string(),
            date,
            receiver,
        }
    }

    /// Re-run `query` for every live subscription of `user_id` and push the result.
    /// Subscriptions whose receiver was dropped are pruned.
    pub(crate) fn notify<F>(&self, user_id: &str, mut query: F)
    where
        F: FnMut(NaiveDate) -> Result<Vec<Task>, StoreError>,
    {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|subscriber| {
            if subscriber.user_id != user_id {
                return true;
            }
            match query(subscriber.date) {
                Ok(snapshot) => subscriber.sender.send(snapshot).is_ok(),
                Err(e) => {
                    warn!(user_id, date = %subscriber.date, "failed to refresh subscription: {}", e);
                    true
                }
            }
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        let date = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        Task::from_new("t1".to_string(), NewTask::new("title".to_string(), date, 0))
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut t = task();
        t.description = Some("keep".to_string());
        let patch = TaskPatch {
            title: Some("renamed".to_string()),
            time_spent: Some(42),
            ..Default::default()
        };
        patch.apply_to(&mut t);
        assert_eq!(t.title, "renamed");
        assert_eq!(t.time_spent, 42);
        assert_eq!(t.description.as_deref(), Some("keep"));
        assert!(!t.completed);
    }

    #[test]
    fn test_patch_subtask_upsert_and_remove() {
        let mut t = task();
        let mut a = SubTask::new("a".to_string(), 0);
        a.id = "a".to_string();
        let mut b = SubTask::new("b".to_string(), 1);
        b.id = "b".to_string();
        t.sub_tasks = vec![a.clone(), b];

        a.completed = true;
        TaskPatch::upsert_subtask(a).apply_to(&mut t);
        assert!(t.subtask("a").unwrap().completed);
        assert_eq!(t.sub_tasks.len(), 2);

        TaskPatch::remove_subtask("b").apply_to(&mut t);
        assert_eq!(t.sub_tasks.len(), 1);
        assert!(t.subtask("b").is_none());
    }

    #[test]
    fn test_description_can_be_cleared() {
        let mut t = task();
        t.description = Some("old".to_string());
        TaskPatch {
            description: Some(None),
            ..Default::default()
        }
        .apply_to(&mut t);
        assert_eq!(t.description, None);
    }

    #[test]
    fn test_subscribers_prune_dropped_receivers() {
        let subscribers = Subscribers::default();
        let date = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap();
        let kept = subscribers.register("u", date, Vec::new());
        let dropped = subscribers.register("u", date, Vec::new());
        let other_user = subscribers.register("v", date, Vec::new());
        drop(dropped);

        subscribers.notify("u", |_| Ok(vec![task()]));
        assert_eq!(subscribers.len(), 2);

        let latest = kept.try_latest().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(other_user.try_latest().unwrap().len(), 0);
        assert!(other_user.try_latest().is_none());
    }
}
