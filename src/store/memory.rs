use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::models::{NewTask, Task};
use crate::ordering::{PositionTarget, PositionUpdate, sort_by_position};
use crate::store::{StoreError, Subscribers, Subscription, TaskPatch, TaskStore};

/// A write accepted by [`MemoryStore`], in the order it arrived
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Create { task_id: String },
    Patch { task_id: String, patch: TaskPatch },
    PatchMany(Vec<PositionUpdate>),
    Delete { task_id: String },
}

struct StoredTask {
    user_id: String,
    task: Task,
}

#[derive(Default)]
struct MemoryInner {
    tasks: RefCell<Vec<StoredTask>>,
    subscribers: Subscribers,
    failing: Cell<bool>,
    failing_patches: Cell<bool>,
    log: RefCell<Vec<StoreOp>>,
}

/// In-process store. Clones share the same data, so a test can keep a handle
/// while the board owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails with [`StoreError::Unavailable`]
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.set(failing);
    }

    /// While set, only `patch` fails; creates, deletes and position rewrites still succeed
    pub fn set_failing_patches(&self, failing: bool) {
        self.inner.failing_patches.set(failing);
    }

    /// Writes accepted so far
    pub fn operations(&self) -> Vec<StoreOp> {
        self.inner.log.borrow().clone()
    }

    pub fn clear_operations(&self) {
        self.inner.log.borrow_mut().clear();
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.inner.failing.get() {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }

    fn record(&self, op: StoreOp) {
        self.inner.log.borrow_mut().push(op);
    }

    fn select<F>(&self, user_id: &str, mut keep: F) -> Vec<Task>
    where
        F: FnMut(&Task) -> bool,
    {
        let mut tasks: Vec<Task> = self
            .inner
            .tasks
            .borrow()
            .iter()
            .filter(|stored| stored.user_id == user_id && keep(&stored.task))
            .map(|stored| stored.task.clone())
            .collect();
        sort_by_position(&mut tasks);
        tasks
    }

    fn notify(&self, user_id: &str) {
        self.inner
            .subscribers
            .notify(user_id, |date| Ok(self.select(user_id, |task| task.date == date)));
    }
}

impl TaskStore for MemoryStore {
    fn query_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self.select(user_id, |task| task.date == date))
    }

    fn subscribe(&self, user_id: &str, date: NaiveDate) -> Result<Subscription, StoreError> {
        let initial = self.query_by_date(user_id, date)?;
        Ok(self.inner.subscribers.register(user_id, date, initial))
    }

    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.select(user_id, |_| true);
        // stable, so position order survives within a date
        tasks.sort_by_key(|task| task.date);
        Ok(tasks)
    }

    fn create(&self, user_id: &str, task: NewTask) -> Result<String, StoreError> {
        Ok(self.create_many(user_id, vec![task])?.remove(0))
    }

    fn create_many(&self, user_id: &str, tasks: Vec<NewTask>) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let mut ids = Vec::with_capacity(tasks.len());
        {
            let mut stored = self.inner.tasks.borrow_mut();
            for task in tasks {
                let id = uuid::Uuid::new_v4().simple().to_string();
                stored.push(StoredTask {
                    user_id: user_id.to_string(),
                    task: Task::from_new(id.clone(), task),
                });
                ids.push(id);
            }
        }
        for id in &ids {
            self.record(StoreOp::Create { task_id: id.clone() });
        }
        self.notify(user_id);
        Ok(ids)
    }

    fn patch(&self, user_id: &str, task_id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        self.check_available()?;
        if self.inner.failing_patches.get() {
            return Err(StoreError::Unavailable("memory store set to fail patches".to_string()));
        }
        {
            let mut stored = self.inner.tasks.borrow_mut();
            let entry = stored
                .iter_mut()
                .find(|s| s.user_id == user_id && s.task.id == task_id)
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
            patch.apply_to(&mut entry.task);
        }
        self.record(StoreOp::Patch {
            task_id: task_id.to_string(),
            patch: patch.clone(),
        });
        self.notify(user_id);
        Ok(())
    }

    fn patch_many(&self, user_id: &str, updates: &[PositionUpdate]) -> Result<(), StoreError> {
        self.check_available()?;
        if updates.is_empty() {
            return Ok(());
        }
        {
            let mut stored = self.inner.tasks.borrow_mut();
            for update in updates {
                match &update.target {
                    PositionTarget::Task { task_id } => {
                        if let Some(entry) = stored.iter_mut().find(|s| s.user_id == user_id && &s.task.id == task_id) {
                            entry.task.position = update.position;
                        }
                    }
                    PositionTarget::SubTask { task_id, subtask_id } => {
                        let subtask = stored
                            .iter_mut()
                            .find(|s| s.user_id == user_id && &s.task.id == task_id)
                            .and_then(|entry| entry.task.sub_tasks.iter_mut().find(|st| &st.id == subtask_id));
                        if let Some(subtask) = subtask {
                            subtask.position = update.position;
                        }
                    }
                }
            }
        }
        self.record(StoreOp::PatchMany(updates.to_vec()));
        self.notify(user_id);
        Ok(())
    }

    fn delete(&self, user_id: &str, task_id: &str) -> Result<(), StoreError> {
        self.check_available()?;
        {
            let mut stored = self.inner.tasks.borrow_mut();
            let index = stored
                .iter()
                .position(|s| s.user_id == user_id && s.task.id == task_id)
                .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
            stored.remove(index);
        }
        self.record(StoreOp::Delete {
            task_id: task_id.to_string(),
        });
        self.notify(user_id);
        Ok(())
    }
}
