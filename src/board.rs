//! The single writer over a user's day.
//!
//! [`Board`] owns the signed-in user, the selected date, the position-sorted task list
//! for that date, the live store subscription and the timer. Every mutation applies to
//! the local list first and is then written to the store; a failed write is logged and
//! reported, and the local state is kept.

use chrono::NaiveDate;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::identity::User;
use crate::models::{NewTask, Priority, SubTask, Task};
use crate::ordering::{self, PositionUpdate};
use crate::store::{StoreError, Subscription, TaskPatch, TaskStore};
use crate::timer::{Clock, TimeSink, Timer, TimerView};
use crate::transfer::{self, TransferError};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Link cannot be empty")]
    EmptyLink,
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Subtask not found: {0}")]
    SubTaskNotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

fn store_failed(action: &str, e: StoreError) -> BoardError {
    error!(action, "store write failed: {}", e);
    BoardError::Store(e)
}

/// Writes flushed timer values to the store and mirrors them into the local list
struct StoreSink<'a> {
    store: &'a dyn TaskStore,
    user_id: Option<&'a str>,
    tasks: &'a mut Vec<Task>,
    failure: Option<StoreError>,
}

impl TimeSink for StoreSink<'_> {
    fn flush(&mut self, task_id: &str, seconds: u64) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.time_spent = seconds;
        }
        let Some(user_id) = self.user_id else {
            warn!(task_id, seconds, "dropping time flush: no signed-in user");
            return;
        };
        match self.store.patch(user_id, task_id, &TaskPatch::time_spent(seconds)) {
            Ok(()) => debug!(task_id, seconds, "time spent persisted"),
            Err(e) => {
                error!(task_id, seconds, "failed to persist time spent: {}", e);
                self.failure.get_or_insert(e);
            }
        }
    }
}

pub struct Board {
    store: Box<dyn TaskStore>,
    clock: Box<dyn Clock>,
    user: Option<User>,
    selected_date: NaiveDate,
    tasks: Vec<Task>,
    subscription: Option<Subscription>,
    timer: Timer,
    /// Title of the timed task, kept so it can be shown while another date is selected
    active_title: Option<String>,
}

impl Board {
    pub fn new(store: Box<dyn TaskStore>, clock: Box<dyn Clock>, date: NaiveDate) -> Self {
        Self {
            store,
            clock,
            user: None,
            selected_date: date,
            tasks: Vec::new(),
            subscription: None,
            timer: Timer::new(),
            active_title: None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    /// Tasks of the selected date in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn timer_view(&self) -> TimerView {
        self.timer.snapshot()
    }

    pub fn active_title(&self) -> Option<&str> {
        self.active_title.as_deref()
    }

    fn user_id(&self) -> Result<String, BoardError> {
        self.user.as_ref().map(|u| u.uid.clone()).ok_or(BoardError::NotSignedIn)
    }

    fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, BoardError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))
    }

    /// Run a timer transition with a sink bound to the store. The transition always
    /// happens; a failed flush is returned afterwards.
    fn drive_timer<F>(&mut self, transition: F) -> Result<(), BoardError>
    where
        F: FnOnce(&mut Timer, &dyn Clock, &mut dyn TimeSink),
    {
        let Board {
            store,
            clock,
            user,
            tasks,
            timer,
            active_title,
            ..
        } = self;
        let mut sink = StoreSink {
            store: store.as_ref(),
            user_id: user.as_ref().map(|u| u.uid.as_str()),
            tasks,
            failure: None,
        };
        transition(timer, clock.as_ref(), &mut sink);
        if timer.active_task_id().is_none() {
            *active_title = None;
        }
        match sink.failure {
            Some(e) => Err(BoardError::Store(e)),
            None => Ok(()),
        }
    }

    /// Switch user. Any running timer is stopped (and flushed for the previous user)
    /// before the switch.
    pub fn set_user(&mut self, user: Option<User>) -> Result<(), BoardError> {
        if self.user == user {
            return Ok(());
        }
        let flushed = self.stop_timer();
        self.subscription = None;
        self.tasks.clear();
        self.user = user;
        match self.user {
            Some(ref u) => info!(uid = %u.uid, "board user set"),
            None => info!("board user cleared"),
        }
        self.resubscribe()?;
        flushed
    }

    pub fn set_selected_date(&mut self, date: NaiveDate) -> Result<(), BoardError> {
        if date == self.selected_date && self.subscription.is_some() {
            return Ok(());
        }
        self.selected_date = date;
        self.resubscribe()
    }

    fn resubscribe(&mut self) -> Result<(), BoardError> {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.tasks.clear();
        let Some(ref user) = self.user else {
            return Ok(());
        };
        let subscription = self
            .store
            .subscribe(&user.uid, self.selected_date)
            .map_err(|e| store_failed("subscribe", e))?;
        self.subscription = Some(subscription);
        self.sync();
        Ok(())
    }

    /// Apply the newest pushed snapshot, if any. Returns true when the list changed.
    pub fn sync(&mut self) -> bool {
        let Some(snapshot) = self.subscription.as_ref().and_then(|s| s.try_latest()) else {
            return false;
        };
        let mut snapshot = snapshot;
        ordering::sort_by_position(&mut snapshot);
        if snapshot == self.tasks {
            return false;
        }
        debug!(count = snapshot.len(), date = %self.selected_date, "task snapshot applied");
        self.tasks = snapshot;
        true
    }

    /// One-shot re-read of the selected date
    pub fn refresh(&mut self) -> Result<(), BoardError> {
        let user_id = self.user_id()?;
        let mut tasks = self
            .store
            .query_by_date(&user_id, self.selected_date)
            .map_err(|e| store_failed("refresh", e))?;
        ordering::sort_by_position(&mut tasks);
        self.tasks = tasks;
        Ok(())
    }

    /// Every task of the user, for statistics
    pub fn all_tasks(&self) -> Result<Vec<Task>, BoardError> {
        let user_id = self.user_id()?;
        self.store.list_all(&user_id).map_err(|e| store_failed("list tasks", e))
    }

    /// Create a task at the end of the selected date
    pub fn add_task(&mut self, title: &str, tags: Vec<String>, priority: Option<Priority>) -> Result<String, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let user_id = self.user_id()?;
        let mut new = NewTask::new(title.to_string(), self.selected_date, self.tasks.len() as i64);
        new.tags = tags;
        new.priority = priority;

        let id = self
            .store
            .create(&user_id, new.clone())
            .map_err(|e| store_failed("create task", e))?;
        if self.task(&id).is_none() {
            self.tasks.push(Task::from_new(id.clone(), new));
        }
        info!(task_id = %id, date = %self.selected_date, "task created");
        Ok(id)
    }

    fn patch_task(&mut self, task_id: &str, patch: TaskPatch, action: &str) -> Result<(), BoardError> {
        let user_id = self.user_id()?;
        patch.apply_to(self.task_mut(task_id)?);
        self.store
            .patch(&user_id, task_id, &patch)
            .map_err(|e| store_failed(action, e))
    }

    pub fn rename_task(&mut self, task_id: &str, title: &str) -> Result<(), BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        if self.timer.is_active(task_id) {
            self.active_title = Some(title.to_string());
        }
        let patch = TaskPatch {
            title: Some(title.to_string()),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "rename task")
    }

    /// Flip completion. Completing or reopening the timed task stops its timer first.
    /// Returns the new completion state.
    pub fn toggle_completion(&mut self, task_id: &str) -> Result<bool, BoardError> {
        let completed = !self
            .task(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?
            .completed;
        let flushed = if self.timer.is_active(task_id) {
            self.stop_timer()
        } else {
            Ok(())
        };
        self.patch_task(task_id, TaskPatch::completed(completed), "toggle completion")?;
        flushed.map(|_| completed)
    }

    /// Delete a task. The timed task is stopped and flushed before the delete is issued.
    pub fn delete_task(&mut self, task_id: &str) -> Result<(), BoardError> {
        let user_id = self.user_id()?;
        if self.task(task_id).is_none() {
            return Err(BoardError::TaskNotFound(task_id.to_string()));
        }
        // A failed flush must not block the delete; it is reported afterwards
        let flushed = if self.timer.is_active(task_id) {
            self.stop_timer()
        } else {
            Ok(())
        };
        self.tasks.retain(|t| t.id != task_id);
        self.store
            .delete(&user_id, task_id)
            .map_err(|e| store_failed("delete task", e))?;
        info!(task_id, "task deleted");
        flushed
    }

    /// Blank text clears the description
    pub fn set_description(&mut self, task_id: &str, description: &str) -> Result<(), BoardError> {
        let description = description.trim();
        let value = (!description.is_empty()).then(|| description.to_string());
        let patch = TaskPatch {
            description: Some(value),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "set description")
    }

    pub fn add_link(&mut self, task_id: &str, url: &str) -> Result<(), BoardError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(BoardError::EmptyLink);
        }
        let mut links = self.task_mut(task_id)?.links.clone();
        links.push(url.to_string());
        let patch = TaskPatch {
            links: Some(links),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "add link")
    }

    pub fn remove_link(&mut self, task_id: &str, index: usize) -> Result<(), BoardError> {
        let mut links = self.task_mut(task_id)?.links.clone();
        if index >= links.len() {
            return Ok(());
        }
        links.remove(index);
        let patch = TaskPatch {
            links: Some(links),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "remove link")
    }

    pub fn set_tags(&mut self, task_id: &str, tags: Vec<String>) -> Result<(), BoardError> {
        let patch = TaskPatch {
            tags: Some(tags),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "set tags")
    }

    pub fn set_priority(&mut self, task_id: &str, priority: Option<Priority>) -> Result<(), BoardError> {
        let patch = TaskPatch {
            priority: Some(priority),
            ..Default::default()
        };
        self.patch_task(task_id, patch, "set priority")
    }

    /// Append a subtask; returns its id
    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<String, BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::EmptyTitle);
        }
        let position = self.task_mut(task_id)?.sub_tasks.len() as i64;
        let subtask = SubTask::new(title.to_string(), position);
        let id = subtask.id.clone();
        self.patch_task(task_id, TaskPatch::upsert_subtask(subtask), "add subtask")?;
        Ok(id)
    }

    fn subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<SubTask, BoardError> {
        self.task_mut(task_id)?
            .sub_tasks
            .iter()
            .find(|s| s.id == subtask_id)
            .cloned()
            .ok_or_else(|| BoardError::SubTaskNotFound(subtask_id.to_string()))
    }

    pub fn toggle_subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<bool, BoardError> {
        let mut subtask = self.subtask(task_id, subtask_id)?;
        subtask.completed = !subtask.completed;
        let completed = subtask.completed;
        self.patch_task(task_id, TaskPatch::upsert_subtask(subtask), "toggle subtask")?;
        Ok(completed)
    }

    pub fn delete_subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<(), BoardError> {
        self.subtask(task_id, subtask_id)?;
        self.patch_task(task_id, TaskPatch::remove_subtask(subtask_id), "delete subtask")
    }

    fn persist_positions(&mut self, updates: Vec<PositionUpdate>, action: &str) -> Result<(), BoardError> {
        let user_id = self.user_id()?;
        self.store
            .patch_many(&user_id, &updates)
            .map_err(|e| store_failed(action, e))
    }

    /// Move the task at display index `from` to `to`. Returns false for a no-op move.
    pub fn reorder_tasks(&mut self, from: usize, to: usize) -> Result<bool, BoardError> {
        self.user_id()?;
        let Some(updates) = ordering::reorder_tasks(&mut self.tasks, from, to) else {
            return Ok(false);
        };
        debug!(from, to, "tasks reordered");
        self.persist_positions(updates, "reorder tasks")?;
        Ok(true)
    }

    /// Move a task (by id) to display index `to`
    pub fn move_task(&mut self, task_id: &str, to: usize) -> Result<bool, BoardError> {
        let from = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?;
        self.reorder_tasks(from, to)
    }

    pub fn reorder_subtasks(&mut self, task_id: &str, from: usize, to: usize) -> Result<bool, BoardError> {
        self.user_id()?;
        let Some(updates) = ordering::reorder_subtasks(self.task_mut(task_id)?, from, to) else {
            return Ok(false);
        };
        debug!(task_id, from, to, "subtasks reordered");
        self.persist_positions(updates, "reorder subtasks")?;
        Ok(true)
    }

    /// Start (or resume) timing `task_id` from its recorded time
    pub fn start_timer(&mut self, task_id: &str) -> Result<(), BoardError> {
        self.user_id()?;
        let task = self
            .task(task_id)
            .ok_or_else(|| BoardError::TaskNotFound(task_id.to_string()))?;
        let (base, title) = (task.time_spent, task.title.clone());
        let id = task_id.to_string();
        let result = self.drive_timer(|timer, clock, sink| timer.start(&id, base, clock, sink));
        self.active_title = Some(title);
        result
    }

    pub fn pause_timer(&mut self) -> Result<(), BoardError> {
        self.drive_timer(|timer, clock, sink| timer.pause(clock, sink))
    }

    pub fn resume_timer(&mut self) {
        self.timer.resume(self.clock.as_ref());
    }

    /// Pause a running timer or resume a paused one
    pub fn toggle_pause(&mut self) -> Result<(), BoardError> {
        if self.timer.is_paused() {
            self.resume_timer();
            Ok(())
        } else {
            self.pause_timer()
        }
    }

    pub fn stop_timer(&mut self) -> Result<(), BoardError> {
        self.drive_timer(|timer, clock, sink| timer.stop(clock, sink))
    }

    /// Resample the timer; returns the new elapsed seconds when it changed
    pub fn tick(&mut self) -> Option<u64> {
        self.timer.tick(self.clock.as_ref())
    }

    pub fn next_tick_in(&self) -> Option<Duration> {
        self.timer.next_tick_in(self.clock.as_ref())
    }

    /// Seconds to display for a task: the live elapsed value for the timed task
    pub fn display_seconds(&self, task: &Task) -> u64 {
        if self.timer.is_active(&task.id) {
            self.timer.elapsed()
        } else {
            task.time_spent
        }
    }

    pub fn export_json(&self) -> Result<(String, usize), BoardError> {
        let user_id = self.user_id()?;
        Ok(transfer::export_user(self.store.as_ref(), &user_id)?)
    }

    /// Import a JSON batch; returns how many tasks were created
    pub fn import_json(&mut self, json: &str) -> Result<usize, BoardError> {
        let user_id = self.user_id()?;
        let ids = transfer::import_user(self.store.as_ref(), &user_id, json)?;
        self.sync();
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreOp};
    use crate::timer::ManualClock;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()
    }

    fn board() -> (Board, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(1_700_000_000_000);
        let mut board = Board::new(Box::new(store.clone()), Box::new(clock.clone()), day());
        board.set_user(Some(User::from_name("tester").unwrap())).unwrap();
        (board, store, clock)
    }

    fn run_for(board: &mut Board, clock: &ManualClock, seconds: u64) {
        for _ in 0..seconds {
            clock.advance(Duration::from_secs(1));
            board.tick();
        }
    }

    #[test]
    fn test_add_task_appends_at_count_and_rejects_blank() {
        let (mut board, store, _) = board();
        board.add_task("first", Vec::new(), None).unwrap();
        let id = board.add_task("second", vec!["x".to_string()], Some(Priority::Low)).unwrap();
        board.sync();

        let task = board.task(&id).unwrap();
        assert_eq!(task.position, 1);
        assert_eq!(task.time_spent, 0);
        assert!(!task.completed);

        store.clear_operations();
        assert!(matches!(board.add_task("   ", Vec::new(), None), Err(BoardError::EmptyTitle)));
        assert!(store.operations().is_empty());
    }

    #[test]
    fn test_requires_user() {
        let store = MemoryStore::new();
        let mut board = Board::new(Box::new(store), Box::new(ManualClock::new(0)), day());
        assert!(matches!(board.add_task("t", Vec::new(), None), Err(BoardError::NotSignedIn)));
    }

    #[test]
    fn test_timer_flushes_five_seconds_on_stop() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        store.clear_operations();

        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 5);
        assert_eq!(board.timer_view().elapsed, 5);
        board.stop_timer().unwrap();

        assert_eq!(
            store.operations(),
            vec![StoreOp::Patch {
                task_id: id.clone(),
                patch: TaskPatch::time_spent(5)
            }]
        );
        assert_eq!(board.task(&id).unwrap().time_spent, 5);
        assert_eq!(board.timer_view(), TimerView::default());
        assert_eq!(board.active_title(), None);
    }

    #[test]
    fn test_switching_tasks_flushes_previous_before_new_run() {
        let (mut board, store, clock) = board();
        let a = board.add_task("a", Vec::new(), None).unwrap();
        let b = board.add_task("b", Vec::new(), None).unwrap();
        store.clear_operations();

        board.start_timer(&a).unwrap();
        run_for(&mut board, &clock, 3);
        board.start_timer(&b).unwrap();

        assert_eq!(
            store.operations(),
            vec![StoreOp::Patch {
                task_id: a.clone(),
                patch: TaskPatch::time_spent(3)
            }]
        );
        let view = board.timer_view();
        assert_eq!(view.active_task_id.as_deref(), Some(b.as_str()));
        assert_eq!(view.elapsed, 0);
        assert_eq!(board.active_title(), Some("b"));
    }

    #[test]
    fn test_restart_continues_from_recorded_time() {
        let (mut board, _, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 4);
        board.stop_timer().unwrap();

        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 2);
        assert_eq!(board.timer_view().elapsed, 6);
    }

    #[test]
    fn test_delete_active_task_flushes_then_deletes() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        store.clear_operations();

        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 7);
        board.delete_task(&id).unwrap();

        assert_eq!(
            store.operations(),
            vec![
                StoreOp::Patch {
                    task_id: id.clone(),
                    patch: TaskPatch::time_spent(7)
                },
                StoreOp::Delete { task_id: id.clone() },
            ]
        );
        assert!(!board.timer_view().running);
        assert!(board.task(&id).is_none());
    }

    #[test]
    fn test_completing_active_task_stops_timer() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        store.clear_operations();
        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 2);

        assert!(board.toggle_completion(&id).unwrap());
        assert_eq!(board.timer_view().active_task_id, None);
        assert_eq!(
            store.operations(),
            vec![
                StoreOp::Patch {
                    task_id: id.clone(),
                    patch: TaskPatch::time_spent(2)
                },
                StoreOp::Patch {
                    task_id: id.clone(),
                    patch: TaskPatch::completed(true)
                },
            ]
        );
    }

    #[test]
    fn test_failed_flush_is_reported_but_timer_still_stops() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 3);

        store.set_failing(true);
        assert!(matches!(board.stop_timer(), Err(BoardError::Store(_))));
        assert_eq!(board.timer_view(), TimerView::default());
        // local value is kept
        assert_eq!(board.task(&id).unwrap().time_spent, 3);
    }

    #[test]
    fn test_delete_still_happens_when_flush_fails() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 4);
        store.clear_operations();

        store.set_failing_patches(true);
        assert!(matches!(board.delete_task(&id), Err(BoardError::Store(_))));
        assert_eq!(store.operations(), vec![StoreOp::Delete { task_id: id.clone() }]);
        assert!(board.task(&id).is_none());
        assert_eq!(board.timer_view(), TimerView::default());
    }

    #[test]
    fn test_failed_write_keeps_local_edit() {
        let (mut board, store, _) = board();
        let id = board.add_task("old", Vec::new(), None).unwrap();
        store.set_failing(true);
        assert!(board.rename_task(&id, "new").is_err());
        assert_eq!(board.task(&id).unwrap().title, "new");
    }

    #[test]
    fn test_reorder_persists_full_rewrite() {
        let (mut board, store, _) = board();
        for title in ["1", "2", "3"] {
            board.add_task(title, Vec::new(), None).unwrap();
        }
        board.sync();
        store.clear_operations();

        assert!(board.reorder_tasks(2, 0).unwrap());
        assert!(!board.reorder_tasks(1, 1).unwrap());
        assert_eq!(store.operations().len(), 1);

        board.sync();
        let titles: Vec<&str> = board.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["3", "1", "2"]);
        let positions: Vec<i64> = board.tasks().iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_subtasks_add_toggle_reorder_delete() {
        let (mut board, _, _) = board();
        let id = board.add_task("parent", Vec::new(), None).unwrap();
        let a = board.add_subtask(&id, "a").unwrap();
        let b = board.add_subtask(&id, "b").unwrap();
        assert!(board.toggle_subtask(&id, &a).unwrap());

        assert!(board.reorder_subtasks(&id, 1, 0).unwrap());
        board.sync();
        let order: Vec<String> = board.task(&id).unwrap().ordered_subtasks().iter().map(|s| s.id.clone()).collect();
        assert_eq!(order, vec![b.clone(), a.clone()]);
        assert!(board.task(&id).unwrap().subtask(&a).unwrap().completed);

        board.delete_subtask(&id, &b).unwrap();
        board.sync();
        assert_eq!(board.task(&id).unwrap().sub_tasks.len(), 1);
        assert!(matches!(board.toggle_subtask(&id, &b), Err(BoardError::SubTaskNotFound(_))));
    }

    #[test]
    fn test_sync_picks_up_writes_from_another_handle() {
        let (mut board, store, _) = board();
        store
            .create("tester", NewTask::new("elsewhere".to_string(), day(), 0))
            .unwrap();
        assert!(board.sync());
        assert_eq!(board.tasks().len(), 1);
        assert!(!board.sync());
    }

    #[test]
    fn test_sign_out_stops_and_flushes_timer() {
        let (mut board, store, clock) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        board.start_timer(&id).unwrap();
        run_for(&mut board, &clock, 4);

        board.set_user(None).unwrap();
        assert!(board.tasks().is_empty());
        assert_eq!(board.timer_view().active_task_id, None);
        assert_eq!(store.query_by_date("tester", day()).unwrap()[0].time_spent, 4);
    }

    #[test]
    fn test_date_change_resubscribes() {
        let (mut board, _, _) = board();
        board.add_task("today", Vec::new(), None).unwrap();
        let tomorrow = day().succ_opt().unwrap();
        board.set_selected_date(tomorrow).unwrap();
        assert!(board.tasks().is_empty());
        board.add_task("tomorrow", Vec::new(), None).unwrap();
        board.set_selected_date(day()).unwrap();
        let titles: Vec<&str> = board.tasks().iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["today"]);
    }

    #[test]
    fn test_description_and_links() {
        let (mut board, _, _) = board();
        let id = board.add_task("x", Vec::new(), None).unwrap();
        board.set_description(&id, "  **bold**  ").unwrap();
        board.add_link(&id, "https://a.example").unwrap();
        board.add_link(&id, "https://b.example").unwrap();
        assert!(matches!(board.add_link(&id, " "), Err(BoardError::EmptyLink)));
        board.remove_link(&id, 0).unwrap();

        let task = board.task(&id).unwrap();
        assert_eq!(task.description.as_deref(), Some("**bold**"));
        assert_eq!(task.links, vec!["https://b.example"]);

        board.set_description(&id, "").unwrap();
        assert_eq!(board.task(&id).unwrap().description, None);
    }
}
