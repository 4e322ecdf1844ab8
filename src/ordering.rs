//! Position-indexed ordering of sibling sets (tasks of one date, subtasks of one task).
//!
//! Display order is `position` ascending with ties kept in arrival order. A reorder is a
//! single-element move over the displayed sequence, after which every sibling gets its new
//! zero-based index written back as its position.

use crate::models::{SubTask, Task};

pub trait Positioned {
    fn id(&self) -> &str;
    fn position(&self) -> i64;
    fn set_position(&mut self, position: i64);
}

impl Positioned for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

impl Positioned for SubTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn set_position(&mut self, position: i64) {
        self.position = position;
    }
}

/// Where a position value is written in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PositionTarget {
    Task { task_id: String },
    SubTask { task_id: String, subtask_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    pub target: PositionTarget,
    pub position: i64,
}

/// Stable sort by position; duplicates keep their arrival order
pub fn sort_by_position<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(|item| item.position());
}

/// Move the element at `from` to `to`. Returns false (and leaves `items` untouched)
/// when the indices are equal or either one is outside the sequence.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from == to || from >= items.len() || to >= items.len() {
        return false;
    }
    let item = items.remove(from);
    items.insert(to, item);
    true
}

/// Rewrite positions to match the current sequence index
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i64);
    }
}

pub fn task_position_updates(tasks: &[Task]) -> Vec<PositionUpdate> {
    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| PositionUpdate {
            target: PositionTarget::Task { task_id: task.id.clone() },
            position: index as i64,
        })
        .collect()
}

pub fn subtask_position_updates(task_id: &str, subtasks: &[SubTask]) -> Vec<PositionUpdate> {
    subtasks
        .iter()
        .enumerate()
        .map(|(index, subtask)| PositionUpdate {
            target: PositionTarget::SubTask {
                task_id: task_id.to_string(),
                subtask_id: subtask.id.clone(),
            },
            position: index as i64,
        })
        .collect()
}

/// Reorder a position-sorted task list in place. Returns the full set of position
/// updates to persist, or `None` when the move is a no-op.
pub fn reorder_tasks(tasks: &mut Vec<Task>, from: usize, to: usize) -> Option<Vec<PositionUpdate>> {
    if !move_item(tasks, from, to) {
        return None;
    }
    renumber(tasks);
    Some(task_position_updates(tasks))
}

/// Reorder one task's subtasks. Indices refer to the displayed (position-sorted) order;
/// the subtask vector is left in that order afterwards.
pub fn reorder_subtasks(task: &mut Task, from: usize, to: usize) -> Option<Vec<PositionUpdate>> {
    sort_by_position(&mut task.sub_tasks);
    if !move_item(&mut task.sub_tasks, from, to) {
        return None;
    }
    renumber(&mut task.sub_tasks);
    Some(subtask_position_updates(&task.id, &task.sub_tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn task(id: &str, position: i64) -> Task {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        Task::from_new(id.to_string(), NewTask::new(format!("task {}", id), date, position))
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn updates_by_id(updates: &[PositionUpdate]) -> HashMap<String, i64> {
        updates
            .iter()
            .map(|u| match &u.target {
                PositionTarget::Task { task_id } => (task_id.clone(), u.position),
                PositionTarget::SubTask { subtask_id, .. } => (subtask_id.clone(), u.position),
            })
            .collect()
    }

    fn splice(mut ids: Vec<&str>, from: usize, to: usize) -> Vec<&str> {
        let item = ids.remove(from);
        ids.insert(to, item);
        ids
    }

    #[test]
    fn test_drag_last_to_first_persists_full_rewrite() {
        let mut tasks = vec![task("1", 0), task("2", 1), task("3", 2)];
        let updates = reorder_tasks(&mut tasks, 2, 0).unwrap();

        let expected: HashMap<String, i64> =
            [("1".to_string(), 1), ("2".to_string(), 2), ("3".to_string(), 0)].into_iter().collect();
        assert_eq!(updates_by_id(&updates), expected);
        assert_eq!(ids(&tasks), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_reorder_matches_single_splice_forward_and_backward() {
        for (from, to) in [(0, 3), (1, 2), (3, 0), (2, 1)] {
            let mut tasks = vec![task("a", 0), task("b", 1), task("c", 2), task("d", 3)];
            let expected = splice(vec!["a", "b", "c", "d"], from, to);

            let updates = reorder_tasks(&mut tasks, from, to).unwrap();

            // Apply the persisted positions to a fresh copy and read back by position
            let positions = updates_by_id(&updates);
            let mut reread = vec![task("a", 0), task("b", 1), task("c", 2), task("d", 3)];
            for t in reread.iter_mut() {
                t.position = positions[&t.id];
            }
            sort_by_position(&mut reread);
            assert_eq!(ids(&reread), expected, "move {} -> {}", from, to);
        }
    }

    #[test]
    fn test_same_index_is_noop() {
        let mut tasks = vec![task("1", 0), task("2", 5)];
        assert!(reorder_tasks(&mut tasks, 1, 1).is_none());
        assert_eq!(tasks[1].position, 5);
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut tasks = vec![task("1", 0), task("2", 1)];
        assert!(reorder_tasks(&mut tasks, 0, 2).is_none());
        assert!(reorder_tasks(&mut tasks, 7, 0).is_none());
        assert_eq!(ids(&tasks), vec!["1", "2"]);
    }

    #[test]
    fn test_sort_by_position_is_stable_for_duplicates_and_gaps() {
        let mut tasks = vec![task("x", 4), task("y", 1), task("z", 4), task("w", 1)];
        sort_by_position(&mut tasks);
        assert_eq!(ids(&tasks), vec!["y", "w", "x", "z"]);
    }

    #[test]
    fn test_reorder_subtasks_uses_display_order_and_scopes_updates() {
        let mut parent = task("p", 0);
        for (id, pos) in [("s1", 1), ("s2", 0), ("s3", 2)] {
            let mut s = SubTask::new(id.to_string(), pos);
            s.id = id.to_string();
            parent.sub_tasks.push(s);
        }

        // displayed: s2, s1, s3 ; move s3 (index 2) to the top
        let updates = reorder_subtasks(&mut parent, 2, 0).unwrap();
        let order: Vec<&str> = parent.sub_tasks.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(order, vec!["s3", "s2", "s1"]);

        for update in &updates {
            match &update.target {
                PositionTarget::SubTask { task_id, .. } => assert_eq!(task_id, "p"),
                other => panic!("unexpected target {:?}", other),
            }
        }
        let positions = updates_by_id(&updates);
        assert_eq!(positions["s3"], 0);
        assert_eq!(positions["s2"], 1);
        assert_eq!(positions["s1"], 2);
    }
}
