//! JSON export and import of a user's tasks.
//!
//! Export writes every task as a pretty-printed JSON array. Import accepts the same
//! shape and is all-or-nothing: the batch is validated in full before anything is
//! written, then created in one atomic store call with fresh task ids.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{MAX_TIME_SPENT, NewTask, Task};
use crate::store::{StoreError, TaskStore};

const REQUIRED_FIELDS: [&str; 3] = ["id", "title", "date"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Import data is not an array of tasks")]
    NotAnArray,
    #[error("Task at index {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },
    #[error("Task at index {index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
    #[error("Failed to store imported tasks: {0}")]
    StoreError(#[from] StoreError),
    #[error("Failed to encode tasks: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// Default file name for an export made on `date`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("taskclock_export_{}.json", date.format("%Y-%m-%d"))
}

pub fn export_json(tasks: &[Task]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(tasks)
}

/// Export every task of `user_id`
pub fn export_user(store: &dyn TaskStore, user_id: &str) -> Result<(String, usize), TransferError> {
    let tasks = store.list_all(user_id)?;
    let json = export_json(&tasks)?;
    info!(user_id, count = tasks.len(), "tasks exported");
    Ok((json, tasks.len()))
}

fn has_non_empty_string(object: &serde_json::Map<String, Value>, field: &str) -> bool {
    object
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn check_time_spent(index: usize, task: &Task) -> Result<(), ValidationError> {
    let too_large = |seconds: u64| seconds > MAX_TIME_SPENT;
    if too_large(task.time_spent) {
        return Err(ValidationError::Malformed {
            index,
            reason: format!("timeSpent {} is out of range", task.time_spent),
        });
    }
    if let Some(subtask) = task.sub_tasks.iter().find(|s| too_large(s.time_spent)) {
        return Err(ValidationError::Malformed {
            index,
            reason: format!("subtask '{}' timeSpent {} is out of range", subtask.id, subtask.time_spent),
        });
    }
    Ok(())
}

/// Validate an import payload. Any failing element rejects the whole batch.
pub fn parse_import(json: &str) -> Result<Vec<NewTask>, ValidationError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(elements) = value else {
        return Err(ValidationError::NotAnArray);
    };

    let mut tasks = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        let Some(object) = element.as_object() else {
            return Err(ValidationError::Malformed {
                index,
                reason: "expected an object".to_string(),
            });
        };
        for field in REQUIRED_FIELDS {
            if !has_non_empty_string(object, field) {
                return Err(ValidationError::MissingField { index, field });
            }
        }
        let task: Task = serde_json::from_value(element).map_err(|e| ValidationError::Malformed {
            index,
            reason: e.to_string(),
        })?;
        check_time_spent(index, &task)?;
        tasks.push(NewTask::from(task));
    }
    Ok(tasks)
}

/// Validate `json` and create every task under `user_id`. Returns the new ids.
pub fn import_user(store: &dyn TaskStore, user_id: &str, json: &str) -> Result<Vec<String>, TransferError> {
    let tasks = match parse_import(json) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(user_id, "import rejected: {}", e);
            return Err(e.into());
        }
    };
    let ids = store.create_many(user_id, tasks)?;
    info!(user_id, count = ids.len(), "tasks imported");
    Ok(ids)
}
