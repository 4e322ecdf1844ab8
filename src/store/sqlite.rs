use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use tracing::{debug, info};

use crate::models::{NewTask, Priority, SubTask, Task};
use crate::ordering::{PositionTarget, PositionUpdate};
use crate::store::{StoreError, Subscribers, Subscription, TaskPatch, TaskStore};

const TASK_COLUMNS: &str =
    "id, title, date, completed, time_spent, description, links, position, tags, priority";

pub struct SqliteStore {
    conn: Connection,
    subscribers: Subscribers,
}

fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize the schema
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "task database opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn,
            subscribers: Subscribers::default(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                date            TEXT NOT NULL,
                completed       INTEGER NOT NULL DEFAULT 0,
                time_spent      INTEGER NOT NULL DEFAULT 0,
                description     TEXT,
                links           TEXT NOT NULL DEFAULT '[]',
                position        INTEGER NOT NULL DEFAULT 0,
                tags            TEXT NOT NULL DEFAULT '[]',
                priority        TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subtasks (
                task_id         TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                id              TEXT NOT NULL,
                user_id         TEXT NOT NULL,
                title           TEXT NOT NULL,
                completed       INTEGER NOT NULL DEFAULT 0,
                time_spent      INTEGER NOT NULL DEFAULT 0,
                position        INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (task_id, id)
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_user_date ON tasks(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks(task_id);",
        )?;
        Ok(())
    }

    /// Helper function to map a row (selected with TASK_COLUMNS) to a Task without subtasks
    fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
        let priority: Option<String> = row.get(9)?;
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            date: row.get(2)?,
            completed: row.get::<_, i64>(3)? != 0,
            time_spent: row.get::<_, i64>(4)?.max(0) as u64,
            sub_tasks: Vec::new(),
            description: row.get(5)?,
            links: json_list(row, 6)?,
            position: row.get(7)?,
            tags: json_list(row, 8)?,
            priority: priority.and_then(|p| p.parse::<Priority>().ok()),
        })
    }

    fn row_to_subtask(row: &rusqlite::Row) -> Result<SubTask, rusqlite::Error> {
        Ok(SubTask {
            id: row.get(0)?,
            title: row.get(1)?,
            completed: row.get::<_, i64>(2)? != 0,
            time_spent: row.get::<_, i64>(3)?.max(0) as u64,
            position: row.get(4)?,
        })
    }

    fn load_subtasks(&self, task: &mut Task) -> Result<(), StoreError> {
        // rowid order is insertion order; display order is decided by position
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, title, completed, time_spent, position FROM subtasks WHERE task_id = ?1 ORDER BY rowid ASC",
        )?;
        task.sub_tasks = stmt
            .query_map(rusqlite::params![task.id], Self::row_to_subtask)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }

    fn query_tasks(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Task>, StoreError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let mut tasks = stmt
            .query_map(params, Self::row_to_task)?
            .collect::<Result<Vec<_>, _>>()?;
        for task in tasks.iter_mut() {
            self.load_subtasks(task)?;
        }
        Ok(tasks)
    }

    fn insert_task(tx: &Transaction, user_id: &str, task: &NewTask) -> Result<String, StoreError> {
        let id = new_task_id();
        let now = now_timestamp();
        tx.execute(
            "INSERT INTO tasks (id, user_id, title, date, completed, time_spent, description, links, position, tags, priority, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                id,
                user_id,
                task.title,
                task.date,
                task.completed as i64,
                seconds_column(task.time_spent)?,
                task.description,
                serde_json::to_string(&task.links)?,
                task.position,
                serde_json::to_string(&task.tags)?,
                task.priority.map(|p| p.as_str()),
                now,
                now
            ],
        )?;
        for subtask in &task.sub_tasks {
            Self::upsert_subtask(tx, user_id, &id, subtask)?;
        }
        Ok(id)
    }

    fn upsert_subtask(tx: &Transaction, user_id: &str, task_id: &str, subtask: &SubTask) -> Result<(), StoreError> {
        tx.execute(
            "INSERT INTO subtasks (task_id, id, user_id, title, completed, time_spent, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(task_id, id) DO UPDATE SET
                title = excluded.title,
                completed = excluded.completed,
                time_spent = excluded.time_spent,
                position = excluded.position",
            rusqlite::params![
                task_id,
                subtask.id,
                user_id,
                subtask.title,
                subtask.completed as i64,
                seconds_column(subtask.time_spent)?,
                subtask.position
            ],
        )?;
        Ok(())
    }

    fn notify(&self, user_id: &str) {
        self.subscribers.notify(user_id, |date| self.query_by_date(user_id, date));
    }
}

/// `time_spent` as stored; SQLite integers are signed
fn seconds_column(seconds: u64) -> Result<i64, StoreError> {
    i64::try_from(seconds).map_err(|_| StoreError::OutOfRange {
        column: "time_spent",
        value: seconds,
    })
}

/// Read a JSON encoded string list column
fn json_list(row: &rusqlite::Row, idx: usize) -> Result<Vec<String>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

impl TaskStore for SqliteStore {
    fn query_by_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 AND date = ?2 ORDER BY position ASC, rowid ASC",
            TASK_COLUMNS
        );
        self.query_tasks(&sql, rusqlite::params![user_id, date])
    }

    fn subscribe(&self, user_id: &str, date: NaiveDate) -> Result<Subscription, StoreError> {
        let initial = self.query_by_date(user_id, date)?;
        Ok(self.subscribers.register(user_id, date, initial))
    }

    fn list_all(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = ?1 ORDER BY date ASC, position ASC, rowid ASC",
            TASK_COLUMNS
        );
        self.query_tasks(&sql, rusqlite::params![user_id])
    }

    fn create(&self, user_id: &str, task: NewTask) -> Result<String, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let id = Self::insert_task(&tx, user_id, &task)?;
        tx.commit()?;
        debug!(user_id, task_id = %id, "task created");
        self.notify(user_id);
        Ok(id)
    }

    fn create_many(&self, user_id: &str, tasks: Vec<NewTask>) -> Result<Vec<String>, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(tasks.len());
        for task in &tasks {
            ids.push(Self::insert_task(&tx, user_id, task)?);
        }
        tx.commit()?;
        debug!(user_id, count = ids.len(), "tasks created");
        self.notify(user_id);
        Ok(ids)
    }

    fn patch(&self, user_id: &str, task_id: &str, patch: &TaskPatch) -> Result<(), StoreError> {
        let mut assignments: Vec<&str> = vec!["updated_at = ?"];
        let mut values: Vec<Value> = vec![Value::Text(now_timestamp())];

        if let Some(ref title) = patch.title {
            assignments.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(completed) = patch.completed {
            assignments.push("completed = ?");
            values.push(Value::Integer(completed as i64));
        }
        if let Some(time_spent) = patch.time_spent {
            assignments.push("time_spent = ?");
            values.push(Value::Integer(seconds_column(time_spent)?));
        }
        if let Some(ref description) = patch.description {
            assignments.push("description = ?");
            values.push(description.clone().map(Value::Text).unwrap_or(Value::Null));
        }
        if let Some(ref links) = patch.links {
            assignments.push("links = ?");
            values.push(Value::Text(serde_json::to_string(links)?));
        }
        if let Some(ref tags) = patch.tags {
            assignments.push("tags = ?");
            values.push(Value::Text(serde_json::to_string(tags)?));
        }
        if let Some(priority) = patch.priority {
            assignments.push("priority = ?");
            values.push(priority.map(|p| Value::Text(p.as_str().to_string())).unwrap_or(Value::Null));
        }
        values.push(Value::Text(task_id.to_string()));
        values.push(Value::Text(user_id.to_string()));

        let tx = self.conn.unchecked_transaction()?;
        let sql = format!("UPDATE tasks SET {} WHERE id = ? AND user_id = ?", assignments.join(", "));
        let updated = tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        if updated == 0 {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        for subtask in &patch.upsert_subtasks {
            Self::upsert_subtask(&tx, user_id, task_id, subtask)?;
        }
        for subtask_id in &patch.remove_subtasks {
            tx.execute(
                "DELETE FROM subtasks WHERE task_id = ?1 AND id = ?2 AND user_id = ?3",
                rusqlite::params![task_id, subtask_id, user_id],
            )?;
        }
        tx.commit()?;
        self.notify(user_id);
        Ok(())
    }

    fn patch_many(&self, user_id: &str, updates: &[PositionUpdate]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let now = now_timestamp();
        let tx = self.conn.unchecked_transaction()?;
        for update in updates {
            match &update.target {
                PositionTarget::Task { task_id } => {
                    tx.execute(
                        "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                        rusqlite::params![update.position, now, task_id, user_id],
                    )?;
                }
                PositionTarget::SubTask { task_id, subtask_id } => {
                    tx.execute(
                        "UPDATE subtasks SET position = ?1 WHERE task_id = ?2 AND id = ?3 AND user_id = ?4",
                        rusqlite::params![update.position, task_id, subtask_id, user_id],
                    )?;
                }
            }
        }
        tx.commit()?;
        debug!(user_id, count = updates.len(), "positions rewritten");
        self.notify(user_id);
        Ok(())
    }

    fn delete(&self, user_id: &str, task_id: &str) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let owner: Option<String> = tx
            .query_row(
                "SELECT user_id FROM tasks WHERE id = ?1",
                rusqlite::params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.as_deref() != Some(user_id) {
            return Err(StoreError::NotFound(task_id.to_string()));
        }
        tx.execute("DELETE FROM subtasks WHERE task_id = ?1", rusqlite::params![task_id])?;
        tx.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![task_id])?;
        tx.commit()?;
        debug!(user_id, task_id, "task deleted");
        self.notify(user_id);
        Ok(())
    }
}
