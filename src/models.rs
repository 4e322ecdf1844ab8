use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Cycle none -> high -> medium -> low -> none (used by the TUI priority key)
    pub fn cycle(current: Option<Priority>) -> Option<Priority> {
        match current {
            None => Some(Priority::High),
            Some(Priority::High) => Some(Priority::Medium),
            Some(Priority::Medium) => Some(Priority::Low),
            Some(Priority::Low) => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            other => Err(format!("unknown priority '{}' (expected high, medium or low)", other)),
        }
    }
}

/// Largest `time_spent` whose millisecond value still fits an `i64`
pub const MAX_TIME_SPENT: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default)]
    pub position: i64,
}

impl SubTask {
    pub fn new(title: String, position: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title,
            completed: false,
            time_spent: 0,
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl Task {
    pub fn from_new(id: String, new: NewTask) -> Self {
        Self {
            id,
            title: new.title,
            date: new.date,
            completed: new.completed,
            time_spent: new.time_spent,
            sub_tasks: new.sub_tasks,
            description: new.description,
            links: new.links,
            position: new.position,
            tags: new.tags,
            priority: new.priority,
        }
    }

    /// Subtasks in display order (position ascending, insertion order on ties)
    pub fn ordered_subtasks(&self) -> Vec<&SubTask> {
        let mut subtasks: Vec<&SubTask> = self.sub_tasks.iter().collect();
        subtasks.sort_by_key(|s| s.position);
        subtasks
    }

    pub fn completed_subtask_count(&self) -> usize {
        self.sub_tasks.iter().filter(|s| s.completed).count()
    }

    pub fn subtask(&self, subtask_id: &str) -> Option<&SubTask> {
        self.sub_tasks.iter().find(|s| s.id == subtask_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A task as submitted to the store, before an id is assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub date: NaiveDate,
    pub completed: bool,
    pub time_spent: u64,
    pub sub_tasks: Vec<SubTask>,
    pub description: Option<String>,
    pub links: Vec<String>,
    pub position: i64,
    pub tags: Vec<String>,
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new(title: String, date: NaiveDate, position: i64) -> Self {
        Self {
            title,
            date,
            completed: false,
            time_spent: 0,
            sub_tasks: Vec::new(),
            description: None,
            links: Vec::new(),
            position,
            tags: Vec::new(),
            priority: None,
        }
    }
}

impl From<Task> for NewTask {
    fn from(task: Task) -> Self {
        Self {
            title: task.title,
            date: task.date,
            completed: task.completed,
            time_spent: task.time_spent,
            sub_tasks: task.sub_tasks,
            description: task.description,
            links: task.links,
            position: task.position,
            tags: task.tags,
            priority: task.priority,
        }
    }
}

/// Parse a comma separated tag list: trimmed, lower-cased, empty entries and duplicates dropped
pub fn parse_tags(input: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in input.split(',') {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
