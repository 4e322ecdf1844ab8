use crate::models::{Priority, Task};

/// Active search / priority / tag filter over the day's tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub query: String,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
}

impl TaskFilter {
    pub fn is_active(&self) -> bool {
        !self.query.trim().is_empty() || self.priority.is_some() || self.tag.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Parse search box input. `!high` sets the priority, `#work` the tag,
    /// everything else is free text. An unknown priority stays in the text.
    pub fn parse(input: &str) -> Self {
        let mut filter = Self::default();
        let mut words = Vec::new();
        for word in input.split_whitespace() {
            if let Some(tag) = word.strip_prefix('#').filter(|t| !t.is_empty()) {
                filter.tag = Some(tag.to_lowercase());
            } else if let Some(priority) = word.strip_prefix('!').and_then(|p| p.parse().ok()) {
                filter.priority = Some(priority);
            } else {
                words.push(word);
            }
        }
        filter.query = words.join(" ");
        filter
    }

    /// Case-insensitive search over title, description and subtask titles,
    /// combined with exact priority and tag matches
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(priority) = self.priority {
            if task.priority != Some(priority) {
                return false;
            }
        }
        if let Some(ref tag) = self.tag {
            if !task.has_tag(tag) {
                return false;
            }
        }
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        task.title.to_lowercase().contains(&query)
            || task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&query))
            || task.sub_tasks.iter().any(|s| s.title.to_lowercase().contains(&query))
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }

    /// Short label for the status bar, e.g. `"report" !high #work`
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.query.trim().is_empty() {
            parts.push(format!("\"{}\"", self.query.trim()));
        }
        if let Some(priority) = self.priority {
            parts.push(format!("!{}", priority));
        }
        if let Some(ref tag) = self.tag {
            parts.push(format!("#{}", tag));
        }
        parts.join(" ")
    }
}

/// Split into (active, completed), keeping the incoming order within each half
pub fn partition_by_completion<'a>(tasks: &[&'a Task]) -> (Vec<&'a Task>, Vec<&'a Task>) {
    tasks.iter().copied().partition(|t| !t.completed)
}

/// Every distinct tag used by `tasks`, sorted
pub fn all_tags(tasks: &[Task]) -> Vec<String> {
    let mut tags: Vec<String> = tasks.iter().flat_map(|t| t.tags.iter().cloned()).collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Tag after `current` in `tags`; `None` after the last one, the first one from `None`
pub fn next_tag(tags: &[String], current: Option<&str>) -> Option<String> {
    match current.and_then(|c| tags.iter().position(|t| t == c)) {
        Some(index) => tags.get(index + 1).cloned(),
        None => tags.first().cloned(),
    }
}
