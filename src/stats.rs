use chrono::{Datelike, Days, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsRange {
    #[default]
    Today,
    /// Monday through Sunday of the week containing today
    Week,
    All,
}

impl StatsRange {
    pub const ALL: [StatsRange; 3] = [StatsRange::Today, StatsRange::Week, StatsRange::All];

    pub fn label(&self) -> &'static str {
        match self {
            StatsRange::Today => "Today",
            StatsRange::Week => "This Week",
            StatsRange::All => "All Time",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            StatsRange::Today => StatsRange::Week,
            StatsRange::Week => StatsRange::All,
            StatsRange::All => StatsRange::Today,
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            StatsRange::Today => date == today,
            StatsRange::Week => {
                let (start, end) = week_bounds(today);
                date >= start && date <= end
            }
            StatsRange::All => true,
        }
    }
}

impl fmt::Display for StatsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" | "day" => Ok(StatsRange::Today),
            "week" => Ok(StatsRange::Week),
            "all" => Ok(StatsRange::All),
            other => Err(format!("unknown range '{}' (expected today, week or all)", other)),
        }
    }
}

/// Monday and Sunday of the week containing `date`
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = date.weekday().num_days_from_monday() as u64;
    let start = date.checked_sub_days(Days::new(offset)).unwrap_or(date);
    let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
    (start, end)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStats {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayStats {
    pub date: NaiveDate,
    pub total: usize,
    pub completed: usize,
    pub time_spent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStats {
    pub range: StatsRange,
    pub total: usize,
    pub completed: usize,
    /// Whole percent, rounded
    pub completion_rate: u32,
    pub total_time: u64,
    /// Seconds per task, rounded
    pub average_time: u64,
    /// Keyed by priority name, `"none"` for tasks without one
    pub by_priority: BTreeMap<String, GroupStats>,
    /// Keyed by tag, `"untagged"` for tasks without tags. A task counts once per tag.
    pub by_tag: BTreeMap<String, GroupStats>,
    /// The seven days of the current week, independent of `range`
    pub week: Vec<DayStats>,
}

fn rounded_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    (numerator + denominator / 2) / denominator
}

fn bump(groups: &mut BTreeMap<String, GroupStats>, key: &str, completed: bool) {
    let entry = groups
        .entry(key.to_string())
        .or_insert(GroupStats { total: 0, completed: 0 });
    entry.total += 1;
    if completed {
        entry.completed += 1;
    }
}

/// Compute statistics over `tasks` (every task of the user) for `range` relative to `today`
pub fn compute(tasks: &[Task], range: StatsRange, today: NaiveDate) -> TaskStats {
    let selected: Vec<&Task> = tasks.iter().filter(|t| range.contains(t.date, today)).collect();

    let total = selected.len();
    let completed = selected.iter().filter(|t| t.completed).count();
    let total_time: u64 = selected.iter().map(|t| t.time_spent).sum();

    let mut by_priority = BTreeMap::new();
    let mut by_tag = BTreeMap::new();
    for task in &selected {
        let priority = task.priority.map(|p| p.as_str()).unwrap_or("none");
        bump(&mut by_priority, priority, task.completed);
        if task.tags.is_empty() {
            bump(&mut by_tag, "untagged", task.completed);
        }
        for tag in &task.tags {
            bump(&mut by_tag, tag, task.completed);
        }
    }

    let (week_start, _) = week_bounds(today);
    let week = (0..7)
        .filter_map(|offset| week_start.checked_add_days(Days::new(offset)))
        .map(|date| {
            let day_tasks: Vec<&Task> = tasks.iter().filter(|t| t.date == date).collect();
            DayStats {
                date,
                total: day_tasks.len(),
                completed: day_tasks.iter().filter(|t| t.completed).count(),
                time_spent: day_tasks.iter().map(|t| t.time_spent).sum(),
            }
        })
        .collect();

    TaskStats {
        range,
        total,
        completed,
        completion_rate: rounded_div(completed as u64 * 100, total as u64) as u32,
        total_time,
        average_time: rounded_div(total_time, total as u64),
        by_priority,
        by_tag,
        week,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn task(id: &str, day: &str, completed: bool, time_spent: u64) -> Task {
        let mut t = Task::from_new(id.to_string(), NewTask::new(format!("task {}", id), date(day), 0));
        t.completed = completed;
        t.time_spent = time_spent;
        t
    }

    // Wednesday
    const TODAY: &str = "2024-05-15";

    fn fixture() -> Vec<Task> {
        let mut a = task("a", "2024-05-15", true, 600);
        a.priority = Some(Priority::High);
        a.tags = vec!["work".to_string(), "deep".to_string()];
        let mut b = task("b", "2024-05-15", false, 301);
        b.tags = vec!["work".to_string()];
        let c = task("c", "2024-05-15", false, 0);
        let d = task("d", "2024-05-13", true, 1200);
        let e = task("e", "2024-05-19", false, 60);
        let f = task("f", "2024-05-12", true, 3600);
        vec![a, b, c, d, e, f]
    }

    #[test]
    fn test_today_totals_and_rounding() {
        let stats = compute(&fixture(), StatsRange::Today, date(TODAY));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        // 33.3% rounds down, 901 / 3 = 300.33 rounds down
        assert_eq!(stats.completion_rate, 33);
        assert_eq!(stats.total_time, 901);
        assert_eq!(stats.average_time, 300);
    }

    #[test]
    fn test_week_is_monday_to_sunday() {
        let stats = compute(&fixture(), StatsRange::Week, date(TODAY));
        // a b c d e, but not f (previous Sunday)
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.completion_rate, 40);
        assert_eq!(stats.week.len(), 7);
        assert_eq!(stats.week[0].date, date("2024-05-13"));
        assert_eq!(stats.week[0].time_spent, 1200);
        assert_eq!(stats.week[2].total, 3);
        assert_eq!(stats.week[6].date, date("2024-05-19"));
    }

    #[test]
    fn test_groups_count_none_and_untagged() {
        let stats = compute(&fixture(), StatsRange::All, date(TODAY));
        assert_eq!(stats.total, 6);
        assert_eq!(stats.completion_rate, 50);
        assert_eq!(stats.by_priority["high"], GroupStats { total: 1, completed: 1 });
        assert_eq!(stats.by_priority["none"], GroupStats { total: 5, completed: 2 });
        assert_eq!(stats.by_tag["work"], GroupStats { total: 2, completed: 1 });
        assert_eq!(stats.by_tag["deep"].total, 1);
        assert_eq!(stats.by_tag["untagged"].total, 4);
    }

    #[test]
    fn test_empty_range_has_zero_rates() {
        let stats = compute(&[], StatsRange::Today, date(TODAY));
        assert_eq!(stats.completion_rate, 0);
        assert_eq!(stats.average_time, 0);
        assert!(stats.by_priority.is_empty());
    }

    #[test]
    fn test_week_bounds_on_sunday() {
        let (start, end) = week_bounds(date("2024-05-19"));
        assert_eq!(start, date("2024-05-13"));
        assert_eq!(end, date("2024-05-19"));
    }

    #[test]
    fn test_range_parse() {
        assert_eq!("Week".parse::<StatsRange>(), Ok(StatsRange::Week));
        assert!("month".parse::<StatsRange>().is_err());
    }
}
