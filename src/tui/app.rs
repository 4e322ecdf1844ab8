use crossbeam_channel::{Receiver, unbounded};
use crossterm::event::KeyEvent;
use ratatui::widgets::ListState;
use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::board::Board;
use crate::config::{Action, Config};
use crate::filter::{self, TaskFilter};
use crate::identity::{Identity, ListenerId, User};
use crate::models::{Priority, Task, parse_tags};
use crate::stats::{self, StatsRange, TaskStats};
use crate::tui::error::TuiError;
use crate::tui::widgets::input::InputField;
use crate::utils::{self, ParsedKeyBinding};

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(3);

/// What the single-line input popup is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    SignIn,
    NewTask,
    Rename,
    Subtask,
    Link,
    Description,
    Tags,
    Search,
}

impl InputKind {
    pub fn title(&self) -> &'static str {
        match self {
            InputKind::SignIn => "Sign in (user name)",
            InputKind::NewTask => "New task",
            InputKind::Rename => "Rename task",
            InputKind::Subtask => "New subtask",
            InputKind::Link => "Add link",
            InputKind::Description => "Description (markdown)",
            InputKind::Tags => "Tags (comma separated)",
            InputKind::Search => "Search (text, !priority, #tag)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Help,
    Stats,
    ConfirmDelete,
    Input(InputKind),
}

/// Which pane the list keys act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Tasks,
    Subtasks,
    Links,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Tasks => Focus::Subtasks,
            Focus::Subtasks => Focus::Links,
            Focus::Links => Focus::Tasks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Task { task_id: String, title: String },
    Subtask { task_id: String, subtask_id: String, title: String },
}

impl DeleteTarget {
    pub fn describe(&self) -> (&'static str, &str) {
        match self {
            DeleteTarget::Task { title, .. } => ("task", title),
            DeleteTarget::Subtask { title, .. } => ("subtask", title),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusState {
    pub message: Option<String>,
    pub message_time: Option<Instant>,
}

pub struct App {
    pub config: Config,
    pub board: Board,
    identity: Box<dyn Identity>,
    auth_listener: ListenerId,
    auth_events: Receiver<Option<User>>,
    bindings: Vec<(Action, ParsedKeyBinding)>,

    pub mode: Mode,
    pub focus: Focus,
    pub filter: TaskFilter,
    pub list_state: ListState,
    pub subtask_index: usize,
    pub link_index: usize,
    pub details_scroll: usize,
    pub input: InputField,
    /// Search text as typed, restored when the search box is reopened
    pub search_text: String,
    pub delete_target: Option<DeleteTarget>,
    /// 0 = Delete, 1 = Cancel
    pub delete_selection: usize,
    pub stats_range: StatsRange,
    pub stats: Option<TaskStats>,
    pub status: StatusState,
}

impl App {
    pub fn new(config: Config, board: Board, mut identity: Box<dyn Identity>) -> Result<Self, TuiError> {
        let bindings = config.key_bindings.parse()?;

        let (tx, rx) = unbounded();
        let auth_listener = identity.on_auth_state_change(Box::new(move |user: Option<&User>| {
            let _ = tx.send(user.cloned());
        }));

        let mut app = Self {
            config,
            board,
            identity,
            auth_listener,
            auth_events: rx,
            bindings,
            mode: Mode::Normal,
            focus: Focus::Tasks,
            filter: TaskFilter::default(),
            list_state: ListState::default(),
            subtask_index: 0,
            link_index: 0,
            details_scroll: 0,
            input: InputField::default(),
            search_text: String::new(),
            delete_target: None,
            delete_selection: 0,
            stats_range: StatsRange::Today,
            stats: None,
            status: StatusState::default(),
        };
        app.apply_auth_changes();
        Ok(app)
    }

    /// Action bound to `key`, if any
    pub fn action_for(&self, key: &KeyEvent) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(_, binding)| binding.matches(key))
            .map(|(action, _)| *action)
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status.message = Some(message);
        self.status.message_time = Some(Instant::now());
    }

    pub fn clear_status_message(&mut self) {
        self.status.message = None;
        self.status.message_time = None;
    }

    pub fn check_status_message_timeout(&mut self) {
        if let Some(time) = self.status.message_time {
            if time.elapsed() >= STATUS_MESSAGE_TIMEOUT {
                self.clear_status_message();
            }
        }
    }

    fn report(&mut self, action: &str, error: impl Display) {
        self.set_status_message(format!("{}: {}", action, error));
    }

    /// Background work for one loop iteration: auth changes, pushed snapshots, timer tick
    pub fn update(&mut self) {
        self.apply_auth_changes();
        let selected = self.selected_task_id();
        if self.board.sync() {
            self.reselect(selected.as_deref());
        }
        self.board.tick();
    }

    /// Feed the newest auth state to the board
    pub fn apply_auth_changes(&mut self) {
        let Some(user) = self.auth_events.try_iter().last() else {
            return;
        };
        let signed_in = user.is_some();
        if let Err(e) = self.board.set_user(user) {
            self.report("Failed to switch user", e);
        }
        self.list_state.select(None);
        self.focus = Focus::Tasks;
        self.filter.clear();
        self.search_text.clear();
        self.clamp_selection();
        if signed_in {
            if self.mode == Mode::Input(InputKind::SignIn) {
                self.mode = Mode::Normal;
            }
        } else {
            self.open_input(InputKind::SignIn, "");
        }
    }

    /// Tasks in list order: filtered, open tasks first, then completed ones
    pub fn visible_tasks(&self) -> Vec<&Task> {
        let filtered = self.filter.apply(self.board.tasks());
        let (mut active, completed) = filter::partition_by_completion(&filtered);
        active.extend(completed);
        active
    }

    pub fn selected_task(&self) -> Option<&Task> {
        let index = self.list_state.selected()?;
        self.visible_tasks().get(index).copied()
    }

    pub fn selected_task_id(&self) -> Option<String> {
        self.selected_task().map(|t| t.id.clone())
    }

    fn selected_subtask_id(&self) -> Option<(String, String, String)> {
        let task = self.selected_task()?;
        let subtask = task.ordered_subtasks().get(self.subtask_index).copied()?;
        Some((task.id.clone(), subtask.id.clone(), subtask.title.clone()))
    }

    fn reselect(&mut self, task_id: Option<&str>) {
        if let Some(id) = task_id {
            if let Some(index) = self.visible_tasks().iter().position(|t| t.id == id) {
                self.list_state.select(Some(index));
                self.clamp_detail_indices();
                return;
            }
        }
        self.clamp_selection();
    }

    pub fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.list_state.select(None);
        } else {
            let index = self.list_state.selected().unwrap_or(0).min(len - 1);
            self.list_state.select(Some(index));
        }
        self.clamp_detail_indices();
    }

    fn clamp_detail_indices(&mut self) {
        let (subtasks, links) = self
            .selected_task()
            .map(|t| (t.sub_tasks.len(), t.links.len()))
            .unwrap_or((0, 0));
        self.subtask_index = self.subtask_index.min(subtasks.saturating_sub(1));
        self.link_index = self.link_index.min(links.saturating_sub(1));
    }

    fn reset_details(&mut self) {
        self.subtask_index = 0;
        self.link_index = 0;
        self.details_scroll = 0;
    }

    pub fn move_selection_up(&mut self) {
        match self.focus {
            Focus::Tasks => {
                if let Some(index) = self.list_state.selected() {
                    if index > 0 {
                        self.list_state.select(Some(index - 1));
                        self.reset_details();
                    }
                }
            }
            Focus::Subtasks => self.subtask_index = self.subtask_index.saturating_sub(1),
            Focus::Links => self.link_index = self.link_index.saturating_sub(1),
        }
    }

    pub fn move_selection_down(&mut self) {
        match self.focus {
            Focus::Tasks => {
                let len = self.visible_tasks().len();
                let next = self.list_state.selected().map_or(0, |i| i + 1);
                if next < len {
                    self.list_state.select(Some(next));
                    self.reset_details();
                }
            }
            Focus::Subtasks => {
                self.subtask_index += 1;
                self.clamp_detail_indices();
            }
            Focus::Links => {
                self.link_index += 1;
                self.clamp_detail_indices();
            }
        }
    }

    pub fn switch_focus(&mut self) {
        self.focus = self.focus.next();
        self.clamp_detail_indices();
    }

    pub fn select(&mut self) {
        match self.focus {
            Focus::Tasks => {
                if self.selected_task().is_some_and(|t| !t.sub_tasks.is_empty()) {
                    self.focus = Focus::Subtasks;
                    self.subtask_index = 0;
                }
            }
            Focus::Subtasks => self.toggle_completion(),
            Focus::Links => self.copy_link(),
        }
    }

    pub fn scroll_details_up(&mut self) {
        self.details_scroll = self.details_scroll.saturating_sub(1);
    }

    pub fn scroll_details_down(&mut self) {
        self.details_scroll += 1;
    }

    pub fn change_date(&mut self, date: chrono::NaiveDate) {
        if let Err(e) = self.board.set_selected_date(date) {
            self.report("Failed to load tasks", e);
        }
        self.list_state.select(None);
        self.focus = Focus::Tasks;
        self.reset_details();
        self.clamp_selection();
    }

    pub fn previous_day(&mut self) {
        if let Some(date) = self.board.selected_date().pred_opt() {
            self.change_date(date);
        }
    }

    pub fn next_day(&mut self) {
        if let Some(date) = self.board.selected_date().succ_opt() {
            self.change_date(date);
        }
    }

    pub fn go_to_today(&mut self) {
        self.change_date(utils::today());
    }

    pub fn refresh(&mut self) {
        let selected = self.selected_task_id();
        match self.board.refresh() {
            Ok(()) => self.set_status_message("Refreshed".to_string()),
            Err(e) => self.report("Failed to refresh", e),
        }
        self.reselect(selected.as_deref());
    }

    pub fn open_input(&mut self, kind: InputKind, initial: &str) {
        self.input = InputField::new(initial);
        self.mode = Mode::Input(kind);
    }

    /// Open the input popup for `kind`, prefilled from the selected task where it makes sense
    pub fn begin_input(&mut self, kind: InputKind) {
        let needs_task = !matches!(kind, InputKind::NewTask | InputKind::Search | InputKind::SignIn);
        if needs_task && self.selected_task().is_none() {
            self.set_status_message("No task selected".to_string());
            return;
        }
        let initial = match (kind, self.selected_task()) {
            (InputKind::Rename, Some(task)) => task.title.clone(),
            (InputKind::Description, Some(task)) => task.description.clone().unwrap_or_default(),
            (InputKind::Tags, Some(task)) => task.tags.join(", "),
            (InputKind::Search, _) => self.search_text.clone(),
            _ => String::new(),
        };
        self.open_input(kind, &initial);
    }

    /// Live filter update while typing in the search box
    pub fn update_search(&mut self) {
        if self.mode != Mode::Input(InputKind::Search) {
            return;
        }
        let selected = self.selected_task_id();
        self.search_text = self.input.value().to_string();
        self.filter = TaskFilter::parse(&self.search_text);
        self.reselect(selected.as_deref());
    }

    /// Tags used by the day's tasks
    pub fn tag_inventory(&self) -> Vec<String> {
        filter::all_tags(self.board.tasks())
    }

    /// Swap the `#tag` token in the search box for the next known tag
    pub fn cycle_search_tag(&mut self) {
        if self.mode != Mode::Input(InputKind::Search) {
            return;
        }
        let tags = self.tag_inventory();
        if tags.is_empty() {
            self.set_status_message("No tags on this day".to_string());
            return;
        }
        let next = filter::next_tag(&tags, self.filter.tag.as_deref());
        let mut words: Vec<String> = self
            .input
            .value()
            .split_whitespace()
            .filter(|w| !w.starts_with('#'))
            .map(str::to_string)
            .collect();
        if let Some(tag) = next {
            words.push(format!("#{}", tag));
        }
        self.input = InputField::new(&words.join(" "));
        self.update_search();
    }

    /// Esc in the input popup. Returns true when the app should quit (leaving sign-in).
    pub fn cancel_input(&mut self) -> bool {
        match self.mode {
            Mode::Input(InputKind::SignIn) => return true,
            Mode::Input(InputKind::Search) => {
                let selected = self.selected_task_id();
                self.filter.clear();
                self.search_text.clear();
                self.reselect(selected.as_deref());
            }
            _ => {}
        }
        self.mode = Mode::Normal;
        false
    }

    /// Enter in the input popup
    pub fn submit_input(&mut self) {
        let Mode::Input(kind) = self.mode else {
            return;
        };
        let value = self.input.value().trim().to_string();
        self.mode = Mode::Normal;

        if kind == InputKind::SignIn {
            match self.identity.sign_in(&value) {
                Ok(user) => {
                    self.apply_auth_changes();
                    self.set_status_message(format!("Signed in as {}", user.display_name));
                }
                Err(e) => {
                    self.open_input(InputKind::SignIn, &value);
                    self.report("Sign-in failed", e);
                }
            }
            return;
        }
        if kind == InputKind::Search {
            return;
        }
        if kind == InputKind::NewTask {
            match self.board.add_task(&value, Vec::new(), None) {
                Ok(id) => {
                    self.reselect(Some(&id));
                    self.focus = Focus::Tasks;
                    self.reset_details();
                    self.set_status_message("Task created".to_string());
                }
                Err(e) => self.report("Failed to create task", e),
            }
            return;
        }

        let Some(task_id) = self.selected_task_id() else {
            self.set_status_message("No task selected".to_string());
            return;
        };
        let result = match kind {
            InputKind::Rename => self.board.rename_task(&task_id, &value).map(|_| "Task renamed"),
            InputKind::Subtask => self.board.add_subtask(&task_id, &value).map(|_| "Subtask added"),
            InputKind::Link => self.board.add_link(&task_id, &value).map(|_| "Link added"),
            InputKind::Description => self.board.set_description(&task_id, &value).map(|_| "Description saved"),
            InputKind::Tags => self.board.set_tags(&task_id, parse_tags(&value)).map(|_| "Tags saved"),
            InputKind::SignIn | InputKind::NewTask | InputKind::Search => return,
        };
        match result {
            Ok(message) => self.set_status_message(message.to_string()),
            Err(e) => self.report("Update failed", e),
        }
        self.reselect(Some(&task_id));
    }

    pub fn toggle_completion(&mut self) {
        match self.focus {
            Focus::Subtasks => {
                let Some((task_id, subtask_id, _)) = self.selected_subtask_id() else {
                    return;
                };
                if let Err(e) = self.board.toggle_subtask(&task_id, &subtask_id) {
                    self.report("Failed to update subtask", e);
                }
            }
            Focus::Tasks | Focus::Links => {
                let Some(task_id) = self.selected_task_id() else {
                    return;
                };
                match self.board.toggle_completion(&task_id) {
                    Ok(true) => self.set_status_message("Task completed".to_string()),
                    Ok(false) => self.set_status_message("Task reopened".to_string()),
                    Err(e) => self.report("Failed to update task", e),
                }
                self.reselect(Some(&task_id));
            }
        }
    }

    pub fn cycle_priority(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let (task_id, next) = (task.id.clone(), Priority::cycle(task.priority));
        match self.board.set_priority(&task_id, next) {
            Ok(()) => self.set_status_message(format!(
                "Priority: {}",
                next.map_or("none", |p| p.as_str())
            )),
            Err(e) => self.report("Failed to set priority", e),
        }
    }

    /// Delete key: links go immediately, tasks and subtasks ask first
    pub fn request_delete(&mut self) {
        let target = match self.focus {
            Focus::Tasks => self.selected_task().map(|t| DeleteTarget::Task {
                task_id: t.id.clone(),
                title: t.title.clone(),
            }),
            Focus::Subtasks => self
                .selected_subtask_id()
                .map(|(task_id, subtask_id, title)| DeleteTarget::Subtask { task_id, subtask_id, title }),
            Focus::Links => {
                if let Some(task_id) = self.selected_task_id() {
                    match self.board.remove_link(&task_id, self.link_index) {
                        Ok(()) => self.set_status_message("Link removed".to_string()),
                        Err(e) => self.report("Failed to remove link", e),
                    }
                    self.clamp_detail_indices();
                }
                return;
            }
        };
        if let Some(target) = target {
            self.delete_target = Some(target);
            self.delete_selection = 0;
            self.mode = Mode::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.mode = Mode::Normal;
        let Some(target) = self.delete_target.take() else {
            return;
        };
        if self.delete_selection != 0 {
            return;
        }
        let result = match &target {
            DeleteTarget::Task { task_id, .. } => self.board.delete_task(task_id).map(|_| "Task deleted"),
            DeleteTarget::Subtask { task_id, subtask_id, .. } => {
                self.board.delete_subtask(task_id, subtask_id).map(|_| "Subtask deleted")
            }
        };
        match result {
            Ok(message) => self.set_status_message(message.to_string()),
            Err(e) => self.report("Delete failed", e),
        }
        self.clamp_selection();
    }

    pub fn cancel_delete(&mut self) {
        self.delete_target = None;
        self.mode = Mode::Normal;
    }

    /// Move the selection one step up (`-1`) or down (`1`) in its list and persist the order
    pub fn move_selected(&mut self, delta: isize) {
        match self.focus {
            Focus::Tasks => self.move_selected_task(delta),
            Focus::Subtasks => {
                let Some(task) = self.selected_task() else {
                    return;
                };
                let (task_id, count) = (task.id.clone(), task.sub_tasks.len());
                let Some(to) = self.subtask_index.checked_add_signed(delta).filter(|&to| to < count) else {
                    return;
                };
                match self.board.reorder_subtasks(&task_id, self.subtask_index, to) {
                    Ok(_) => self.subtask_index = to,
                    Err(e) => self.report("Failed to reorder subtasks", e),
                }
            }
            Focus::Links => {}
        }
    }

    fn move_selected_task(&mut self, delta: isize) {
        if self.filter.is_active() {
            self.set_status_message("Clear the search to reorder tasks".to_string());
            return;
        }
        let Some(index) = self.list_state.selected() else {
            return;
        };
        let visible = self.visible_tasks();
        let Some(to) = index.checked_add_signed(delta) else {
            return;
        };
        let (Some(task), Some(neighbor)) = (visible.get(index), visible.get(to)) else {
            return;
        };
        // Open and completed tasks are shown in separate groups; moves stay inside one
        if task.completed != neighbor.completed {
            return;
        }
        let (task_id, neighbor_id) = (task.id.clone(), neighbor.id.clone());
        let Some(target) = self.board.tasks().iter().position(|t| t.id == neighbor_id) else {
            return;
        };
        match self.board.move_task(&task_id, target) {
            Ok(_) => self.reselect(Some(&task_id)),
            Err(e) => self.report("Failed to reorder tasks", e),
        }
    }

    pub fn start_timer(&mut self) {
        let Some(task_id) = self.selected_task_id() else {
            self.set_status_message("No task selected".to_string());
            return;
        };
        if let Err(e) = self.board.start_timer(&task_id) {
            self.report("Timer", e);
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.board.timer_view().active_task_id.is_none() {
            return;
        }
        if let Err(e) = self.board.toggle_pause() {
            self.report("Timer", e);
        }
    }

    pub fn stop_timer(&mut self) {
        if self.board.timer_view().active_task_id.is_none() {
            return;
        }
        match self.board.stop_timer() {
            Ok(()) => self.set_status_message("Timer stopped".to_string()),
            Err(e) => self.report("Timer", e),
        }
    }

    pub fn copy_link(&mut self) {
        let Some(link) = self
            .selected_task()
            .and_then(|t| t.links.get(self.link_index))
            .cloned()
        else {
            self.set_status_message("No link to copy".to_string());
            return;
        };
        if let Ok(mut clipboard) = arboard::Clipboard::new() {
            if let Err(e) = clipboard.set_text(&link) {
                self.set_status_message(format!("Failed to copy to clipboard: {}", e));
            } else {
                self.set_status_message("Link copied to clipboard".to_string());
            }
        } else {
            self.set_status_message("Failed to access clipboard".to_string());
        }
    }

    pub fn open_stats(&mut self) {
        match self.board.all_tasks() {
            Ok(tasks) => {
                self.stats = Some(stats::compute(&tasks, self.stats_range, utils::today()));
                self.mode = Mode::Stats;
            }
            Err(e) => self.report("Failed to load statistics", e),
        }
    }

    pub fn cycle_stats_range(&mut self) {
        self.stats_range = self.stats_range.next();
        self.open_stats();
    }

    pub fn sign_out(&mut self) {
        match self.identity.sign_out() {
            Ok(()) => {
                info!("signed out from the TUI");
                self.apply_auth_changes();
            }
            Err(e) => self.report("Sign-out failed", e),
        }
    }

    /// Flush a running timer before the app exits
    pub fn shutdown(&mut self) {
        if self.board.timer_view().active_task_id.is_some() {
            if let Err(e) = self.board.stop_timer() {
                warn!("timer flush on exit failed: {}", e);
            }
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.identity.remove_listener(self.auth_listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalIdentity;
    use crate::store::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::NaiveDate;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()
    }

    fn app_with(identity: LocalIdentity) -> App {
        let board = Board::new(Box::new(MemoryStore::new()), Box::new(ManualClock::new(0)), day());
        App::new(Config::default(), board, Box::new(identity)).unwrap()
    }

    fn signed_in_app() -> App {
        let mut identity = LocalIdentity::ephemeral();
        identity.sign_in("alice").unwrap();
        app_with(identity)
    }

    fn add(app: &mut App, title: &str) {
        app.open_input(InputKind::NewTask, title);
        app.submit_input();
    }

    fn titles(app: &App) -> Vec<String> {
        app.visible_tasks().iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_starts_in_sign_in_without_session() {
        let mut app = app_with(LocalIdentity::ephemeral());
        assert_eq!(app.mode, Mode::Input(InputKind::SignIn));

        app.input = InputField::new("Alice");
        app.submit_input();
        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.board.user().map(|u| u.uid.as_str()), Some("alice"));
    }

    #[test]
    fn test_invalid_sign_in_stays_in_prompt() {
        let mut app = app_with(LocalIdentity::ephemeral());
        app.input = InputField::new("   ");
        app.submit_input();
        assert_eq!(app.mode, Mode::Input(InputKind::SignIn));
        assert!(app.status.message.is_some());
        assert!(app.cancel_input());
    }

    #[test]
    fn test_completed_tasks_are_listed_last() {
        let mut app = signed_in_app();
        add(&mut app, "one");
        add(&mut app, "two");
        add(&mut app, "three");
        app.list_state.select(Some(0));
        app.toggle_completion();
        assert_eq!(titles(&app), vec!["two", "three", "one"]);
        assert_eq!(app.selected_task().map(|t| t.title.as_str()), Some("one"));
    }

    #[test]
    fn test_move_selected_task_down_persists_order() {
        let mut app = signed_in_app();
        add(&mut app, "one");
        add(&mut app, "two");
        add(&mut app, "three");
        app.list_state.select(Some(0));
        app.move_selected(1);
        assert_eq!(titles(&app), vec!["two", "one", "three"]);
        assert_eq!(app.list_state.selected(), Some(1));

        app.board.refresh().unwrap();
        let positions: Vec<(String, i64)> =
            app.board.tasks().iter().map(|t| (t.title.clone(), t.position)).collect();
        assert_eq!(
            positions,
            vec![("two".to_string(), 0), ("one".to_string(), 1), ("three".to_string(), 2)]
        );
    }

    #[test]
    fn test_reorder_is_blocked_while_filtering() {
        let mut app = signed_in_app();
        add(&mut app, "alpha");
        add(&mut app, "beta");
        app.filter = TaskFilter::parse("a");
        app.list_state.select(Some(0));
        app.move_selected(1);
        assert_eq!(
            app.board.tasks().iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["alpha", "beta"]
        );
    }

    #[test]
    fn test_search_filters_live_and_escape_clears() {
        let mut app = signed_in_app();
        add(&mut app, "write report");
        add(&mut app, "groceries");
        app.begin_input(InputKind::Search);
        app.input.insert_str("report");
        app.update_search();
        assert_eq!(titles(&app), vec!["write report"]);

        assert!(!app.cancel_input());
        assert_eq!(titles(&app).len(), 2);
    }

    #[test]
    fn test_search_tab_cycles_known_tags() {
        let mut app = signed_in_app();
        add(&mut app, "write report");
        add(&mut app, "groceries");
        let ids: Vec<String> = app.board.tasks().iter().map(|t| t.id.clone()).collect();
        app.board.set_tags(&ids[0], vec!["work".to_string()]).unwrap();
        app.board.set_tags(&ids[1], vec!["home".to_string(), "errands".to_string()]).unwrap();
        assert_eq!(app.tag_inventory(), vec!["errands", "home", "work"]);

        app.begin_input(InputKind::Search);
        app.input.insert_str("gro");
        app.update_search();
        app.cycle_search_tag();
        assert_eq!(app.input.value(), "gro #errands");
        assert_eq!(titles(&app), vec!["groceries"]);

        app.cycle_search_tag();
        app.cycle_search_tag();
        assert_eq!(app.input.value(), "gro #work");
        assert!(titles(&app).is_empty());

        app.cycle_search_tag();
        assert_eq!(app.input.value(), "gro");
        assert_eq!(app.filter.tag, None);
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let mut app = signed_in_app();
        add(&mut app, "doomed");
        app.request_delete();
        assert_eq!(app.mode, Mode::ConfirmDelete);
        app.delete_selection = 1;
        app.confirm_delete();
        assert_eq!(app.board.tasks().len(), 1);

        app.request_delete();
        app.confirm_delete();
        assert!(app.board.tasks().is_empty());
        assert_eq!(app.list_state.selected(), None);
    }

    #[test]
    fn test_sign_out_returns_to_prompt() {
        let mut app = signed_in_app();
        add(&mut app, "mine");
        app.sign_out();
        assert_eq!(app.mode, Mode::Input(InputKind::SignIn));
        assert!(app.board.tasks().is_empty());
    }

    #[test]
    fn test_default_bindings_resolve() {
        let app = signed_in_app();
        let key = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE);
        assert_eq!(app.action_for(&key), Some(Action::StartTimer));
        let key = KeyEvent::new(KeyCode::Up, KeyModifiers::CONTROL);
        assert_eq!(app.action_for(&key), Some(Action::MoveUp));
    }
}
