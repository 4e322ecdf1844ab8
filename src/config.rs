use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::utils::{self, ParsedKeyBinding};

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_sidebar_width")]
    pub sidebar_width_percent: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_current_theme")]
    pub current_theme: String,
    #[serde(default)]
    pub themes: HashMap<String, Theme>,
    /// Tracing filter directive used when TASKCLOCK_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_edit")]
    pub edit: String,
    #[serde(default = "default_delete")]
    pub delete: String,
    #[serde(default = "default_search")]
    pub search: String,
    #[serde(default = "default_select")]
    pub select: String,
    #[serde(default = "default_list_up")]
    pub list_up: String,
    #[serde(default = "default_list_down")]
    pub list_down: String,
    #[serde(default = "default_move_up")]
    pub move_up: String,
    #[serde(default = "default_move_down")]
    pub move_down: String,
    #[serde(default = "default_help")]
    pub help: String,
    #[serde(default = "default_stats")]
    pub stats: String,
    #[serde(default = "default_toggle_completion")]
    pub toggle_completion: String,
    #[serde(default = "default_start_timer")]
    pub start_timer: String,
    #[serde(default = "default_pause_timer")]
    pub pause_timer: String,
    #[serde(default = "default_stop_timer")]
    pub stop_timer: String,
    #[serde(default = "default_prev_day")]
    pub prev_day: String,
    #[serde(default = "default_next_day")]
    pub next_day: String,
    #[serde(default = "default_today")]
    pub today: String,
    #[serde(default = "default_add_subtask")]
    pub add_subtask: String,
    #[serde(default = "default_switch_focus")]
    pub switch_focus: String,
    #[serde(default = "default_add_link")]
    pub add_link: String,
    #[serde(default = "default_copy_link")]
    pub copy_link: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_tags")]
    pub tags: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_refresh")]
    pub refresh: String,
    #[serde(default = "default_sign_out")]
    pub sign_out: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    #[serde(default = "default_highlight_fg")]
    pub highlight_fg: String,
    /// Timer bar and header accents
    #[serde(default = "default_accent")]
    pub accent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sidebar_width_percent: default_sidebar_width(),
            database_path: default_database_path(),
            key_bindings: KeyBindings::default(),
            current_theme: default_current_theme(),
            themes: HashMap::new(),
            log_level: default_log_level(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            new: default_new(),
            edit: default_edit(),
            delete: default_delete(),
            search: default_search(),
            select: default_select(),
            list_up: default_list_up(),
            list_down: default_list_down(),
            move_up: default_move_up(),
            move_down: default_move_down(),
            help: default_help(),
            stats: default_stats(),
            toggle_completion: default_toggle_completion(),
            start_timer: default_start_timer(),
            pause_timer: default_pause_timer(),
            stop_timer: default_stop_timer(),
            prev_day: default_prev_day(),
            next_day: default_next_day(),
            today: default_today(),
            add_subtask: default_add_subtask(),
            switch_focus: default_switch_focus(),
            add_link: default_add_link(),
            copy_link: default_copy_link(),
            description: default_description(),
            tags: default_tags(),
            priority: default_priority(),
            refresh: default_refresh(),
            sign_out: default_sign_out(),
        }
    }
}

/// A user action the TUI binds a key to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    New,
    Edit,
    Delete,
    Search,
    Select,
    ListUp,
    ListDown,
    MoveUp,
    MoveDown,
    Help,
    Stats,
    ToggleCompletion,
    StartTimer,
    PauseTimer,
    StopTimer,
    PrevDay,
    NextDay,
    Today,
    AddSubtask,
    SwitchFocus,
    AddLink,
    CopyLink,
    Description,
    Tags,
    Priority,
    Refresh,
    SignOut,
}

impl Action {
    /// Short label for the help popup and status bar hints
    pub fn description(&self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::New => "New task",
            Action::Edit => "Rename task",
            Action::Delete => "Delete",
            Action::Search => "Search",
            Action::Select => "Open subtasks / toggle / copy",
            Action::ListUp => "Up",
            Action::ListDown => "Down",
            Action::MoveUp => "Move up",
            Action::MoveDown => "Move down",
            Action::Help => "Help",
            Action::Stats => "Statistics",
            Action::ToggleCompletion => "Toggle done",
            Action::StartTimer => "Start timer",
            Action::PauseTimer => "Pause/resume timer",
            Action::StopTimer => "Stop timer",
            Action::PrevDay => "Previous day",
            Action::NextDay => "Next day",
            Action::Today => "Today",
            Action::AddSubtask => "Add subtask",
            Action::SwitchFocus => "Switch pane",
            Action::AddLink => "Add link",
            Action::CopyLink => "Copy link",
            Action::Description => "Edit description",
            Action::Tags => "Edit tags",
            Action::Priority => "Cycle priority",
            Action::Refresh => "Refresh",
            Action::SignOut => "Sign out",
        }
    }
}

impl KeyBindings {
    /// Every action paired with its configured binding string
    pub fn entries(&self) -> Vec<(Action, &str)> {
        vec![
            (Action::Quit, self.quit.as_str()),
            (Action::New, self.new.as_str()),
            (Action::Edit, self.edit.as_str()),
            (Action::Delete, self.delete.as_str()),
            (Action::Search, self.search.as_str()),
            (Action::Select, self.select.as_str()),
            (Action::ListUp, self.list_up.as_str()),
            (Action::ListDown, self.list_down.as_str()),
            (Action::MoveUp, self.move_up.as_str()),
            (Action::MoveDown, self.move_down.as_str()),
            (Action::Help, self.help.as_str()),
            (Action::Stats, self.stats.as_str()),
            (Action::ToggleCompletion, self.toggle_completion.as_str()),
            (Action::StartTimer, self.start_timer.as_str()),
            (Action::PauseTimer, self.pause_timer.as_str()),
            (Action::StopTimer, self.stop_timer.as_str()),
            (Action::PrevDay, self.prev_day.as_str()),
            (Action::NextDay, self.next_day.as_str()),
            (Action::Today, self.today.as_str()),
            (Action::AddSubtask, self.add_subtask.as_str()),
            (Action::SwitchFocus, self.switch_focus.as_str()),
            (Action::AddLink, self.add_link.as_str()),
            (Action::CopyLink, self.copy_link.as_str()),
            (Action::Description, self.description.as_str()),
            (Action::Tags, self.tags.as_str()),
            (Action::Priority, self.priority.as_str()),
            (Action::Refresh, self.refresh.as_str()),
            (Action::SignOut, self.sign_out.as_str()),
        ]
    }

    /// Parse every binding. Fails on the first one that is not a valid key.
    pub fn parse(&self) -> Result<Vec<(Action, ParsedKeyBinding)>, ConfigError> {
        self.entries()
            .into_iter()
            .map(|(action, key)| {
                utils::parse_key_binding(key)
                    .map(|parsed| (action, parsed))
                    .map_err(|e| ConfigError::KeyBindingError(format!("{:?}: {}", action, e)))
            })
            .collect()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            highlight_fg: default_highlight_fg(),
            accent: default_accent(),
        }
    }
}

impl Theme {
    fn preset(fg: &str, bg: &str, highlight_bg: &str, highlight_fg: &str, accent: &str) -> Self {
        Self {
            fg: fg.to_string(),
            bg: bg.to_string(),
            highlight_bg: highlight_bg.to_string(),
            highlight_fg: highlight_fg.to_string(),
            accent: accent.to_string(),
        }
    }

    /// Get preset themes that are always available
    pub fn get_preset_themes() -> HashMap<String, Theme> {
        let mut themes = HashMap::new();
        themes.insert("default".to_string(), Theme::default());
        themes.insert("dark".to_string(), Theme::preset("white", "black", "cyan", "black", "yellow"));
        themes.insert("light".to_string(), Theme::preset("black", "white", "blue", "white", "magenta"));
        themes.insert("green".to_string(), Theme::preset("green", "black", "yellow", "black", "lightgreen"));
        themes.insert("monochrome".to_string(), Theme::preset("white", "black", "white", "black", "gray"));
        themes
    }
}

// Default value functions
fn default_sidebar_width() -> u16 {
    40
}

fn default_database_path() -> String {
    Config::default_database_path_for_profile(utils::Profile::Prod)
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_new() -> String {
    "n".to_string()
}

fn default_edit() -> String {
    "e".to_string()
}

fn default_delete() -> String {
    "d".to_string()
}

fn default_search() -> String {
    "/".to_string()
}

fn default_select() -> String {
    "Enter".to_string()
}

fn default_list_up() -> String {
    "k".to_string()
}

fn default_list_down() -> String {
    "j".to_string()
}

fn default_move_up() -> String {
    "Ctrl+Up".to_string()
}

fn default_move_down() -> String {
    "Ctrl+Down".to_string()
}

fn default_help() -> String {
    "F1".to_string()
}

fn default_stats() -> String {
    "F2".to_string()
}

fn default_toggle_completion() -> String {
    "Space".to_string()
}

fn default_start_timer() -> String {
    "s".to_string()
}

fn default_pause_timer() -> String {
    "p".to_string()
}

fn default_stop_timer() -> String {
    "x".to_string()
}

fn default_prev_day() -> String {
    "[".to_string()
}

fn default_next_day() -> String {
    "]".to_string()
}

fn default_today() -> String {
    "t".to_string()
}

fn default_add_subtask() -> String {
    "a".to_string()
}

fn default_switch_focus() -> String {
    "Tab".to_string()
}

fn default_add_link() -> String {
    "l".to_string()
}

fn default_copy_link() -> String {
    "y".to_string()
}

fn default_description() -> String {
    "m".to_string()
}

fn default_tags() -> String {
    "g".to_string()
}

fn default_priority() -> String {
    "!".to_string()
}

fn default_refresh() -> String {
    "r".to_string()
}

fn default_sign_out() -> String {
    "Ctrl+o".to_string()
}

fn default_current_theme() -> String {
    "default".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_highlight_fg() -> String {
    "white".to_string()
}

fn default_accent() -> String {
    "green".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Invalid key binding: {0}")]
    KeyBindingError(String),
}

impl Config {
    /// Load configuration for a profile, creating the default file if missing.
    /// `override_path` replaces the profile's config location.
    pub fn load_with_profile(profile: utils::Profile, override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match override_path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path(profile)?,
        };
        let default_db = Self::default_database_path_for_profile(profile);
        Self::load_from(&config_path, &default_db)
    }

    /// Load from an explicit file. A missing `database_path` falls back to `default_db`.
    pub fn load_from(config_path: &Path, default_db: &str) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;
            let table: toml::Table = toml::from_str(&contents)?;
            if !table.contains_key("database_path") {
                config.database_path = default_db.to_string();
            }
            Ok(config)
        } else {
            let mut config = Config {
                database_path: default_db.to_string(),
                ..Config::default()
            };
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to `config_path`
    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    pub fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("tasks.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/taskclock-dev/tasks.db".to_string(),
                utils::Profile::Prod => "~/.local/share/taskclock/tasks.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Directory holding the database; the session file and logs live here too
    pub fn get_data_dir(&self) -> PathBuf {
        self.get_database_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the currently active theme: user-defined, then preset, then default
    pub fn get_active_theme(&self) -> Theme {
        if let Some(theme) = self.themes.get(&self.current_theme) {
            return theme.clone();
        }
        Theme::get_preset_themes()
            .remove(&self.current_theme)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path, "/data/tasks.db").unwrap();

        assert!(path.exists());
        assert_eq!(config.database_path, "/data/tasks.db");
        assert_eq!(config.key_bindings.start_timer, "s");

        let reloaded = Config::load_from(&path, "/elsewhere.db").unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "current_theme = \"dark\"\nlog_level = \"debug\"\n[key_bindings]\nstart_timer = \"Ctrl+t\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path, "/data/tasks.db").unwrap();
        assert_eq!(config.current_theme, "dark");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.key_bindings.start_timer, "Ctrl+t");
        assert_eq!(config.key_bindings.quit, "q");
        assert_eq!(config.database_path, "/data/tasks.db");
        assert_eq!(config.sidebar_width_percent, 40);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sidebar_width_percent = \"wide\"").unwrap();
        assert!(matches!(Config::load_from(&path, "x"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_default_bindings_all_parse() {
        let parsed = KeyBindings::default().parse().unwrap();
        assert_eq!(parsed.len(), KeyBindings::default().entries().len());
    }

    #[test]
    fn test_bad_binding_is_reported() {
        let bindings = KeyBindings {
            stats: "Banana".to_string(),
            ..KeyBindings::default()
        };
        assert!(matches!(bindings.parse(), Err(ConfigError::KeyBindingError(_))));
    }

    #[test]
    fn test_active_theme_falls_back() {
        let mut config = Config::default();
        config.current_theme = "dark".to_string();
        assert_eq!(config.get_active_theme().highlight_bg, "cyan");

        config.themes.insert("mine".to_string(), Theme::preset("red", "black", "red", "white", "red"));
        config.current_theme = "mine".to_string();
        assert_eq!(config.get_active_theme().fg, "red");

        config.current_theme = "missing".to_string();
        assert_eq!(config.get_active_theme(), Theme::default());
    }
}
