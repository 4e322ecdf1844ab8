use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Profile mode for the application (dev or prod), chosen by the --dev flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "taskclock-dev",
            Profile::Prod => "taskclock",
        }
    }
}

fn project_dirs(profile: Profile) -> Option<ProjectDirs> {
    ProjectDirs::from("com", "taskclock", profile.app_name())
}

/// Get the configuration directory for a profile
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    project_dirs(profile).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the data directory (database, session, logs) for a profile
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    project_dirs(profile).map(|dirs| dirs.data_dir().to_path_buf())
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
}

/// Today's date in the local time zone
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Human readable duration: `45s`, `3m 05s`, `1h 02m 03s`
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Stopwatch display: `HH:MM:SS`
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Parsed key binding information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKeyBinding {
    pub key_code: KeyCode,
    pub requires_ctrl: bool,
}

impl ParsedKeyBinding {
    /// Whether a key event triggers this binding
    pub fn matches(&self, key: &KeyEvent) -> bool {
        if self.requires_ctrl != has_primary_modifier(key.modifiers) {
            return false;
        }
        match (self.key_code, key.code) {
            // Letters ignore shift so bindings still work with caps lock
            (KeyCode::Char(a), KeyCode::Char(b)) => a.eq_ignore_ascii_case(&b),
            (a, b) => a == b,
        }
    }
}

/// Check if a key event has the primary modifier (Ctrl on Windows/Linux, Ctrl or Option on macOS)
pub fn has_primary_modifier(modifiers: KeyModifiers) -> bool {
    #[cfg(target_os = "macos")]
    {
        modifiers.contains(KeyModifiers::CONTROL) || modifiers.contains(KeyModifiers::ALT)
    }

    #[cfg(not(target_os = "macos"))]
    {
        modifiers.contains(KeyModifiers::CONTROL)
    }
}

/// Format a key binding string for display. On macOS "Ctrl+" is shown as "Opt+".
pub fn format_key_binding_for_display(key_binding: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        key_binding.replace("Ctrl+", "Opt+")
    }

    #[cfg(not(target_os = "macos"))]
    {
        key_binding.to_string()
    }
}

/// Parse a key binding string from config.
/// Supports single keys ("q", "/"), special keys ("Enter", "Space", "F1") and "Ctrl+<key>".
pub fn parse_key_binding(key_str: &str) -> Result<ParsedKeyBinding, String> {
    let key_str = key_str.trim();

    if let Some(key_part) = key_str.strip_prefix("Ctrl+") {
        return Ok(ParsedKeyBinding {
            key_code: parse_key_code(key_part)?,
            requires_ctrl: true,
        });
    }

    Ok(ParsedKeyBinding {
        key_code: parse_key_code(key_str)?,
        requires_ctrl: false,
    })
}

/// Parse a key code from a string (without modifiers)
fn parse_key_code(key_str: &str) -> Result<KeyCode, String> {
    match key_str {
        "Enter" => Ok(KeyCode::Enter),
        "Esc" | "Escape" => Ok(KeyCode::Esc),
        "Backspace" => Ok(KeyCode::Backspace),
        "Tab" => Ok(KeyCode::Tab),
        "Space" | " " => Ok(KeyCode::Char(' ')),
        "Left" => Ok(KeyCode::Left),
        "Right" => Ok(KeyCode::Right),
        "Up" => Ok(KeyCode::Up),
        "Down" => Ok(KeyCode::Down),
        "Home" => Ok(KeyCode::Home),
        "End" => Ok(KeyCode::End),
        "PageUp" => Ok(KeyCode::PageUp),
        "PageDown" => Ok(KeyCode::PageDown),
        "Delete" => Ok(KeyCode::Delete),
        "Insert" => Ok(KeyCode::Insert),
        _ => {
            if let Some(n) = key_str.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                if (1..=12).contains(&n) {
                    return Ok(KeyCode::F(n));
                }
            }
            let mut chars = key_str.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(KeyCode::Char(c)),
                _ => Err(format!("Unknown key binding: {}", key_str)),
            }
        }
    }
}
