use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, size as terminal_size};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::io;
use std::time::Duration;
use tracing::info;
use crate::config::Action;
use crate::tui::App;
use crate::tui::app::{Focus, InputKind, Mode};
use crate::tui::error::TuiError;
use crate::tui::layout::Layout;
use crate::tui::widgets::confirm_delete::OPTIONS;
use crate::utils::has_primary_modifier;

/// Longest wait for input before redrawing; a due timer tick shortens it
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Restores the terminal on drop, so a panic never leaves it in raw mode
/// or on the alternate screen.
struct TerminalGuard {
    raw_mode_enabled: bool,
    alternate_screen_enabled: bool,
}

impl TerminalGuard {
    fn new() -> Result<Self, TuiError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self {
            raw_mode_enabled: true,
            alternate_screen_enabled: true,
        })
    }

    /// Restore on normal exit; the guard does nothing on drop afterwards
    fn restore(&mut self) -> Result<(), TuiError> {
        if self.raw_mode_enabled {
            disable_raw_mode()?;
            self.raw_mode_enabled = false;
        }
        if self.alternate_screen_enabled {
            execute!(io::stdout(), LeaveAlternateScreen)?;
            self.alternate_screen_enabled = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Already cleaning up, errors have nowhere to go
        if self.raw_mode_enabled {
            let _ = disable_raw_mode();
        }
        if self.alternate_screen_enabled {
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
        }
    }
}

pub fn run_event_loop(mut app: App) -> Result<(), TuiError> {
    // Checked before entering the alternate screen so the message stays visible
    let (width, height) = terminal_size()?;
    let min_width_with_border = Layout::MIN_WIDTH + 2;
    let min_height_with_border = Layout::MIN_HEIGHT + 2;
    if width < min_width_with_border || height < min_height_with_border {
        return Err(TuiError::RenderError(format!(
            "Terminal size too small. Current: {}x{}, Minimum required: {}x{}. Please resize your terminal window.",
            width, height, min_width_with_border, min_height_with_border
        )));
    }

    let mut guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    info!("tui started");

    loop {
        app.update();
        app.check_status_message_timeout();

        let terminal_size = terminal.size()?;
        let terminal_rect = Rect::new(0, 0, terminal_size.width, terminal_size.height);
        terminal.draw(|f| {
            let layout = Layout::calculate(terminal_rect, app.config.sidebar_width_percent);
            crate::tui::render::render(f, &mut app, &layout);
        })?;

        let timeout = app.board.next_tick_in().map_or(IDLE_POLL, |due| due.min(IDLE_POLL));
        if event::poll(timeout)? {
            // Only Press events; Windows also reports releases
            if let Event::Key(key_event) = event::read()? {
                if key_event.kind == KeyEventKind::Press && handle_key_event(&mut app, key_event)? {
                    break;
                }
            }
        }
    }

    app.shutdown();
    guard.restore()?;
    info!("tui stopped");
    Ok(())
}

/// Handle one key press. Returns true when the app should quit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    if key_event.code == KeyCode::Char('c') && key_event.modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(true);
    }

    match app.mode {
        Mode::Input(_) => Ok(handle_input_key(app, key_event)),
        Mode::ConfirmDelete => {
            match key_event.code {
                KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
                    app.delete_selection = (app.delete_selection + 1) % OPTIONS.len();
                }
                KeyCode::Enter => app.confirm_delete(),
                KeyCode::Esc => app.cancel_delete(),
                _ => {}
            }
            Ok(false)
        }
        Mode::Help => {
            let action = app.action_for(&key_event);
            if key_event.code == KeyCode::Esc || matches!(action, Some(Action::Help | Action::Quit)) {
                app.mode = Mode::Normal;
            }
            Ok(false)
        }
        Mode::Stats => {
            let action = app.action_for(&key_event);
            if key_event.code == KeyCode::Tab || action == Some(Action::Stats) {
                app.cycle_stats_range();
            } else if key_event.code == KeyCode::Esc || action == Some(Action::Quit) {
                app.mode = Mode::Normal;
            }
            Ok(false)
        }
        Mode::Normal => handle_normal_key(app, key_event),
    }
}

fn handle_input_key(app: &mut App, key_event: KeyEvent) -> bool {
    match key_event.code {
        KeyCode::Esc => return app.cancel_input(),
        KeyCode::Enter => {
            app.submit_input();
            return false;
        }
        KeyCode::Backspace => app.input.backspace(),
        KeyCode::Delete => app.input.delete(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        KeyCode::Tab if app.mode == Mode::Input(InputKind::Search) => {
            app.cycle_search_tag();
            return false;
        }
        KeyCode::Char('v') | KeyCode::Char('V') if has_primary_modifier(key_event.modifiers) => {
            match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
                Ok(text) => app.input.insert_str(&text),
                Err(e) => app.set_status_message(format!("Failed to paste from clipboard: {}", e)),
            }
        }
        KeyCode::Char(c) if !key_event.modifiers.contains(KeyModifiers::CONTROL) => app.input.insert(c),
        _ => return false,
    }
    if app.mode == Mode::Input(InputKind::Search) {
        app.update_search();
    }
    false
}

fn handle_normal_key(app: &mut App, key_event: KeyEvent) -> Result<bool, TuiError> {
    let Some(action) = app.action_for(&key_event) else {
        match key_event.code {
            KeyCode::Up => app.move_selection_up(),
            KeyCode::Down => app.move_selection_down(),
            KeyCode::PageUp => app.scroll_details_up(),
            KeyCode::PageDown => app.scroll_details_down(),
            KeyCode::Esc if app.focus != Focus::Tasks => app.focus = Focus::Tasks,
            KeyCode::Esc if app.filter.is_active() => {
                app.filter.clear();
                app.search_text.clear();
                app.clamp_selection();
            }
            _ => {}
        }
        return Ok(false);
    };

    match action {
        Action::Quit => return Ok(true),
        Action::New => app.begin_input(InputKind::NewTask),
        Action::Edit => app.begin_input(InputKind::Rename),
        Action::Delete => app.request_delete(),
        Action::Search => app.begin_input(InputKind::Search),
        Action::Select => app.select(),
        Action::ListUp => app.move_selection_up(),
        Action::ListDown => app.move_selection_down(),
        Action::MoveUp => app.move_selected(-1),
        Action::MoveDown => app.move_selected(1),
        Action::Help => app.mode = Mode::Help,
        Action::Stats => app.open_stats(),
        Action::ToggleCompletion => app.toggle_completion(),
        Action::StartTimer => app.start_timer(),
        Action::PauseTimer => app.toggle_pause(),
        Action::StopTimer => app.stop_timer(),
        Action::PrevDay => app.previous_day(),
        Action::NextDay => app.next_day(),
        Action::Today => app.go_to_today(),
        Action::AddSubtask => app.begin_input(InputKind::Subtask),
        Action::SwitchFocus => app.switch_focus(),
        Action::AddLink => app.begin_input(InputKind::Link),
        Action::CopyLink => app.copy_link(),
        Action::Description => app.begin_input(InputKind::Description),
        Action::Tags => app.begin_input(InputKind::Tags),
        Action::Priority => app.cycle_priority(),
        Action::Refresh => app.refresh(),
        Action::SignOut => app.sign_out(),
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::config::Config;
    use crate::identity::{Identity, LocalIdentity};
    use crate::models::Priority;
    use crate::store::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::NaiveDate;

    fn setup() -> (App, ManualClock) {
        let clock = ManualClock::new(0);
        let date = NaiveDate::from_ymd_opt(2024, 10, 2).unwrap();
        let board = Board::new(Box::new(MemoryStore::new()), Box::new(clock.clone()), date);
        let mut identity = LocalIdentity::ephemeral();
        identity.sign_in("bob").unwrap();
        (App::new(Config::default(), board, Box::new(identity)).unwrap(), clock)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_key_event(app, KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_create_task_from_keyboard() {
        let (mut app, _) = setup();
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.mode, Mode::Input(InputKind::NewTask));
        type_text(&mut app, "Write report");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.selected_task().map(|t| t.title.as_str()), Some("Write report"));
    }

    #[test]
    fn test_tab_in_search_picks_a_tag() {
        let (mut app, _) = setup();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "Write report");
        press(&mut app, KeyCode::Enter);
        let id = app.selected_task_id().unwrap();
        app.board.set_tags(&id, vec!["work".to_string()]).unwrap();

        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, Mode::Input(InputKind::Search));
        assert_eq!(crate::tui::render::get_key_hints(&app)[0], "Tab: Next tag (#work)");

        press(&mut app, KeyCode::Tab);
        assert_eq!(app.input.value(), "#work");
        assert_eq!(app.filter.tag.as_deref(), Some("work"));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.filter.is_active());
    }

    #[test]
    fn test_timer_keys_persist_elapsed_time() {
        let (mut app, clock) = setup();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "focus");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('s'));
        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            app.update();
        }
        assert_eq!(app.board.timer_view().elapsed, 5);

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.board.timer_view().active_task_id, None);
        assert_eq!(app.selected_task().map(|t| t.time_spent), Some(5));
    }

    #[test]
    fn test_priority_key_cycles() {
        let (mut app, _) = setup();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "t");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('!'));
        assert_eq!(app.selected_task().and_then(|t| t.priority), Some(Priority::High));
        press(&mut app, KeyCode::Char('!'));
        assert_eq!(app.selected_task().and_then(|t| t.priority), Some(Priority::Medium));
    }

    #[test]
    fn test_escape_from_sign_in_quits() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 2).unwrap();
        let board = Board::new(Box::new(MemoryStore::new()), Box::new(ManualClock::new(0)), date);
        let mut app = App::new(Config::default(), board, Box::new(LocalIdentity::ephemeral())).unwrap();
        // Typing 'q' in the prompt is text, not the quit binding
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert!(press(&mut app, KeyCode::Esc));
    }

    #[test]
    fn test_delete_confirmation_defaults_to_delete() {
        let (mut app, _) = setup();
        press(&mut app, KeyCode::Char('n'));
        type_text(&mut app, "gone");
        press(&mut app, KeyCode::Enter);

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.mode, Mode::ConfirmDelete);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);
        assert!(app.board.tasks().is_empty());
    }
}
