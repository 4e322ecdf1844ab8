use ratatui::Frame;
use ratatui::widgets::{Block, Borders};
use ratatui::style::Style;
use crate::config::Action;
use crate::tui::{App, Layout};
use crate::tui::app::{Focus, InputKind, Mode};
use crate::tui::widgets::{
    header::render_header,
    task_list::render_task_list,
    details::render_details,
    status_bar::render_status_bar,
    help::render_help,
    stats_view::render_stats,
    input::render_input,
    color::parse_color,
    confirm_delete::render_confirm_delete,
};
use crate::utils::{format_key_binding_for_display, today};

pub fn render(f: &mut Frame, app: &mut App, layout: &Layout) {
    let active_theme = app.config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let outer_block = Block::default()
        .borders(Borders::ALL)
        .title("taskclock")
        .title_alignment(ratatui::layout::Alignment::Center)
        .style(Style::default().fg(fg_color).bg(bg_color));
    f.render_widget(outer_block, f.area());

    let today = today();
    render_header(f, layout.header_area, &app.board, today, &app.config);

    {
        let tasks = app.visible_tasks();
        // The list widget needs the state mutably while `tasks` borrows the app
        let mut list_state = app.list_state.clone();
        render_task_list(
            f,
            layout.sidebar_area,
            &tasks,
            &app.board,
            &mut list_state,
            app.focus == Focus::Tasks,
            &app.config,
        );
        render_details(
            f,
            layout.main_area,
            app.selected_task(),
            &app.board,
            app.focus,
            (app.subtask_index, app.link_index),
            app.details_scroll,
            &app.config,
        );
        app.list_state = list_state;
    }

    match app.mode {
        Mode::Help => render_help(f, layout.inner_area, &app.config),
        Mode::Stats => {
            if let Some(ref stats) = app.stats {
                render_stats(f, layout.inner_area, stats, &app.config);
            }
        }
        Mode::ConfirmDelete => {
            if let Some(ref target) = app.delete_target {
                render_confirm_delete(f, layout.inner_area, target, app.delete_selection, &app.config);
            }
        }
        Mode::Input(kind) => render_input(f, layout.inner_area, kind.title(), &app.input, &app.config),
        Mode::Normal => {}
    }

    let key_hints = get_key_hints(app);
    render_status_bar(f, layout.status_area, app.status.message.as_ref(), &key_hints, &app.config);
}

fn hint(app: &App, action: Action) -> String {
    let key = app
        .config
        .key_bindings
        .entries()
        .into_iter()
        .find(|(a, _)| *a == action)
        .map(|(_, key)| format_key_binding_for_display(key))
        .unwrap_or_default();
    format!("{}: {}", key, action.description())
}

/// Key hints for the status bar, most relevant first
pub fn get_key_hints(app: &App) -> Vec<String> {
    match app.mode {
        Mode::Input(InputKind::SignIn) => vec!["Enter: Sign in".to_string(), "Esc: Quit".to_string()],
        Mode::Input(InputKind::Search) => {
            let mut hints = vec!["Enter: Keep filter".to_string(), "Esc: Clear filter".to_string()];
            let tags = app.tag_inventory();
            if !tags.is_empty() {
                let listed: Vec<String> = tags.iter().map(|t| format!("#{}", t)).collect();
                hints.insert(0, format!("Tab: Next tag ({})", listed.join(" ")));
            }
            hints
        }
        Mode::Input(_) => vec!["Enter: Save".to_string(), "Esc: Cancel".to_string()],
        Mode::ConfirmDelete => vec!["↑↓: Choose".to_string(), "Enter: Confirm".to_string(), "Esc: Cancel".to_string()],
        Mode::Help => vec!["Esc: Close help".to_string()],
        Mode::Stats => vec!["Tab: Next range".to_string(), "Esc: Close".to_string()],
        Mode::Normal => {
            let timer = app.board.timer_view();
            let mut actions = Vec::new();
            if timer.active_task_id.is_some() {
                actions.extend([Action::PauseTimer, Action::StopTimer]);
            } else {
                actions.push(Action::StartTimer);
            }
            match app.focus {
                Focus::Tasks => actions.extend([Action::New, Action::ToggleCompletion, Action::AddSubtask]),
                Focus::Subtasks => actions.extend([Action::ToggleCompletion, Action::MoveUp, Action::Delete]),
                Focus::Links => actions.extend([Action::CopyLink, Action::AddLink, Action::Delete]),
            }
            actions.extend([Action::SwitchFocus, Action::PrevDay, Action::NextDay, Action::Help, Action::Quit]);
            let mut hints: Vec<String> = actions.into_iter().map(|a| hint(app, a)).collect();
            if app.filter.is_active() {
                hints.insert(0, format!("Filter: {}", app.filter.describe()));
            }
            hints
        }
    }
}
