use ratatui::widgets::{Block, Borders, Paragraph, Clear, Wrap};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::config::Action;
use crate::tui::widgets::color::parse_color;
use crate::tui::widgets::popup_area;
use crate::utils::format_key_binding_for_display;

const SECTIONS: &[(&str, &[Action])] = &[
    ("Navigation", &[
        Action::ListUp, Action::ListDown, Action::SwitchFocus, Action::Select,
        Action::PrevDay, Action::NextDay, Action::Today,
    ]),
    ("Tasks", &[
        Action::New, Action::Edit, Action::Delete, Action::ToggleCompletion,
        Action::MoveUp, Action::MoveDown, Action::Priority, Action::Tags, Action::Description,
        Action::AddSubtask, Action::AddLink, Action::CopyLink,
    ]),
    ("Timer", &[Action::StartTimer, Action::PauseTimer, Action::StopTimer]),
    ("General", &[
        Action::Search, Action::Stats, Action::Refresh, Action::SignOut, Action::Help, Action::Quit,
    ]),
];

pub fn render_help(f: &mut Frame, area: Rect, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let accent = parse_color(&active_theme.accent);

    let popup_area = popup_area(area, 60, 80);
    f.render_widget(Clear, popup_area);

    let bindings = config.key_bindings.entries();
    let key_for = |action: Action| {
        bindings
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, key)| format_key_binding_for_display(key))
            .unwrap_or_default()
    };

    let mut lines = Vec::new();
    for (title, actions) in SECTIONS {
        lines.push(Line::from(Span::styled(
            format!("{}:", title),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        )));
        for action in actions.iter() {
            lines.push(Line::from(format!("  {:<10} {}", key_for(*action), action.description())));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from("Input popups: Enter saves, Esc cancels, Ctrl+V pastes"));
    lines.push(Line::from("Search accepts free text plus !priority and #tag"));

    let paragraph = Paragraph::new(lines)
        .block(Block::default()
            .borders(Borders::ALL)
            .title("Help - Key Bindings")
            .title_alignment(Alignment::Center)
            .style(Style::default().fg(fg_color).bg(bg_color)))
        .style(Style::default().fg(fg_color).bg(bg_color))
        .wrap(Wrap { trim: false });

    f.render_widget(paragraph, popup_area);
}
