use chrono::NaiveDate;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::board::Board;
use crate::tui::widgets::color::parse_color;
use crate::utils::format_clock;

/// Date title such as `Wed 2 Oct 2024 (today)`
pub fn date_title(date: NaiveDate, today: NaiveDate) -> String {
    let label = date.format("%a %-d %b %Y").to_string();
    match (date - today).num_days() {
        0 => format!("{} (today)", label),
        -1 => format!("{} (yesterday)", label),
        1 => format!("{} (tomorrow)", label),
        _ => label,
    }
}

pub fn render_header(f: &mut Frame, area: Rect, board: &Board, today: NaiveDate, config: &Config) {
    let timer = board.timer_view();
    let timer_title = board.active_title();
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);

    let timer_line = match (&timer.active_task_id, timer_title) {
        (Some(_), title) => {
            let (symbol, state) = if timer.running { ("●", "running") } else { ("⏸", "paused") };
            Line::from(vec![
                Span::styled(
                    format!("{} {} ", symbol, format_clock(timer.elapsed)),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ),
                Span::styled(title.unwrap_or("untitled task").to_string(), Style::default().fg(fg_color)),
                Span::styled(format!(" ({})", state), Style::default().fg(fg_color).add_modifier(Modifier::DIM)),
            ])
        }
        (None, _) => Line::from(Span::styled(
            "No timer running",
            Style::default().fg(fg_color).add_modifier(Modifier::DIM),
        )),
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(format!("◀ {} ▶", date_title(board.selected_date(), today)))
        .title_alignment(Alignment::Left)
        .style(Style::default().fg(fg_color));
    if let Some(name) = board.user().map(|u| u.display_name.as_str()) {
        block = block.title(Line::from(format!(" {} ", name)).alignment(Alignment::Right));
    }

    f.render_widget(Paragraph::new(timer_line).block(block), area);
}
