use ratatui::widgets::{Block, Borders, List, ListItem, StatefulWidget, Scrollbar, ScrollbarState, ScrollbarOrientation};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Rect, Layout, Direction, Constraint};
use ratatui::widgets::ListState;
use ratatui::text::{Line, Span};
use crate::board::Board;
use crate::models::Task;
use crate::Config;
use crate::tui::widgets::color::{parse_color, get_contrast_text_color, priority_color};
use crate::utils::format_duration;

fn truncate(text: &str, max_width: usize) -> String {
    if text.chars().count() > max_width {
        text.chars().take(max_width.saturating_sub(3)).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// Right-hand summary: elapsed time and subtask progress
fn task_suffix(task: &Task, seconds: u64) -> String {
    let mut parts = Vec::new();
    if seconds > 0 {
        parts.push(format_duration(seconds));
    }
    if !task.sub_tasks.is_empty() {
        parts.push(format!("{}/{}", task.completed_subtask_count(), task.sub_tasks.len()));
    }
    parts.join(" ")
}

fn task_line<'a>(task: &Task, board: &Board, max_width: usize, dim: Style) -> Line<'a> {
    let timed = board.timer_view().active_task_id.as_deref() == Some(task.id.as_str());
    let status_indicator = match (task.completed, timed) {
        (_, true) => "●",
        (true, false) => "✓",
        (false, false) => "○",
    };
    let suffix = task_suffix(task, board.display_seconds(task));
    let priority_mark = task.priority.map(|_| "! ").unwrap_or("");

    // indicator + space + priority mark + title + space + suffix
    let fixed = 2 + priority_mark.chars().count() + suffix.chars().count() + 1;
    let title = truncate(&task.title, max_width.saturating_sub(fixed).max(4));

    let title_style = if task.completed {
        Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
    } else {
        Style::default()
    };

    let mut spans = vec![Span::raw(format!("{} ", status_indicator))];
    if let Some(priority) = task.priority {
        spans.push(Span::styled(priority_mark, Style::default().fg(priority_color(priority))));
    }
    spans.push(Span::styled(title, title_style));
    if !suffix.is_empty() {
        spans.push(Span::styled(format!(" {}", suffix), dim));
    }
    Line::from(spans)
}

pub fn render_task_list(
    f: &mut Frame,
    area: Rect,
    tasks: &[&Task],
    board: &Board,
    list_state: &mut ListState,
    focused: bool,
    config: &Config,
) {
    // Borders and padding
    let max_width = area.width.saturating_sub(4) as usize;

    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = if active_theme.highlight_fg.is_empty() {
        get_contrast_text_color(highlight_bg)
    } else {
        parse_color(&active_theme.highlight_fg)
    };
    let dim = Style::default().add_modifier(Modifier::DIM);

    let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| ListItem::new(task_line(task, board, max_width, dim)))
        .collect();

    let list_areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let list_area = list_areas[0];
    let scrollbar_area = list_areas[1];

    let total_count = board.tasks().len();
    let title = if tasks.len() == total_count {
        format!("Tasks ({})", total_count)
    } else {
        format!("Tasks ({} of {})", tasks.len(), total_count)
    };
    let border_style = if focused { Style::default().fg(accent) } else { Style::default().fg(fg_color) };

    let total_items = items.len();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));

    StatefulWidget::render(list, list_area, f.buffer_mut(), list_state);

    let visible_items = list_area.height.saturating_sub(2) as usize;
    if total_items > visible_items && visible_items > 0 && scrollbar_area.width > 0 {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            list_area.y + 1, // Start after top border
            scrollbar_area.width,
            list_area.height.saturating_sub(2),
        );

        let mut scrollbar_state = ScrollbarState::new(total_items)
            .viewport_content_length(visible_items)
            .position(list_state.offset());

        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");

        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }
}
