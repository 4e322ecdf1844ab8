use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarState, ScrollbarOrientation, Wrap};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Rect, Layout as RatLayout, Direction, Constraint};
use ratatui::text::{Text, Line, Span};
use ratskin::RatSkin;
use termimad::minimad::Text as MinimadText;
use std::cmp;
use crate::board::Board;
use crate::models::Task;
use crate::tui::app::Focus;
use crate::Config;
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};
use crate::utils::format_duration;

/// Markdown summary of a task: metadata lines followed by the description
pub fn task_markdown(task: &Task, seconds: u64) -> String {
    let mut content = format!("# {}\n", task.title);
    content.push_str(&format!(
        "**Status:** {}  **Time:** {}\n",
        if task.completed { "done" } else { "open" },
        format_duration(seconds)
    ));
    if let Some(priority) = task.priority {
        content.push_str(&format!("**Priority:** {}\n", priority));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("`{}`", t)).collect();
        content.push_str(&format!("**Tags:** {}\n", tags.join(" ")));
    }
    match task.description {
        Some(ref description) => {
            content.push('\n');
            content.push_str(description);
            content.push('\n');
        }
        None => content.push_str("\n*No description*\n"),
    }
    content
}

fn markdown_lines(markdown: &str, width: usize) -> Vec<Line<'static>> {
    let width_u16: u16 = width.try_into().unwrap_or(u16::MAX);
    RatSkin::default()
        .parse(MinimadText::from(markdown), width_u16)
        .into_iter()
        .map(|line| {
            let spans: Vec<Span> = line
                .spans
                .into_iter()
                .map(|span| Span::styled(span.content.to_string(), span.style))
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn pane_height(items: usize, cap: usize) -> u16 {
    (items.clamp(1, cap) + 2) as u16
}

pub fn render_details(
    f: &mut Frame,
    area: Rect,
    task: Option<&Task>,
    board: &Board,
    app_focus: Focus,
    selection: (usize, usize),
    scroll_offset: usize,
    config: &Config,
) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);

    let Some(task) = task else {
        let paragraph = Paragraph::new("No task selected. Press the new-task key to add one.")
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .style(Style::default().fg(fg_color))
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    };

    let vertical = RatLayout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(pane_height(task.sub_tasks.len(), 8)),
            Constraint::Length(pane_height(task.links.len(), 4)),
        ])
        .split(area);

    render_description(f, vertical[0], task, board.display_seconds(task), scroll_offset, config);

    let (subtask_index, link_index) = selection;
    let subtasks: Vec<ListItem> = task
        .ordered_subtasks()
        .iter()
        .map(|s| {
            let mark = if s.completed { "✓" } else { "○" };
            let style = if s.completed {
                Style::default().add_modifier(Modifier::DIM)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(format!("{} {}", mark, s.title), style)))
        })
        .collect();
    let title = format!("Subtasks ({}/{})", task.completed_subtask_count(), task.sub_tasks.len());
    render_pane(f, vertical[1], title, subtasks, subtask_index, app_focus == Focus::Subtasks, config);

    let links: Vec<ListItem> = task
        .links
        .iter()
        .enumerate()
        .map(|(i, link)| ListItem::new(format!("{}. {}", i + 1, link)))
        .collect();
    let title = format!("Links ({})", task.links.len());
    render_pane(f, vertical[2], title, links, link_index, app_focus == Focus::Links, config);
}

fn render_pane(
    f: &mut Frame,
    area: Rect,
    title: String,
    items: Vec<ListItem>,
    selected: usize,
    focused: bool,
    config: &Config,
) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let accent = parse_color(&active_theme.accent);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);

    let border_style = if focused { Style::default().fg(accent) } else { Style::default().fg(fg_color) };
    let block = Block::default().borders(Borders::ALL).title(title).border_style(border_style);

    if items.is_empty() {
        let empty = Paragraph::new(Span::styled("(none)", Style::default().add_modifier(Modifier::DIM)))
            .block(block)
            .style(Style::default().fg(fg_color));
        f.render_widget(empty, area);
        return;
    }

    let mut state = ListState::default();
    if focused {
        state.select(Some(selected));
    }
    let list = List::new(items)
        .block(block)
        .style(Style::default().fg(fg_color))
        .highlight_style(Style::default().fg(highlight_fg).bg(highlight_bg));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_description(f: &mut Frame, area: Rect, task: &Task, seconds: u64, scroll_offset: usize, config: &Config) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let horizontal = RatLayout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    let content_area = horizontal[0];
    let scrollbar_area = horizontal[1];

    let viewport_height = (area.height - 2) as usize;
    let text_width = content_area.width.saturating_sub(2) as usize;
    let lines = markdown_lines(&task_markdown(task, seconds), text_width);

    let total_lines = lines.len();
    let max_scroll = total_lines.saturating_sub(viewport_height);
    let scroll_offset = cmp::min(scroll_offset, max_scroll);
    let end_line = cmp::min(scroll_offset + viewport_height, total_lines);
    let visible_text = Text::from(lines[scroll_offset..end_line].to_vec());

    // trim: false keeps nested list indentation
    let base_style = Style::default().fg(parse_color(&config.get_active_theme().fg));
    let paragraph = Paragraph::new(visible_text)
        .block(Block::default().borders(Borders::ALL).title("Task"))
        .style(base_style)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, content_area);

    if total_lines > viewport_height {
        let scrollbar_inner_area = Rect::new(
            scrollbar_area.x,
            content_area.y + 1,
            scrollbar_area.width,
            content_area.height.saturating_sub(2),
        );
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .viewport_content_length(viewport_height)
            .position(scroll_offset);
        let scrollbar = Scrollbar::default()
            .orientation(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"))
            .track_symbol(Some("│"))
            .thumb_symbol("█");
        f.render_stateful_widget(scrollbar, scrollbar_inner_area, &mut scrollbar_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority};
    use chrono::NaiveDate;

    #[test]
    fn test_markdown_includes_metadata_and_description() {
        let date = NaiveDate::from_ymd_opt(2024, 10, 2).unwrap();
        let mut task = Task::from_new("t".to_string(), NewTask::new("Report".to_string(), date, 0));
        let plain = task_markdown(&task, 65);
        assert!(plain.starts_with("# Report\n"));
        assert!(plain.contains("**Time:** 1m 05s"));
        assert!(plain.contains("*No description*"));

        task.priority = Some(Priority::High);
        task.tags = vec!["work".to_string()];
        task.description = Some("- [ ] draft\n- [ ] send".to_string());
        let full = task_markdown(&task, 0);
        assert!(full.contains("**Priority:** high"));
        assert!(full.contains("**Tags:** `work`"));
        assert!(full.ends_with("- [ ] send\n"));
    }

    #[test]
    fn test_pane_height_is_capped() {
        assert_eq!(pane_height(0, 8), 3);
        assert_eq!(pane_height(3, 8), 5);
        assert_eq!(pane_height(20, 4), 6);
    }
}
