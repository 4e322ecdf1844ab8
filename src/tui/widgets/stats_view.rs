use ratatui::widgets::{BarChart, Block, Borders, Clear, Paragraph, Tabs};
use ratatui::style::{Style, Modifier};
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment, Constraint, Layout};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::stats::{GroupStats, StatsRange, TaskStats};
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};
use crate::tui::widgets::popup_area;
use crate::utils::format_duration;

fn group_line(name: &str, group: &GroupStats) -> String {
    format!("  {:<12} {}/{} done", name, group.completed, group.total)
}

/// Text body of the statistics popup
pub fn summary_lines(stats: &TaskStats) -> Vec<String> {
    let mut lines = vec![
        format!("Tasks: {}   Completed: {}   Rate: {}%", stats.total, stats.completed, stats.completion_rate),
        format!(
            "Time tracked: {}   Average per task: {}",
            format_duration(stats.total_time),
            format_duration(stats.average_time)
        ),
        String::new(),
        "By priority:".to_string(),
    ];
    lines.extend(stats.by_priority.iter().map(|(name, group)| group_line(name, group)));
    lines.push(String::new());
    lines.push("By tag:".to_string());
    lines.extend(stats.by_tag.iter().map(|(name, group)| group_line(name, group)));
    lines
}

pub fn render_stats(f: &mut Frame, area: Rect, stats: &TaskStats, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let accent = parse_color(&active_theme.accent);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let normal = Style::default().fg(fg_color).bg(bg_color);

    let popup_area = popup_area(area, 70, 80);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Statistics (Tab: range, Esc: close)")
        .title_alignment(Alignment::Center)
        .style(normal);
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let [tabs_area, summary_area, chart_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(4),
        Constraint::Length(8),
    ])
    .areas(inner);

    let titles: Vec<Line> = StatsRange::ALL.iter().map(|r| Line::from(r.label())).collect();
    let selected = StatsRange::ALL.iter().position(|r| *r == stats.range).unwrap_or(0);
    let tabs = Tabs::new(titles)
        .select(selected)
        .style(normal)
        .highlight_style(
            Style::default()
                .fg(get_contrast_text_color(highlight_bg))
                .bg(highlight_bg)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" | ");
    f.render_widget(tabs, tabs_area);

    let lines: Vec<Line> = summary_lines(stats).into_iter().map(Line::from).collect();
    f.render_widget(Paragraph::new(lines).style(normal), summary_area);

    // Minutes tracked per weekday of the current week
    let labels: Vec<(String, u64)> = stats
        .week
        .iter()
        .map(|day| (day.date.format("%a").to_string(), day.time_spent / 60))
        .collect();
    let data: Vec<(&str, u64)> = labels.iter().map(|(label, minutes)| (label.as_str(), *minutes)).collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::TOP).title(Span::styled(
            "This week (minutes)",
            Style::default().fg(accent),
        )))
        .data(data.as_slice())
        .bar_width(5)
        .bar_gap(1)
        .bar_style(Style::default().fg(accent))
        .value_style(Style::default().fg(get_contrast_text_color(accent)).bg(accent))
        .style(normal);
    f.render_widget(chart, chart_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, Priority, Task};
    use chrono::NaiveDate;

    #[test]
    fn test_summary_lists_groups() {
        let today = NaiveDate::from_ymd_opt(2024, 10, 2).unwrap();
        let mut a = Task::from_new("a".to_string(), NewTask::new("a".to_string(), today, 0));
        a.priority = Some(Priority::High);
        a.completed = true;
        a.time_spent = 120;
        a.tags = vec!["work".to_string()];
        let b = Task::from_new("b".to_string(), NewTask::new("b".to_string(), today, 1));

        let stats = crate::stats::compute(&[a, b], StatsRange::Today, today);
        let lines = summary_lines(&stats);
        assert_eq!(lines[0], "Tasks: 2   Completed: 1   Rate: 50%");
        assert_eq!(lines[1], "Time tracked: 2m 00s   Average per task: 1m 00s");
        assert!(lines.contains(&"  high         1/1 done".to_string()));
        assert!(lines.contains(&"  untagged     0/1 done".to_string()));
    }
}
