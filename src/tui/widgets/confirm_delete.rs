use ratatui::widgets::{Block, Borders, Paragraph, Clear, Wrap};
use ratatui::style::Style;
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment};
use ratatui::text::{Line, Span};
use crate::Config;
use crate::tui::app::DeleteTarget;
use crate::tui::widgets::color::{parse_color, get_contrast_text_color};
use crate::tui::widgets::popup_area;

pub const OPTIONS: [&str; 2] = ["Delete", "Cancel"];

pub fn render_confirm_delete(f: &mut Frame, area: Rect, target: &DeleteTarget, selection: usize, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let highlight_bg = parse_color(&active_theme.highlight_bg);
    let highlight_fg = get_contrast_text_color(highlight_bg);
    let normal = Style::default().fg(fg_color).bg(bg_color);

    let popup_area = popup_area(area, 50, 35);
    f.render_widget(Clear, popup_area);

    let (kind, name) = target.describe();
    let mut lines = vec![
        Line::from(Span::styled(format!("Delete this {}?", kind), normal)),
        Line::from(""),
        Line::from(Span::styled(name.to_string(), normal)),
        Line::from(""),
    ];
    if matches!(target, DeleteTarget::Task { .. }) {
        lines.push(Line::from(Span::styled("A running timer on it is stopped and saved first.", normal)));
        lines.push(Line::from(""));
    }

    for (index, option) in OPTIONS.iter().enumerate() {
        let (prefix, style) = if index == selection {
            ("> ", Style::default().fg(highlight_fg).bg(highlight_bg))
        } else {
            ("  ", normal)
        };
        lines.push(Line::from(Span::styled(format!("{}{}", prefix, option), style)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Use ↑↓ to navigate, Enter to confirm, Esc to cancel", normal)));

    let paragraph = Paragraph::new(lines)
        .block(Block::default()
            .borders(Borders::ALL)
            .title("Confirm Delete")
            .title_alignment(Alignment::Center)
            .style(normal))
        .style(normal)
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);

    f.render_widget(paragraph, popup_area);
}
