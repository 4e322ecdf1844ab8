use ratatui::widgets::{Block, Borders, Paragraph, Clear};
use ratatui::style::Style;
use ratatui::Frame;
use ratatui::layout::{Rect, Alignment, Constraint, Layout, Flex};
use crate::Config;
use crate::tui::widgets::color::parse_color;

/// Single-line text field. The cursor is a char index into `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    value: String,
    cursor: usize,
}

impl InputField {
    /// Field prefilled with `initial`, cursor at the end
    pub fn new(initial: &str) -> Self {
        Self {
            value: initial.to_string(),
            cursor: initial.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert(&mut self, c: char) {
        // Newlines would break the single-line layout
        let c = if c == '\n' || c == '\r' { ' ' } else { c };
        let at = self.byte_index();
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars() {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index();
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_index();
            self.value.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }

    /// First visible char so the cursor stays inside `width` columns
    fn scroll_offset(&self, width: usize) -> usize {
        if width == 0 {
            return self.cursor;
        }
        self.cursor.saturating_sub(width - 1)
    }
}

pub fn render_input(f: &mut Frame, area: Rect, title: &str, field: &InputField, config: &Config) {
    let active_theme = config.get_active_theme();
    let fg_color = parse_color(&active_theme.fg);
    let bg_color = parse_color(&active_theme.bg);
    let accent = parse_color(&active_theme.accent);

    let vertical = Layout::vertical([Constraint::Length(3)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(60)]).flex(Flex::Center);
    let [popup_area] = vertical.areas(area);
    let [popup_area] = horizontal.areas(popup_area);

    f.render_widget(Clear, popup_area);

    let inner_width = popup_area.width.saturating_sub(2) as usize;
    let offset = field.scroll_offset(inner_width);
    let visible: String = field.value().chars().skip(offset).take(inner_width).collect();

    let paragraph = Paragraph::new(visible)
        .block(Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_alignment(Alignment::Left)
            .border_style(Style::default().fg(accent))
            .style(Style::default().fg(fg_color).bg(bg_color)))
        .style(Style::default().fg(fg_color).bg(bg_color));

    f.render_widget(paragraph, popup_area);

    let cursor_x = popup_area.x + 1 + (field.cursor() - offset) as u16;
    f.set_cursor_position((cursor_x, popup_area.y + 1));
}
