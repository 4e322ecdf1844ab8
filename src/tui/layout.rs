use ratatui::layout::{Rect, Layout as RatLayout, Direction, Constraint};

pub struct Layout {
    pub inner_area: Rect,  // Area inside the outer border
    pub header_area: Rect,
    pub sidebar_area: Rect,
    pub main_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum terminal dimensions, excluding the outer border.
    /// Width: sidebar (25) + details (15). Height: header, timer bar, 4 content lines, status.
    pub const MIN_WIDTH: u16 = 40;
    pub const MIN_HEIGHT: u16 = 10;

    pub fn calculate(size: Rect, sidebar_width_percent: u16) -> Self {
        let min_width_with_border = Self::MIN_WIDTH + 2;
        let min_height_with_border = Self::MIN_HEIGHT + 2;
        let width = size.width.max(min_width_with_border);
        let height = size.height.max(min_height_with_border);
        let size = Rect::new(size.x, size.y, width, height);

        let inner_area = Rect::new(
            size.x + 1,
            size.y + 1,
            size.width.saturating_sub(2),
            size.height.saturating_sub(2),
        );

        // Sidebar: at least 25 columns, at most 60%, and the details pane keeps 15
        let requested_width = (inner_area.width * sidebar_width_percent) / 100;
        let max_width = (inner_area.width * 60) / 100;
        let sidebar_width = requested_width
            .max(25)
            .min(max_width)
            .min(inner_area.width.saturating_sub(15));

        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Date header with timer bar
                Constraint::Min(1),    // Task list + details
                Constraint::Length(1), // Status
            ])
            .split(inner_area);

        let horizontal = RatLayout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(sidebar_width),
                Constraint::Min(1),
            ])
            .split(vertical[1]);

        Self {
            inner_area,
            header_area: vertical[0],
            sidebar_area: horizontal[0],
            main_area: horizontal[1],
            status_area: vertical[2],
        }
    }
}
