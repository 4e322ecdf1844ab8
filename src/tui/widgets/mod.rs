pub mod color;
pub mod confirm_delete;
pub mod details;
pub mod header;
pub mod help;
pub mod input;
pub mod stats_view;
pub mod status_bar;
pub mod task_list;

use ratatui::layout::{Constraint, Flex, Layout, Rect};

/// Centered rect taking the given percentage of `area`
/// (after the ratatui popup example: https://ratatui.rs/examples/apps/popup/)
pub fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
