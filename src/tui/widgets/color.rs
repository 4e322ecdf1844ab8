use ratatui::style::Color;
use crate::models::Priority;

/// Parse a theme color.
/// Accepts named colors (`red`, `lightblue`, `darkgray`, ...), `#RRGGBB`, `#RGB` and `rgb(r, g, b)`.
/// Unrecognized values fall back to white.
pub fn parse_color(color_str: &str) -> Color {
    let s = color_str.trim().to_lowercase();
    match s.as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" | "lightgray" | "lightgrey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        "reset" => Color::Reset,
        _ => parse_hex_color(&s)
            .or_else(|| parse_rgb_color(&s))
            .unwrap_or(Color::White),
    }
}

fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.strip_prefix('#')?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    match hex.len() {
        6 => Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        // #RGB expands each digit: F -> FF
        3 => {
            let (r, g, b) = (channel(0..1)?, channel(1..2)?, channel(2..3)?);
            Some(Color::Rgb(r << 4 | r, g << 4 | g, b << 4 | b))
        }
        _ => None,
    }
}

fn parse_rgb_color(s: &str) -> Option<Color> {
    let content = s.strip_prefix("rgb(")?.strip_suffix(')')?;
    let parts: Vec<u8> = content
        .split(',')
        .map(|p| p.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match parts[..] {
        [r, g, b] => Some(Color::Rgb(r, g, b)),
        _ => None,
    }
}

/// WCAG relative luminance of an RGB color, 0.0 (dark) to 1.0 (light)
fn luminance(r: u8, g: u8, b: u8) -> f64 {
    let linear = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
    };
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

/// Black or white text, whichever reads better on `background`
pub fn get_contrast_text_color(background: Color) -> Color {
    let dark = match background {
        Color::Rgb(r, g, b) => luminance(r, g, b) < 0.5,
        // Gray renders light in most terminals
        other => matches!(other, Color::Black | Color::Blue | Color::Magenta | Color::Red | Color::DarkGray),
    };
    if dark { Color::White } else { Color::Black }
}

pub fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::LightRed,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::LightBlue,
    }
}
