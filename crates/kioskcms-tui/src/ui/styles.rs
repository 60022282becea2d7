use ratatui::style::{Color, Modifier, Style};

// Kiosk palette
pub const BRAND: Color = Color::Rgb(72, 140, 200);
pub const OK: Color = Color::Rgb(110, 170, 100);
pub const WARN: Color = Color::Rgb(210, 170, 70);
pub const DANGER: Color = Color::Rgb(200, 72, 72);
pub const DIM: Color = Color::Rgb(120, 120, 130);
pub const FOCUS_BG: Color = Color::Rgb(44, 48, 66);
pub const BAR_BG: Color = Color::Rgb(28, 30, 38);

/// Remaining time below which the countdown turns to the warning color.
pub const COUNTDOWN_WARNING_SECS: u64 = 60;

pub fn title_style() -> Style {
    Style::default().fg(BRAND).add_modifier(Modifier::BOLD)
}

/// Focused login field or button
pub fn selected_style() -> Style {
    Style::default().bg(FOCUS_BG).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(DIM)
}

pub fn highlight_style() -> Style {
    Style::default().fg(WARN)
}

pub fn error_style() -> Style {
    Style::default().fg(DANGER)
}

pub fn countdown_style(remaining_secs: u64) -> Style {
    if remaining_secs <= COUNTDOWN_WARNING_SECS {
        error_style().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(OK)
    }
}

pub fn border_style() -> Style {
    Style::default().fg(BRAND)
}

pub fn status_bar_style() -> Style {
    Style::default().bg(BAR_BG).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default().fg(WARN).add_modifier(Modifier::BOLD)
}
