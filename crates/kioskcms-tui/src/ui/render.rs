use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{format_countdown, format_timeout, App, AppState, LoginFocus};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(8),    // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    if app.session().is_some() {
        render_console(frame, app, chunks[1]);
    }
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.demo_mode {
        "  Kiosk CMS (demo)"
    } else {
        "  Kiosk CMS"
    };
    let user = app
        .session()
        .map(|s| s.display_name().to_string())
        .unwrap_or_default();

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + user.len() + 4),
        )),
        Span::styled(user, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_console(frame: &mut Frame, app: &App, area: Rect) {
    let Some(session) = app.session() else {
        return;
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Signed in as  ", styles::muted_style()),
            Span::styled(session.display_name().to_string(), styles::list_item_style()),
        ]),
        Line::from(vec![
            Span::styled("  Idle timeout  ", styles::muted_style()),
            Span::styled(
                format_timeout(app.timeout()),
                styles::list_item_style(),
            ),
        ]),
    ];

    if let Some(remaining) = app.time_remaining() {
        lines.push(Line::from(vec![
            Span::styled("  Auto sign-out ", styles::muted_style()),
            Span::styled(
                format!("in {}", format_countdown(remaining)),
                styles::countdown_style(remaining.as_secs()),
            ),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "  Any key press or mouse movement keeps the session alive.",
        styles::highlight_style(),
    )));

    let block = Block::default()
        .title(" Session ")
        .borders(Borders::ALL)
        .border_style(styles::border_style());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help = match app.state {
        AppState::Console => vec![
            Span::styled(" [o]", styles::help_key_style()),
            Span::styled(" sign out  ", styles::muted_style()),
            Span::styled("[q]", styles::help_key_style()),
            Span::styled(" quit", styles::muted_style()),
        ],
        AppState::LoggingIn => vec![
            Span::styled(" [Tab]", styles::help_key_style()),
            Span::styled(" next field  ", styles::muted_style()),
            Span::styled("[Enter]", styles::help_key_style()),
            Span::styled(" sign in  ", styles::muted_style()),
            Span::styled("[Esc]", styles::help_key_style()),
            Span::styled(" quit", styles::muted_style()),
        ],
        AppState::ConfirmingQuit | AppState::Quitting => vec![],
    };

    let mut spans = help;
    if let Some(ref message) = app.status_message {
        spans.push(Span::raw("   "));
        spans.push(Span::styled(message.clone(), styles::status_bar_style()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let messages = usize::from(app.logout_notice.is_some()) + usize::from(app.login_error.is_some());
    let height = 10 + 2 * messages as u16;
    let area = centered_rect_fixed(52, height, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("  CMS ADMIN", styles::muted_style())),
        Line::from(Span::styled("  Sign in", styles::title_style())),
        Line::from(""),
    ];

    // Email field
    let email_focused = app.login_focus == LoginFocus::Email;
    let email_style = if email_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let email_display = format!("{:<28}", tail(&app.login_email, 28));
    let cursor = if email_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Email:    [", styles::muted_style()),
        Span::styled(format!("{}{}", email_display, cursor), email_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Password field
    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.chars().count().min(28));
    let password_display = format!("{:<28}", password_masked);
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{}{}", password_display, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    // Sign-in button
    let button_focused = app.login_focus == LoginFocus::Button;
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let label = if button_focused { " ▶ Sign in ◀ " } else { "   Sign in   " };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("                ["),
        Span::styled(label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref notice) = app.logout_notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", notice),
            styles::highlight_style(),
        )));
    }

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Error: {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 6, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style())
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Last `max` characters of `s`, so the cursor end of a long field stays visible
fn tail(s: &str, max: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(max)).collect()
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        assert_eq!(tail("admin@kiosk.local", 5), "local");
        assert_eq!(tail("short", 28), "short");
        assert_eq!(tail("", 3), "");
    }

    #[test]
    fn test_centered_rect_fixed_clamps_to_area() {
        let area = Rect::new(0, 0, 40, 10);
        assert_eq!(centered_rect_fixed(20, 4, area), Rect::new(10, 3, 20, 4));
        assert_eq!(centered_rect_fixed(80, 20, area), Rect::new(0, 0, 40, 10));
    }
}
