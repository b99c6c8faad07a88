use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::app::{App, DashboardFocus, Page};
use crate::task::{Priority, Status};

const TICK: Duration = Duration::from_millis(100);

/// Switches to raw mode and the alternate screen. Nothing stays switched on if a step fails.
pub fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let entered = (|| {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        Terminal::new(CrosstermBackend::new(stdout))
    })();
    undo_on_err(entered, || {
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        let _ = disable_raw_mode();
    })
}

/// Attempts every restore step and reports the first failure.
pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    );
    let cursor = terminal.show_cursor();
    raw.and(screen).and(cursor)
}

fn undo_on_err<T>(result: io::Result<T>, undo: impl FnOnce()) -> io::Result<T> {
    if result.is_err() {
        undo();
    }
    result
}

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.drain_messages();
        terminal.draw(|f| draw(f, app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    let hints = match app.page {
        Page::Home => "l login  s signup  d dashboard  q quit",
        Page::Login => "tab next field  enter login  ctrl-n signup  esc back",
        Page::Signup => "tab next field  enter signup  ctrl-l login  esc back",
        Page::Dashboard => match app.focus {
            DashboardFocus::List => {
                "↑↓ select  enter/s status  p priority  d delete  a add  o logout  esc home"
            }
            DashboardFocus::Form => {
                "type title  ctrl-p priority  ctrl-t status  enter add  esc list"
            }
        },
    };

    match app.page {
        Page::Home => draw_home(f, chunks[0]),
        Page::Login => draw_login(f, chunks[0], app),
        Page::Signup => draw_signup(f, chunks[0], app),
        Page::Dashboard => draw_dashboard(f, chunks[0], app),
    }
    f.render_widget(
        Paragraph::new(hints).style(Style::default().fg(Color::DarkGray)),
        chunks[1],
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_home(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(vec![
            Span::raw("Welcome to "),
            Span::styled(
                "My Task Manager",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
        Line::from(
            "Organize your tasks, boost your productivity, and achieve your goals with ease.",
        ),
        Line::from(""),
        Line::from("[l] Login    [s] Signup    [d] Dashboard"),
        Line::from(""),
        Line::styled(
            "Start managing your tasks efficiently today",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    f.render_widget(
        Paragraph::new(text)
            .alignment(ratatui::layout::Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL)),
        centered(area, 70, 11),
    );
}

fn input_line<'a>(label: &'a str, value: &'a str, masked: bool, focused: bool) -> Line<'a> {
    let shown = if masked {
        "*".repeat(value.chars().count())
    } else {
        value.to_string()
    };
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::styled(format!("{label:>9}: "), style),
        Span::raw(shown),
        Span::styled(if focused { "▏" } else { "" }, style),
    ])
}

fn message_lines(error: &Option<String>, success: Option<&String>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(error) = error {
        lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    if let Some(success) = success {
        lines.push(Line::styled(success.clone(), Style::default().fg(Color::Green)));
    }
    lines
}

fn draw_login(f: &mut Frame, area: Rect, app: &App) {
    let form = &app.login;
    let mut lines = vec![
        Line::from("Welcome back! Please sign in to your account."),
        Line::from(""),
    ];
    lines.extend(message_lines(&form.error, None));
    lines.push(input_line("Email", &form.email, false, form.focus == 0));
    lines.push(input_line("Password", &form.password, true, form.focus == 1));
    lines.push(Line::from(""));
    lines.push(Line::from(if form.loading { "Signing in..." } else { "[enter] Login" }));
    lines.push(Line::from(""));
    lines.push(Line::from("Don't have an account? ctrl-n to sign up"));

    f.render_widget(
        Paragraph::new(lines).block(Block::default().title("Login").borders(Borders::ALL)),
        centered(area, 60, 13),
    );
}

fn draw_signup(f: &mut Frame, area: Rect, app: &App) {
    let form = &app.signup;
    let mut lines = vec![
        Line::from("Join us today! Please fill in your details to get started."),
        Line::from(""),
    ];
    lines.extend(message_lines(&form.error, form.success.as_ref()));
    lines.push(input_line("Name", &form.name, false, form.focus == 0));
    lines.push(input_line("Email", &form.email, false, form.focus == 1));
    lines.push(input_line("Password", &form.password, true, form.focus == 2));
    lines.push(Line::from(""));
    lines.push(Line::from(if form.loading {
        "Creating account..."
    } else {
        "[enter] Signup"
    }));
    lines.push(Line::from(""));
    lines.push(Line::from("Already have an account? ctrl-l to log in"));

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title("Create Account")
                .borders(Borders::ALL),
        ),
        centered(area, 64, 15),
    );
}

fn priority_style(priority: Priority) -> Style {
    let color = match priority {
        Priority::Low => Color::Green,
        Priority::Medium => Color::Yellow,
        Priority::High => Color::Red,
    };
    Style::default().fg(color)
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Pending => Style::default(),
        Status::InProgress => Style::default().fg(Color::Cyan),
        Status::Done => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT),
    }
}

fn draw_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(5),
        ])
        .split(area);

    let greeting = match app.session().current() {
        Some(session) => format!("Welcome back, {}!", session.display_name()),
        None => "Not signed in".to_string(),
    };
    let mut header = vec![Line::styled(
        greeting,
        Style::default().add_modifier(Modifier::BOLD),
    )];
    if let Some(error) = &app.tasks.error {
        header.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }
    f.render_widget(Paragraph::new(header), chunks[0]);

    let view = &app.tasks;
    let items: Vec<ListItem> = if view.loading {
        vec![ListItem::new("Loading tasks...")]
    } else {
        view.tasks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:>2}. ", i + 1)),
                    Span::styled(
                        format!("[{:<6}] ", t.priority.label()),
                        priority_style(t.priority),
                    ),
                    Span::styled(
                        format!("{:<11} ", t.status.label()),
                        status_style(t.status),
                    ),
                    Span::styled(&t.title, status_style(t.status)),
                ]))
            })
            .collect()
    };
    let list_focused = app.focus == DashboardFocus::List;
    let list = List::new(items)
        .block(
            Block::default()
                .title(format!("Your Tasks ({})", view.tasks.len()))
                .borders(Borders::ALL)
                .border_style(if list_focused {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                }),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    let mut state = ListState::default();
    if !view.loading && !view.tasks.is_empty() {
        state.select(Some(view.selected));
    }
    f.render_stateful_widget(list, chunks[1], &mut state);

    let form = &view.form;
    let form_focused = app.focus == DashboardFocus::Form;
    let lines = vec![
        input_line("Title", &form.title, false, form_focused),
        Line::from(vec![
            Span::raw(format!("{:>9}: ", "Priority")),
            Span::styled(form.priority.label(), priority_style(form.priority)),
            Span::raw(format!("   {:>6}: ", "Status")),
            Span::styled(form.status.label(), status_style(form.status)),
        ]),
    ];
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title("Add New Task")
                .borders(Borders::ALL)
                .border_style(if form_focused {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                }),
        ),
        chunks[2],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use crate::service::TaskService;
    use crate::session::SessionHandle;
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn rendered(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn home_page_lists_choices() {
        let backend = MemoryBackend::new();
        let service = TaskService::new(Arc::new(backend.clone()), SessionHandle::new());
        let app = App::new(service, Arc::new(backend), tokio::runtime::Handle::current());
        let screen = rendered(&app);
        assert!(screen.contains("My Task Manager"));
        assert!(screen.contains("[l] Login"));
    }

    #[test]
    fn failed_setup_step_is_undone() {
        let mut undone = 0;
        let failed: io::Result<()> = Err(io::Error::other("no tty"));
        let result = undo_on_err(failed, || undone += 1);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::Other);
        assert_eq!(undone, 1);

        let result = undo_on_err(Ok(7), || undone += 1);
        assert_eq!(result.unwrap(), 7);
        assert_eq!(undone, 1);
    }

    #[test]
    fn centered_never_exceeds_area() {
        let area = Rect::new(0, 0, 20, 5);
        assert_eq!(centered(area, 70, 11), area);
        assert_eq!(centered(area, 10, 1), Rect::new(5, 2, 10, 1));
    }
}
