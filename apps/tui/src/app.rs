//! Core TUI application state and event loop.
//!
//! The pipeline is built before the terminal is touched, so a missing
//! credential is reported on the normal console. Each submitted query then
//! blocks the loop until the pipeline returns.

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use deepresearch_core::{ResearchPipeline, SilentProgress};
use deepresearch_shared::{config_dir, load_config};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::runtime::Runtime;

use crate::form::{FormAction, ResearchForm};
use crate::widgets::status_bar;

/// Log file written under the config dir when `RUST_LOG` is set.
const LOG_FILE_NAME: &str = "tui.log";

/// Application state.
pub(crate) struct App {
    pub form: ResearchForm,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Whether help overlay is visible.
    pub show_help: bool,
}

impl App {
    pub(crate) fn new() -> Self {
        Self {
            form: ResearchForm::new(),
            should_quit: false,
            show_help: false,
        }
    }
}

/// Send logs to `~/.deepresearch/tui.log`, but only when `RUST_LOG` is set;
/// anything written to the terminal would corrupt the UI.
pub(crate) fn init_tracing() -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let Ok(env_filter) = EnvFilter::try_from_default_env() else {
        return Ok(());
    };

    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::File::create(dir.join(LOG_FILE_NAME))?;

    fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Build the pipeline, set up the terminal, run the event loop, then
/// restore the terminal.
pub(crate) fn run() -> Result<()> {
    let config = load_config()?;
    let pipeline = ResearchPipeline::from_config(&config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &pipeline, &runtime);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    pipeline: &ResearchPipeline,
    runtime: &Runtime,
) -> Result<()> {
    let mut app = App::new();

    loop {
        terminal.draw(|f| draw(f, &app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if let FormAction::Submit(query) = handle_key(&mut app, key.code, key.modifiers) {
                    // Show the "researching" status before blocking.
                    terminal.draw(|f| draw(f, &app))?;
                    let outcome = runtime.block_on(pipeline.run(&query, &SilentProgress));
                    app.form.apply_outcome(outcome);
                    discard_pending_input()?;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Drop keys typed while a query was running so they cannot trigger a
/// second submission.
fn discard_pending_input() -> Result<()> {
    while event::poll(Duration::ZERO)? {
        let _ = event::read()?;
    }
    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> FormAction {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return FormAction::None;
        }
        KeyCode::Char('q') if !app.form.is_editing() => {
            app.should_quit = true;
            return FormAction::None;
        }
        KeyCode::Char('?') if !app.form.is_editing() => {
            app.show_help = !app.show_help;
            return FormAction::None;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return FormAction::None;
    }

    app.form.handle_key(code, modifiers)
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Form
            Constraint::Length(1), // Key hints
        ])
        .split(f.area());

    let outer = Block::default()
        .borders(Borders::ALL)
        .title(" Deep Research AI System ");
    let inner = outer.inner(chunks[0]);
    f.render_widget(outer, chunks[0]);
    app.form.draw(f, inner);

    let hints = if app.form.is_editing() {
        "Enter run research · Tab browse sources · Ctrl-C quit"
    } else {
        "↑/↓ select · Space expand · Tab edit query · ? help · q quit"
    };
    f.render_widget(status_bar(hints), chunks[1]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 50, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("Query field:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Enter        Run research"),
        Line::from("  Tab / Esc    Browse sources"),
        Line::from(""),
        Line::from("Sources:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  ↑/↓ or j/k   Select source"),
        Line::from("  Space/Enter  Expand / collapse"),
        Line::from("  Tab or /     Edit query"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help (any key closes) ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
