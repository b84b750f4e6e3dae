mod app;
mod view;
mod worker;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use datalink_adapters::SimulatedSession;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use app::{map_key_event, InputMode, Msg, Tab, TuiApp, TuiOptions};
pub use worker::{perform, BusyKind, Command, Outcome, SessionSnapshot};

use crate::view::render;

const TICK_RATE: Duration = Duration::from_millis(120);

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Shared pieces the event loop hands to background tasks.
struct Dispatcher {
    runtime: Runtime,
    session: Arc<Mutex<SimulatedSession>>,
    outcomes: UnboundedSender<Outcome>,
}

impl Dispatcher {
    fn spawn(&self, app: &TuiApp, commands: Vec<Command>) {
        for command in commands {
            debug!(kind = ?command.kind(), "dispatching background task");
            let session = Arc::clone(&self.session);
            let outcomes = self.outcomes.clone();
            let export_dir = app.export_dir().to_path_buf();
            self.runtime.spawn(async move {
                let outcome = perform(&session, command, &export_dir).await;
                let _ = outcomes.send(outcome);
            });
        }
    }
}

/// Takes over the terminal until the user quits. Slow session work runs on a
/// tokio runtime owned by this call while the UI keeps drawing.
pub fn run(session: SimulatedSession, options: TuiOptions) -> Result<(), TuiError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let app = TuiApp::new(options, SessionSnapshot::capture(&session));
    let (outcomes, receiver) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher {
        runtime,
        session: Arc::new(Mutex::new(session)),
        outcomes,
    };

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, app, &dispatcher, receiver);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    info!("terminal ui closed");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: TuiApp,
    dispatcher: &Dispatcher,
    mut receiver: UnboundedReceiver<Outcome>,
) -> Result<(), TuiError> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, &app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(app.input_mode(), key) {
                        let commands = app.handle(message);
                        dispatcher.spawn(&app, commands);
                    }
                }
            }
        }

        while let Ok(outcome) = receiver.try_recv() {
            let commands = app.apply(outcome);
            dispatcher.spawn(&app, commands);
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.handle(Msg::Tick);
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
