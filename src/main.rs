mod app;
mod audio;
mod constants;
mod container;
mod input;
mod messages;
mod project;
mod ui;

use std::fs::File;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use crate::app::AppState;
use crate::audio::device::cpal_device::{CpalInput, CpalOutput};
use crate::audio::engine::Engine;
use crate::messages::Action;
use crate::project::config::EngineConfig;
use crate::project::session::Session;
use crate::ui::views::routing_view::RoutingView;
use crate::ui::views::View;
use crate::ui::widgets::keyboard_hint::KeyHintFooter;
use crate::ui::widgets::status_line::StatusLine;
use crate::ui::widgets::transport_bar::TransportBarWidget;

const LOG_FILE: &str = "multitrack.log";
const DEFAULT_PROJECT: &str = "multitrack";

type Term = Terminal<CrosstermBackend<Stdout>>;

fn main() -> anyhow::Result<()> {
    // The terminal belongs to the UI, so logs go to a file. RUST_LOG=debug for more.
    let log_file = File::create(LOG_FILE).with_context(|| format!("Failed to create {}", LOG_FILE))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    log::info!("multitrack starting up");

    let config_path = EngineConfig::default_path();
    let config = EngineConfig::load(&config_path)?;
    let name = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_PROJECT.to_string());
    let (wav_path, session_path) = config.project_paths(&name);

    let output = CpalOutput::new(config.output_device.clone());
    let input = CpalInput::new(config.input_device.clone());
    let mut engine = Engine::new(&config, Box::new(output), Box::new(input));
    engine
        .open_project(&wav_path)
        .with_context(|| format!("Failed to open project {}", wav_path.display()))?;
    let session = Session::load(&session_path, config.record_offset())?;
    engine.load_session(&session);

    let result = run_ui(&mut engine, &config, &name);

    // Settings and the file header are written even when the UI failed.
    if let Err(e) = engine.session().save(&session_path) {
        log::error!("{}", e);
    }
    engine.close_project()?;
    log::info!("multitrack shut down");
    result
}

fn run_ui(engine: &mut Engine, config: &EngineConfig, name: &str) -> anyhow::Result<()> {
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_loop(&mut terminal, engine, config, name);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// One key, one period of playback and capture, and a render when due.
fn run_loop(terminal: &mut Term, engine: &mut Engine, config: &EngineConfig, name: &str) -> anyhow::Result<()> {
    let frame_duration = Duration::from_millis(1000 / config.ui_fps.max(1));
    let project = engine
        .project_path()
        .map_or_else(|| name.to_string(), |p| p.display().to_string());
    let mut state = AppState::new(project, engine.status());
    let mut last_render: Option<Instant> = None;

    loop {
        // Playing: the output device paces the loop, so never block on input.
        let timeout = if engine.is_playing() {
            Duration::ZERO
        } else {
            frame_duration
        };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = input::handle_key(key, config.seek_step_frames) {
                        handle_action(&mut state, engine, action);
                    }
                }
            }
        }
        if state.should_quit {
            break;
        }

        engine.step();

        if last_render.map_or(true, |t| t.elapsed() >= frame_duration) {
            state.status = engine.status();
            terminal.draw(|frame| render(frame, &state))?;
            last_render = Some(Instant::now());
        }
    }
    Ok(())
}

fn handle_action(state: &mut AppState, engine: &mut Engine, action: Action) {
    if action == Action::Quit {
        state.should_quit = true;
        return;
    }
    match engine.apply(action) {
        Ok(()) => state.message = None,
        Err(e) => {
            log::error!("{} failed: {}", action.label(), e);
            state.message = Some(format!("{}: {}", action.label(), e));
        }
    }
}

fn render(frame: &mut ratatui::Frame, state: &AppState) {
    let layout = ui::layout::ScreenLayout::new(frame.area());
    frame.render_widget(TransportBarWidget { state }, layout.header);
    RoutingView.render(state, frame, layout.main);
    frame.render_widget(
        StatusLine {
            project: &state.project,
            message: state.message.as_deref(),
        },
        layout.status,
    );
    let hints = input::key_hints();
    frame.render_widget(KeyHintFooter { hints: &hints }, layout.footer);
}
