//! Terminal dashboard for curbside that sets up Milwaukee addresses and shows their next pickups.

mod app;
mod config;
mod input;
mod ui;

use std::{
    env,
    fs::File,
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use curbside_core::{registry::InstanceRegistry, scheduler::TokioScheduler};
use curbside_provider_milwaukee::{BASE_URL, HttpTransport, provider, provider_with_transport};
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{App, Screen, parse_address_input};
use crate::config::HostConfig;
use crate::input::Action;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = HostConfig::load(config_path.as_deref())?;
    init_tracing(&config)?;

    // HTTP + provider setup
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()?;
    let ports = if config.endpoint == BASE_URL {
        provider(client)
    } else {
        tracing::info!(endpoint = %config.endpoint, "Using custom lookup endpoint");
        provider_with_transport(Arc::new(HttpTransport::with_url(
            client,
            config.endpoint.as_str(),
        )))
    };

    let registry = Arc::new(InstanceRegistry::new(
        Arc::new(TokioScheduler),
        config.poll_interval(),
    ));

    // App state
    let mut app = App::new(Arc::clone(&registry), ports);
    let mut startup_errors = Vec::new();
    for form in &config.addresses {
        if let Err(err) = app.configure(form).await {
            tracing::error!(error = ?err, "Startup address not set up");
            startup_errors.push(format!("{err:#}"));
        }
    }
    if !startup_errors.is_empty() {
        app.error_message = Some(startup_errors.join("; "));
    }

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    registry.teardown_all();
    tracing::info!("Shut down");

    res
}

// Logs go to a file; stdout belongs to the terminal UI.
fn init_tracing(config: &HostConfig) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("Cannot create log file {}", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        // Redraws pick up snapshots published by background polls
        terminal.draw(|frame| ui::draw(frame, &app))?;

        if event::poll(StdDuration::from_millis(250))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::SubmitAddress => {
                    let form = parse_address_input(&app.address_input);

                    app.is_loading = true;
                    app.form_error = None;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.configure(&form).await;

                    app.is_loading = false;
                    match res {
                        Ok(entry) => {
                            app.list_index = app
                                .registry
                                .instances()
                                .iter()
                                .position(|(configured, _)| configured.entry_id == entry.entry_id)
                                .unwrap_or_default();
                            app.address_input.clear();
                            app.screen = Screen::Dashboard;
                        }
                        Err(err) if App::form_can_retry(&err) => {
                            app.form_error = Some(format!("{err:#}"));
                        }
                        Err(err) => {
                            app.error_message = Some(format!("{err:#}"));
                            app.screen = Screen::Dashboard;
                        }
                    }
                }
                Action::RefreshSelected => {
                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let res = app.refresh_selected().await;

                    app.is_loading = false;
                    if let Err(err) = res {
                        app.error_message = Some(format!("{err:#}"));
                    }
                }
                Action::RemoveSelected => match app.remove_selected() {
                    Some(entry) => {
                        tracing::info!(entry_id = %entry.entry_id, "Address removed");
                        app.error_message = None;
                    }
                    None => {
                        app.error_message = Some("No address selected".into());
                    }
                },
            }
        }
    }

    Ok(())
}
