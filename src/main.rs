//! make-tray: a live menu of Makefile targets.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! sets up logging, loads the configuration, and runs the main event loop that
//! ties the reload coordinator, the menu surface and the launcher together.

mod app;
mod config;
mod events;
mod launcher;
mod menu;
mod paths;
mod reload;
mod surface;
mod targets;
mod tui;
mod watch;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{CommandFactory, Parser, Subcommand};
use crossterm::event::KeyEventKind;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{App, AppAction};
use crate::config::{ConfigStore, Entry};
use crate::events::Event;
use crate::launcher::TerminalTemplate;
use crate::menu::{GroupState, MenuAction, MenuBackend, MenuModel};
use crate::reload::{Coordinator, ReloadOutcome};
use crate::surface::MenuSurface;

const APP_NAME: &str = "MakeTray";
const ADDED_NOTICE: &str = "Makefile added – menu refreshed.";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "make-tray",
    version,
    about = "Live menu of Makefile targets",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to the JSON configuration file.
    #[arg(long)]
    config: Option<String>,
    /// Terminal command template containing {cmd} or {cmd:applescript}.
    #[arg(long)]
    terminal: Option<String>,
    /// Where to write logs (defaults to make-tray.log next to the config).
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the menu and exit.
    List,
    /// Show help information.
    Help,
    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Some(Commands::Help) => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        Some(Commands::Version) => {
            println!("make-tray {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Commands::List) => {
            init_logging(None, cli.verbose)?;
            let store = load_store(&cli)?;
            print!("{}", render_listing(store.entries()));
            return Ok(());
        }
        None => {}
    }

    let config_path = config_path(&cli)?;
    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_path(&paths::resolve(&config_path)));
    init_logging(Some(&log_file), cli.verbose)?;

    let template =
        TerminalTemplate::parse(cli.terminal.as_deref().unwrap_or(launcher::DEFAULT_TERMINAL))?;
    let store = load_store(&cli)?;
    run(store, template).await
}

async fn run(store: ConfigStore, template: TerminalTemplate) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel(256);

    let mut surface = MenuSurface::new();
    surface.set_title("");
    surface.set_tooltip(APP_NAME);
    let mut coordinator = Coordinator::new(store, event_tx.clone());
    coordinator.start(&mut surface);
    info!(
        "started with {} makefiles from {}",
        coordinator.store().entries().len(),
        coordinator.store().path().display()
    );

    let mut app = App::new();
    let mut terminal = tui::init_terminal().context("failed to initialize terminal")?;
    spawn_input_listener(event_tx.clone());
    spawn_signal_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut result = Ok(());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::WatchFired { generation, path } => {
                        match coordinator.on_watch_fired(generation, &mut surface) {
                            ReloadOutcome::Rebuilt => app.set_status_message(format!(
                                "{} changed - menu refreshed",
                                path.display()
                            )),
                            ReloadOutcome::Failed => app.set_status_warning_persistent(
                                "config could not be loaded; waiting for a fix",
                            ),
                            ReloadOutcome::Ignored => {}
                        }
                    }
                    Event::Key(key) => {
                        let action = app.handle_key(key, &surface);
                        handle_app_action(
                            action,
                            &mut app,
                            &mut coordinator,
                            &mut surface,
                            &template,
                        );
                    }
                    Event::Resize { width, height } => {
                        debug!("terminal resized to {}x{}", width, height);
                        let _ = terminal.autoresize();
                    }
                    Event::Shutdown => {
                        info!("shutdown requested");
                        app.should_quit = true;
                    }
                }
            }
            _ = ticker.tick() => {}
        }

        if let Err(err) = tui::draw(&mut app, &surface, &coordinator, &mut terminal) {
            result = Err(err.into());
            break;
        }
        if app.should_quit {
            break;
        }
    }

    coordinator.shutdown();
    tui::restore_terminal(terminal)?;
    result
}

fn handle_app_action(
    action: AppAction,
    app: &mut App,
    coordinator: &mut Coordinator,
    surface: &mut MenuSurface,
    template: &TerminalTemplate,
) {
    match action {
        AppAction::Click(id) => match coordinator.action_for(id) {
            Some(MenuAction::Launch { makefile, target }) => {
                launcher::launch(template, &makefile, &target);
                app.set_status_message(format!("Running {} in a new terminal", target));
            }
            Some(MenuAction::AddEntry) => app.begin_add_entry(),
            Some(MenuAction::OpenConfig) => launcher::open_config(coordinator.store().path()),
            Some(MenuAction::Exit) => app.should_quit = true,
            None => debug!("click on unbound item {:?}", id),
        },
        AppAction::OpenConfig => launcher::open_config(coordinator.store().path()),
        AppAction::SubmitEntry { path, label } => {
            match coordinator.add_entry(&path, &label, surface) {
                Ok(()) => {
                    info!("added makefile {}", path);
                    app.set_status_message(ADDED_NOTICE);
                }
                Err(err) => {
                    warn!("add makefile failed: {}", err);
                    app.set_status_warning_for(
                        format!("could not add Makefile: {}", err),
                        Duration::from_secs(5),
                    );
                }
            }
        }
        AppAction::Quit | AppAction::None => {}
    }
}

fn config_path(cli: &Cli) -> Result<String> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    let Some(dir) = dirs::config_dir() else {
        bail!("cannot determine the user config directory; pass --config");
    };
    Ok(dir.join(APP_NAME).join("config.json").display().to_string())
}

fn default_log_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("make-tray.log")
}

fn load_store(cli: &Cli) -> Result<ConfigStore> {
    let raw = config_path(cli)?;
    let store = ConfigStore::load(&raw).context("failed to load configuration")?;
    if store.entries().is_empty() {
        bail!("no Makefiles listed in {}", store.path().display());
    }
    Ok(store)
}

fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Plain-text rendering of the menu for `make-tray list`.
fn render_listing(entries: &[Entry]) -> String {
    let mut surface = MenuSurface::new();
    let model = MenuModel::build(entries, &mut surface);
    let mut out = String::new();
    for group in model.groups() {
        out.push_str(&format!("{} ({})\n", group.label, group.makefile.display()));
        match &group.state {
            GroupState::Error(err) => out.push_str(&format!("  (error) {}\n", err)),
            GroupState::Empty => out.push_str("  (no targets)\n"),
            GroupState::Targets(_) => {
                for leaf in surface.visible_children(group.id) {
                    out.push_str(&format!("  {}\n", leaf.title));
                }
            }
        }
    }
    out
}

fn spawn_input_listener(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(100)).unwrap_or(false) {
            let sent = match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.blocking_send(Event::Key(key))
                }
                Ok(crossterm::event::Event::Resize(width, height)) => {
                    tx.blocking_send(Event::Resize { width, height })
                }
                _ => Ok(()),
            };
            if sent.is_err() {
                break;
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    warn!("cannot listen for SIGTERM: {}", err);
                    let _ = tokio::signal::ctrl_c().await;
                    let _ = tx.send(Event::Shutdown).await;
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        let _ = tx.send(Event::Shutdown).await;
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}
