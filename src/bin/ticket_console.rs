use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::{
    collections::BTreeMap,
    fs::OpenOptions,
    io::{self, IsTerminal, Stdout},
    sync::Mutex,
    time::Duration,
};
use ticket_monitor::engine::{
    config::MonitorConfig,
    monitor::Monitor,
    notify::{LocalAlerts, Permission, RelayClient, Sinks},
    poller::Poller,
    session::{Control, Session, Step},
    ticket_api::TicketApi,
    timefmt::{clock_string, describe_start},
    types::{EventId, EventRecord, HistoryEntry, StatusTone, ViewMode, MIN_REFRESH_SECS},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[path = "ticket_console/ui.rs"]
mod ui;

type ConsoleSession = Session<TicketApi, Sinks>;

fn init_tracing(tui: bool, cfg: &MonitorConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if tui {
        // The TUI owns stdout/stderr; tracing goes to a file instead.
        if let Some(parent) = cfg.log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.log_file)
            .with_context(|| format!("open log file {}", cfg.log_file.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cfg = MonitorConfig::from_env()?;
    let tui = io::stdout().is_terminal();
    init_tracing(tui, &cfg)?;

    let api = TicketApi::new(&cfg.api_base)?;
    let sinks = Sinks::new(
        RelayClient::new(&cfg.relay),
        LocalAlerts::request(cfg.desktop_notify),
    );
    let monitor = Monitor::new(cfg.ignored_statuses.clone(), sinks);
    let poller = Poller::new(api, cfg.event_ids.clone(), monitor);
    info!(
        ids = ?cfg.event_ids,
        refresh_secs = cfg.refresh_secs,
        api = %cfg.api_base,
        relay = cfg.relay.is_configured(),
        "ticket console starting"
    );
    let session = Session::new(poller, cfg.refresh_secs);

    if tui {
        ui::run_tui(session).await?;
    } else {
        ui::run_plain(session).await?;
    }
    info!("ticket console stopped");
    Ok(())
}
