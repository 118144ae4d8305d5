pub mod activity_log;
pub mod cli;
pub mod clock;
pub mod db;
pub mod notify;
pub mod settings;
mod signals;
pub mod timer;
mod utils;

use std::{
    io::Write,
    path::Path,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};

use activity_log::{export_csv, render_table};
use cli::{Args, Command};
use clock::SystemClock;
use db::Database;
use notify::{Notifier, NullNotifier, TerminalBell};
use settings::{debug_mode_from_env, default_settings_path, NotificationKind, SettingsStore};
use signals::ResumeSignal;
use timer::{
    commands::{self, describe, parse_command},
    TimerController, TimerEvent,
};

pub struct AppState {
    pub db: Database,
    pub timer: TimerController,
    pub settings: SettingsStore,
}

fn build_notifier(kind: NotificationKind) -> Arc<dyn Notifier> {
    match kind {
        NotificationKind::Bell => Arc::new(TerminalBell::new()),
        #[cfg(feature = "chime")]
        NotificationKind::Chime => Arc::new(notify::ChimeNotifier::new()),
        #[cfg(not(feature = "chime"))]
        NotificationKind::Chime => {
            warn!("Built without the `chime` feature; falling back to the terminal bell");
            Arc::new(TerminalBell::new())
        }
        NotificationKind::None => Arc::new(NullNotifier),
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    // Reads RUST_LOG; --verbose lowers the floor to debug.
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run_with(args))
}

async fn run_with(args: Args) -> Result<()> {
    let settings_path = args.config.clone().unwrap_or_else(default_settings_path);
    let settings_store = SettingsStore::new(settings_path)?;
    let settings = settings_store.get();

    let db_path = args.db.clone().unwrap_or_else(|| settings.database_path());
    let database = Database::new(db_path)?;

    match args.command.clone().unwrap_or(Command::Run) {
        Command::Run => {
            let debug_mode = debug_mode_from_env();
            let timer = TimerController::new(
                Arc::new(SystemClock),
                Arc::new(database.clone()),
                build_notifier(settings.notification),
                settings.timer_config(debug_mode),
            );
            let state = AppState {
                db: database,
                timer,
                settings: settings_store,
            };
            info!("focuslog starting up...");
            interactive(&state).await
        }
        Command::Log { limit } => {
            let records = match limit {
                Some(limit) => database.list_records_paginated(limit, 0).await?,
                None => database.list_records().await?,
            };
            print!("{}", render_table(&records, settings.minutes_display));
            Ok(())
        }
        Command::Export { path } => export(&database, &settings_store, &path).await,
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear the log without --yes");
            }
            let removed = database.clear_records().await?;
            println!("removed {removed} records");
            Ok(())
        }
    }
}

async fn export(database: &Database, settings: &SettingsStore, path: &Path) -> Result<()> {
    let records = database.list_records().await?;
    export_csv(&records, settings.get().minutes_display, path)?;
    println!("exported {} records to {}", records.len(), path.display());
    Ok(())
}

async fn interactive(state: &AppState) -> Result<()> {
    let mut events = state.timer.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut resumed = ResumeSignal::new()?;

    println!("{}", commands::HELP);
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else { break };
                if line.trim().is_empty() {
                    prompt();
                    continue;
                }
                match parse_command(&line) {
                    Ok(commands::Command::Quit) => break,
                    Ok(command) => match commands::execute(state, command).await {
                        Ok(output) => println!("{output}"),
                        Err(err) => println!("error: {err}"),
                    },
                    Err(err) => println!("error: {err}"),
                }
                prompt();
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {skipped} timer events"),
                Err(RecvError::Closed) => break,
            },
            _ = resumed.recv() => {
                info!("Process resumed; resynchronizing timer");
                state.timer.resync().await;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    state.timer.shutdown().await;
    info!("focuslog shutting down");
    Ok(())
}

fn print_event(event: &TimerEvent) {
    match event {
        TimerEvent::Heartbeat(snapshot) => println!("\r{}", describe(snapshot)),
        TimerEvent::Completed(record) => {
            println!(
                "\rtime's up: {} ({} min). 'stop' to dismiss or 'start' a new one.",
                record.activity, record.planned_minutes
            );
            prompt();
        }
        TimerEvent::PersistFailed { record_id, reason } => {
            println!("\rwarning: record {record_id} was not saved: {reason}");
        }
        // Replies to commands already describe these.
        TimerEvent::StateChanged(_) | TimerEvent::Stopped(_) => {}
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
