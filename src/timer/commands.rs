use std::path::PathBuf;

use crate::{
    activity_log::{export_csv, render_table},
    timer::{FinishedSession, Phase, TimerController, TimerSnapshot},
    AppState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { minutes: u32, activity: String },
    Pause,
    Resume,
    Stop,
    Status,
    Sync,
    Log { limit: Option<usize> },
    Export { path: PathBuf },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start <minutes> <activity...>  begin a session
  pause | resume                 hold or continue the countdown
  stop                           end early (or dismiss a finished timer)
  status                         show the current timer
  sync                           re-check the timer against the clock
  log [n]                        show the newest n records
  export <file.csv>              write the log as CSV
  quit";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("empty command".into());
    };

    match verb.to_ascii_lowercase().as_str() {
        "start" => {
            let minutes = parts
                .next()
                .ok_or_else(|| "usage: start <minutes> <activity...>".to_string())?;
            let minutes: i64 = minutes
                .parse()
                .map_err(|_| format!("'{minutes}' is not a whole number of minutes"))?;
            let minutes = if minutes <= 0 {
                0
            } else {
                u32::try_from(minutes).map_err(|_| format!("{minutes} minutes is too long"))?
            };
            let activity = parts.collect::<Vec<_>>().join(" ");
            Ok(Command::Start { minutes, activity })
        }
        "pause" => Ok(Command::Pause),
        "resume" => Ok(Command::Resume),
        "stop" => Ok(Command::Stop),
        "status" => Ok(Command::Status),
        "sync" => Ok(Command::Sync),
        "log" => {
            let limit = parts
                .next()
                .map(|n| n.parse::<usize>().map_err(|_| format!("'{n}' is not a count")))
                .transpose()?;
            Ok(Command::Log { limit })
        }
        "export" => {
            let path = parts
                .next()
                .ok_or_else(|| "usage: export <file.csv>".to_string())?;
            Ok(Command::Export {
                path: PathBuf::from(path),
            })
        }
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

fn controller_from_state(state: &AppState) -> TimerController {
    state.timer.clone()
}

pub fn describe(snapshot: &TimerSnapshot) -> String {
    let activity = snapshot.activity.as_deref().unwrap_or("-");
    match snapshot.phase {
        Phase::Idle => "idle".to_string(),
        Phase::Running => format!("running  {activity}  {} left", snapshot.remaining_display()),
        Phase::Paused => format!("paused   {activity}  {} left", snapshot.remaining_display()),
        Phase::Completed => format!("finished {activity}"),
        Phase::Stopped => format!("stopped  {activity}"),
    }
}

fn describe_finished(finished: &FinishedSession) -> String {
    let mut line = format!(
        "logged {} ({:.2} of {} min)",
        finished.record.activity, finished.record.actual_minutes, finished.record.planned_minutes
    );
    if !finished.persisted {
        line.push_str(" [not saved]");
    }
    line
}

/// Runs one command and returns the text to show. `Quit` is handled by the
/// caller.
pub async fn execute(state: &AppState, command: Command) -> Result<String, String> {
    let controller = controller_from_state(state);
    match command {
        Command::Start { minutes, activity } => controller
            .start(&activity, minutes)
            .await
            .map(|snapshot| describe(&snapshot))
            .map_err(|e| e.to_string()),
        Command::Pause => controller
            .pause()
            .await
            .map(|snapshot| describe(&snapshot))
            .map_err(|e| e.to_string()),
        Command::Resume => controller
            .resume()
            .await
            .map(|snapshot| describe(&snapshot))
            .map_err(|e| e.to_string()),
        Command::Stop => match controller.stop().await.map_err(|e| e.to_string())? {
            Some(finished) => Ok(describe_finished(&finished)),
            None => Ok("dismissed".to_string()),
        },
        Command::Status => Ok(describe(&controller.snapshot().await)),
        Command::Sync => match controller.resync().await {
            Some(finished) => Ok(describe_finished(&finished)),
            None => Ok(describe(&controller.snapshot().await)),
        },
        Command::Log { limit } => {
            let records = match limit {
                Some(limit) => state.db.list_records_paginated(limit, 0).await,
                None => state.db.list_records().await,
            }
            .map_err(|e| e.to_string())?;
            Ok(render_table(&records, state.settings.get().minutes_display)
                .trim_end()
                .to_string())
        }
        Command::Export { path } => {
            let records = state.db.list_records().await.map_err(|e| e.to_string())?;
            export_csv(&records, state.settings.get().minutes_display, &path)
                .map_err(|e| format!("{e:#}"))?;
            Ok(format!("exported {} records to {}", records.len(), path.display()))
        }
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_keeps_multi_word_activity() {
        assert_eq!(
            parse_command("start 25 edit the paper"),
            Ok(Command::Start {
                minutes: 25,
                activity: "edit the paper".into()
            })
        );
    }

    #[test]
    fn start_passes_non_positive_minutes_through_as_zero() {
        assert_eq!(
            parse_command("start -5 read"),
            Ok(Command::Start {
                minutes: 0,
                activity: "read".into()
            })
        );
        assert!(parse_command("start ten read").is_err());
        assert!(parse_command("start").is_err());
    }

    #[test]
    fn simple_verbs_are_case_insensitive() {
        assert_eq!(parse_command("PAUSE"), Ok(Command::Pause));
        assert_eq!(parse_command("  resume "), Ok(Command::Resume));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
        assert_eq!(parse_command("log 3"), Ok(Command::Log { limit: Some(3) }));
        assert!(parse_command("dance").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn describe_shows_countdown() {
        let snapshot = TimerSnapshot {
            phase: Phase::Running,
            activity: Some("read".into()),
            planned_minutes: Some(25),
            active_ms: 60_000,
            remaining_ms: 24 * 60_000,
        };
        assert_eq!(describe(&snapshot), "running  read  24:00 left");
    }
}
