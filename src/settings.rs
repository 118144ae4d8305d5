use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use crate::{
    activity_log::MinutesDisplay,
    timer::{record::TimeFormat, TimerConfig},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    #[default]
    Bell,
    Chime,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub tick_interval_ms: u64,
    pub heartbeat_every_ticks: u32,
    pub notification: NotificationKind,
    pub time_format: String,
    pub minutes_display: MinutesDisplay,
    pub database_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            heartbeat_every_ticks: 10,
            notification: NotificationKind::Bell,
            time_format: "%H:%M".into(),
            minutes_display: MinutesDisplay::Precise,
            database_path: None,
        }
    }
}

impl Settings {
    pub fn timer_config(&self, debug_mode: bool) -> TimerConfig {
        TimerConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(10)),
            heartbeat_every_ticks: if debug_mode {
                1
            } else {
                self.heartbeat_every_ticks.max(1)
            },
            time_format: TimeFormat(self.time_format.clone()),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("focuslog.sqlite3"))
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("focuslog")
}

pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("focuslog")
        .join("settings.json")
}

/// `FOCUSLOG_DEBUG=1|true` turns on per-tick heartbeats.
pub fn debug_mode_from_env() -> bool {
    std::env::var("FOCUSLOG_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings at {}: {err}; using defaults",
                    path.display()
                );
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serialized)
            .with_context(|| format!("Failed to write settings to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace settings at {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.get(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "minutesDisplay": "roundUp", "notification": "none" }"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.minutes_display, MinutesDisplay::RoundUp);
        assert_eq!(settings.notification, NotificationKind::None);
        assert_eq!(settings.tick_interval_ms, 1000);
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.time_format = "%I:%M %p".into();
        store.update(settings.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.get(), settings);
    }

    #[test]
    fn debug_mode_heartbeats_every_tick() {
        let settings = Settings::default();
        assert_eq!(settings.timer_config(true).heartbeat_every_ticks, 1);
        assert_eq!(settings.timer_config(false).heartbeat_every_ticks, 10);
        assert_eq!(settings.timer_config(false).tick_interval, Duration::from_secs(1));
    }
}
