pub mod commands;
pub mod controller;
pub mod record;
pub mod state;

pub use controller::{
    FinishedSession, TimerConfig, TimerController, TimerError, TimerEvent, TimerSnapshot,
};
pub use record::{build_record, TimeFormat};
pub use state::{active_elapsed, PauseInterval, Phase, Session, TimerState};
