#[cfg(feature = "chime")]
pub mod chime;

use std::io::Write;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

#[cfg(feature = "chime")]
pub use chime::ChimeNotifier;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Completion alert. Calls are fire-and-forget and must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self);
    fn silence(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self) {}
    fn silence(&self) {}
}

/// Rings the terminal bell on stderr until silenced.
pub struct TerminalBell {
    // Bumped on every notify/silence; a ringer thread exits once it sees a
    // generation other than its own.
    generation: Arc<AtomicU64>,
    ringing: Arc<AtomicU64>,
    period: Duration,
}

impl TerminalBell {
    pub fn new() -> Self {
        Self::with_period(Duration::from_secs(2))
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            ringing: Arc::new(AtomicU64::new(0)),
            period,
        }
    }

    pub fn is_ringing(&self) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        current != 0 && self.ringing.load(Ordering::SeqCst) == current
    }
}

impl Default for TerminalBell {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for TerminalBell {
    fn notify(&self) {
        if self.is_ringing() {
            return;
        }

        let mine = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.ringing.store(mine, Ordering::SeqCst);

        let generation = Arc::clone(&self.generation);
        let period = self.period;
        let spawned = thread::Builder::new()
            .name("focuslog-bell".into())
            .spawn(move || {
                while generation.load(Ordering::SeqCst) == mine {
                    let mut stderr = std::io::stderr();
                    let _ = stderr.write_all(b"\x07");
                    let _ = stderr.flush();
                    thread::sleep(period);
                }
            });

        match spawned {
            Ok(_) => log_info!("completion bell ringing"),
            Err(err) => log_warn!("failed to spawn bell thread: {err}"),
        }
    }

    fn silence(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
