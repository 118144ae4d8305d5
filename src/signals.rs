//! Notification that the process was resumed after being stopped, the
//! closest portable hint that ticks may have been missed.

use anyhow::Result;

#[cfg(unix)]
pub struct ResumeSignal {
    inner: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ResumeSignal {
    pub fn new() -> Result<Self> {
        use anyhow::Context;
        use tokio::signal::unix::{signal, SignalKind};

        let inner = signal(SignalKind::from_raw(libc::SIGCONT))
            .context("failed to install SIGCONT handler")?;
        Ok(Self { inner })
    }

    /// Resolves on each resume. Pending forever once the stream closes.
    pub async fn recv(&mut self) {
        if self.inner.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
pub struct ResumeSignal;

#[cfg(not(unix))]
impl ResumeSignal {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
