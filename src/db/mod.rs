//! Activity log storage.
//!
//! SQLite connections are not `Sync`, so a single worker thread owns the
//! connection and async callers hand it closures, awaiting the result on a
//! oneshot channel.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use models::{ActivityRecord, TerminationKind};

/// Destination for finished records. The timer calls `append` once per
/// terminated session and never retries.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &ActivityRecord) -> Result<()>;
}

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close,
}

struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else { return };

        if self.requests.send(Request::Close).is_err() {
            warn!("Activity log worker already gone at shutdown");
        }
        if let Err(panic) = handle.join() {
            error!("Activity log worker panicked: {panic:?}");
        }
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database at {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        warn!("Falling back to the default journal mode: {err}");
    }
    migrations::run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(mut conn: Connection, requests: mpsc::Receiver<Request>) {
    for request in requests {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Close => break,
        }
    }
    info!("Activity log worker stopped");
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (creating if needed) the store at `path` and migrates it. Fails
    /// before returning if the file cannot be opened or migrated.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let (requests, inbox) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("focuslog-db".into())
            .spawn(move || match open_connection(&worker_path) {
                Ok(conn) => {
                    if ready_tx.send(Ok(())).is_ok() {
                        serve(conn, inbox);
                    }
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .context("failed to spawn activity log worker")?;

        let worker = Worker {
            requests,
            thread: Mutex::new(Some(thread)),
        };
        ready_rx
            .recv()
            .context("activity log worker exited during startup")??;

        info!("Activity log opened at {}", path.display());
        Ok(Self {
            worker: Arc::new(worker),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the worker's connection.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // Caller gone: nothing to deliver to.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("activity log worker is not running"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("activity log worker dropped the request"))?
    }
}

#[async_trait]
impl RecordSink for Database {
    async fn append(&self, record: &ActivityRecord) -> Result<()> {
        self.insert_record(record).await
    }
}
