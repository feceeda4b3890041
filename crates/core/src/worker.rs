use tokio::{
    runtime::{Builder, Runtime},
    task::JoinHandle,
};
use tracing::debug;

use crate::{Error, Result};

/// A single-threaded worker for connection setup and teardown.
///
/// Work runs on one blocking thread; the caller collects the outcome with
/// [`BackgroundWorker::wait`] the first time it needs it.
#[derive(Debug)]
pub struct BackgroundWorker {
    runtime: Runtime,
}

#[derive(Debug)]
pub struct Pending<T> {
    label: &'static str,
    handle: JoinHandle<T>,
}

impl<T> Pending<T> {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl BackgroundWorker {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .max_blocking_threads(1)
            .thread_name("tablelink-worker")
            .build()
            .map_err(|source| Error::Worker {
                message: format!("failed to start worker runtime: {source}"),
            })?;
        Ok(Self { runtime })
    }

    pub fn submit<F, T>(&self, label: &'static str, task: F) -> Pending<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        debug!(task = label, "submitting background task");
        Pending {
            label,
            handle: self.runtime.spawn_blocking(task),
        }
    }

    pub fn wait<T>(&self, pending: Pending<T>) -> Result<T> {
        let Pending { label, handle } = pending;
        self.runtime.block_on(handle).map_err(|source| Error::Worker {
            message: format!("{label} task did not complete: {source}"),
        })
    }
}
