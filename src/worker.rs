//! Background execution of one operation
//!
//! A [`BackgroundTask`] runs a single orchestrated operation on its own OS
//! thread so an interactive front end stays responsive. Copy progress is
//! forwarded over a tokio channel the caller drains whenever it likes, and
//! the most recent event is kept for UIs that only poll.
//!
//! Cancelling only stops progress delivery. The file-level copy in flight is
//! never interrupted, so a snapshot or restore still runs to completion.

use crate::error::{Result, WorldError};
use crate::manager::WorldManager;
use crate::types::{CopyProgress, ProgressSink};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct ChannelProgress {
    sender: mpsc::UnboundedSender<CopyProgress>,
    latest: Arc<Mutex<Option<CopyProgress>>>,
    cancelled: Arc<AtomicBool>,
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, progress: &CopyProgress) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        *self.latest.lock() = Some(progress.clone());
        // receiver may already be gone
        let _ = self.sender.send(progress.clone());
    }
}

/// Handle to an operation running on a worker thread
pub struct BackgroundTask<T> {
    handle: Option<JoinHandle<Result<T>>>,
    receiver: mpsc::UnboundedReceiver<CopyProgress>,
    latest: Arc<Mutex<Option<CopyProgress>>>,
    cancelled: Arc<AtomicBool>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Start `op` on a thread named `worldvault-<name>`
    ///
    /// `op` receives the progress sink it should report through.
    pub fn spawn<F>(name: &str, op: F) -> Result<Self>
    where
        F: FnOnce(Arc<dyn ProgressSink>) -> Result<T> + Send + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let latest = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));

        let sink: Arc<dyn ProgressSink> = Arc::new(ChannelProgress {
            sender,
            latest: Arc::clone(&latest),
            cancelled: Arc::clone(&cancelled),
        });

        let handle = thread::Builder::new()
            .name(format!("worldvault-{}", name))
            .spawn(move || op(sink))?;
        debug!("Spawned background task {}", name);

        Ok(Self {
            handle: Some(handle),
            receiver,
            latest,
            cancelled,
        })
    }
}

impl<T> BackgroundTask<T> {
    /// Every progress event queued since the last call
    pub fn drain(&mut self) -> Vec<CopyProgress> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next progress event; `None` once the task has finished
    /// and every event has been received
    pub async fn next_progress(&mut self) -> Option<CopyProgress> {
        self.receiver.recv().await
    }

    /// Most recent progress event, if any was delivered
    pub fn latest(&self) -> Option<CopyProgress> {
        self.latest.lock().clone()
    }

    /// Stop delivering progress; the operation itself keeps running
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the operation finishes and return its result
    ///
    /// A panic on the worker thread becomes [`WorldError::Internal`].
    pub fn join(mut self) -> Result<T> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| WorldError::internal("background task already joined"))?;
        handle.join().unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!("Background task panicked: {}", message);
            Err(WorldError::internal(format!("worker panicked: {}", message)))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl WorldManager {
    /// Run `op` on a worker thread with progress routed to the task
    ///
    /// ```rust,no_run
    /// use worldvault::WorldManager;
    ///
    /// # async fn example() -> worldvault::Result<()> {
    /// let manager = WorldManager::default();
    /// let mut task = manager.spawn(|m| m.create_backup("Survival"))?;
    /// while let Some(p) = task.next_progress().await {
    ///     println!("{}/{} {}", p.completed, p.total, p.relative_path.display());
    /// }
    /// let entry = task.join()?;
    /// println!("created {}", entry.name);
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<T, F>(&self, op: F) -> Result<BackgroundTask<T>>
    where
        T: Send + 'static,
        F: FnOnce(&WorldManager) -> Result<T> + Send + 'static,
    {
        let manager = self.clone();
        BackgroundTask::spawn("op", move |sink| op(&manager.with_progress(sink)))
    }
}
