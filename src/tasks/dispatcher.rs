use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{Task, TaskHandler};
use crate::config::TaskConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("task dispatcher is stopped")]
    Closed,
}

/// Bounded FIFO queue drained by a fixed pool of worker threads.
///
/// `submit` applies backpressure: when the queue is full the caller waits
/// for a slot instead of the task being dropped. `stop` is broadcast to every
/// worker; each finishes its in-flight task and exits without draining what
/// is still queued.
pub struct TaskDispatcher {
    sender: Sender<Task>,
    shutdown: Mutex<Option<Sender<()>>>,
    stopped: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    completed: Arc<AtomicUsize>,
    capacity: usize,
}

impl TaskDispatcher {
    pub fn start(config: TaskConfig, handler: Arc<dyn TaskHandler>) -> std::io::Result<Self> {
        let (sender, receiver) = channel::bounded::<Task>(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);
        let completed = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.workers)
            .map(|worker_id| -> std::io::Result<JoinHandle<()>> {
                let receiver = receiver.clone();
                let shutdown = shutdown_rx.clone();
                let handler = handler.clone();
                let completed = completed.clone();
                thread::Builder::new()
                    .name(format!("task-worker-{}", worker_id))
                    .spawn(move || worker_loop(worker_id, receiver, shutdown, handler, completed))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        info!(
            workers = config.workers,
            capacity = config.queue_capacity,
            "Task dispatcher started"
        );

        Ok(Self {
            sender,
            shutdown: Mutex::new(Some(shutdown_tx)),
            stopped: AtomicBool::new(false),
            workers: Mutex::new(workers),
            completed,
            capacity: config.queue_capacity,
        })
    }

    /// Enqueues `task`, waiting for a free slot while the queue is full.
    /// The wait happens on the blocking pool, not on the request runtime.
    pub async fn submit(&self, task: Task) -> Result<(), DispatchError> {
        self.ensure_open()?;
        let task = match self.sender.try_send(task) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Disconnected(_)) => return Err(DispatchError::Closed),
            Err(TrySendError::Full(task)) => task,
        };

        debug!(kind = task.kind(), "Task queue full, waiting for a slot");
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || sender.send(task))
            .await
            .map_err(|_| DispatchError::Closed)?
            .map_err(|_| DispatchError::Closed)
    }

    /// Blocking variant for callers outside the async runtime.
    pub fn submit_blocking(&self, task: Task) -> Result<(), DispatchError> {
        self.ensure_open()?;
        self.sender.send(task).map_err(|_| DispatchError::Closed)
    }

    /// Submits and logs a failure instead of returning it. Request handlers
    /// use this: a lost side effect must never fail the request.
    pub async fn submit_or_log(&self, task: Task) {
        let kind = task.kind();
        if let Err(e) = self.submit(task).await {
            warn!(kind, error = %e, "Dropped background task");
        }
    }

    /// Signals every worker to exit and refuses further submissions. Idempotent.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if self.shutdown.lock().take().is_some() {
            info!(pending = self.sender.len(), "Task dispatcher stopping");
        }
    }

    /// Stops the pool and waits for every worker thread to finish.
    pub fn join(&self) {
        self.stop();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if worker.join().is_err() {
                error!("Task worker thread panicked");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    // Workers may still be finishing a task after stop; their receivers keep
    // the channel connected, so the flag is what closes submission.
    fn ensure_open(&self) -> Result<(), DispatchError> {
        if self.is_stopped() {
            Err(DispatchError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}

impl Drop for TaskDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(
    worker_id: usize,
    tasks: Receiver<Task>,
    shutdown: Receiver<()>,
    handler: Arc<dyn TaskHandler>,
    completed: Arc<AtomicUsize>,
) {
    debug!(worker_id, "Task worker started");
    loop {
        // Shutdown wins over queued work.
        if shutdown_requested(&shutdown) {
            break;
        }

        let next = crossbeam::select! {
            recv(shutdown) -> _ => None,
            recv(tasks) -> msg => msg.ok(),
        };
        let Some(task) = next else { break };

        run_task(worker_id, handler.as_ref(), &task);
        completed.fetch_add(1, Ordering::Relaxed);
    }
    debug!(worker_id, "Task worker stopped");
}

fn shutdown_requested(shutdown: &Receiver<()>) -> bool {
    matches!(shutdown.try_recv(), Err(TryRecvError::Disconnected) | Ok(()))
}

fn run_task(worker_id: usize, handler: &dyn TaskHandler, task: &Task) {
    debug!(worker_id, kind = task.kind(), "Processing task");
    match catch_unwind(AssertUnwindSafe(|| handler.handle(task))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(worker_id, kind = task.kind(), error = %e, "Task failed"),
        Err(_) => error!(worker_id, kind = task.kind(), "Task handler panicked"),
    }
}
