//! Host scheduling capability and the bundled threaded implementation.

use crate::config::LoaderConfig;
use log::{error, info, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One unit of work submitted to the host.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Scheduling primitives the host offers to the loader.
///
/// A scheduler may drop a task without running it (after shutdown, for
/// example). Callers that track in-flight work must clean up when the task
/// itself is dropped.
pub trait HostScheduler: Send + Sync {
    /// Whether the calling thread is the designated affinity thread.
    fn is_affinity_thread(&self) -> bool;

    /// Queues `task` to run on the affinity thread later.
    ///
    /// Tasks submitted from one thread run in submission order.
    fn run_on_affinity_thread(&self, task: Task);

    /// Runs `task` on some thread other than the affinity thread.
    fn run_in_background(&self, task: Task);
}

/// Scheduler owning one named affinity thread and a tokio blocking pool.
///
/// # Invariants
/// - The affinity thread drains its queue strictly in FIFO order.
/// - Background tasks run on the runtime's blocking pool, never on the
///   affinity thread.
/// - A panicking task is logged and does not take its thread down.
/// - After `shutdown`, submitted tasks are dropped with a warning.
pub struct ThreadedScheduler {
    affinity_thread: ThreadId,
    affinity_tx: Mutex<Option<UnboundedSender<Task>>>,
    affinity_handle: Mutex<Option<JoinHandle<()>>>,
    runtime: Mutex<Option<Runtime>>,
}

impl ThreadedScheduler {
    /// Spawns the affinity thread and a blocking pool of up to
    /// `background_workers` threads (at least one).
    pub fn start(background_workers: usize) -> io::Result<Self> {
        let background_workers = background_workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(background_workers)
            .thread_name("chestvault-worker")
            .build()?;

        let (affinity_tx, affinity_rx) = mpsc::unbounded_channel::<Task>();
        let affinity = thread::Builder::new()
            .name("chestvault-affinity".to_string())
            .spawn(move || drain_affinity_queue(affinity_rx))?;

        info!(
            "event=scheduler_start module=runtime status=ok background_workers={}",
            background_workers
        );

        Ok(Self {
            affinity_thread: affinity.thread().id(),
            affinity_tx: Mutex::new(Some(affinity_tx)),
            affinity_handle: Mutex::new(Some(affinity)),
            runtime: Mutex::new(Some(runtime)),
        })
    }

    /// Starts a scheduler sized by `config.background_workers`.
    pub fn from_config(config: &LoaderConfig) -> io::Result<Self> {
        Self::start(config.background_workers)
    }

    pub fn affinity_thread_id(&self) -> ThreadId {
        self.affinity_thread
    }

    /// Stops accepting tasks and joins the affinity thread.
    ///
    /// Background tasks already running get a grace period; queued ones that
    /// have not started are dropped. The affinity queue is drained after the
    /// pool stops, so work those drops post back still runs.
    ///
    /// Idempotent. The calling thread is never joined, so shutting down from
    /// inside a task is safe.
    pub fn shutdown(&self) {
        let runtime = self.runtime.lock().take();
        let Some(runtime) = runtime else {
            return;
        };
        if Handle::try_current().is_ok() {
            runtime.shutdown_background();
        } else {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }

        drop(self.affinity_tx.lock().take());
        let affinity = self.affinity_handle.lock().take();
        if let Some(handle) = affinity {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                error!("event=scheduler_shutdown module=runtime status=error error_code=join_failed");
            }
        }
        info!("event=scheduler_shutdown module=runtime status=ok");
    }
}

impl Drop for ThreadedScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl HostScheduler for ThreadedScheduler {
    fn is_affinity_thread(&self) -> bool {
        thread::current().id() == self.affinity_thread
    }

    fn run_on_affinity_thread(&self, task: Task) {
        let rejected = match self.affinity_tx.lock().as_ref() {
            Some(tx) => tx.send(task).err().map(|returned| returned.0),
            None => Some(task),
        };
        if let Some(task) = rejected {
            warn!("event=task_submit module=runtime status=dropped queue=affinity reason=shutdown");
            drop(task);
        }
    }

    fn run_in_background(&self, task: Task) {
        let rejected = match self.runtime.lock().as_ref() {
            Some(runtime) => {
                drop(runtime.spawn_blocking(move || run_task("background", task)));
                None
            }
            None => Some(task),
        };
        if let Some(task) = rejected {
            warn!("event=task_submit module=runtime status=dropped queue=background reason=shutdown");
            drop(task);
        }
    }
}

fn drain_affinity_queue(mut receiver: UnboundedReceiver<Task>) {
    while let Some(task) = receiver.blocking_recv() {
        run_task("affinity", task);
    }
}

fn run_task(queue: &'static str, task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(
            "event=task_panic module=runtime status=error queue={} payload={}",
            queue,
            panic_message(payload.as_ref())
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
