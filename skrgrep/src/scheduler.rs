//! Worker pool with ordered result slots.
//!
//! Tasks are numbered as they are submitted and a result slot is reserved for
//! each one before it reaches the queue. Workers finish in any order and fill
//! their slot; the dispatching thread takes outcomes from the front of the
//! slot table only, so results come out in submission order.

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::errors::GrepResult;
use crate::results::{FileOutcome, FileReport, FileStatus};

/// Outstanding slots allowed per worker before `submit` callers should wait
pub const SLOTS_PER_WORKER: usize = 64;

/// One file to process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    /// Position in submission order, assigned by [`TaskScheduler::submit`]
    pub index: u64,
    pub path: PathBuf,
    pub file_name: String,
    pub folder: PathBuf,
    /// Path as printed in result records
    pub display_path: String,
    /// Folder heading text used when separate-folder output is on
    pub folder_label: String,
    /// Folder list entry the file was found under
    pub root: PathBuf,
}

impl Task {
    /// Ties a per-file report to this task
    pub fn outcome(&self, report: FileReport) -> FileOutcome {
        FileOutcome {
            index: self.index,
            path: self.path.clone(),
            folder: self.folder.clone(),
            folder_label: self.folder_label.clone(),
            root: self.root.clone(),
            hit_count: report.hit_count,
            message: report.message,
            has_records: report.has_records,
            status: report.status,
        }
    }

    fn cancelled(&self) -> FileOutcome {
        self.outcome(FileReport {
            status: FileStatus::Cancelled,
            ..FileReport::default()
        })
    }

    fn aborted(&self, reason: String) -> FileOutcome {
        self.outcome(FileReport {
            status: FileStatus::Aborted(reason),
            ..FileReport::default()
        })
    }
}

/// Per-thread task handler. Each worker thread owns one.
pub trait TaskWorker: Send {
    fn run(&mut self, task: &Task) -> FileOutcome;
}

impl<F> TaskWorker for F
where
    F: FnMut(&Task) -> FileOutcome + Send,
{
    fn run(&mut self, task: &Task) -> FileOutcome {
        self(task)
    }
}

/// What a worker gets to know about its pool
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: usize,
    stop: Arc<AtomicBool>,
}

impl WorkerContext {
    /// True once the pool was told to stop; running tasks should end early
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct SlotTable {
    /// Task index of the front slot
    base: u64,
    slots: VecDeque<Option<FileOutcome>>,
}

#[derive(Debug)]
struct Shared {
    table: Mutex<SlotTable>,
    ready: Condvar,
    stop: Arc<AtomicBool>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill(&self, outcome: FileOutcome) {
        let mut table = self.lock();
        // Slots below the base were discarded after a cancel
        if let Some(offset) = outcome.index.checked_sub(table.base) {
            if let Some(slot) = table.slots.get_mut(offset as usize) {
                *slot = Some(outcome);
            }
        }
        drop(table);
        self.ready.notify_all();
    }
}

/// Fixed pool of worker threads fed through a channel
pub struct TaskScheduler {
    sender: Option<Sender<Task>>,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
    next_index: u64,
    capacity: usize,
}

impl TaskScheduler {
    /// Starts `threads` workers, each built by `make_worker`
    pub fn start<F, W>(threads: NonZeroUsize, mut make_worker: F) -> GrepResult<Self>
    where
        F: FnMut(WorkerContext) -> W,
        W: TaskWorker + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let shared = Arc::new(Shared {
            table: Mutex::new(SlotTable::default()),
            ready: Condvar::new(),
            stop: Arc::new(AtomicBool::new(false)),
        });

        let mut scheduler = Self {
            sender: Some(sender),
            shared,
            handles: Vec::with_capacity(threads.get()),
            next_index: 0,
            capacity: threads.get() * SLOTS_PER_WORKER,
        };

        for id in 0..threads.get() {
            let worker = make_worker(WorkerContext {
                id,
                stop: Arc::clone(&scheduler.shared.stop),
            });
            let receiver = receiver.clone();
            let shared = Arc::clone(&scheduler.shared);
            // On error the partly built pool is shut down by Drop
            let handle = thread::Builder::new()
                .name(format!("skrgrep-worker-{id}"))
                .spawn(move || worker_loop(id, worker, receiver, shared))?;
            scheduler.handles.push(handle);
        }

        debug!("Started {} grep workers", threads);
        Ok(scheduler)
    }

    /// Queues a task and returns its index. The result slot is reserved first.
    pub fn submit(&mut self, mut task: Task) -> u64 {
        task.index = self.next_index;
        self.next_index += 1;
        self.shared.lock().slots.push_back(None);

        let index = task.index;
        let unsent = match &self.sender {
            Some(sender) => sender.send(task).err().map(|e| e.into_inner()),
            None => Some(task),
        };
        if let Some(task) = unsent {
            self.shared.fill(task.cancelled());
        }
        index
    }

    /// Number of reserved slots not yet taken
    pub fn outstanding(&self) -> usize {
        self.shared.lock().slots.len()
    }

    /// True when enough slots are outstanding that the caller should drain first
    pub fn is_saturated(&self) -> bool {
        self.outstanding() >= self.capacity
    }

    /// Waits up to `timeout` for the front slot to be filled
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let table = self.shared.lock();
        if matches!(table.slots.front(), Some(Some(_))) {
            return true;
        }
        let (table, _) = self
            .shared
            .ready
            .wait_timeout_while(table, timeout, |t| {
                !matches!(t.slots.front(), Some(Some(_)))
            })
            .unwrap_or_else(PoisonError::into_inner);
        matches!(table.slots.front(), Some(Some(_)))
    }

    /// Takes the front outcome if its task has completed
    pub fn take_ready(&self) -> Option<FileOutcome> {
        let mut table = self.shared.lock();
        if !matches!(table.slots.front(), Some(Some(_))) {
            return None;
        }
        table.base += 1;
        table.slots.pop_front().flatten()
    }

    /// Drops every outstanding slot; late results are ignored
    pub fn discard(&self) {
        let mut table = self.shared.lock();
        let dropped = table.slots.len();
        table.base += dropped as u64;
        table.slots.clear();
        trace!("Discarded {} pending results", dropped);
    }

    /// Tells workers to cut running tasks short and skip queued ones
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Stops the pool and joins every worker thread
    pub fn shutdown(&mut self) {
        self.stop();
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("A grep worker panicked");
            }
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, mut worker: impl TaskWorker, receiver: Receiver<Task>, shared: Arc<Shared>) {
    for task in receiver.iter() {
        let outcome = if shared.stop.load(Ordering::Relaxed) {
            task.cancelled()
        } else {
            // A panicking worker must still fill its slot or the sequencer stalls
            let run = panic::catch_unwind(AssertUnwindSafe(|| worker.run(&task)));
            run.unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                warn!("Worker {} panicked on {}: {}", id, task.path.display(), reason);
                task.aborted(format!("worker panicked: {}", reason))
            })
        };
        shared.fill(outcome);
    }
    trace!("Worker {} finished", id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
