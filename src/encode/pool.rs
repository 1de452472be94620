//! Fixed-size pool of OS-thread encoder workers.

use std::any::Any;
use std::collections::{BTreeSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use crate::encode::page::EncodedPage;
use crate::encode::task::EncodeTask;
use crate::foundation::error::{ForteError, ForteResult};

/// Turns one task into one encoded page. Implementations must not share mutable state between
/// calls.
pub trait FrameEncoder: Send + Sync + 'static {
    /// Encode `task`, giving up with [`ForteError::Aborted`] once `cancel` is set.
    fn encode(&self, task: &EncodeTask, cancel: &AtomicBool) -> ForteResult<EncodedPage>;
}

/// Identifies one worker thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

/// Exclusive right to hand one task to an idle worker.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
}

impl WorkerHandle {
    /// Worker this handle addresses.
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

/// Messages arriving at the dispatcher: worker results and caller aborts.
#[derive(Debug)]
pub(crate) enum JobMessage {
    Finished {
        worker: WorkerId,
        page: EncodedPage,
    },
    Failed {
        worker: WorkerId,
        index: u32,
        error: ForteError,
    },
    Abort,
}

struct Worker {
    jobs: Option<Sender<EncodeTask>>,
    thread: Option<JoinHandle<()>>,
}

/// Workers partitioned into disjoint free and active sets.
///
/// Owned by one dispatcher; `acquire` moves a worker to active, `release` moves it back.
pub struct WorkerPool {
    workers: Vec<Worker>,
    free: VecDeque<WorkerId>,
    active: BTreeSet<WorkerId>,
    cancel: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `size` workers that report into `reports`.
    pub(crate) fn spawn(
        size: usize,
        encoder: Arc<dyn FrameEncoder>,
        reports: Sender<JobMessage>,
        cancel: Arc<AtomicBool>,
    ) -> ForteResult<Self> {
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let (tx, rx) = mpsc::channel::<EncodeTask>();
            let encoder = Arc::clone(&encoder);
            let reports = reports.clone();
            let cancel = Arc::clone(&cancel);
            let id = WorkerId(i);

            let thread = std::thread::Builder::new()
                .name(format!("forte-gif-{i}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        if cancel.load(Ordering::Relaxed) {
                            break;
                        }
                        let index = task.index;
                        let outcome =
                            panic::catch_unwind(AssertUnwindSafe(|| encoder.encode(&task, &cancel)))
                                .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())));
                        let msg = match outcome {
                            Ok(page) => JobMessage::Finished { worker: id, page },
                            Err(error) => JobMessage::Failed {
                                worker: id,
                                index,
                                error,
                            },
                        };
                        if reports.send(msg).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| ForteError::encode(format!("spawn encoder worker: {e}")))?;

            tracing::debug!(worker = i, "spawned encoder worker");
            workers.push(Worker {
                jobs: Some(tx),
                thread: Some(thread),
            });
        }

        Ok(Self {
            free: (0..size).map(WorkerId).collect(),
            active: BTreeSet::new(),
            workers,
            cancel,
        })
    }

    /// Total workers.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Idle workers.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Busy workers.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Take an idle worker, if any.
    pub fn acquire(&mut self) -> Option<WorkerHandle> {
        let id = self.free.pop_front()?;
        self.active.insert(id);
        Some(WorkerHandle { id })
    }

    /// Return a worker to the free set. Unknown or already-free ids are ignored.
    pub fn release(&mut self, id: WorkerId) {
        if self.active.remove(&id) {
            self.free.push_back(id);
        }
    }

    /// Hand `task` to the worker behind `handle`.
    pub fn submit(&mut self, handle: WorkerHandle, task: EncodeTask) -> ForteResult<()> {
        let sent = self
            .workers
            .get(handle.id.0)
            .and_then(|w| w.jobs.as_ref())
            .map(|jobs| jobs.send(task).is_ok())
            .unwrap_or(false);
        if !sent {
            self.release(handle.id);
            return Err(ForteError::encode(format!(
                "encoder worker {} is not accepting tasks",
                handle.id.0
            )));
        }
        Ok(())
    }

    /// Stop every worker: raise the cancel flag, close task queues and join the threads.
    pub fn terminate(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        for w in &mut self.workers {
            w.jobs.take();
        }
        for w in &mut self.workers {
            if let Some(t) = w.thread.take() {
                let _ = t.join();
            }
        }
        self.active.clear();
        self.free.clear();
    }
}

/// A panicking encoder becomes an ordinary task failure so the dispatcher still hears back.
fn panic_error(payload: &(dyn Any + Send)) -> ForteError {
    let msg = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    ForteError::encode(format!("encoder worker panicked: {msg}"))
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pool.rs"]
mod tests;
