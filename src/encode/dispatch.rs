//! Encoder job state machine: pull-based task dispatch over a [`WorkerPool`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use bytes::Bytes;

use crate::encode::assemble::assemble;
use crate::encode::gif::GifFrameEncoder;
use crate::encode::page::EncodedPage;
use crate::encode::pool::{FrameEncoder, JobMessage, WorkerPool};
use crate::encode::task::{EncodeOptions, EncodeTask};
use crate::foundation::error::{ForteError, ForteResult};

/// Progress of one encoder job, delivered in order over the job's channel.
///
/// `Finished`, `Error` and `Aborted` are terminal; exactly one of them ends every job.
#[derive(Clone, Debug)]
pub enum EncodeEvent {
    /// Workers spawned and the first tasks dispatched.
    Started,
    /// Finished tasks over total tasks, non-decreasing.
    Progress(f64),
    /// The assembled stream.
    Finished(Bytes),
    /// A worker failed; no output is produced.
    Error(Arc<ForteError>),
    /// The caller aborted the job.
    Aborted,
}

impl EncodeEvent {
    /// Whether no further events follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished(_) | Self::Error(_) | Self::Aborted)
    }
}

/// Lifecycle of a [`GifEncoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Accepting frames.
    Idle,
    /// Workers are encoding.
    Running,
    /// The stream was assembled.
    Completed,
    /// Aborted by the caller or by a worker failure.
    Aborted,
}

fn lock_state(state: &Mutex<JobState>) -> MutexGuard<'_, JobState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collects frames, then encodes them once on a pool of worker threads.
pub struct GifEncoder {
    opts: EncodeOptions,
    encoder: Arc<dyn FrameEncoder>,
    frames: Vec<Bytes>,
    state: Arc<Mutex<JobState>>,
}

impl std::fmt::Debug for GifEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifEncoder")
            .field("opts", &self.opts)
            .field("frames", &self.frames.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl GifEncoder {
    /// Encoder writing GIF89a frames.
    pub fn new(opts: EncodeOptions) -> Self {
        Self::with_encoder(opts, Arc::new(GifFrameEncoder))
    }

    /// Encoder driving a custom per-frame encoder.
    pub fn with_encoder(opts: EncodeOptions, encoder: Arc<dyn FrameEncoder>) -> Self {
        Self {
            opts,
            encoder,
            frames: Vec::new(),
            state: Arc::new(Mutex::new(JobState::Idle)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *lock_state(&self.state)
    }

    /// Frames queued so far.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Queue one straight-alpha RGBA8 frame of the canvas size.
    pub fn add_frame(&mut self, pixels: impl Into<Bytes>) -> ForteResult<()> {
        if self.state() != JobState::Idle {
            return Err(ForteError::validation(
                "frames can only be added before rendering starts",
            ));
        }
        let pixels = pixels.into();
        let expected = self.opts.canvas.rgba_len();
        if pixels.len() != expected {
            return Err(ForteError::validation(format!(
                "frame has {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        self.frames.push(pixels);
        Ok(())
    }

    /// Start encoding the queued frames.
    ///
    /// Fails with [`ForteError::AlreadyRunning`] while a job is running. An encoder runs at most
    /// once.
    pub fn render(&mut self) -> ForteResult<EncodeJob> {
        let mut state = lock_state(&self.state);
        match *state {
            JobState::Running => return Err(ForteError::AlreadyRunning),
            JobState::Completed | JobState::Aborted => {
                return Err(ForteError::validation(
                    "encoder already ran; create a new one for another job",
                ));
            }
            JobState::Idle => {}
        }
        if self.frames.is_empty() {
            return Err(ForteError::validation("no frames to encode"));
        }
        self.opts.validate()?;

        let tasks = EncodeTask::plan(std::mem::take(&mut self.frames), &self.opts)?;
        let (msg_tx, msg_rx) = mpsc::channel::<JobMessage>();
        let (event_tx, event_rx) = mpsc::channel::<EncodeEvent>();
        let cancel = Arc::new(AtomicBool::new(false));

        let ctx = DispatchContext {
            tasks: tasks.into_iter().map(Some).collect(),
            workers: self.opts.workers,
            encoder: Arc::clone(&self.encoder),
            reports: msg_tx.clone(),
            messages: msg_rx,
            cancel: Arc::clone(&cancel),
            events: event_tx,
        };
        let job_state = Arc::clone(&self.state);
        let thread = std::thread::Builder::new()
            .name("forte-gif-dispatch".to_string())
            .spawn(move || run_dispatch(ctx, &job_state))
            .map_err(|e| ForteError::encode(format!("spawn dispatcher: {e}")))?;

        *state = JobState::Running;
        Ok(EncodeJob {
            events: event_rx,
            abort: AbortHandle {
                cancel,
                messages: msg_tx,
            },
            state: Arc::clone(&self.state),
            thread: Some(thread),
        })
    }
}

/// Encode `frames` with `opts` using the GIF frame encoder.
pub fn encode(frames: Vec<Bytes>, opts: EncodeOptions) -> ForteResult<EncodeJob> {
    let mut encoder = GifEncoder::new(opts);
    for f in frames {
        encoder.add_frame(f)?;
    }
    encoder.render()
}

/// Cloneable handle that aborts a running job.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    cancel: Arc<AtomicBool>,
    messages: Sender<JobMessage>,
}

impl AbortHandle {
    /// Cancel the job. Workers stop at their next stage boundary; late results are dropped.
    pub fn abort(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        let _ = self.messages.send(JobMessage::Abort);
    }
}

/// A running encoder job.
#[derive(Debug)]
pub struct EncodeJob {
    events: Receiver<EncodeEvent>,
    abort: AbortHandle,
    state: Arc<Mutex<JobState>>,
    thread: Option<JoinHandle<()>>,
}

impl EncodeJob {
    /// Blocking iterator over the job's events; ends after the terminal event.
    pub fn events(&self) -> mpsc::Iter<'_, EncodeEvent> {
        self.events.iter()
    }

    /// Next event, or `None` once the job has ended.
    pub fn recv(&self) -> Option<EncodeEvent> {
        self.events.recv().ok()
    }

    /// Abort the job.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Handle for aborting from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        *lock_state(&self.state)
    }

    /// Drain events until the job ends and return the stream.
    pub fn wait(mut self) -> ForteResult<Bytes> {
        let mut outcome = Err(ForteError::encode("encoder job ended without a result"));
        for event in self.events.iter() {
            match event {
                EncodeEvent::Finished(bytes) => outcome = Ok(bytes),
                EncodeEvent::Error(err) => outcome = Err(unshare_error(err)),
                EncodeEvent::Aborted => outcome = Err(ForteError::Aborted),
                EncodeEvent::Started | EncodeEvent::Progress(_) => continue,
            }
            break;
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        outcome
    }
}

/// Take the error out of an event, or describe it if other clones are still alive.
pub(crate) fn unshare_error(err: Arc<ForteError>) -> ForteError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| match shared.as_ref() {
        ForteError::Aborted => ForteError::Aborted,
        ForteError::AlreadyRunning => ForteError::AlreadyRunning,
        other => ForteError::encode(other.to_string()),
    })
}

struct DispatchContext {
    tasks: Vec<Option<EncodeTask>>,
    workers: usize,
    encoder: Arc<dyn FrameEncoder>,
    reports: Sender<JobMessage>,
    messages: Receiver<JobMessage>,
    cancel: Arc<AtomicBool>,
    events: Sender<EncodeEvent>,
}

fn run_dispatch(ctx: DispatchContext, state: &Mutex<JobState>) {
    let events = ctx.events.clone();
    let (next_state, terminal) = match dispatch(ctx) {
        Ok(bytes) => (JobState::Completed, EncodeEvent::Finished(bytes)),
        Err(ForteError::Aborted) => (JobState::Aborted, EncodeEvent::Aborted),
        Err(err) => {
            tracing::warn!(error = %err, "gif encoding failed");
            (JobState::Aborted, EncodeEvent::Error(Arc::new(err)))
        }
    };
    *lock_state(state) = next_state;
    let _ = events.send(terminal);
}

struct Scheduler {
    tasks: Vec<Option<EncodeTask>>,
    next: usize,
    palette_ready: bool,
}

impl Scheduler {
    /// Hand out tasks in index order while workers are free. Before the shared palette is known
    /// only task 0 may go out.
    fn fill(&mut self, pool: &mut WorkerPool) -> ForteResult<()> {
        let total = self.tasks.len();
        while self.next < total {
            if !self.palette_ready && self.next > 0 {
                break;
            }
            let Some(handle) = pool.acquire() else {
                break;
            };
            let task = self.tasks[self.next]
                .take()
                .ok_or_else(|| ForteError::encode(format!("task {} dispatched twice", self.next)))?;
            tracing::debug!(worker = handle.id().0, "frame {} of {}", self.next + 1, total);
            pool.submit(handle, task)?;
            self.next += 1;
        }
        Ok(())
    }

    fn broadcast_palette(&mut self, palette: &Bytes) {
        for task in self.tasks[self.next..].iter_mut().flatten() {
            task.global_palette = Some(palette.clone());
        }
        self.palette_ready = true;
    }
}

fn dispatch(ctx: DispatchContext) -> ForteResult<Bytes> {
    let total = ctx.tasks.len();
    let global = ctx
        .tasks
        .first()
        .and_then(|t| t.as_ref())
        .is_some_and(|t| t.use_global_palette);
    let size = ctx.workers.min(total).max(1);

    let mut pool = WorkerPool::spawn(size, ctx.encoder, ctx.reports, Arc::clone(&ctx.cancel))?;
    let mut scheduler = Scheduler {
        tasks: ctx.tasks,
        next: 0,
        palette_ready: !global,
    };
    let mut slots: Vec<Option<EncodedPage>> = vec![None; total];
    let mut finished = 0usize;

    let _ = ctx.events.send(EncodeEvent::Started);
    tracing::info!(frames = total, workers = size, global_palette = global, "encoding gif");
    scheduler.fill(&mut pool)?;

    while finished < total {
        let msg = ctx
            .messages
            .recv()
            .map_err(|_| ForteError::encode("dispatcher channel closed"))?;
        match msg {
            JobMessage::Abort => {
                pool.terminate();
                return Err(ForteError::Aborted);
            }
            JobMessage::Failed { index, error, .. } => {
                // terminate() raises the cancel flag itself
                let cancelled = ctx.cancel.load(Ordering::Relaxed);
                pool.terminate();
                if cancelled {
                    return Err(ForteError::Aborted);
                }
                tracing::debug!(frame = index, "worker failed");
                return Err(error);
            }
            JobMessage::Finished { worker, page } => {
                pool.release(worker);
                if ctx.cancel.load(Ordering::Relaxed) {
                    pool.terminate();
                    return Err(ForteError::Aborted);
                }
                let idx = page.index as usize;
                match slots.get(idx) {
                    Some(None) => {}
                    Some(Some(_)) => {
                        pool.terminate();
                        return Err(ForteError::encode(format!("frame {idx} finished twice")));
                    }
                    None => {
                        pool.terminate();
                        return Err(ForteError::encode(format!(
                            "frame {idx} is outside the job ({total} frames)"
                        )));
                    }
                }
                if !scheduler.palette_ready && idx == 0 {
                    let Some(palette) = page.global_palette.clone() else {
                        pool.terminate();
                        return Err(ForteError::encode("first frame returned no global palette"));
                    };
                    tracing::debug!(colors = palette.len() / 3, "global palette analyzed");
                    scheduler.broadcast_palette(&palette);
                }
                slots[idx] = Some(page);
                finished += 1;
                tracing::debug!(
                    frame = idx + 1,
                    active = pool.active_count(),
                    "frame {} finished",
                    idx + 1
                );
                let _ = ctx
                    .events
                    .send(EncodeEvent::Progress(finished as f64 / total as f64));
                scheduler.fill(&mut pool)?;
            }
        }
    }

    pool.terminate();
    assemble(&slots)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/dispatch.rs"]
mod tests;
