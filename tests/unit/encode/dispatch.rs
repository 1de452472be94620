use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use super::*;
use crate::encode::page::PagedWriter;
use crate::foundation::core::Canvas;

/// Records start/end of every task and writes the task index as its only byte.
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    palettes: Mutex<Vec<(u32, bool)>>,
    fail_at: Option<u32>,
    delay_ms: u64,
}

impl Recorder {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl FrameEncoder for Recorder {
    fn encode(&self, task: &EncodeTask, _cancel: &AtomicBool) -> ForteResult<EncodedPage> {
        self.log.lock().unwrap().push(format!("start {}", task.index));
        self.palettes
            .lock()
            .unwrap()
            .push((task.index, task.global_palette.is_some()));
        let delay = if task.index == 0 { self.delay_ms * 3 } else { self.delay_ms };
        std::thread::sleep(Duration::from_millis(delay));
        if self.fail_at == Some(task.index) {
            return Err(ForteError::encode(format!("frame {} exploded", task.index)));
        }
        let mut w = PagedWriter::new(task.page_size);
        w.write_all(&[task.index as u8]).unwrap();
        let palette = (task.use_global_palette && task.index == 0)
            .then(|| Bytes::from(vec![7u8; 256 * 3]));
        self.log.lock().unwrap().push(format!("end {}", task.index));
        Ok(w.finish(task.index, palette))
    }
}

fn opts(workers: usize, global: bool) -> EncodeOptions {
    let mut o = EncodeOptions::new(Canvas::new(2, 2).unwrap());
    o.workers = workers;
    o.global_palette = global;
    o
}

fn frames(n: usize) -> Vec<Bytes> {
    (0..n).map(|i| Bytes::from(vec![i as u8; 16])).collect()
}

fn run(recorder: Arc<Recorder>, o: EncodeOptions, n: usize) -> (Vec<EncodeEvent>, JobState) {
    let mut enc = GifEncoder::with_encoder(o, recorder);
    for f in frames(n) {
        enc.add_frame(f).unwrap();
    }
    let job = enc.render().unwrap();
    let events: Vec<EncodeEvent> = job.events().collect();
    (events, enc.state())
}

#[test]
fn output_is_in_task_order_regardless_of_completion() {
    let rec = Arc::new(Recorder {
        delay_ms: 5,
        ..Default::default()
    });
    let (events, state) = run(rec, opts(4, false), 7);
    assert_eq!(state, JobState::Completed);
    assert!(matches!(events.first(), Some(EncodeEvent::Started)));
    match events.last() {
        Some(EncodeEvent::Finished(bytes)) => assert_eq!(&bytes[..], &[0, 1, 2, 3, 4, 5, 6]),
        other => panic!("unexpected terminal event {other:?}"),
    }
}

#[test]
fn progress_is_monotonic_and_reaches_one() {
    let rec = Arc::new(Recorder::default());
    let (events, _) = run(rec, opts(3, false), 5);
    let progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            EncodeEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 5);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert!((progress[4] - 1.0).abs() < 1e-9);
}

#[test]
fn per_frame_mode_saturates_pool_immediately() {
    let rec = Arc::new(Recorder {
        delay_ms: 20,
        ..Default::default()
    });
    let _ = run(Arc::clone(&rec), opts(3, false), 6);
    let log = rec.log();
    let first_end = log.iter().position(|l| l.starts_with("end")).unwrap();
    let starts_before_end = log[..first_end]
        .iter()
        .filter(|l| l.starts_with("start"))
        .count();
    assert_eq!(starts_before_end, 3);
}

#[test]
fn global_palette_mode_dispatches_first_frame_alone() {
    let rec = Arc::new(Recorder {
        delay_ms: 5,
        ..Default::default()
    });
    let (events, state) = run(Arc::clone(&rec), opts(4, true), 6);
    assert_eq!(state, JobState::Completed);
    assert!(matches!(events.last(), Some(EncodeEvent::Finished(_))));

    let log = rec.log();
    assert_eq!(log[0], "start 0");
    assert_eq!(log[1], "end 0");
    for (index, had_palette) in rec.palettes.lock().unwrap().iter() {
        assert_eq!(*had_palette, *index > 0, "frame {index}");
    }
}

#[test]
fn pool_is_bounded_by_frame_count() {
    let rec = Arc::new(Recorder {
        delay_ms: 10,
        ..Default::default()
    });
    let (events, _) = run(Arc::clone(&rec), opts(16, false), 2);
    assert!(matches!(events.last(), Some(EncodeEvent::Finished(b)) if b.len() == 2));
}

#[test]
fn worker_failure_aborts_the_job_without_output() {
    let rec = Arc::new(Recorder {
        fail_at: Some(2),
        ..Default::default()
    });
    let (events, state) = run(rec, opts(2, false), 5);
    assert_eq!(state, JobState::Aborted);
    assert!(!events.iter().any(|e| matches!(e, EncodeEvent::Finished(_))));
    match events.last() {
        Some(EncodeEvent::Error(err)) => assert!(err.to_string().contains("frame 2 exploded")),
        other => panic!("unexpected terminal event {other:?}"),
    }
}

#[test]
fn worker_failure_is_reported_as_the_encode_error() {
    let rec = Arc::new(Recorder {
        fail_at: Some(1),
        ..Default::default()
    });
    let mut enc = GifEncoder::with_encoder(opts(2, false), rec);
    for f in frames(3) {
        enc.add_frame(f).unwrap();
    }
    match enc.render().unwrap().wait() {
        Err(ForteError::Encode(msg)) => assert!(msg.contains("frame 1 exploded")),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(enc.state(), JobState::Aborted);
}

struct Panicking;

impl FrameEncoder for Panicking {
    fn encode(&self, task: &EncodeTask, _cancel: &AtomicBool) -> ForteResult<EncodedPage> {
        if task.index == 1 {
            panic!("quantizer blew up");
        }
        let mut w = PagedWriter::new(task.page_size);
        w.write_all(&[task.index as u8]).unwrap();
        Ok(w.finish(task.index, None))
    }
}

#[test]
fn panicking_encoder_fails_the_job_instead_of_hanging() {
    let mut enc = GifEncoder::with_encoder(opts(2, false), Arc::new(Panicking));
    for f in frames(3) {
        enc.add_frame(f).unwrap();
    }
    match enc.render().unwrap().wait() {
        Err(ForteError::Encode(msg)) => assert!(msg.contains("quantizer blew up")),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(enc.state(), JobState::Aborted);
}

#[test]
fn render_while_running_is_rejected() {
    let rec = Arc::new(Recorder {
        delay_ms: 50,
        ..Default::default()
    });
    let mut enc = GifEncoder::with_encoder(opts(1, false), rec);
    for f in frames(3) {
        enc.add_frame(f).unwrap();
    }
    let job = enc.render().unwrap();
    assert!(matches!(enc.render(), Err(ForteError::AlreadyRunning)));
    assert!(enc.add_frame(Bytes::from(vec![0u8; 16])).is_err());
    job.wait().unwrap();
    assert_eq!(enc.state(), JobState::Completed);
    assert!(matches!(enc.render(), Err(ForteError::Validation(_))));
}

#[test]
fn abort_ends_with_aborted_event() {
    let rec = Arc::new(Recorder {
        delay_ms: 30,
        ..Default::default()
    });
    let mut enc = GifEncoder::with_encoder(opts(1, false), rec);
    for f in frames(20) {
        enc.add_frame(f).unwrap();
    }
    let job = enc.render().unwrap();
    job.abort_handle().abort();
    assert!(matches!(job.wait(), Err(ForteError::Aborted)));
    assert_eq!(enc.state(), JobState::Aborted);
}

#[test]
fn empty_and_misfit_frames_are_rejected() {
    let mut enc = GifEncoder::new(opts(2, false));
    assert!(matches!(enc.render(), Err(ForteError::Validation(_))));
    assert!(enc.add_frame(Bytes::from(vec![0u8; 3])).is_err());
    assert_eq!(enc.frame_count(), 0);
}

#[test]
fn gif_job_produces_a_complete_stream() {
    let o = opts(2, false);
    let job = encode(frames(3), o).unwrap();
    let bytes = job.wait().unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");
    let end = bytes.iter().rposition(|&b| b != 0).unwrap();
    assert_eq!(bytes[end], 0x3B);
}
