use std::io::Write;
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::encode::page::PagedWriter;

struct Echo;

impl FrameEncoder for Echo {
    fn encode(&self, task: &EncodeTask, _cancel: &AtomicBool) -> ForteResult<EncodedPage> {
        if task.index == 99 {
            return Err(ForteError::encode("boom"));
        }
        if task.index == 98 {
            panic!("palette table overrun");
        }
        let mut w = PagedWriter::new(task.page_size);
        w.write_all(&[task.index as u8]).unwrap();
        Ok(w.finish(task.index, None))
    }
}

fn task(index: u32) -> EncodeTask {
    EncodeTask {
        index,
        is_last: false,
        width: 1,
        height: 1,
        quality: 10,
        dither: crate::encode::task::DitherMode::none(),
        use_global_palette: false,
        global_palette: None,
        repeat: crate::encode::task::RepeatCount::Forever,
        delay_centis: 50,
        page_size: 8,
        pixels: Bytes::from_static(&[0, 0, 0, 255]),
    }
}

fn pool(size: usize) -> (WorkerPool, mpsc::Receiver<JobMessage>) {
    let (tx, rx) = mpsc::channel();
    let p = WorkerPool::spawn(size, Arc::new(Echo), tx, Arc::new(AtomicBool::new(false))).unwrap();
    (p, rx)
}

#[test]
fn acquire_moves_workers_between_disjoint_sets() {
    let (mut p, _rx) = pool(2);
    assert_eq!((p.free_count(), p.active_count()), (2, 0));

    let a = p.acquire().unwrap();
    let b = p.acquire().unwrap();
    assert_ne!(a.id(), b.id());
    assert!(p.acquire().is_none());
    assert_eq!((p.free_count(), p.active_count()), (0, 2));

    p.release(a.id());
    p.release(a.id());
    assert_eq!((p.free_count(), p.active_count()), (1, 1));
    assert_eq!(p.size(), 2);
}

#[test]
fn submitted_task_reports_its_page() {
    let (mut p, rx) = pool(1);
    let h = p.acquire().unwrap();
    let id = h.id();
    p.submit(h, task(3)).unwrap();

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        JobMessage::Finished { worker, page } => {
            assert_eq!(worker, id);
            assert_eq!(page.index, 3);
            assert_eq!(page.byte_len(), 1);
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn encoder_failure_is_reported_with_task_index() {
    let (mut p, rx) = pool(1);
    let h = p.acquire().unwrap();
    p.submit(h, task(99)).unwrap();

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        JobMessage::Failed { index, error, .. } => {
            assert_eq!(index, 99);
            assert!(matches!(error, ForteError::Encode(_)));
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn encoder_panic_is_reported_and_worker_keeps_serving() {
    let (mut p, rx) = pool(1);
    let h = p.acquire().unwrap();
    let id = h.id();
    p.submit(h, task(98)).unwrap();

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        JobMessage::Failed { worker, index, error } => {
            assert_eq!((worker, index), (id, 98));
            assert!(matches!(error, ForteError::Encode(_)));
            assert!(error.to_string().contains("palette table overrun"));
        }
        other => panic!("unexpected message {other:?}"),
    }

    p.release(id);
    let h = p.acquire().unwrap();
    p.submit(h, task(4)).unwrap();
    assert!(matches!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        JobMessage::Finished { .. }
    ));
}

#[test]
fn terminate_stops_accepting_work() {
    let (mut p, _rx) = pool(2);
    let h = p.acquire().unwrap();
    p.terminate();
    assert!(p.submit(h, task(0)).is_err());
    assert_eq!(p.free_count(), 0);
}
