use bytes::Bytes;

use super::*;
use crate::encode::task::{EncodeOptions, RepeatCount};
use crate::foundation::core::Canvas;

fn tasks(n: usize, global: bool, repeat: RepeatCount) -> Vec<EncodeTask> {
    let mut opts = EncodeOptions::new(Canvas::new(4, 2).unwrap());
    opts.global_palette = global;
    opts.repeat = repeat;
    opts.frame_delay_ms = 120;
    let frames = (0..n)
        .map(|i| Bytes::from([i as u8 * 50, 10, 200, 255].repeat(8)))
        .collect();
    EncodeTask::plan(frames, &opts).unwrap()
}

fn bytes_of(page: &EncodedPage) -> Vec<u8> {
    let mut out = Vec::new();
    let last = page.chunks.len() - 1;
    for (i, c) in page.chunks.iter().enumerate() {
        let take = if i == last { page.cursor } else { page.chunk_size };
        out.extend_from_slice(&c[..take]);
    }
    out
}

#[test]
fn first_frame_writes_header_screen_and_loop() {
    let cancel = AtomicBool::new(false);
    let t = tasks(2, false, RepeatCount::Forever);
    let b = bytes_of(&encode_frame(&t[0], &cancel).unwrap());

    assert_eq!(&b[..6], b"GIF89a");
    assert_eq!(&b[6..10], &[4, 0, 2, 0]);
    assert_eq!(b[10], 0xF7);
    let ext = 13 + 256 * 3;
    assert_eq!(&b[ext..ext + 3], &[0x21, 0xFF, 11]);
    assert_eq!(&b[ext + 3..ext + 14], b"NETSCAPE2.0");
    assert_eq!(&b[ext + 14..ext + 19], &[3, 1, 0, 0, 0]);
    // graphic control with 12cs delay
    assert_eq!(&b[ext + 19..ext + 27], &[0x21, 0xF9, 4, 0, 12, 0, 0, 0]);
    // not last: no trailer
    assert_ne!(*b.last().unwrap(), 0x3B);
}

#[test]
fn play_once_omits_loop_extension() {
    let cancel = AtomicBool::new(false);
    let t = tasks(1, false, RepeatCount::Once);
    let b = bytes_of(&encode_frame(&t[0], &cancel).unwrap());
    let after_table = 13 + 256 * 3;
    assert_eq!(&b[after_table..after_table + 2], &[0x21, 0xF9]);
    assert_eq!(*b.last().unwrap(), 0x3B);
}

#[test]
fn later_frames_carry_local_tables_unless_shared() {
    let cancel = AtomicBool::new(false);

    let per_frame = tasks(2, false, RepeatCount::Forever);
    let b = bytes_of(&encode_frame(&per_frame[1], &cancel).unwrap());
    assert_eq!(&b[..3], &[0x21, 0xF9, 4]);
    assert_eq!(b[8], 0x2C);
    assert_eq!(b[17], 0x87);
    assert_eq!(*b.last().unwrap(), 0x3B);

    let mut shared = tasks(2, true, RepeatCount::Forever);
    let first = encode_frame(&shared[0], &cancel).unwrap();
    let palette = first.global_palette.clone().unwrap();
    assert_eq!(palette.len(), 256 * 3);

    shared[1].global_palette = Some(palette);
    let page = encode_frame(&shared[1], &cancel).unwrap();
    assert!(page.global_palette.is_none());
    let b = bytes_of(&page);
    assert_eq!(b[17], 0x00);
    // image data follows the descriptor directly
    assert_eq!(b[18], 8);
}

#[test]
fn shared_mode_needs_the_palette_first() {
    let cancel = AtomicBool::new(false);
    let t = tasks(2, true, RepeatCount::Forever);
    assert!(matches!(
        encode_frame(&t[1], &cancel),
        Err(ForteError::Encode(_))
    ));
}

#[test]
fn cancelled_flag_aborts_before_work() {
    let cancel = AtomicBool::new(true);
    let t = tasks(1, false, RepeatCount::Forever);
    assert!(matches!(
        encode_frame(&t[0], &cancel),
        Err(ForteError::Aborted)
    ));
}

#[test]
fn single_frame_stream_decodes() {
    use image::AnimationDecoder;

    let cancel = AtomicBool::new(false);
    let t = tasks(1, false, RepeatCount::Forever);
    let b = bytes_of(&encode_frame(&t[0], &cancel).unwrap());

    let decoder = image::codecs::gif::GifDecoder::new(std::io::Cursor::new(b)).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 1);
    let px = frames[0].buffer().get_pixel(3, 1).0;
    assert_eq!(px, [0, 10, 200, 255]);
}
