use super::*;

#[test]
fn dither_modes_parse_and_print() {
    for s in [
        "none",
        "floyd-steinberg",
        "false-floyd-steinberg-serpentine",
        "stucki",
        "atkinson-serpentine",
    ] {
        let d: DitherMode = s.parse().unwrap();
        assert_eq!(d.to_string(), s);
    }
    assert_eq!(
        "Stucki-Serpentine".parse::<DitherMode>().unwrap(),
        DitherMode::new(DitherKernel::Stucki).serpentine()
    );
    assert_eq!("false".parse::<DitherMode>().unwrap(), DitherMode::none());
    assert!("bayer".parse::<DitherMode>().is_err());
}

#[test]
fn dither_kernels_distribute_all_error() {
    for k in [
        DitherKernel::FloydSteinberg,
        DitherKernel::FalseFloydSteinberg,
        DitherKernel::Stucki,
    ] {
        let sum: f32 = k.taps().iter().map(|t| t.0).sum();
        assert!((sum - 1.0).abs() < 1e-6, "{k:?}");
    }
    // Atkinson propagates only 6/8 of the error.
    let sum: f32 = DitherKernel::Atkinson.taps().iter().map(|t| t.0).sum();
    assert!((sum - 0.75).abs() < 1e-6);
}

#[test]
fn repeat_maps_to_netscape_loops() {
    assert_eq!(RepeatCount::Forever.netscape_loops(), Some(0));
    assert_eq!(RepeatCount::Once.netscape_loops(), None);
    assert_eq!(RepeatCount::Times(3).netscape_loops(), Some(3));
    let r: RepeatCount = serde_json::from_str(r#"{"times": 2}"#).unwrap();
    assert_eq!(r, RepeatCount::Times(2));
}

#[test]
fn options_validate_ranges() {
    let canvas = Canvas::new(2, 2).unwrap();
    let mut o = EncodeOptions::new(canvas);
    assert!(o.validate().is_ok());
    o.quality = 0;
    assert!(o.validate().is_err());
    o.quality = 31;
    assert!(o.validate().is_err());
    o.quality = 10;
    o.workers = 0;
    assert!(o.validate().is_err());
}

#[test]
fn delay_rounds_to_centiseconds() {
    let mut o = EncodeOptions::new(Canvas::new(1, 1).unwrap());
    o.frame_delay_ms = 100;
    assert_eq!(o.delay_centis(), 10);
    o.frame_delay_ms = 34;
    assert_eq!(o.delay_centis(), 3);
    o.frame_delay_ms = 35;
    assert_eq!(o.delay_centis(), 4);
}

#[test]
fn plan_marks_last_and_checks_sizes() {
    let opts = EncodeOptions::new(Canvas::new(1, 1).unwrap());
    let px = Bytes::from_static(&[1, 2, 3, 255]);
    let tasks = EncodeTask::plan(vec![px.clone(), px.clone(), px], &opts).unwrap();
    assert_eq!(tasks.len(), 3);
    assert_eq!(tasks.iter().map(|t| t.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(
        tasks.iter().map(|t| t.is_last).collect::<Vec<_>>(),
        vec![false, false, true]
    );

    let bad = EncodeTask::plan(vec![Bytes::from_static(&[0, 0])], &opts);
    assert!(matches!(bad, Err(ForteError::Validation(_))));
}
