use super::*;
use crate::foundation::core::Canvas;
use crate::frames::filter::FilterPredicate;
use crate::resource::model::{ActionRun, Configuration, RasterFrame};

fn idle_layer(name: &str) -> Layer {
    let frames: Vec<RasterFrame> = (0..4)
        .map(|i| RasterFrame::solid(2, 2, [i as u8 * 60, 0, 0, 255]))
        .collect();
    let config = Configuration::new(vec![ActionRun::new(0, 2, 1, "idle", 2)]);
    Layer::new(name, frames).with_config(config)
}

fn settings() -> ExportSettings {
    ExportSettings {
        canvas: Canvas::new(4, 4).unwrap(),
        workers: 2,
        show_grid: false,
        show_glow: false,
        ..Default::default()
    }
}

#[test]
fn plan_selects_matching_frames_per_layer() {
    let layers = vec![idle_layer("a")];
    let plan = plan_export(&layers, &FilterPredicate::new(["idle"], [])).unwrap();
    assert_eq!(plan.frame_count, 4);
    assert_eq!(plan.layers[0].valid, vec![0, 1, 2, 3]);

    let plan = plan_export(&layers, &FilterPredicate::new(["idle"], [1])).unwrap();
    assert_eq!(plan.layers[0].valid, vec![2, 3]);
}

#[test]
fn unmatched_predicate_is_an_empty_selection() {
    let layers = vec![idle_layer("a")];
    let err = plan_export(&layers, &FilterPredicate::new(["walk"], [])).unwrap_err();
    match err {
        ForteError::EmptySelection { predicate } => assert!(predicate.contains("walk")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn hidden_and_empty_layers_are_skipped() {
    let mut hidden = idle_layer("hidden");
    hidden.visible = false;
    let empty = Layer::new("empty", Vec::new());
    assert!(matches!(
        plan_export(&[hidden.clone(), empty], &FilterPredicate::all()),
        Err(ForteError::EmptySelection { .. })
    ));

    let plan = plan_export(&[hidden, idle_layer("shown")], &FilterPredicate::all()).unwrap();
    assert_eq!(plan.layers.len(), 1);
    assert_eq!(plan.layers[0].layer, 1);
}

#[test]
fn shorter_selections_wrap_around() {
    let plan = ExportPlan {
        layers: vec![
            LayerSelection {
                layer: 0,
                valid: vec![1, 3, 5],
            },
            LayerSelection {
                layer: 1,
                valid: vec![7],
            },
        ],
        frame_count: 3,
    };
    let frame2: Vec<(usize, usize)> = plan.sources(2).collect();
    assert_eq!(frame2, vec![(0, 5), (1, 7)]);
    let frame4: Vec<(usize, usize)> = plan.sources(4).collect();
    assert_eq!(frame4, vec![(0, 3), (1, 7)]);
}

#[test]
fn render_frame_draws_selected_frame() {
    let layers = vec![idle_layer("a")];
    let exporter = Exporter::new(ExportSettings {
        background_opacity: 0.0,
        ..settings()
    });
    let frame = exporter
        .render_frame(&layers, &FilterPredicate::new(["idle"], [1]), 1)
        .unwrap();
    assert_eq!(frame.pixel(0, 0), Some([180, 0, 0, 255]));
    assert_eq!(frame.pixel(3, 3), Some([0, 0, 0, 255]));
    assert!(
        exporter
            .render_frame(&layers, &FilterPredicate::all(), 9)
            .is_err()
    );
}

#[test]
fn export_reports_phases_in_order() {
    let layers = vec![idle_layer("a")];
    let job = Exporter::new(settings())
        .start(layers, FilterPredicate::all())
        .unwrap();
    let events: Vec<ExportEvent> = job.events().collect();

    assert!(matches!(events.first(), Some(ExportEvent::Preparing(p)) if *p == 0.0));
    let first_encoding = events
        .iter()
        .position(|e| matches!(e, ExportEvent::Encoding(_)))
        .unwrap();
    let last_rendering = events
        .iter()
        .rposition(|e| matches!(e, ExportEvent::Rendering(_)))
        .unwrap();
    assert!(last_rendering < first_encoding);
    assert!(matches!(events[last_rendering], ExportEvent::Rendering(p) if (p - 1.0).abs() < 1e-9));

    match events.last() {
        Some(ExportEvent::Completed(bytes)) => {
            assert_eq!(&bytes[..6], b"GIF89a");
            let end = bytes.iter().rposition(|&b| b != 0).unwrap();
            assert_eq!(bytes[end], 0x3B);
        }
        other => panic!("unexpected terminal event {other:?}"),
    }
}

#[test]
fn export_batches_rendering_progress() {
    let frames: Vec<RasterFrame> = (0..12)
        .map(|i| RasterFrame::solid(1, 1, [i as u8 * 20, 0, 0, 255]))
        .collect();
    let job = Exporter::new(settings())
        .with_render_threads(Some(2))
        .start(vec![Layer::new("long", frames)], FilterPredicate::all())
        .unwrap();
    let rendering: Vec<f64> = job
        .events()
        .filter_map(|e| match e {
            ExportEvent::Rendering(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(rendering.len(), 3);
    assert!((rendering[0] - 5.0 / 12.0).abs() < 1e-9);
    assert!((rendering[2] - 1.0).abs() < 1e-9);
}

#[test]
fn empty_selection_ends_export_with_error() {
    let job = Exporter::new(settings())
        .start(vec![idle_layer("a")], FilterPredicate::new(["walk"], []))
        .unwrap();
    let events: Vec<ExportEvent> = job.events().collect();
    assert!(!events.iter().any(|e| matches!(e, ExportEvent::Completed(_))));
    assert!(matches!(
        events.last(),
        Some(ExportEvent::Error(err)) if matches!(**err, ForteError::EmptySelection { .. })
    ));
}

#[test]
fn invalid_settings_fail_before_starting() {
    let exporter = Exporter::new(ExportSettings {
        workers: 0,
        ..settings()
    });
    assert!(matches!(
        exporter.start(vec![idle_layer("a")], FilterPredicate::all()),
        Err(ForteError::Validation(_))
    ));
}

#[test]
fn abort_before_encoding_yields_aborted() {
    let frames: Vec<RasterFrame> = (0..200)
        .map(|i| RasterFrame::solid(4, 4, [i as u8, 0, 0, 255]))
        .collect();
    let job = Exporter::new(ExportSettings {
        canvas: Canvas::new(96, 96).unwrap(),
        ..settings()
    })
    .start(vec![Layer::new("many", frames)], FilterPredicate::all())
    .unwrap();
    job.abort();
    assert!(matches!(job.wait(), Err(ForteError::Aborted)));
}
