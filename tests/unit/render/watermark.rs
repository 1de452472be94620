use super::*;

fn canvas() -> Canvas {
    Canvas::new(200, 100).unwrap()
}

fn near(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
}

#[test]
fn anchors_follow_padding_and_alignment() {
    let c = canvas();
    assert_eq!(
        single_anchor(c, 16.0, WatermarkPosition::TopLeft),
        (Point::new(20.0, 28.0), HAlign::Left)
    );
    assert_eq!(
        single_anchor(c, 16.0, WatermarkPosition::BottomRight),
        (Point::new(180.0, 72.0), HAlign::Right)
    );
    assert_eq!(
        single_anchor(c, 16.0, WatermarkPosition::Center),
        (Point::new(100.0, 50.0), HAlign::Center)
    );
}

#[test]
fn right_aligned_text_ends_at_anchor() {
    let spec = WatermarkSpec {
        rotation_deg: 0.0,
        layout: WatermarkLayout::Single(WatermarkPosition::TopRight),
        ..WatermarkSpec::default()
    };
    let t = stamp_transforms(canvas(), &spec, 50.0, 10.0).unwrap();
    assert_eq!(t.len(), 1);
    // right edge of the text box, vertical middle
    assert!(near(t[0] * Point::new(50.0, 5.0), Point::new(180.0, 28.0)));
}

#[test]
fn rotation_pivots_on_anchor() {
    let spec = WatermarkSpec {
        rotation_deg: 90.0,
        layout: WatermarkLayout::Single(WatermarkPosition::Center),
        ..WatermarkSpec::default()
    };
    let t = stamp_transforms(canvas(), &spec, 40.0, 10.0).unwrap();
    // text center maps onto the anchor regardless of rotation
    assert!(near(t[0] * Point::new(20.0, 5.0), Point::new(100.0, 50.0)));
}

#[test]
fn tiled_grid_spans_twice_the_canvas() {
    let spec = WatermarkSpec {
        rotation_deg: 0.0,
        layout: WatermarkLayout::Tiled { gap: 50.0 },
        ..WatermarkSpec::default()
    };
    let t = stamp_transforms(canvas(), &spec, 10.0, 0.0).unwrap();
    // cols: -4..=4, rows: -2..=2
    assert_eq!(t.len(), 9 * 5);
    let origins: Vec<Point> = t.iter().map(|a| *a * Point::ORIGIN).collect();
    assert!(origins.iter().any(|p| near(*p, Point::new(100.0, 50.0))));
    assert!(origins.iter().any(|p| near(*p, Point::new(-100.0, -50.0))));
    assert!(origins.iter().any(|p| near(*p, Point::new(300.0, 150.0))));
}

#[test]
fn tiny_gap_is_rejected() {
    let spec = WatermarkSpec {
        layout: WatermarkLayout::Tiled { gap: 0.5 },
        ..WatermarkSpec::default()
    };
    assert!(spec.validate().is_err());

    let spec = WatermarkSpec {
        layout: WatermarkLayout::Tiled { gap: 1.0 },
        ..WatermarkSpec::default()
    };
    assert!(stamp_transforms(Canvas::new(1000, 1000).unwrap(), &spec, 1.0, 1.0).is_err());
}

#[test]
fn validate_rejects_empty_text_and_bad_size() {
    let mut spec = WatermarkSpec::default();
    assert!(spec.validate().is_ok());
    spec.text = "  ".to_owned();
    assert!(spec.validate().is_err());
    spec.text = "x".to_owned();
    spec.font_size = 0.0;
    assert!(spec.validate().is_err());
}

#[test]
fn spec_json_uses_editor_position_names() {
    let spec: WatermarkSpec = serde_json::from_str(
        r##"{ "text": "hi", "layout": { "single": "topLeft" }, "color": "#ff0000" }"##,
    )
    .unwrap();
    assert_eq!(spec.layout, WatermarkLayout::Single(WatermarkPosition::TopLeft));
    assert_eq!(spec.font_size, 16.0);
    assert_eq!(spec.opacity, 0.35);
}

#[test]
fn rasterized_overlay_draws_text_if_font_present() {
    let Some(font) = crate::render::text::find_system_font() else {
        return;
    };
    let spec = WatermarkSpec {
        text: "FORTE".to_owned(),
        layout: WatermarkLayout::Single(WatermarkPosition::Center),
        font_size: 24.0,
        opacity: 1.0,
        rotation_deg: 0.0,
        ..WatermarkSpec::default()
    };
    let c = canvas();
    let wm = PreparedWatermark::rasterize(c, &spec, &font).unwrap();
    assert!(wm.overlay().data.chunks_exact(4).any(|p| p[3] > 0));
    // corners stay untouched
    assert_eq!(wm.overlay().pixel(0, 0), Some([0, 0, 0, 0]));

    let mut frame = FrameRGBA::filled(c, Color::rgba(0.0, 0.0, 0.0, 1.0).to_rgba8_premul());
    wm.apply(&mut frame).unwrap();
    assert!(frame.data.chunks_exact(4).any(|p| p[0] > 0));
}
