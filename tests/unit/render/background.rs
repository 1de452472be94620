use super::*;

fn plain() -> BaseStyle {
    BaseStyle {
        background_opacity: 1.0,
        show_grid: false,
        show_glow: false,
    }
}

#[test]
fn none_background_is_opaque_black() {
    let canvas = Canvas::new(4, 4).unwrap();
    let f = paint_base(canvas, &Background::None, plain());
    assert!(f.data.chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
}

#[test]
fn solid_background_respects_opacity() {
    let canvas = Canvas::new(2, 2).unwrap();
    let style = BaseStyle {
        background_opacity: 0.5,
        ..plain()
    };
    let f = paint_base(canvas, &Background::Solid(Color::white()), style);
    assert_eq!(f.pixel(0, 0), Some([128, 128, 128, 255]));
}

#[test]
fn gradient_runs_from_top_left_to_bottom_right() {
    let canvas = Canvas::new(16, 16).unwrap();
    let bg = Background::Gradient {
        from: Color::rgba(1.0, 0.0, 0.0, 1.0),
        to: Color::rgba(0.0, 0.0, 1.0, 1.0),
    };
    let f = paint_base(canvas, &bg, plain());
    let tl = f.pixel(0, 0).unwrap();
    let br = f.pixel(15, 15).unwrap();
    assert!(tl[0] > 230 && tl[2] < 25);
    assert!(br[2] > 230 && br[0] < 25);
}

#[test]
fn presets_parse_by_name() {
    for p in BackgroundPreset::ALL {
        assert_eq!(BackgroundPreset::from_name(p.name()).unwrap(), p);
        let json = serde_json::to_value(p).unwrap();
        assert_eq!(json, serde_json::Value::String(p.name().to_owned()));
    }
    assert!(matches!(
        BackgroundPreset::from_name("sunset"),
        Err(ForteError::Validation(_))
    ));
}

#[test]
fn spec_deserializes_all_forms() {
    let s: BackgroundSpec = serde_json::from_str(r#""none""#).unwrap();
    assert_eq!(s, BackgroundSpec::None);
    let s: BackgroundSpec = serde_json::from_str(r#"{"preset": "no-comment"}"#).unwrap();
    assert_eq!(s, BackgroundSpec::Preset(BackgroundPreset::NoComment));
    let s: BackgroundSpec = serde_json::from_str(r##"{"solid": "#102030"}"##).unwrap();
    assert_eq!(s, BackgroundSpec::Solid(Color::rgba8(0x10, 0x20, 0x30, 1.0)));
    assert!(serde_json::from_str::<BackgroundSpec>(r#"{"preset": "sunset"}"#).is_err());
}

#[test]
fn grid_lines_fall_on_twenty_pixel_pitch() {
    let canvas = Canvas::new(41, 41).unwrap();
    let style = BaseStyle {
        show_grid: true,
        ..plain()
    };
    let f = paint_base(canvas, &Background::Solid(Color::white()), style);
    let on_line = f.pixel(20, 7).unwrap();
    let off_line = f.pixel(7, 7).unwrap();
    assert_eq!(off_line, [255, 255, 255, 255]);
    assert!(on_line[0] < 255);
    assert_eq!(f.pixel(40, 40), f.pixel(20, 20));
}

#[test]
fn glow_is_centered_and_bounded() {
    assert_eq!(glow_radius(1000, 800), 300.0);
    assert_eq!(glow_radius(100, 60), 30.0);

    let canvas = Canvas::new(60, 60).unwrap();
    let style = BaseStyle {
        show_glow: true,
        ..plain()
    };
    let f = paint_base(canvas, &Background::None, style);
    let center = f.pixel(30, 30).unwrap();
    assert!(center[2] > 0);
    assert_eq!(f.pixel(0, 0), Some([0, 0, 0, 255]));
}

#[test]
fn image_background_is_stretched() {
    let canvas = Canvas::new(8, 8).unwrap();
    let img = RasterFrame::solid(2, 2, [0, 255, 0, 255]);
    let f = paint_base(canvas, &Background::Image(img), plain());
    assert_eq!(f.pixel(7, 7), Some([0, 255, 0, 255]));
}
