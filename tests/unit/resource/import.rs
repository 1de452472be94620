use super::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("forte_import_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(rgba));
    img.save(path).unwrap();
}

#[test]
fn natural_order_compares_digit_runs_by_value() {
    let mut names = vec!["Frame10.png", "frame2.png", "frame1.png", "frame01a.png"];
    names.sort_by(|a, b| natural_cmp(a, b));
    assert_eq!(
        names,
        vec!["frame1.png", "frame01a.png", "frame2.png", "Frame10.png"]
    );
}

#[test]
fn placement_accepts_crlf_and_trims() {
    assert_eq!(parse_placement("-12\r\n 34 \r\n"), Some((-12, 34)));
    assert_eq!(parse_placement("5\n6"), Some((5, 6)));
    assert_eq!(parse_placement("5"), None);
    assert_eq!(parse_placement("a\nb"), None);
}

#[test]
fn loads_all_images_without_placements() {
    let dir = scratch_dir("plain");
    write_png(&dir.join("10.png"), 2, 2, [255, 0, 0, 255]);
    write_png(&dir.join("2.png"), 3, 1, [0, 255, 0, 255]);
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let layer = load_layer_dir(&dir).unwrap();
    assert_eq!(layer.frames.len(), 2);
    assert_eq!((layer.frames[0].width, layer.frames[0].height), (3, 1));
    assert_eq!(layer.frames[0].pixel(0, 0), Some([0, 255, 0, 255]));
    assert_eq!(layer.size(), (3, 1));
    assert!(layer.visible);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn placements_keep_only_non_zero_offsets() {
    let dir = scratch_dir("placed");
    let placements = dir.join("Placements");
    std::fs::create_dir_all(&placements).unwrap();
    for i in 0..3 {
        write_png(&dir.join(format!("{i}.png")), 1, 1, [i as u8, 0, 0, 255]);
    }
    std::fs::write(placements.join("0.txt"), "4\r\n-2\r\n").unwrap();
    std::fs::write(placements.join("1.txt"), "0\r\n0\r\n").unwrap();

    let layer = load_layer_dir(&dir).unwrap();
    assert_eq!(layer.frames.len(), 1);
    assert_eq!((layer.frames[0].offset_x, layer.frames[0].offset_y), (4, -2));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_config_reports_missing_file() {
    let err = load_config("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, ForteError::Io { .. }));
}
