//! Loading layers and act configurations from disk.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::foundation::error::{ForteError, ForteResult};
use crate::resource::model::{Configuration, Layer, RasterFrame};

const IMAGE_EXTENSIONS: &[&str] = &["png", "bmp", "jpg", "jpeg", "gif", "webp", "tga"];
const PLACEMENTS_DIR: &str = "Placements";

/// Load every image in `dir` as one layer.
///
/// Files are taken in natural name order. When a `Placements` sub-directory exists, each
/// `<stem>.txt` in it holds the frame offset (x and y on the first two lines); only images with a
/// non-zero placement are kept. Without it every image is kept at offset (0, 0).
#[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub fn load_layer_dir(dir: impl AsRef<Path>) -> ForteResult<Layer> {
    let dir = dir.as_ref();
    let placements_dir = dir.join(PLACEMENTS_DIR);
    let placements = if placements_dir.is_dir() {
        Some(read_placements(&placements_dir)?)
    } else {
        None
    };

    let mut frames = Vec::new();
    let mut dropped = 0usize;
    for path in sorted_entries(dir)? {
        if !path.is_file() || !is_image_path(&path) {
            continue;
        }
        let offset = match &placements {
            Some(map) => match map.get(&file_stem(&path)) {
                Some(&offset) => offset,
                None => {
                    dropped += 1;
                    continue;
                }
            },
            None => (0, 0),
        };
        let (width, height, pixels) = decode_rgba8(&path)?;
        frames.push(RasterFrame::new(width, height, offset.0, offset.1, pixels)?);
    }

    let name = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());
    tracing::debug!(frames = frames.len(), dropped, "loaded layer directory");
    Ok(Layer::new(name, frames))
}

/// Parse an act configuration JSON file.
pub fn load_config(path: impl AsRef<Path>) -> ForteResult<Configuration> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ForteError::io(path, e))?;
    Configuration::from_json_str(&text)
}

/// Compare file names the way a file browser does: case-insensitive, digit runs by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let xs = take_digits(&mut ai);
                let ys = take_digits(&mut bi);
                let xt = xs.trim_start_matches('0');
                let yt = ys.trim_start_matches('0');
                let ord = xt.len().cmp(&yt.len()).then_with(|| xt.cmp(yt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        s.push(c);
        it.next();
    }
    s
}

fn sorted_entries(dir: &Path) -> ForteResult<Vec<PathBuf>> {
    let rd = std::fs::read_dir(dir).map_err(|e| ForteError::io(dir, e))?;
    let mut out = Vec::new();
    for entry in rd {
        let entry = entry.map_err(|e| ForteError::io(dir, e))?;
        out.push(entry.path());
    }
    out.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(out)
}

fn read_placements(dir: &Path) -> ForteResult<HashMap<String, (i32, i32)>> {
    let mut out = HashMap::new();
    for path in sorted_entries(dir)? {
        if !path.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ForteError::io(&path, e))?;
        let offset = parse_placement(&text).ok_or_else(|| {
            ForteError::validation(format!(
                "placement file '{}' must start with two integer lines",
                path.display()
            ))
        })?;
        if offset != (0, 0) {
            out.insert(file_stem(&path), offset);
        }
    }
    Ok(out)
}

/// Offset from a placement file: x and y on the first two lines.
pub fn parse_placement(text: &str) -> Option<(i32, i32)> {
    let mut lines = text.lines().map(str::trim);
    let x = lines.next()?.parse().ok()?;
    let y = lines.next()?.parse().ok()?;
    Some((x, y))
}

fn decode_rgba8(path: &Path) -> ForteResult<(u32, u32, Vec<u8>)> {
    let bytes = std::fs::read(path).map_err(|e| ForteError::io(path, e))?;
    let img = image::load_from_memory(&bytes)
        .with_context(|| format!("decode image '{}'", path.display()))?;
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    Ok((w, h, rgba.into_raw()))
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "../../tests/unit/resource/import.rs"]
mod tests;
