//! GIF89a block writer: one task in, one page of stream bytes out.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::encode::page::{EncodedPage, PagedWriter};
use crate::encode::pool::FrameEncoder;
use crate::encode::quant::{ColorMapper, map_indices, opaque_rgba};
use crate::encode::task::EncodeTask;
use crate::foundation::error::{ForteError, ForteResult};

const HEADER: &[u8; 6] = b"GIF89a";
const EXTENSION_INTRODUCER: u8 = 0x21;
const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
const APPLICATION_LABEL: u8 = 0xFF;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
/// Color table size field for 256 entries (2^(7+1)).
const TABLE_SIZE_BITS: u8 = 7;
const LZW_MIN_CODE_SIZE: u8 = 8;
const MAX_SUB_BLOCK: usize = 255;

/// Encodes tasks with NeuQuant palettes and LZW-compressed image data.
#[derive(Clone, Copy, Debug, Default)]
pub struct GifFrameEncoder;

impl FrameEncoder for GifFrameEncoder {
    fn encode(&self, task: &EncodeTask, cancel: &AtomicBool) -> ForteResult<EncodedPage> {
        encode_frame(task, cancel)
    }
}

fn check_cancel(cancel: &AtomicBool) -> ForteResult<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(ForteError::Aborted);
    }
    Ok(())
}

fn io_err(e: std::io::Error) -> ForteError {
    ForteError::encode(e.to_string())
}

/// Encode one frame of the stream.
///
/// Frame 0 writes the header, the screen descriptor with its palette as the global table, and
/// the loop extension. Later frames carry a local table unless frames share one palette.
pub fn encode_frame(task: &EncodeTask, cancel: &AtomicBool) -> ForteResult<EncodedPage> {
    check_cancel(cancel)?;
    let width = u16::try_from(task.width)
        .map_err(|_| ForteError::validation("gif width must fit in 16 bits"))?;
    let height = u16::try_from(task.height)
        .map_err(|_| ForteError::validation("gif height must fit in 16 bits"))?;

    let pixels = opaque_rgba(&task.pixels);
    let (mut mapper, shared_out) = match (&task.global_palette, task.use_global_palette) {
        (Some(palette), true) => (ColorMapper::fixed(palette)?, None),
        (None, true) if task.index > 0 => {
            return Err(ForteError::encode(format!(
                "frame {} needs the shared palette before encoding",
                task.index
            )));
        }
        (_, shared) => {
            let m = ColorMapper::for_frame(&pixels, task.quality);
            let out = shared.then(|| m.palette_bytes());
            (m, out)
        }
    };
    let palette = mapper.palette_bytes();
    check_cancel(cancel)?;

    let indices = map_indices(&pixels, task.width, task.height, &mut mapper, task.dither);
    check_cancel(cancel)?;

    let lzw = weezl::encode::Encoder::new(weezl::BitOrder::Lsb, LZW_MIN_CODE_SIZE)
        .encode(&indices)
        .map_err(|e| ForteError::encode(format!("lzw: {e}")))?;
    check_cancel(cancel)?;

    let mut w = PagedWriter::new(task.page_size);
    let first = task.index == 0;
    if first {
        write_header(&mut w, width, height, &palette).map_err(io_err)?;
        if let Some(loops) = task.repeat.netscape_loops() {
            write_netscape_ext(&mut w, loops).map_err(io_err)?;
        }
    }
    write_graphic_control(&mut w, task.delay_centis).map_err(io_err)?;
    let local_table = !first && !task.use_global_palette;
    write_image_descriptor(&mut w, width, height, local_table).map_err(io_err)?;
    if local_table {
        w.write_all(&palette).map_err(io_err)?;
    }
    write_image_data(&mut w, &lzw).map_err(io_err)?;
    if task.is_last {
        w.write_u8(TRAILER).map_err(io_err)?;
    }

    tracing::trace!(frame = task.index, bytes = w.len(), "encoded frame");
    Ok(w.finish(task.index, shared_out))
}

fn write_header(w: &mut PagedWriter, width: u16, height: u16, palette: &[u8]) -> std::io::Result<()> {
    w.write_all(HEADER)?;
    w.write_u16::<LittleEndian>(width)?;
    w.write_u16::<LittleEndian>(height)?;
    // global table present, 8-bit color resolution, unsorted, 256 entries
    w.write_u8(0x80 | 0x70 | TABLE_SIZE_BITS)?;
    w.write_u8(0)?;
    w.write_u8(0)?;
    w.write_all(palette)
}

fn write_netscape_ext(w: &mut PagedWriter, loops: u16) -> std::io::Result<()> {
    w.write_u8(EXTENSION_INTRODUCER)?;
    w.write_u8(APPLICATION_LABEL)?;
    w.write_u8(11)?;
    w.write_all(b"NETSCAPE2.0")?;
    w.write_u8(3)?;
    w.write_u8(1)?;
    w.write_u16::<LittleEndian>(loops)?;
    w.write_u8(0)
}

fn write_graphic_control(w: &mut PagedWriter, delay_centis: u16) -> std::io::Result<()> {
    w.write_u8(EXTENSION_INTRODUCER)?;
    w.write_u8(GRAPHIC_CONTROL_LABEL)?;
    w.write_u8(4)?;
    // no disposal, no user input, no transparency
    w.write_u8(0)?;
    w.write_u16::<LittleEndian>(delay_centis)?;
    w.write_u8(0)?;
    w.write_u8(0)
}

fn write_image_descriptor(
    w: &mut PagedWriter,
    width: u16,
    height: u16,
    local_table: bool,
) -> std::io::Result<()> {
    w.write_u8(IMAGE_SEPARATOR)?;
    w.write_u16::<LittleEndian>(0)?;
    w.write_u16::<LittleEndian>(0)?;
    w.write_u16::<LittleEndian>(width)?;
    w.write_u16::<LittleEndian>(height)?;
    if local_table {
        w.write_u8(0x80 | TABLE_SIZE_BITS)
    } else {
        w.write_u8(0)
    }
}

fn write_image_data(w: &mut PagedWriter, lzw: &[u8]) -> std::io::Result<()> {
    w.write_u8(LZW_MIN_CODE_SIZE)?;
    for block in lzw.chunks(MAX_SUB_BLOCK) {
        w.write_u8(block.len() as u8)?;
        w.write_all(block)?;
    }
    w.write_u8(0)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
