//! Concatenating encoded pages into the final stream.

use bytes::{Bytes, BytesMut};

use crate::encode::page::EncodedPage;
use crate::foundation::error::{ForteError, ForteResult};

/// Byte length of the assembled stream.
///
/// Every part contributes its meaningful bytes; the last part also contributes the unused rest of
/// its final page (`chunk_size - cursor` zero bytes).
pub fn assembled_len(parts: &[Option<EncodedPage>]) -> usize {
    let body: usize = parts.iter().flatten().map(EncodedPage::byte_len).sum();
    body + parts.last().and_then(Option::as_ref).map_or(0, tail_len)
}

fn tail_len(part: &EncodedPage) -> usize {
    if part.chunks.is_empty() {
        return 0;
    }
    part.chunk_size.saturating_sub(part.cursor)
}

/// Concatenate `parts` in slot order.
///
/// Every chunk contributes its full `chunk_size` except each part's last chunk, which contributes
/// `cursor` bytes. The stream ends with the whole last page of the last part, padding included.
/// Completion order plays no role: slots are index-aligned with tasks.
pub fn assemble(parts: &[Option<EncodedPage>]) -> ForteResult<Bytes> {
    let mut out = BytesMut::with_capacity(assembled_len(parts));
    for (slot, part) in parts.iter().enumerate() {
        let part = part
            .as_ref()
            .ok_or_else(|| ForteError::encode(format!("frame {slot} has no encoded page")))?;
        if part.index as usize != slot {
            return Err(ForteError::encode(format!(
                "slot {slot} holds the page of frame {}",
                part.index
            )));
        }
        let last = part.chunks.len().saturating_sub(1);
        let final_part = slot + 1 == parts.len();
        for (i, chunk) in part.chunks.iter().enumerate() {
            let take = if i == last && !final_part {
                part.cursor
            } else {
                part.chunk_size
            };
            let chunk = chunk.get(..take).ok_or_else(|| {
                ForteError::encode(format!("frame {slot} chunk {i} is shorter than {take} bytes"))
            })?;
            out.extend_from_slice(chunk);
        }
    }
    tracing::info!("assembled {:.2} KiB", out.len() as f64 / 1024.0);
    Ok(out.freeze())
}

#[cfg(test)]
#[path = "../../tests/unit/encode/assemble.rs"]
mod tests;
