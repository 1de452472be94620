//! Fixed-size output pages written by one worker.

use std::io;

use bytes::{Bytes, BytesMut};

/// One worker's complete output for one frame.
///
/// Every chunk but the last is full; the last holds `cursor` meaningful bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPage {
    /// Task index this page belongs to.
    pub index: u32,
    /// Output pages, each `chunk_size` bytes long.
    pub chunks: Vec<Bytes>,
    /// Meaningful bytes in the last chunk.
    pub cursor: usize,
    /// Page size.
    pub chunk_size: usize,
    /// Palette derived by the first frame in shared-palette mode.
    pub global_palette: Option<Bytes>,
}

impl EncodedPage {
    /// Meaningful bytes across all chunks.
    pub fn byte_len(&self) -> usize {
        match self.chunks.len() {
            0 => 0,
            n => (n - 1) * self.chunk_size + self.cursor,
        }
    }
}

/// `io::Write` sink that fills fixed-size pages.
#[derive(Debug)]
pub struct PagedWriter {
    page_size: usize,
    pages: Vec<Bytes>,
    current: BytesMut,
}

impl PagedWriter {
    /// Writer with pages of `page_size` bytes (at least 1).
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            pages: Vec::new(),
            current: BytesMut::with_capacity(page_size),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.pages.len() * self.page_size + self.current.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seal the pages into an [`EncodedPage`].
    ///
    /// The last page is zero-padded to `page_size`; `cursor` records how much of it is real.
    pub fn finish(mut self, index: u32, global_palette: Option<Bytes>) -> EncodedPage {
        let cursor = if !self.current.is_empty() || self.pages.is_empty() {
            let cursor = self.current.len();
            self.current.resize(self.page_size, 0);
            self.pages.push(self.current.freeze());
            cursor
        } else {
            self.page_size
        };
        EncodedPage {
            index,
            chunks: self.pages,
            cursor,
            chunk_size: self.page_size,
            global_palette,
        }
    }
}

impl io::Write for PagedWriter {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let written = buf.len();
        while !buf.is_empty() {
            let room = self.page_size - self.current.len();
            let take = room.min(buf.len());
            self.current.extend_from_slice(&buf[..take]);
            buf = &buf[take..];
            if self.current.len() == self.page_size {
                let full = std::mem::replace(&mut self.current, BytesMut::with_capacity(self.page_size));
                self.pages.push(full.freeze());
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/page.rs"]
mod tests;
