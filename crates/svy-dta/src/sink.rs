//! Buffered I/O.
//!
//! Two independent buffers bound peak memory during long operations: a
//! raw byte buffer in front of the output sink, and a pending-row buffer
//! in front of the document store. Section writers and the data-read
//! loop never touch the underlying file or store directly.

use std::io::{Seek, SeekFrom, Write};

use tracing::debug;

use svy_store::{Document, DocumentStore};

use crate::error::Result;

/// Byte count above which the write buffer is flushed.
pub const WRITE_FLUSH_THRESHOLD: usize = 64 * 1024;

/// Pending row count above which observations are flushed to the store.
pub const INSERT_FLUSH_THRESHOLD: usize = 1024;

/// Buffered byte sink over any seekable writer.
///
/// Tracks the logical position (underlying position plus buffered bytes)
/// so section offsets can be recorded without flushing, and supports the
/// seek-back needed to backpatch the offset map. `seek_to` flushes first;
/// buffered bytes always land at the position they were produced for.
pub struct ByteSink<W: Write + Seek> {
    inner: W,
    buf: Vec<u8>,
    threshold: usize,
    position: u64,
}

impl<W: Write + Seek> ByteSink<W> {
    pub fn new(mut inner: W) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            buf: Vec::with_capacity(WRITE_FLUSH_THRESHOLD),
            threshold: WRITE_FLUSH_THRESHOLD,
            position,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_threshold(inner: W, threshold: usize) -> Result<Self> {
        let mut sink = Self::new(inner)?;
        sink.threshold = threshold;
        Ok(sink)
    }

    /// Current logical byte position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append bytes, flushing once the buffer exceeds the threshold.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        self.position += bytes.len() as u64;
        if self.buf.len() > self.threshold {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Flush buffered bytes to the underlying writer.
    pub fn flush_buffer(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            debug!(bytes = self.buf.len(), "flushing write buffer");
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Reposition the sink. Flushes buffered bytes first.
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.flush_buffer()?;
        self.inner.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(())
    }

    /// Flush everything and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.flush_buffer()?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Pending-row buffer in front of the document store.
pub struct RowBuffer {
    collection: String,
    pending: Vec<Document>,
    threshold: usize,
}

impl RowBuffer {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            pending: Vec::new(),
            threshold: INSERT_FLUSH_THRESHOLD,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_threshold(collection: impl Into<String>, threshold: usize) -> Self {
        let mut buffer = Self::new(collection);
        buffer.threshold = threshold;
        buffer
    }

    /// Queue a row document, flushing in bulk past the threshold.
    pub fn push<S: DocumentStore>(&mut self, store: &mut S, doc: Document) -> Result<()> {
        self.pending.push(doc);
        if self.pending.len() >= self.threshold {
            self.flush(store)?;
        }
        Ok(())
    }

    /// Insert all pending rows with one `insert_many`.
    pub fn flush<S: DocumentStore>(&mut self, store: &mut S) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        debug!(rows = self.pending.len(), collection = %self.collection, "flushing row buffer");
        store.insert_many(&self.collection, std::mem::take(&mut self.pending))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use svy_store::MemoryStore;

    fn row_document(row: u64) -> Document {
        json!({ "_id": row })
    }

    #[test]
    fn test_sink_tracks_logical_position() {
        let mut sink = ByteSink::with_threshold(Cursor::new(Vec::new()), 1024).unwrap();
        sink.push(b"abcd").unwrap();
        assert_eq!(sink.position(), 4);
        // Nothing hit the writer yet; position is logical.
        sink.push(&[0u8; 10]).unwrap();
        assert_eq!(sink.position(), 14);

        let inner = sink.finish().unwrap();
        assert_eq!(inner.into_inner().len(), 14);
    }

    #[test]
    fn test_sink_threshold_flush() {
        let mut sink = ByteSink::with_threshold(Cursor::new(Vec::new()), 4).unwrap();
        sink.push(b"abcdef").unwrap();
        // Past the threshold, so bytes are already in the writer.
        assert_eq!(sink.position(), 6);
        let inner = sink.finish().unwrap();
        assert_eq!(inner.into_inner(), b"abcdef".to_vec());
    }

    #[test]
    fn test_sink_seek_back_and_patch() {
        let mut sink = ByteSink::with_threshold(Cursor::new(Vec::new()), 1024).unwrap();
        sink.push(b"....placeholder....").unwrap();
        let end = sink.position();

        sink.seek_to(4).unwrap();
        sink.push(b"PATCHED").unwrap();
        sink.seek_to(end).unwrap();
        sink.push(b"!").unwrap();

        let bytes = sink.finish().unwrap().into_inner();
        assert_eq!(&bytes, b"....PATCHEDder....!");
    }

    #[test]
    fn test_row_buffer_bulk_insert() {
        let mut store = MemoryStore::new();
        let mut buffer = RowBuffer::with_threshold("obs", 3);

        for row in 1..=2u64 {
            buffer.push(&mut store, row_document(row)).unwrap();
        }
        // Below the threshold, nothing inserted yet.
        assert!(store.is_empty("obs"));

        buffer.push(&mut store, row_document(3)).unwrap();
        assert_eq!(store.len("obs"), 3);

        buffer.push(&mut store, row_document(4)).unwrap();
        buffer.flush(&mut store).unwrap();
        assert_eq!(store.len("obs"), 4);
    }
}
