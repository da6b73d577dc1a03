//! Write Buffer: accumulates write bytes into page-sized payloads.
//!
//! A buffer holds at most one page payload (`P - H` bytes). Every time it
//! fills up it is flushed through a [`FlushTarget`], and whatever is left at
//! the end of a `write` call is flushed as a partial page. The buffer is
//! therefore always empty between calls.

use crate::error::FsResult;

/// What a single flush did to the stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Logical bytes merged into the content.
    pub written: usize,
    /// Logical content length after the flush.
    pub total_len: u64,
}

/// Destination for buffered bytes.
///
/// The dispatcher implements this with get → splice → update → commit →
/// record update; tests use counting mocks.
pub trait FlushTarget {
    fn flush(&mut self, offset: u64, data: &[u8]) -> FsResult<FlushOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Idle,
    Accumulating,
    Flushing,
}

#[derive(Debug)]
pub struct WriteBuffer {
    capacity: usize,
    buf: Vec<u8>,
    state: BufferState,
}

impl WriteBuffer {
    /// Buffer for `capacity` payload bytes per page.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buf: Vec::with_capacity(capacity),
            state: BufferState::Idle,
        }
    }

    pub fn state(&self) -> BufferState {
        self.state
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Push `data` at `offset` through the buffer into `target`.
    ///
    /// Returns `data.len()`. A zero-length write performs one zero-length flush.
    pub fn write<T>(&mut self, target: &mut T, data: &[u8], offset: u64) -> FsResult<usize>
    where
        T: FlushTarget + ?Sized,
    {
        let mut offset = offset;

        if data.is_empty() {
            self.flush(target, offset)?;
            return Ok(0);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let n = (self.capacity - self.buf.len()).min(rest.len());
            self.buf.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            self.state = BufferState::Accumulating;

            if self.buf.len() == self.capacity {
                let outcome = self.flush(target, offset)?;
                offset += outcome.written as u64;
            }
        }

        if !self.buf.is_empty() {
            self.flush(target, offset)?;
        }
        Ok(data.len())
    }

    fn flush<T>(&mut self, target: &mut T, offset: u64) -> FsResult<FlushOutcome>
    where
        T: FlushTarget + ?Sized,
    {
        self.state = BufferState::Flushing;
        let result = target.flush(offset, &self.buf);
        // Buffered bytes are dropped on failure too; the write call reports the error.
        self.buf.clear();
        self.state = BufferState::Idle;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FsError, StoreError};

    /// Records every flush as (offset, len) and keeps a flat byte image.
    #[derive(Default)]
    struct RecordingTarget {
        flushes: Vec<(u64, usize)>,
        image: Vec<u8>,
    }

    impl FlushTarget for RecordingTarget {
        fn flush(&mut self, offset: u64, data: &[u8]) -> FsResult<FlushOutcome> {
            self.flushes.push((offset, data.len()));
            if !data.is_empty() {
                let end = offset as usize + data.len();
                if self.image.len() < end {
                    self.image.resize(end, 0);
                }
                self.image[offset as usize..end].copy_from_slice(data);
            }
            Ok(FlushOutcome {
                written: data.len(),
                total_len: self.image.len() as u64,
            })
        }
    }

    struct FailingTarget;

    impl FlushTarget for FailingTarget {
        fn flush(&mut self, _offset: u64, _data: &[u8]) -> FsResult<FlushOutcome> {
            Err(FsError::Store(StoreError::Timeout))
        }
    }

    #[test]
    fn test_exact_page_is_one_flush() {
        let mut target = RecordingTarget::default();
        let mut buffer = WriteBuffer::new(16);

        let n = buffer.write(&mut target, &[7u8; 16], 0).unwrap();
        assert_eq!(n, 16);
        assert_eq!(target.flushes, vec![(0, 16)]);
        assert_eq!(buffer.buffered(), 0);
        assert_eq!(buffer.state(), BufferState::Idle);
    }

    #[test]
    fn test_two_pages_plus_one_is_three_flushes() {
        let mut target = RecordingTarget::default();
        let mut buffer = WriteBuffer::new(16);
        let data: Vec<u8> = (0..33u8).collect();

        buffer.write(&mut target, &data, 100).unwrap();
        assert_eq!(target.flushes, vec![(100, 16), (116, 16), (132, 1)]);
        assert_eq!(&target.image[100..], &data[..]);
    }

    #[test]
    fn test_short_write_flushes_partial() {
        let mut target = RecordingTarget::default();
        let mut buffer = WriteBuffer::new(16);

        buffer.write(&mut target, b"hello", 3).unwrap();
        assert_eq!(target.flushes, vec![(3, 5)]);
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_zero_length_write_reports_empty_flush() {
        let mut target = RecordingTarget::default();
        let mut buffer = WriteBuffer::new(16);

        assert_eq!(buffer.write(&mut target, &[], 42).unwrap(), 0);
        assert_eq!(target.flushes, vec![(42, 0)]);
        assert!(target.image.is_empty());
    }

    #[test]
    fn test_failed_flush_leaves_buffer_idle() {
        let mut buffer = WriteBuffer::new(16);
        let err = buffer.write(&mut FailingTarget, b"abc", 0).unwrap_err();
        assert!(matches!(err, FsError::Store(StoreError::Timeout)));
        assert_eq!(buffer.buffered(), 0);
        assert_eq!(buffer.state(), BufferState::Idle);
    }
}
