//! Bounded byte container for outgoing and incoming frames.

use crate::error::UhfError;

/// Byte buffer with a fixed capacity ceiling.
///
/// Appending past the ceiling fails with `MemoryOverrun` and leaves the
/// contents untouched. Storage is allocated once and kept across resets.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), UhfError> {
        let new_len = self.data.len() + bytes.len();
        if new_len > self.capacity {
            return Err(UhfError::MemoryOverrun(format!(
                "frame buffer holds {} bytes, {} more requested (capacity {})",
                self.data.len(),
                bytes.len(),
                self.capacity
            )));
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn push(&mut self, byte: u8) -> Result<(), UhfError> {
        self.append(&[byte])
    }

    /// Drop the first `count` bytes, keeping the rest in order
    pub fn discard_front(&mut self, count: usize) {
        let count = count.min(self.data.len());
        self.data.drain(..count);
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
