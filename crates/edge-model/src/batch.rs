use crate::error::{ModelError, Result};

/// One token submitted to a decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEntry {
    pub token: u32,
    /// Absolute position of the token in its sequence.
    pub pos: usize,
    pub seq_id: i32,
    /// Whether the decode call should produce logits for this entry.
    pub logits: bool,
}

/// A bounded group of tokens submitted together for one decode step.
///
/// The capacity is fixed at construction; `add` refuses entries past it
/// instead of growing.
#[derive(Debug, Clone)]
pub struct Batch {
    entries: Vec<BatchEntry>,
    capacity: usize,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Batch {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn add(&mut self, token: u32, pos: usize, seq_id: i32, logits: bool) -> Result<()> {
        if self.is_full() {
            return Err(ModelError::BatchFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(BatchEntry {
            token,
            pos,
            seq_id,
            logits,
        });
        Ok(())
    }

    /// Flag the most recently added entry to emit logits.
    ///
    /// Returns false when the batch is empty.
    pub fn mark_last_for_logits(&mut self) -> bool {
        match self.entries.last_mut() {
            Some(entry) => {
                entry.logits = true;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries flagged to emit logits.
    pub fn n_outputs(&self) -> usize {
        self.entries.iter().filter(|e| e.logits).count()
    }
}
