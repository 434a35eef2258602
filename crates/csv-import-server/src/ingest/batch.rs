//! Fixed-size batch accumulator

use super::models::CustomerRecord;

/// An ordered group of records handed to the writer together
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 1-based position of this batch within its run
    pub sequence: u64,
    pub records: Vec<CustomerRecord>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collects records until `batch_size` is reached
///
/// `push` hands back a full batch in the same call that completes it, so the
/// buffer never holds more than `batch_size` records. `flush` returns whatever
/// is left, or `None` when empty. Owned by a single producer.
#[derive(Debug)]
pub struct BatchAccumulator {
    batch_size: usize,
    buffer: Vec<CustomerRecord>,
    emitted: u64,
}

impl BatchAccumulator {
    /// A `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            emitted: 0,
        }
    }

    pub fn push(&mut self, record: CustomerRecord) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches handed out so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn take(&mut self) -> Batch {
        self.emitted += 1;
        Batch {
            sequence: self.emitted,
            records: std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size)),
        }
    }
}
