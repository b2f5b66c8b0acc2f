//! Min-priority queue of per-stream current rows.
//!
//! `std::collections::BinaryHeap` needs an infallible `Ord`, but key
//! comparison can fail (incomparable kinds), so the heap is kept by hand over
//! a `Vec` with a fallible ordering callback.

use std::cmp::Ordering;

use rowflow_types::{Row, StepError};

/// Current row of one active stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueueEntry {
    pub(crate) row: Row,
    pub(crate) stream: usize,
}

/// Binary min-heap of [`QueueEntry`]. Holds at most one entry per stream.
#[derive(Debug, Default)]
pub(crate) struct KeyQueue {
    heap: Vec<QueueEntry>,
}

impl KeyQueue {
    pub(crate) fn with_capacity(streams: usize) -> Self {
        Self {
            heap: Vec::with_capacity(streams),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn peek(&self) -> Option<&QueueEntry> {
        self.heap.first()
    }

    pub(crate) fn contains_stream(&self, stream: usize) -> bool {
        self.heap.iter().any(|e| e.stream == stream)
    }

    pub(crate) fn push<F>(&mut self, entry: QueueEntry, order: &F) -> Result<(), StepError>
    where
        F: Fn(&QueueEntry, &QueueEntry) -> Result<Ordering, StepError>,
    {
        debug_assert!(!self.contains_stream(entry.stream));
        self.heap.push(entry);
        self.sift_up(self.heap.len() - 1, order)
    }

    pub(crate) fn pop<F>(&mut self, order: &F) -> Result<Option<QueueEntry>, StepError>
    where
        F: Fn(&QueueEntry, &QueueEntry) -> Result<Ordering, StepError>,
    {
        if self.is_empty() {
            return Ok(None);
        }
        let top = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0, order)?;
        }
        Ok(Some(top))
    }

    fn sift_up<F>(&mut self, mut pos: usize, order: &F) -> Result<(), StepError>
    where
        F: Fn(&QueueEntry, &QueueEntry) -> Result<Ordering, StepError>,
    {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if order(&self.heap[pos], &self.heap[parent])? != Ordering::Less {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
        Ok(())
    }

    fn sift_down<F>(&mut self, mut pos: usize, order: &F) -> Result<(), StepError>
    where
        F: Fn(&QueueEntry, &QueueEntry) -> Result<Ordering, StepError>,
    {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && order(&self.heap[right], &self.heap[left])? == Ordering::Less {
                child = right;
            }
            if order(&self.heap[child], &self.heap[pos])? != Ordering::Less {
                break;
            }
            self.heap.swap(pos, child);
            pos = child;
        }
        Ok(())
    }
}
