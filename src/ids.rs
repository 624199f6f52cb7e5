//! Per-split id counters

use crate::models::{PerSplit, Split};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counters {
    next_image_id: u64,
    next_annotation_id: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            next_image_id: 1,
            next_annotation_id: 1,
        }
    }
}

/// Independent image and annotation id sequences for each split, starting at 1.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: PerSplit<Counters>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next image of `split` will receive, without consuming it.
    pub fn peek_image_id(&self, split: Split) -> u64 {
        self.counters[split].next_image_id
    }

    pub fn allocate_image_id(&mut self, split: Split) -> u64 {
        let counters = &mut self.counters[split];
        let id = counters.next_image_id;
        counters.next_image_id += 1;
        id
    }

    pub fn allocate_annotation_id(&mut self, split: Split) -> u64 {
        let counters = &mut self.counters[split];
        let id = counters.next_annotation_id;
        counters.next_annotation_id += 1;
        id
    }

    /// Annotation ids handed out so far for `split`, accepted or not.
    pub fn annotation_attempts(&self, split: Split) -> u64 {
        self.counters[split].next_annotation_id - 1
    }
}
