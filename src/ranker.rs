//! Bounded top-K ranking.
//!
//! [`BoundedRanker`] keeps the `capacity` highest-scoring entries seen so far
//! in an array-backed binary min-heap. The root is the weakest retained entry,
//! so once the heap is full most incoming entries are rejected with a single
//! comparison.
//!
//! ```ascii
//!             [0] min
//!            /      \
//!        [1]          [2]          parent(i)   = (i - 1) / 2
//!       /   \        /   \         children(i) = 2i + 1, 2i + 2
//!     [3]   [4]    [5]   [6]
//! ```

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{ArticlesError, Result};

/// A named score held by the ranker.
///
/// Ordering is by score only; entries with equal scores have no defined
/// relative order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    name: String,
    score: u64,
}

impl RankedEntry {
    pub fn new(name: impl Into<String>, score: u64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> u64 {
        self.score
    }
}

/// Fixed-capacity min-heap of [`RankedEntry`] values.
#[derive(Debug)]
struct MinHeap {
    entries: Vec<RankedEntry>,
}

impl MinHeap {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn peek(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }

    fn push(&mut self, entry: RankedEntry) {
        self.entries.push(entry);
        self.sift_up(self.entries.len() - 1);
    }

    /// Overwrite the root and restore heap order.
    fn replace_min(&mut self, entry: RankedEntry) {
        self.entries[0] = entry;
        self.sift_down(0);
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[idx].score >= self.entries[parent].score {
                break;
            }
            self.entries.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;

            if left < len && self.entries[left].score < self.entries[smallest].score {
                smallest = left;
            }
            if right < len && self.entries[right].score < self.entries[smallest].score {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.entries.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn into_vec(self) -> Vec<RankedEntry> {
        self.entries
    }
}

/// Thread-safe top-K container.
///
/// Created once per run, filled concurrently through [`insert`](Self::insert),
/// then drained exactly once with
/// [`drain_sorted_names_desc`](Self::drain_sorted_names_desc). Draining
/// releases the storage; later drains return an empty list.
#[derive(Debug)]
pub struct BoundedRanker {
    capacity: usize,
    heap: Mutex<Option<MinHeap>>,
}

impl BoundedRanker {
    /// Create a ranker retaining at most `capacity` entries.
    ///
    /// A zero capacity is a configuration error.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ArticlesError::ConfigError(
                "ranker capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            heap: Mutex::new(Some(MinHeap::with_capacity(capacity))),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries (0 once drained).
    pub fn len(&self) -> usize {
        self.heap.lock().as_ref().map_or(0, MinHeap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score of the weakest retained entry.
    pub fn min_score(&self) -> Option<u64> {
        self.heap
            .lock()
            .as_ref()
            .and_then(|h| h.peek().map(RankedEntry::score))
    }

    /// Whether [`drain_sorted_names_desc`](Self::drain_sorted_names_desc) has run.
    pub fn is_drained(&self) -> bool {
        self.heap.lock().is_none()
    }

    /// Offer an entry to the ranker.
    ///
    /// While below capacity the entry is always kept. At capacity it replaces
    /// the current minimum only if its score is strictly greater. Inserts
    /// after a drain are ignored.
    pub fn insert(&self, entry: RankedEntry) {
        let mut guard = self.heap.lock();
        let Some(heap) = guard.as_mut() else {
            return;
        };

        if heap.len() < self.capacity {
            heap.push(entry);
            return;
        }

        let min_score = heap.peek().map(RankedEntry::score);
        if min_score.is_some_and(|min| entry.score > min) {
            heap.replace_min(entry);
        }
    }

    /// Sort retained entries by score descending and return their names.
    ///
    /// Must be called after all insertion has stopped. The ranker is empty
    /// afterwards and a second call returns an empty list.
    pub fn drain_sorted_names_desc(&self) -> Vec<String> {
        let Some(heap) = self.heap.lock().take() else {
            warn!("ranker drained more than once");
            return Vec::new();
        };

        let mut entries = heap.into_vec();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.into_iter().map(|e| e.name).collect()
    }
}
