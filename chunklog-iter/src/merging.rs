use std::cmp::Ordering;
use std::collections::BinaryHeap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chunklog_protocol::LogLine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::LogError;
use crate::iterator::{IterState, IteratorKind, LogIterator};

/// Head of one child in the merge heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    timestamp: DateTime<Utc>,
    child: usize,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // `BinaryHeap` is a max-heap; reversed so the earliest line, then the
    // lowest child index, is popped first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.child.cmp(&other.child))
            .reverse()
    }
}

/// K-way merge of already ordered iterators by line timestamp.
///
/// Lines with equal timestamps come out in child order. A child is advanced
/// again only after its line has been consumed, and any child error ends the
/// merge with that error.
pub struct MergingIterator {
    children: Vec<Box<dyn LogIterator>>,
    heap: BinaryHeap<HeapEntry>,
    last: Option<usize>,
    state: IterState,
}

impl MergingIterator {
    /// Builds the merge and primes every child with one `advance`.
    pub async fn new(children: Vec<Box<dyn LogIterator>>, cancel: &CancellationToken) -> Self {
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(children.len()),
            children,
            last: None,
            state: IterState::default(),
        };

        for child in 0..merge.children.len() {
            if !merge.pull(child, cancel).await {
                break;
            }
        }
        debug!(
            children = merge.children.len(),
            primed = merge.heap.len(),
            "merge primed"
        );
        merge
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Advances `child` and pushes its new head. Returns `false` if the child
    /// failed, which poisons the merge.
    async fn pull(&mut self, child: usize, cancel: &CancellationToken) -> bool {
        let Some(iter) = self.children.get_mut(child) else {
            return true;
        };
        if iter.advance(cancel).await {
            if let Some(line) = iter.current() {
                self.heap.push(HeapEntry {
                    timestamp: line.timestamp,
                    child,
                });
            }
            return true;
        }

        match iter.error().cloned() {
            Some(err) => {
                warn!(child, kind = %iter.kind(), error = %err, "merge input failed");
                self.heap.clear();
                self.last = None;
                self.state.fail(err);
                false
            }
            None => true,
        }
    }
}

#[async_trait]
impl LogIterator for MergingIterator {
    fn kind(&self) -> IteratorKind {
        IteratorKind::Merging
    }

    async fn advance(&mut self, cancel: &CancellationToken) -> bool {
        if self.state.is_exhausted() {
            return false;
        }
        if cancel.is_cancelled() {
            self.heap.clear();
            self.last = None;
            return self.state.fail(LogError::Cancelled);
        }

        if let Some(child) = self.last.take() {
            if !self.pull(child, cancel).await {
                return false;
            }
        }

        match self.heap.pop() {
            Some(head) => {
                self.last = Some(head.child);
                true
            }
            None => self.state.finish(),
        }
    }

    fn current(&self) -> Option<&LogLine> {
        if self.state.is_exhausted() {
            return None;
        }
        self.last
            .and_then(|child| self.children.get(child))
            .and_then(|child| child.current())
    }

    fn error(&self) -> Option<&LogError> {
        self.state.error()
    }

    fn is_exhausted(&self) -> bool {
        self.state.is_exhausted()
    }

    async fn close(&mut self) -> Result<(), LogError> {
        self.heap.clear();
        self.last = None;
        if !self.state.is_exhausted() {
            self.state.finish();
        }

        let mut first_error = None;
        for (index, child) in self.children.iter_mut().enumerate() {
            if let Err(err) = child.close().await {
                warn!(child = index, error = %err, "failed to close merge input");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
