//! Content change events.
//!
//! Defines the change events published by mutation paths and the in-memory
//! queue the consumer drains to run invalidation and index maintenance.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic epoch for ordering events.
///
/// Each event gets a unique, monotonically increasing epoch number, so the
/// consumer can tell which of two events for the same entity is latest.
pub type Epoch = u64;

/// A content change with idempotency and ordering support.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Unique identifier for idempotency (UUIDv4).
    pub id: Uuid,
    /// Monotonic epoch for ordering within this process.
    pub epoch: Epoch,
    /// What changed.
    pub kind: EventKind,
    /// When the event was created.
    pub timestamp: OffsetDateTime,
}

impl ChangeEvent {
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Content changes that drive cache invalidation and index maintenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A post was created and published.
    PostCreated { post_id: Uuid },
    /// A post's content or metadata changed.
    ///
    /// `category_id` is the post's category before the change, when known,
    /// so entries derived from the old category can be torn down even if
    /// the post moved.
    PostUpdated {
        post_id: Uuid,
        category_id: Option<Uuid>,
    },
    /// A post was deleted or unpublished.
    PostDeleted {
        post_id: Uuid,
        category_id: Option<Uuid>,
    },
    /// A category was renamed, created, or removed.
    CategoryChanged { category_id: Uuid },
    /// A user's profile changed.
    UserUpdated { user_id: Uuid },
}

impl EventKind {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PostCreated { .. } => "post_created",
            Self::PostUpdated { .. } => "post_updated",
            Self::PostDeleted { .. } => "post_deleted",
            Self::CategoryChanged { .. } => "category_changed",
            Self::UserUpdated { .. } => "user_updated",
        }
    }
}

/// In-memory change event queue.
///
/// Events are published by write operations and consumed by the change
/// consumer. The queue uses a mutex for simplicity since contention is
/// expected to be low.
pub struct EventQueue {
    queue: Mutex<VecDeque<ChangeEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    /// Get the next epoch number.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event to the queue.
    ///
    /// The event is logged for observability.
    pub fn publish(&self, kind: EventKind) {
        let epoch = self.next_epoch();
        let event = ChangeEvent::new(kind, epoch);

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = event.kind.label(),
            "Change event enqueued"
        );

        mutex_lock(&self.queue, SOURCE, "publish").push_back(event);
    }

    /// Drain up to `limit` events from the queue, in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<ChangeEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.queue, SOURCE, "clear").clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
