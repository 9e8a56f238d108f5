//! Structured notifications
//!
//! Every state-mutating operation emits one notification describing what
//! changed. Notifications are for off-chain indexing only: they are never
//! read back and carry nothing that cannot be derived from stored state.

use crate::access::Role;
use crate::types::{ActorId, Amount, ContentHash, ProductId, Stage};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A notification that can be indexed
pub trait Notification: Serialize + fmt::Debug + Send + Sync {
    /// Stable event name
    fn name(&self) -> &'static str;
}

/// Destination for notifications
pub trait EventSink<E>: Send + Sync {
    /// Publish one notification
    fn emit(&self, event: &E);
}

/// Writes notifications as structured `tracing` records with a JSON payload
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl<E: Notification> EventSink<E> for TracingSink {
    fn emit(&self, event: &E) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                tracing::info!(target: "notifications", event = event.name(), %payload, "Notification");
            }
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "Failed to serialize notification");
            }
        }
    }
}

/// Keeps notifications in memory (tests, scenario replay, indexers)
#[derive(Debug)]
pub struct MemorySink<E> {
    events: Mutex<Vec<E>>,
}

impl<E> MemorySink<E> {
    /// Empty sink
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Number of notifications collected
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return everything collected so far
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl<E: Clone> MemorySink<E> {
    /// Snapshot of collected notifications
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }
}

impl<E> Default for MemorySink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync> EventSink<E> for MemorySink<E> {
    fn emit(&self, event: &E) {
        self.events.lock().push(event.clone());
    }
}

/// Notifications from the actor registry and product ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Role granted
    RoleGranted {
        /// Recipient
        actor: ActorId,
        /// Role
        role: Role,
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Role revoked
    RoleRevoked {
        /// Former holder
        actor: ActorId,
        /// Role
        role: Role,
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Mutations paused
    Paused {
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Mutations resumed
    Unpaused {
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Product registered
    ProductCreated {
        /// Product
        product_id: ProductId,
        /// Producer
        owner: ActorId,
        /// Quantity
        quantity: u64,
        /// Initial price
        price: Amount,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Stage changed
    StageAdvanced {
        /// Product
        product_id: ProductId,
        /// Previous stage
        from: Stage,
        /// New stage
        to: Stage,
        /// Caller
        actor: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Quality observation appended
    QualityRecorded {
        /// Product
        product_id: ProductId,
        /// Quality score
        score: u16,
        /// Caller
        recorded_by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Owner changed
    OwnershipTransferred {
        /// Product
        product_id: ProductId,
        /// Previous owner
        from: ActorId,
        /// New owner
        to: ActorId,
        /// New price
        price: Amount,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Document attached
    ContentAttached {
        /// Product
        product_id: ProductId,
        /// Document reference
        content_hash: ContentHash,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Product and its history erased
    ProductErased {
        /// Product
        product_id: ProductId,
        /// Regulator
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
}

impl Notification for LedgerEvent {
    fn name(&self) -> &'static str {
        match self {
            LedgerEvent::RoleGranted { .. } => "role_granted",
            LedgerEvent::RoleRevoked { .. } => "role_revoked",
            LedgerEvent::Paused { .. } => "paused",
            LedgerEvent::Unpaused { .. } => "unpaused",
            LedgerEvent::ProductCreated { .. } => "product_created",
            LedgerEvent::StageAdvanced { .. } => "stage_advanced",
            LedgerEvent::QualityRecorded { .. } => "quality_recorded",
            LedgerEvent::OwnershipTransferred { .. } => "ownership_transferred",
            LedgerEvent::ContentAttached { .. } => "content_attached",
            LedgerEvent::ProductErased { .. } => "product_erased",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = LedgerEvent::Paused {
            by: ActorId::new("admin"),
            at: DateTime::<Utc>::default(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "paused");
        assert_eq!(json["by"], "admin");
        assert_eq!(event.name(), "paused");
    }

    #[test]
    fn test_memory_sink_take() {
        let sink = MemorySink::<LedgerEvent>::new();
        sink.emit(&LedgerEvent::Unpaused {
            by: ActorId::new("admin"),
            at: DateTime::<Utc>::default(),
        });

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}
