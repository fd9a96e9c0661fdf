//! Event types for the partner list event system
//!
//! Provides the shared event definitions, the transient user notice, and the
//! EventBus used by both services.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Visual weight of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeVariant {
    Default,
    Destructive,
}

/// Transient user notification
///
/// Every user-visible outcome (success or failure) is reported as a notice;
/// none of them is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    /// Create a success/informational notice
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Default,
        }
    }

    /// Create an error notice ("Error" title, destructive variant)
    pub fn error(description: impl Into<String>) -> Self {
        Self {
            title: "Error".to_string(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == NoticeVariant::Destructive
    }
}

/// Partner list event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlEvent {
    /// User-visible notice
    Notice {
        #[serde(flatten)]
        notice: Notice,
    },

    /// Partner list was re-fetched
    PartnersRefreshed {
        /// Number of records now displayed
        count: usize,
    },

    /// Signed-in identity changed (None after sign-out)
    SessionChanged { user_id: Option<String> },

    /// Edit form opened (None for a new record)
    FormOpened { partner_id: Option<i64> },

    /// Edit form closed and its buffer discarded
    FormClosed,

    /// Deletion awaits explicit confirmation
    DeletePending { partner_id: i64 },

    /// Media library contents changed
    MediaLibraryChanged { count: usize },
}

impl PlEvent {
    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            PlEvent::Notice { .. } => "Notice",
            PlEvent::PartnersRefreshed { .. } => "PartnersRefreshed",
            PlEvent::SessionChanged { .. } => "SessionChanged",
            PlEvent::FormOpened { .. } => "FormOpened",
            PlEvent::FormClosed => "FormClosed",
            PlEvent::DeletePending { .. } => "DeletePending",
            PlEvent::MediaLibraryChanged { .. } => "MediaLibraryChanged",
        }
    }
}

impl From<Notice> for PlEvent {
    fn from(notice: Notice) -> Self {
        PlEvent::Notice { notice }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Events emitted with no
/// subscriber are dropped.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PlEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use pl_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: impl Into<PlEvent>) {
        let _ = self.tx.send(event.into());
    }

    /// Publish a user notice
    pub fn notify(&self, notice: Notice) {
        self.emit_lossy(notice);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
