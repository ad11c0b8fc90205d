//! Receive-side pipeline events
//!
//! Each [`EventSource`] is a plain handler list. Handlers are attached once
//! during setup and invoked synchronously, in registration order, on the
//! thread raising the event.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::headers;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Ordered list of handlers for one event type
pub struct EventSource<E> {
    handlers: RwLock<Vec<Handler<E>>>,
}

impl<E> Default for EventSource<E> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

impl<E> EventSource<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.handlers.write().push(Arc::new(handler));
    }

    /// Invoke every handler with `event`
    pub fn raise(&self, event: &E) {
        // Clone the list so a handler may subscribe without deadlocking
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl<E> std::fmt::Debug for EventSource<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// An incoming message as seen by receive events
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub message_id: String,
    pub headers: BTreeMap<String, String>,
}

impl IncomingMessage {
    pub fn new(message_id: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        Self {
            message_id: message_id.into(),
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// When the sender dispatched the message, if the header is present and
    /// well-formed
    pub fn time_sent(&self) -> Option<DateTime<Utc>> {
        self.header(headers::TIME_SENT)
            .and_then(headers::from_wire_time)
    }

    pub fn message_type(&self) -> Option<&str> {
        self.header(headers::ENCLOSED_MESSAGE_TYPES)
    }
}

/// Processing of a message failed
#[derive(Debug, Clone)]
pub struct ProcessingFailed {
    pub message: IncomingMessage,
    pub error: String,
}

/// A failed message was scheduled for another attempt
#[derive(Debug, Clone)]
pub struct RetryScheduled {
    pub message: IncomingMessage,
    /// Attempt number of the scheduled retry, starting at 1
    pub attempt: u32,
    /// Whether the retry is delayed rather than immediate
    pub delayed: bool,
}

/// A receive finished, successfully or not
#[derive(Debug, Clone)]
pub struct ReceiveCompleted {
    pub message: IncomingMessage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub succeeded: bool,
}

impl ReceiveCompleted {
    /// Time spent processing the message
    pub fn processing_time(&self) -> Option<Duration> {
        (self.completed_at - self.started_at).to_std().ok()
    }

    /// Time from the original send to completion; `None` without a valid
    /// time-sent header
    pub fn critical_time(&self) -> Option<Duration> {
        let sent = self.message.time_sent()?;
        (self.completed_at - sent).to_std().ok()
    }
}

/// Every event a receive pipeline raises
#[derive(Debug, Default)]
pub struct PipelineEvents {
    pub message_pulled: EventSource<IncomingMessage>,
    pub processing_succeeded: EventSource<IncomingMessage>,
    pub processing_failed: EventSource<ProcessingFailed>,
    pub retry_scheduled: EventSource<RetryScheduled>,
    pub receive_completed: EventSource<ReceiveCompleted>,
}

impl PipelineEvents {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    #[test]
    fn test_handlers_fire_in_registration_order() {
        let source = EventSource::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            source.subscribe(move |n: &u32| seen.lock().push(format!("{tag}{n}")));
        }

        source.raise(&1);
        source.raise(&2);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1", "a2", "b2", "c2"]);
        assert_eq!(source.handler_count(), 3);
    }

    #[test]
    fn test_raise_without_handlers() {
        EventSource::<IncomingMessage>::new().raise(&IncomingMessage::default());
    }

    fn completed(headers: BTreeMap<String, String>) -> ReceiveCompleted {
        let started_at = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 10).unwrap();
        ReceiveCompleted {
            message: IncomingMessage::new("m-1", headers),
            started_at,
            completed_at: started_at + chrono::Duration::milliseconds(250),
            succeeded: true,
        }
    }

    #[test]
    fn test_processing_and_critical_time() {
        let mut h = BTreeMap::new();
        h.insert(
            headers::TIME_SENT.to_string(),
            "2024-01-31 12:00:08:000000 Z".to_string(),
        );
        let event = completed(h);

        assert_eq!(event.processing_time(), Some(Duration::from_millis(250)));
        assert_eq!(event.critical_time(), Some(Duration::from_millis(2_250)));
    }

    #[test]
    fn test_critical_time_without_header() {
        let event = completed(BTreeMap::new());
        assert_eq!(event.critical_time(), None);
        assert!(event.message.time_sent().is_none());
    }

    #[test]
    fn test_negative_critical_time_is_skipped() {
        let mut h = BTreeMap::new();
        h.insert(
            headers::TIME_SENT.to_string(),
            "2024-01-31 13:00:00:000000 Z".to_string(),
        );
        assert_eq!(completed(h).critical_time(), None);
    }
}
