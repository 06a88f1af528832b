use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-facing message emitted by a cart operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    AddFailed,
    RemoveFailed,
    UpdateFailed,
    OutOfStock,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Self::AddFailed => "Error adding product",
            Self::RemoveFailed => "Error removing product",
            Self::UpdateFailed => "Error updating product amount",
            Self::OutOfStock => "Requested quantity is out of stock",
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes every notice to the `tracing` pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notice: Notice) {
        warn!(event_name = "cart.notice", notice = ?notice, "{}", notice.message());
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationSink {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl InMemoryNotificationSink {
    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the recorded notices and starts a fresh recording.
    pub fn drain(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for InMemoryNotificationSink {
    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::notify::{InMemoryNotificationSink, Notice, NotificationSink};

    #[test]
    fn in_memory_sink_records_notices_in_order() {
        let sink = InMemoryNotificationSink::default();
        sink.notify(Notice::OutOfStock);
        sink.notify(Notice::RemoveFailed);

        assert_eq!(sink.notices(), vec![Notice::OutOfStock, Notice::RemoveFailed]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.notices().is_empty());
    }

    #[test]
    fn every_notice_has_a_fixed_message() {
        assert_eq!(Notice::OutOfStock.to_string(), "Requested quantity is out of stock");
        assert_eq!(Notice::AddFailed.message(), "Error adding product");
        assert_eq!(Notice::RemoveFailed.message(), "Error removing product");
        assert_eq!(Notice::UpdateFailed.message(), "Error updating product amount");
    }

    #[test]
    fn notices_serialize_as_snake_case() {
        let json = serde_json::to_string(&Notice::OutOfStock).expect("serialize notice");
        assert_eq!(json, "\"out_of_stock\"");
    }
}
