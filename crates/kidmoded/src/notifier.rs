//! Notification sink that forwards to IPC subscribers

use kidmode_api::{Event, EventPayload, Notification};
use kidmode_host_api::NotificationSink;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcasts core notifications as events to subscribed clients
pub struct IpcNotifier {
    events: broadcast::Sender<Event>,
}

impl IpcNotifier {
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self { events }
    }
}

impl NotificationSink for IpcNotifier {
    fn notify(&self, notification: Notification) {
        debug!(?notification, "Broadcasting notification");
        // No subscribers is not an error
        let _ = self
            .events
            .send(Event::new(EventPayload::Notification(notification)));
    }
}
