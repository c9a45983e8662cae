use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use seatwise_core::EventPublisher;
use seatwise_shared::models::events::BookingEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Fans booking events out to in-process subscribers such as SSE streams.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<BookingEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: BookingEvent) {
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            debug!("Booking event dropped, no subscribers");
        }
    }
}
