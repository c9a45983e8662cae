use async_trait::async_trait;
use seatwise_shared::models::events::BookingEvent;

/// Sink for booking lifecycle events. Publishing is best effort and never
/// fails the operation that produced the event.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: BookingEvent);
}
