use async_trait::async_trait;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::{Booking, NewBooking};
use crate::notify::Subscription;

/// What the calendar needs from a booking backend: a live list plus add/remove.
///
/// Implemented by the in-process [`Engine`] and by the network
/// [`Client`](crate::client::Client).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Live, push-based view of the committed list.
    async fn list(&self) -> Result<Subscription, EngineError>;

    /// One-shot copy of the committed list.
    async fn snapshot(&self) -> Result<Vec<Booking>, EngineError>;

    /// Assign an id and persist. Backends re-check overlap at write time.
    async fn add(&self, booking: NewBooking) -> Result<Booking, EngineError>;

    /// Delete by id. `Ok(false)` if no booking had that id.
    async fn remove(&self, id: Ulid) -> Result<bool, EngineError>;
}

#[async_trait]
impl BookingStore for Engine {
    async fn list(&self) -> Result<Subscription, EngineError> {
        Ok(self.subscribe())
    }

    async fn snapshot(&self) -> Result<Vec<Booking>, EngineError> {
        Ok(self.list_bookings().await)
    }

    async fn add(&self, booking: NewBooking) -> Result<Booking, EngineError> {
        self.add_booking(booking).await
    }

    async fn remove(&self, id: Ulid) -> Result<bool, EngineError> {
        self.remove_booking(id).await
    }
}
