use ulid::Ulid;

use crate::model::*;
use crate::notify::Subscription;
use crate::overlap::find_conflict;

use super::Engine;

impl Engine {
    /// Current list in insertion order.
    pub async fn list_bookings(&self) -> Vec<Booking> {
        self.bookings.read().await.clone()
    }

    pub async fn get_booking(&self, id: Ulid) -> Option<Booking> {
        self.bookings.read().await.iter().find(|b| b.id == id).cloned()
    }

    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Live view of the list: yields the current snapshot, then a full snapshot
    /// after every committed change.
    pub fn subscribe(&self) -> Subscription {
        self.notify.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.notify.subscriber_count()
    }

    /// Advisory overlap check against the committed list. Returns the id of the
    /// first colliding booking. `add_booking` repeats the check atomically.
    pub async fn check_overlap(&self, days: DayRange, exclude_id: Option<Ulid>) -> Option<Ulid> {
        let guard = self.bookings.read().await;
        find_conflict(&days, &guard, exclude_id).map(|b| b.id)
    }
}
