use tokio::sync::oneshot;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_new_booking};
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Insert a booking if, and only if, its days are still free.
    ///
    /// The overlap check runs under the write lock, so two members racing for the
    /// same days cannot both win: the loser gets `EngineError::Conflict`.
    pub async fn add_booking(&self, new: NewBooking) -> Result<Booking, EngineError> {
        let new = validate_new_booking(new)?;
        let mut guard = self.bookings.write().await;
        if guard.len() >= MAX_BOOKINGS {
            return Err(EngineError::LimitExceeded("too many bookings"));
        }

        check_no_conflict(&guard, &new.days(), None)?;

        let booking = Booking::from_new(Ulid::new(), new);
        let event = Event::BookingAdded(booking.clone());
        self.persist_and_apply(&mut guard, &event).await?;
        info!(
            "booking {} added: {} {}..{}",
            booking.id,
            booking.member,
            booking.start.date_naive(),
            booking.end.date_naive()
        );
        Ok(booking)
    }

    /// Delete by id. Returns `Ok(false)` without touching the WAL when no booking
    /// has that id.
    pub async fn remove_booking(&self, id: Ulid) -> Result<bool, EngineError> {
        let mut guard = self.bookings.write().await;
        if !guard.iter().any(|b| b.id == id) {
            debug!("remove skipped, no booking {id}");
            return Ok(false);
        }
        let event = Event::BookingRemoved { id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("booking {id} removed");
        Ok(true)
    }

    /// Compact the WAL by rewriting it with one `BookingAdded` per live booking, in
    /// list order.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // Hold the read lock until the swap is done so no append can land in the
        // old file after the snapshot was taken.
        let guard = self.bookings.read().await;
        let events: Vec<Event> = guard.iter().cloned().map(Event::BookingAdded).collect();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guard);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
