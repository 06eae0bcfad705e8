//! Members' calendar view: the working set of bookings mirrored from a store, the
//! date range being picked, and the submit / delete flows with their user notices.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::error::ErrorKind;
use crate::model::{Booking, DayRange, NewBooking, Snapshot};
use crate::notify::Subscription;
use crate::overlap::find_conflict;
use crate::selection::{Selection, SelectionError, SelectionRange, SlotSelection};
use crate::store::BookingStore;

/// What the display widget draws for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: Ulid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub member: String,
}

impl From<&Booking> for CalendarEvent {
    fn from(b: &Booking) -> Self {
        Self {
            id: b.id,
            title: b.title.clone(),
            start: b.start,
            end: b.end,
            member: b.member.clone(),
        }
    }
}

/// Form fields filled in once a range is selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDetails {
    pub title: String,
    pub member: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Keeps the form open until the member fixes the input.
    Blocking,
    /// Shown once and dismissed.
    Transient,
    /// Sends the member back to the login prompt.
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug)]
pub enum CalendarError {
    Selection(SelectionError),
    /// The store rejected or failed the request.
    Store(EngineError),
    /// Delete found nothing with that id.
    NotFound(Ulid),
}

impl CalendarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalendarError::Selection(_) => ErrorKind::Validation,
            CalendarError::Store(e) => e.kind(),
            CalendarError::NotFound(_) => ErrorKind::Store,
        }
    }

    pub fn notice(&self) -> Notice {
        let (severity, message) = match self {
            CalendarError::Store(EngineError::Conflict(_)) => (
                Severity::Blocking,
                "These dates overlap an existing booking. Please choose different dates.".to_string(),
            ),
            CalendarError::NotFound(_) => (Severity::Transient, "Failed to delete booking.".to_string()),
            other => match other.kind() {
                ErrorKind::Validation | ErrorKind::Protocol => (Severity::Blocking, other.to_string()),
                ErrorKind::Store => (Severity::Transient, format!("Something went wrong: {other}")),
                ErrorKind::Auth => (Severity::Redirect, "Please log in again.".to_string()),
            },
        };
        Notice { severity, message }
    }
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::Selection(e) => write!(f, "{e}"),
            CalendarError::Store(e) => write!(f, "{e}"),
            CalendarError::NotFound(id) => write!(f, "no booking with id {id}"),
        }
    }
}

impl std::error::Error for CalendarError {}

impl From<SelectionError> for CalendarError {
    fn from(e: SelectionError) -> Self {
        CalendarError::Selection(e)
    }
}

impl From<EngineError> for CalendarError {
    fn from(e: EngineError) -> Self {
        CalendarError::Store(e)
    }
}

/// Calendar state for one member's view.
///
/// The store owns the bookings; this keeps a read-through copy replaced wholesale by
/// every snapshot. Overlap is pre-checked here against that copy, and the store
/// checks again when it commits.
pub struct BookingCalendar<S: BookingStore + ?Sized> {
    store: Arc<S>,
    bookings: Snapshot,
    loading: bool,
    selection: Selection,
}

impl<S: BookingStore + ?Sized> BookingCalendar<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            bookings: Arc::new(Vec::new()),
            loading: true,
            selection: Selection::new(),
        }
    }

    /// Open the live list on the store.
    pub async fn subscribe(&self) -> Result<Subscription, CalendarError> {
        Ok(self.store.list().await?)
    }

    /// Replace the working set with a full snapshot.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.bookings = snapshot;
        self.loading = false;
    }

    /// Wait for the next snapshot on `sub` and apply it. Returns false once the
    /// subscription has ended.
    pub async fn refresh(&mut self, sub: &mut Subscription) -> bool {
        match sub.next().await {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    /// True until the first snapshot has been applied.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.bookings.iter().map(CalendarEvent::from).collect()
    }

    pub fn selection(&self) -> SelectionRange {
        self.selection.as_range()
    }

    pub fn form_open(&self) -> bool {
        self.selection.form_open()
    }

    pub fn pick_day(&mut self, day: NaiveDate) {
        self.selection.pick(day);
    }

    pub fn select_slot(&mut self, slot: SlotSelection) {
        self.selection.apply(slot);
    }

    pub fn edit_start(&mut self, day: NaiveDate) -> Result<DayRange, CalendarError> {
        Ok(self.selection.edit_start(day)?)
    }

    pub fn edit_end(&mut self, day: NaiveDate) -> Result<DayRange, CalendarError> {
        Ok(self.selection.edit_end(day)?)
    }

    pub fn cancel(&mut self) {
        self.selection.cancel();
    }

    /// Booking in the working set that the current selection would collide with.
    pub fn selection_conflict(&self) -> Option<&Booking> {
        let range = self.selection.range()?;
        find_conflict(&range, &self.bookings, None)
    }

    /// Submit the open form. On any error the selection stays as it was so the
    /// member can adjust and retry.
    pub async fn submit(&mut self, details: BookingDetails) -> Result<Booking, CalendarError> {
        let range = self.selection.range().ok_or(SelectionError::NoRange)?;
        if let Some(existing) = find_conflict(&range, &self.bookings, None) {
            info!("submit blocked locally, overlaps {}", existing.id);
            return Err(EngineError::Conflict(existing.id).into());
        }

        let new = NewBooking {
            title: details.title,
            start: range.start,
            end: range.end,
            member: details.member,
            notes: details.notes,
        };
        let booking = self.store.add(new).await?;
        self.selection.complete();
        Ok(booking)
    }

    pub async fn delete(&mut self, id: Ulid) -> Result<(), CalendarError> {
        if self.store.remove(id).await? {
            Ok(())
        } else {
            warn!("delete of unknown booking {id}");
            Err(CalendarError::NotFound(id))
        }
    }
}
