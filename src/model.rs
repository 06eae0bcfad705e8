use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Inclusive range of calendar days `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DayRange start must not be after end");
        Self { start, end }
    }

    /// Build a range from two days given in either order.
    pub fn ordered(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b { Self::new(a, b) } else { Self::new(b, a) }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    /// Number of calendar days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_range(&self, other: &DayRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Inclusive intersection test. Touching on the same day counts.
    pub fn overlaps(&self, other: &DayRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        end_of_day(self.end)
    }
}

/// First instant of `day`, 00:00:00.000 UTC.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last instant of `day`, 23:59:59.999 UTC. Stored booking ends use this so that a
/// stay ending on day N never reaches into day N+1.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + Duration::days(1) - Duration::milliseconds(1)
}

/// A committed reservation. Immutable once stored; only deletion changes the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub member: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Booking {
    /// Materialize a new booking with a store-assigned id, normalizing its days into
    /// start-of-day / end-of-day instants.
    pub fn from_new(id: Ulid, new: NewBooking) -> Self {
        let days = new.days();
        Self {
            id,
            title: new.title,
            start: days.start_instant(),
            end: days.end_instant(),
            member: new.member,
            notes: new.notes,
        }
    }

    /// Calendar days this booking occupies.
    pub fn days(&self) -> DayRange {
        DayRange::ordered(self.start.date_naive(), self.end.date_naive())
    }
}

/// A booking as submitted by a member, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub member: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn days(&self) -> DayRange {
        DayRange::ordered(self.start, self.end)
    }
}

/// Full copy of the committed booking list, in insertion order.
pub type Snapshot = Arc<Vec<Booking>>;

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingAdded(Booking),
    BookingRemoved { id: Ulid },
}

#[cfg(test)]
pub(crate) fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
