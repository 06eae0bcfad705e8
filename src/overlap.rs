use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Booking, DayRange};

/// Returns true if `[start, end]` collides with any booking in `existing`.
///
/// Comparison is per calendar day: a stay ending on day N and one starting on day
/// N+1 are fine, two stays sharing day N are not. `exclude_id` skips one booking so
/// a stored booking can be re-checked against everyone else. The arguments may be
/// given in either order.
pub fn overlaps(start: NaiveDate, end: NaiveDate, existing: &[Booking], exclude_id: Option<Ulid>) -> bool {
    find_conflict(&DayRange::ordered(start, end), existing, exclude_id).is_some()
}

/// First booking in `existing` that collides with `candidate`.
pub fn find_conflict<'a>(
    candidate: &DayRange,
    existing: &'a [Booking],
    exclude_id: Option<Ulid>,
) -> Option<&'a Booking> {
    existing
        .iter()
        .filter(|b| Some(b.id) != exclude_id)
        .find(|b| collides(candidate, &b.days()))
}

/// The three inclusive collision cases: candidate start inside the booking,
/// candidate end inside the booking, or the candidate wrapping the booking.
fn collides(candidate: &DayRange, booked: &DayRange) -> bool {
    booked.contains_day(candidate.start)
        || booked.contains_day(candidate.end)
        || candidate.contains_range(booked)
}
