use chrono::Datelike;
use ulid::Ulid;

use crate::model::*;
use crate::overlap::find_conflict;

use super::EngineError;

/// Check field rules and limits, returning the booking with its text fields
/// trimmed. Blank notes become `None`.
pub fn validate_new_booking(new: NewBooking) -> Result<NewBooking, EngineError> {
    use crate::limits::*;

    let days = new.days();
    let title = new.title.trim().to_string();
    let member = new.member.trim().to_string();
    if title.is_empty() {
        return Err(EngineError::Invalid("title is required".into()));
    }
    if member.is_empty() {
        return Err(EngineError::Invalid("member name is required".into()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("title too long"));
    }
    if member.len() > MAX_MEMBER_LEN {
        return Err(EngineError::LimitExceeded("member name too long"));
    }
    let notes = new
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if notes.as_ref().is_some_and(|n| n.len() > MAX_NOTES_LEN) {
        return Err(EngineError::LimitExceeded("notes too long"));
    }

    if days.start.year() < MIN_VALID_YEAR || days.end.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    if days.len_days() > MAX_STAY_DAYS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }

    Ok(NewBooking {
        title,
        start: days.start,
        end: days.end,
        member,
        notes,
    })
}

/// Reject `days` if it collides with any committed booking other than `exclude_id`.
pub fn check_no_conflict(bookings: &[Booking], days: &DayRange, exclude_id: Option<Ulid>) -> Result<(), EngineError> {
    match find_conflict(days, bookings, exclude_id) {
        Some(existing) => Err(EngineError::Conflict(existing.id)),
        None => Ok(()),
    }
}
