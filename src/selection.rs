use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::DayRange;

/// How the calendar widget produced a slot selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectAction {
    Click,
    DoubleClick,
    /// Drag across one or more day cells.
    Select,
}

/// Raw selection event forwarded by the calendar widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSelection {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub action: SelectAction,
}

/// The dates picked so far. `end` is only ever set together with `start`, and
/// never before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionError {
    /// A date field was edited while no range was complete.
    NoRange,
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::NoRange => write!(f, "select a start and end date first"),
        }
    }
}

impl std::error::Error for SelectionError {}

/// Two-click date range picker.
///
/// `Empty -> StartPicked -> RangeComplete`, back to `Empty` on cancel or once the
/// booking is committed. A pick while the range is already complete starts over
/// from that day. A second pick before the first is swapped so the range always
/// reads forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Empty,
    StartPicked(NaiveDate),
    RangeComplete(DayRange),
}

impl Selection {
    pub fn new() -> Self {
        Self::Empty
    }

    /// Feed one day click.
    pub fn pick(&mut self, day: NaiveDate) {
        *self = match *self {
            Selection::Empty | Selection::RangeComplete(_) => Selection::StartPicked(day),
            Selection::StartPicked(start) => Selection::RangeComplete(DayRange::ordered(start, day)),
        };
    }

    /// Feed a widget selection event. A multi-day drag completes the range in one
    /// step; clicks and single-cell drags count as one pick.
    pub fn apply(&mut self, slot: SlotSelection) {
        match slot.action {
            SelectAction::Select if slot.start != slot.end => {
                *self = Selection::RangeComplete(DayRange::ordered(slot.start, slot.end));
            }
            _ => self.pick(slot.start),
        }
    }

    /// Edit the start field of the open form. A start past the current end drags
    /// the end along with it.
    pub fn edit_start(&mut self, day: NaiveDate) -> Result<DayRange, SelectionError> {
        let Selection::RangeComplete(range) = *self else {
            return Err(SelectionError::NoRange);
        };
        let next = DayRange::new(day, range.end.max(day));
        *self = Selection::RangeComplete(next);
        Ok(next)
    }

    /// Edit the end field of the open form. An end before the current start pulls
    /// the start back to it.
    pub fn edit_end(&mut self, day: NaiveDate) -> Result<DayRange, SelectionError> {
        let Selection::RangeComplete(range) = *self else {
            return Err(SelectionError::NoRange);
        };
        let next = DayRange::new(range.start.min(day), day);
        *self = Selection::RangeComplete(next);
        Ok(next)
    }

    pub fn cancel(&mut self) {
        *self = Selection::Empty;
    }

    /// Take the completed range and reset. Leaves the state untouched and returns
    /// `None` if the range is not complete yet.
    pub fn complete(&mut self) -> Option<DayRange> {
        let range = self.range()?;
        *self = Selection::Empty;
        Some(range)
    }

    pub fn range(&self) -> Option<DayRange> {
        match self {
            Selection::RangeComplete(range) => Some(*range),
            _ => None,
        }
    }

    /// Whether the booking form should be showing.
    pub fn form_open(&self) -> bool {
        matches!(self, Selection::RangeComplete(_))
    }

    pub fn as_range(&self) -> SelectionRange {
        match *self {
            Selection::Empty => SelectionRange::default(),
            Selection::StartPicked(start) => SelectionRange { start: Some(start), end: None },
            Selection::RangeComplete(r) => SelectionRange { start: Some(r.start), end: Some(r.end) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::day;

    fn aug(d: u32) -> NaiveDate {
        day(2024, 8, d)
    }

    #[test]
    fn two_picks_complete_the_range() {
        let mut sel = Selection::new();
        assert!(!sel.form_open());
        sel.pick(aug(3));
        assert_eq!(sel, Selection::StartPicked(aug(3)));
        assert_eq!(sel.as_range(), SelectionRange { start: Some(aug(3)), end: None });
        assert!(!sel.form_open());
        sel.pick(aug(7));
        assert!(sel.form_open());
        assert_eq!(sel.range(), Some(DayRange::new(aug(3), aug(7))));
    }

    #[test]
    fn backwards_second_pick_is_swapped() {
        let mut sel = Selection::new();
        sel.pick(aug(10));
        sel.pick(aug(4));
        let r = sel.range().unwrap();
        assert_eq!(r.start, aug(4));
        assert_eq!(r.end, aug(10));
    }

    #[test]
    fn same_day_twice_is_single_day_range() {
        let mut sel = Selection::new();
        sel.pick(aug(4));
        sel.pick(aug(4));
        assert_eq!(sel.range(), Some(DayRange::single(aug(4))));
    }

    #[test]
    fn third_pick_restarts_selection() {
        let mut sel = Selection::new();
        sel.pick(aug(1));
        sel.pick(aug(5));
        sel.pick(aug(20));
        assert_eq!(sel, Selection::StartPicked(aug(20)));
        assert!(!sel.form_open());
        sel.pick(aug(22));
        assert_eq!(sel.range(), Some(DayRange::new(aug(20), aug(22))));
    }

    #[test]
    fn cancel_resets_from_any_state() {
        let mut sel = Selection::new();
        sel.pick(aug(1));
        sel.cancel();
        assert_eq!(sel, Selection::Empty);
        sel.pick(aug(1));
        sel.pick(aug(2));
        sel.cancel();
        assert_eq!(sel, Selection::Empty);
        assert_eq!(sel.as_range(), SelectionRange::default());
    }

    #[test]
    fn complete_takes_range_and_resets() {
        let mut sel = Selection::new();
        assert_eq!(sel.complete(), None);
        sel.pick(aug(1));
        assert_eq!(sel.complete(), None);
        assert_eq!(sel, Selection::StartPicked(aug(1))); // untouched
        sel.pick(aug(3));
        assert_eq!(sel.complete(), Some(DayRange::new(aug(1), aug(3))));
        assert_eq!(sel, Selection::Empty);
    }

    #[test]
    fn edit_start_past_end_advances_end() {
        let mut sel = Selection::new();
        sel.pick(aug(1));
        sel.pick(aug(5));
        let r = sel.edit_start(aug(9)).unwrap();
        assert_eq!(r, DayRange::single(aug(9)));
        let r = sel.edit_start(aug(7)).unwrap();
        assert_eq!(r, DayRange::new(aug(7), aug(9)));
    }

    #[test]
    fn edit_end_before_start_pulls_start_back() {
        let mut sel = Selection::new();
        sel.pick(aug(10));
        sel.pick(aug(15));
        let r = sel.edit_end(aug(2)).unwrap();
        assert_eq!(r, DayRange::single(aug(2)));
        let r = sel.edit_end(aug(6)).unwrap();
        assert_eq!(r, DayRange::new(aug(2), aug(6)));
    }

    #[test]
    fn edits_require_a_complete_range() {
        let mut sel = Selection::new();
        assert_eq!(sel.edit_start(aug(1)), Err(SelectionError::NoRange));
        sel.pick(aug(1));
        assert_eq!(sel.edit_end(aug(3)), Err(SelectionError::NoRange));
        assert_eq!(sel, Selection::StartPicked(aug(1)));
    }

    #[test]
    fn drag_selection_completes_in_one_step() {
        let mut sel = Selection::new();
        sel.apply(SlotSelection { start: aug(12), end: aug(9), action: SelectAction::Select });
        assert_eq!(sel.range(), Some(DayRange::new(aug(9), aug(12))));
    }

    #[test]
    fn single_cell_drag_and_clicks_are_picks() {
        let mut sel = Selection::new();
        sel.apply(SlotSelection { start: aug(2), end: aug(2), action: SelectAction::Select });
        assert_eq!(sel, Selection::StartPicked(aug(2)));
        sel.apply(SlotSelection { start: aug(4), end: aug(4), action: SelectAction::DoubleClick });
        assert_eq!(sel.range(), Some(DayRange::new(aug(2), aug(4))));
        sel.apply(SlotSelection { start: aug(8), end: aug(8), action: SelectAction::Click });
        assert_eq!(sel, Selection::StartPicked(aug(8)));
    }

    #[test]
    fn slot_selection_from_widget_json() {
        let raw = r#"{"start":"2024-08-01","end":"2024-08-03","action":"select"}"#;
        let slot: SlotSelection = serde_json::from_str(raw).unwrap();
        assert_eq!(slot.action, SelectAction::Select);
        assert_eq!(slot.end, aug(3));
    }
}
