//! Booking lifecycle rules.
//!
//! Pure decision logic for the booking state machine, the availability
//! window rule and the staged rebooking validation. Route handlers load
//! rows, call into here, and persist the outcome; nothing in this module
//! touches the database.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{GuideStatus, UserRole};

/// Lifecycle state of a booking, stored as text on the `bookings` row.
///
/// Transitions only move forward: `pending` → `accepted`/`rejected`,
/// `pending`/`accepted` → `cancelled`, `accepted` → `completed`,
/// `completed` → `past` (archival).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
    Past,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Past => "past",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "accepted" => Some(BookingStatus::Accepted),
            "rejected" => Some(BookingStatus::Rejected),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            "past" => Some(BookingStatus::Past),
            _ => None,
        }
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Past
        )
    }
}

/// The forward-only transition table.
pub fn transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Accepted)
            | (Pending, Rejected)
            | (Pending, Cancelled)
            | (Accepted, Cancelled)
            | (Accepted, Completed)
            | (Completed, Past)
    )
}

/// Which side of a booking the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingParty {
    Tourist,
    Guide,
    Admin,
}

impl BookingParty {
    pub fn from_role(role: UserRole) -> Self {
        match role {
            UserRole::Admin => BookingParty::Admin,
            UserRole::Guide => BookingParty::Guide,
            UserRole::Tourist => BookingParty::Tourist,
        }
    }
}

/// Role guard on top of the transition table: the guide accepts, rejects
/// and completes; either party cancels; archival to `past` is an admin
/// housekeeping action.
pub fn party_may_transition(party: BookingParty, from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    if !transition_allowed(from, to) {
        return false;
    }
    match to {
        Accepted | Rejected | Completed => party == BookingParty::Guide,
        Cancelled => matches!(party, BookingParty::Tourist | BookingParty::Guide),
        Past => party == BookingParty::Admin,
        Pending => false,
    }
}

/// Availability window rule: bookable iff the window is on and the date
/// falls inside `[start_date, end_date]`, bounds inclusive.
pub fn window_covers(
    start_date: NaiveDate,
    end_date: NaiveDate,
    is_available: bool,
    date: NaiveDate,
) -> bool {
    is_available && start_date <= date && date <= end_date
}

/// Price snapshotted onto a booking at creation time.
pub fn booking_price(price: f32, price_type: &str, number_of_days: i32) -> f32 {
    match price_type {
        "per_day" => price * number_of_days as f32,
        _ => price,
    }
}

/// Only trips that ran to completion can be reviewed; archival to `past`
/// does not revoke the right.
pub fn reviewable(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Completed | BookingStatus::Past)
}

// ---------------------------------------------------------------------------
// Rebooking validation
// ---------------------------------------------------------------------------

/// What the rebooking checks saw of the guide row.
pub struct GuideSnapshot {
    pub status: Option<GuideStatus>,
    pub is_deactivated: bool,
}

/// What the rebooking checks saw of the guide's latest availability window.
pub struct WindowSnapshot {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RebookVerdict {
    Success,
    Warning,
    Error,
}

/// Terminal outcome of the staged validation, one row per check reached.
#[derive(Debug, Serialize)]
pub struct RebookCheck {
    pub stage: &'static str,
    pub verdict: RebookVerdict,
    pub message: String,
}

/// Re-validate a prior booking's guide, availability and itinerary for a
/// candidate date. Checks run in order and short-circuit on the first
/// failure; only a full pass yields `success`. `today` gates the candidate
/// date the same way booking creation does.
pub fn validate_rebooking(
    guide: Option<&GuideSnapshot>,
    window: Option<&WindowSnapshot>,
    itinerary_exists: bool,
    date: NaiveDate,
    today: NaiveDate,
) -> RebookCheck {
    if date < today {
        return RebookCheck {
            stage: "date",
            verdict: RebookVerdict::Warning,
            message: "Pick a date from today onwards.".to_string(),
        };
    }

    let guide = match guide {
        Some(g) => g,
        None => {
            return RebookCheck {
                stage: "guide",
                verdict: RebookVerdict::Error,
                message: "This guide is no longer on the platform.".to_string(),
            }
        }
    };
    if guide.status != Some(GuideStatus::Approved) || guide.is_deactivated {
        return RebookCheck {
            stage: "guide",
            verdict: RebookVerdict::Error,
            message: "This guide is not taking bookings anymore.".to_string(),
        };
    }

    match window {
        None => {
            return RebookCheck {
                stage: "availability",
                verdict: RebookVerdict::Warning,
                message: "The guide has not declared any availability.".to_string(),
            }
        }
        Some(w) if !w.is_available => {
            return RebookCheck {
                stage: "availability",
                verdict: RebookVerdict::Warning,
                message: "The guide is currently on leave.".to_string(),
            }
        }
        Some(w) if !window_covers(w.start_date, w.end_date, w.is_available, date) => {
            return RebookCheck {
                stage: "availability",
                verdict: RebookVerdict::Warning,
                message: format!(
                    "The guide is only available between {} and {}.",
                    w.start_date, w.end_date
                ),
            }
        }
        Some(_) => {}
    }

    if !itinerary_exists {
        return RebookCheck {
            stage: "itinerary",
            verdict: RebookVerdict::Error,
            message: "The original itinerary is no longer offered by this guide.".to_string(),
        };
    }

    RebookCheck {
        stage: "itinerary",
        verdict: RebookVerdict::Success,
        message: "Guide, availability and itinerary are all good to rebook.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn approved_guide() -> GuideSnapshot {
        GuideSnapshot {
            status: Some(GuideStatus::Approved),
            is_deactivated: false,
        }
    }

    fn open_window() -> WindowSnapshot {
        WindowSnapshot {
            start_date: d("2026-09-01"),
            end_date: d("2026-09-30"),
            is_available: true,
        }
    }

    fn today() -> NaiveDate {
        d("2026-08-01")
    }

    #[test]
    fn pending_never_advances_on_its_own() {
        // Only an explicit guide action moves a booking out of pending.
        assert!(party_may_transition(
            BookingParty::Guide,
            BookingStatus::Pending,
            BookingStatus::Accepted
        ));
        assert!(!party_may_transition(
            BookingParty::Tourist,
            BookingStatus::Pending,
            BookingStatus::Accepted
        ));
        assert!(!party_may_transition(
            BookingParty::Admin,
            BookingStatus::Pending,
            BookingStatus::Accepted
        ));
    }

    #[test]
    fn no_backward_or_skipping_transitions() {
        use BookingStatus::*;
        assert!(!transition_allowed(Accepted, Pending));
        assert!(!transition_allowed(Pending, Completed));
        assert!(!transition_allowed(Completed, Cancelled));
        assert!(!transition_allowed(Rejected, Accepted));
        assert!(!transition_allowed(Past, Completed));
    }

    #[test]
    fn terminal_states_are_dead_ends() {
        use BookingStatus::*;
        for from in [Rejected, Cancelled, Past] {
            assert!(from.is_terminal());
            for to in [Pending, Accepted, Rejected, Cancelled, Completed, Past] {
                assert!(!transition_allowed(from, to));
            }
        }
    }

    #[test]
    fn either_party_cancels_but_only_guide_completes() {
        use BookingStatus::*;
        assert!(party_may_transition(BookingParty::Tourist, Accepted, Cancelled));
        assert!(party_may_transition(BookingParty::Guide, Accepted, Cancelled));
        assert!(party_may_transition(BookingParty::Guide, Accepted, Completed));
        assert!(!party_may_transition(BookingParty::Tourist, Accepted, Completed));
    }

    #[test]
    fn archival_is_admin_only() {
        assert!(party_may_transition(
            BookingParty::Admin,
            BookingStatus::Completed,
            BookingStatus::Past
        ));
        assert!(!party_may_transition(
            BookingParty::Guide,
            BookingStatus::Completed,
            BookingStatus::Past
        ));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let (start, end) = (d("2026-09-01"), d("2026-09-30"));
        assert!(window_covers(start, end, true, d("2026-09-01")));
        assert!(window_covers(start, end, true, d("2026-09-30")));
        assert!(!window_covers(start, end, true, d("2026-10-01")));
        assert!(!window_covers(start, end, false, d("2026-09-15")));
    }

    #[test]
    fn per_day_price_scales_with_days() {
        assert_eq!(booking_price(50.0, "per_day", 3), 150.0);
        assert_eq!(booking_price(500.0, "fixed", 3), 500.0);
    }

    #[test]
    fn rebooking_missing_guide_is_an_error() {
        let check = validate_rebooking(None, None, true, d("2026-09-10"), today());
        assert_eq!(check.verdict, RebookVerdict::Error);
        assert_eq!(check.stage, "guide");
    }

    #[test]
    fn rebooking_deactivated_guide_is_an_error() {
        let guide = GuideSnapshot {
            status: Some(GuideStatus::Approved),
            is_deactivated: true,
        };
        let check =
            validate_rebooking(Some(&guide), Some(&open_window()), true, d("2026-09-10"), today());
        assert_eq!(check.verdict, RebookVerdict::Error);
        assert_eq!(check.stage, "guide");
    }

    #[test]
    fn rebooking_outside_window_is_a_warning() {
        let guide = approved_guide();
        let check =
            validate_rebooking(Some(&guide), Some(&open_window()), true, d("2026-10-15"), today());
        assert_eq!(check.verdict, RebookVerdict::Warning);
        assert_eq!(check.stage, "availability");
    }

    #[test]
    fn rebooking_guide_on_leave_is_a_warning() {
        let guide = approved_guide();
        let window = WindowSnapshot {
            is_available: false,
            ..open_window()
        };
        let check =
            validate_rebooking(Some(&guide), Some(&window), true, d("2026-09-10"), today());
        assert_eq!(check.verdict, RebookVerdict::Warning);
    }

    #[test]
    fn rebooking_dropped_itinerary_is_an_error() {
        let guide = approved_guide();
        let check =
            validate_rebooking(Some(&guide), Some(&open_window()), false, d("2026-09-10"), today());
        assert_eq!(check.verdict, RebookVerdict::Error);
        assert_eq!(check.stage, "itinerary");
    }

    #[test]
    fn rebooking_a_past_date_is_a_warning() {
        // Booking creation refuses past dates, so the advisory check must
        // never green-light one.
        let guide = approved_guide();
        let check = validate_rebooking(
            Some(&guide),
            Some(&open_window()),
            true,
            d("2026-07-20"),
            today(),
        );
        assert_eq!(check.verdict, RebookVerdict::Warning);
        assert_eq!(check.stage, "date");
    }

    #[test]
    fn only_completed_trips_are_reviewable() {
        use BookingStatus::*;
        for status in [Pending, Accepted, Rejected, Cancelled] {
            assert!(!reviewable(status));
        }
        assert!(reviewable(Completed));
        assert!(reviewable(Past));
    }

    #[test]
    fn rebooking_succeeds_when_all_checks_pass() {
        let guide = approved_guide();
        let check =
            validate_rebooking(Some(&guide), Some(&open_window()), true, d("2026-09-10"), today());
        assert_eq!(check.verdict, RebookVerdict::Success);
    }

    #[test]
    fn booking_status_text_is_stable() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Accepted,
            BookingStatus::Rejected,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::Past,
        ] {
            assert_eq!(BookingStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("confirmed"), None);
    }
}
