//! Canteen availability gate
//!
//! Decides whether checkout may start. Precedence:
//! 1. owner's manual switch
//! 2. backend `isCurrentlyOpen`
//! 3. same-day `HH:mm` window in the canteen timezone (malformed → open)

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use shared::models::Canteen;

/// Reason reported when the owner switched the canteen off
pub const MANUALLY_CLOSED: &str = "Manually Closed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Open,
    Closed { reason: String },
}

impl Availability {
    pub fn is_open(&self) -> bool {
        matches!(self, Availability::Open)
    }
}

/// Evaluate the gate for `canteen` at instant `now`
pub fn check(canteen: &Canteen, now: DateTime<Utc>, tz: FixedOffset) -> Availability {
    if canteen.is_open == Some(false) {
        return Availability::Closed {
            reason: MANUALLY_CLOSED.to_string(),
        };
    }

    if let Some(open) = canteen.is_currently_open {
        return if open {
            Availability::Open
        } else {
            closed_outside_hours(canteen)
        };
    }

    let (Some(opening), Some(closing)) = (
        canteen.opening_time.as_deref().and_then(parse_hhmm),
        canteen.closing_time.as_deref().and_then(parse_hhmm),
    ) else {
        return Availability::Open;
    };

    let local = now.with_timezone(&tz).time();
    if opening <= local && local < closing {
        Availability::Open
    } else {
        closed_outside_hours(canteen)
    }
}

fn closed_outside_hours(canteen: &Canteen) -> Availability {
    let reason = match canteen.hours_label() {
        Some(hours) => format!("Closed now. Open {}", hours),
        None => "Closed now".to_string(),
    };
    Availability::Closed { reason }
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| {
            tracing::warn!(value, error = %e, "Unparseable canteen hours, treating as open");
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(330 * 60).unwrap()
    }

    /// UTC instant for a wall-clock time in IST
    fn at_ist(hour: u32, minute: u32) -> DateTime<Utc> {
        ist()
            .with_ymd_and_hms(2026, 3, 2, hour, minute, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_manual_switch_wins() {
        let mut canteen = Canteen::new("c1", "North Block");
        canteen.is_open = Some(false);
        canteen.is_currently_open = Some(true);
        assert_eq!(
            check(&canteen, at_ist(12, 0), ist()),
            Availability::Closed {
                reason: MANUALLY_CLOSED.into()
            }
        );
    }

    #[test]
    fn test_backend_flag_overrides_hours() {
        let mut canteen = Canteen::new("c1", "North Block").with_hours("09:00", "17:00");
        canteen.is_currently_open = Some(false);
        assert_eq!(
            check(&canteen, at_ist(12, 0), ist()),
            Availability::Closed {
                reason: "Closed now. Open 09:00 - 17:00".into()
            }
        );

        canteen.is_currently_open = Some(true);
        assert!(check(&canteen, at_ist(22, 0), ist()).is_open());
    }

    #[test]
    fn test_hours_window_in_canteen_timezone() {
        let canteen = Canteen::new("c1", "North Block").with_hours("09:00", "17:00");
        assert!(check(&canteen, at_ist(9, 0), ist()).is_open());
        assert!(check(&canteen, at_ist(16, 59), ist()).is_open());
        assert!(!check(&canteen, at_ist(17, 0), ist()).is_open());
        assert!(!check(&canteen, at_ist(8, 59), ist()).is_open());
    }

    #[test]
    fn test_overnight_window_is_not_supported() {
        let canteen = Canteen::new("c1", "Night Canteen").with_hours("22:00", "02:00");
        assert!(!check(&canteen, at_ist(23, 0), ist()).is_open());
    }

    #[test]
    fn test_malformed_or_missing_hours_fail_open() {
        let canteen = Canteen::new("c1", "North Block").with_hours("9am", "17:00");
        assert!(check(&canteen, at_ist(3, 0), ist()).is_open());
        assert!(check(&Canteen::new("c2", "South"), at_ist(3, 0), ist()).is_open());
    }
}
