//! Voting window policy.
//!
//! Voting for a session opens on the Monday of the session's week at the
//! configured opening time and closes at the configured closing time on the
//! session's own calendar day, both in the club's local time zone. The close
//! is tied to the play *date*, not the play time: an evening session closes
//! hours before play, an early-morning one closes after it.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::ScheduleError;

/// Whether a session currently accepts casts and withdrawals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowStatus {
    NotYetOpen { opens_at: DateTime<Utc> },
    Open { closes_at: DateTime<Utc> },
    Closed { closed_at: DateTime<Utc> },
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, WindowStatus::Open { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            WindowStatus::NotYetOpen { .. } => "not yet open",
            WindowStatus::Open { .. } => "open",
            WindowStatus::Closed { .. } => "closed",
        }
    }

    /// Time left before the window closes, for deadline countdowns.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            WindowStatus::Open { closes_at } if *closes_at > now => Some(*closes_at - now),
            _ => None,
        }
    }
}

impl std::fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowStatus::NotYetOpen { opens_at } => {
                write!(f, "voting not yet open (opens at {})", opens_at)
            }
            WindowStatus::Open { closes_at } => write!(f, "voting open until {}", closes_at),
            WindowStatus::Closed { closed_at } => write!(f, "voting closed at {}", closed_at),
        }
    }
}

/// Pure evaluator of the weekly voting window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VotingWindow {
    tz: Tz,
    opens_at: NaiveTime,
    closes_at: NaiveTime,
}

impl VotingWindow {
    pub fn new(tz: Tz, opens_at: NaiveTime, closes_at: NaiveTime) -> Self {
        Self {
            tz,
            opens_at,
            closes_at,
        }
    }

    pub fn opens_at_time(&self) -> NaiveTime {
        self.opens_at
    }

    /// Evaluate the window of the session playing at `play_at` as of `now`.
    pub fn status(
        &self,
        play_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<WindowStatus, ScheduleError> {
        let play_date = play_at.with_timezone(&self.tz).date_naive();
        let opens_at = localize(self.tz, monday_of(play_date), self.opens_at)?;
        let closes_at = localize(self.tz, play_date, self.closes_at)?;

        Ok(if now < opens_at {
            WindowStatus::NotYetOpen { opens_at }
        } else if now >= closes_at {
            WindowStatus::Closed {
                closed_at: closes_at,
            }
        } else {
            WindowStatus::Open { closes_at }
        })
    }
}

/// The Monday of the ISO week containing `date`.
pub(crate) fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Resolve a local wall-clock reading to an instant. Ambiguous readings
/// (DST fall-back) take the earlier instant; skipped ones are an error.
pub(crate) fn localize(
    tz: Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<Utc>, ScheduleError> {
    let local = date.and_time(time);
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(ScheduleError::NonexistentLocalTime(local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Toronto;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Toronto
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn window() -> VotingWindow {
        VotingWindow::new(Toronto, hm(18, 0), hm(11, 0))
    }

    #[test]
    fn test_window_boundaries_for_wednesday_evening() {
        let play_at = local(2026, 10, 21, 20, 0);
        let opens = local(2026, 10, 19, 18, 0);
        let closes = local(2026, 10, 21, 11, 0);

        let before = window()
            .status(play_at, opens - Duration::seconds(1))
            .unwrap();
        assert_eq!(before, WindowStatus::NotYetOpen { opens_at: opens });
        assert!(!before.is_open());
        assert_eq!(before.reason(), "not yet open");

        let at_open = window().status(play_at, opens).unwrap();
        assert_eq!(at_open, WindowStatus::Open { closes_at: closes });

        let last_moment = window()
            .status(play_at, closes - Duration::seconds(1))
            .unwrap();
        assert!(last_moment.is_open());

        let at_close = window().status(play_at, closes).unwrap();
        assert_eq!(at_close, WindowStatus::Closed { closed_at: closes });
        assert_eq!(at_close.reason(), "closed");

        // Closed nine hours before an 8PM game, as the club runs it.
        assert_eq!(play_at - closes, Duration::hours(9));
    }

    #[test]
    fn test_early_morning_session_closes_after_play_time() {
        let play_at = local(2026, 10, 24, 6, 0);
        let status = window().status(play_at, local(2026, 10, 24, 8, 0)).unwrap();
        assert_eq!(
            status,
            WindowStatus::Open {
                closes_at: local(2026, 10, 24, 11, 0)
            }
        );
    }

    #[test]
    fn test_sunday_session_opens_previous_monday() {
        let play_at = local(2026, 10, 25, 7, 0);
        let status = window().status(play_at, local(2026, 10, 19, 17, 0)).unwrap();
        assert_eq!(
            status,
            WindowStatus::NotYetOpen {
                opens_at: local(2026, 10, 19, 18, 0)
            }
        );
    }

    #[test]
    fn test_window_across_dst_change() {
        // Clocks fall back on Sunday 2026-11-01; Monday opens in EDT, Sunday closes in EST.
        let play_at = local(2026, 11, 1, 7, 0);
        let opens = Utc.with_ymd_and_hms(2026, 10, 26, 22, 0, 0).unwrap();
        let closes = Utc.with_ymd_and_hms(2026, 11, 1, 16, 0, 0).unwrap();

        assert_eq!(
            window().status(play_at, opens).unwrap(),
            WindowStatus::Open { closes_at: closes }
        );
        assert_eq!(
            window().status(play_at, closes).unwrap(),
            WindowStatus::Closed { closed_at: closes }
        );
    }

    #[test]
    fn test_time_remaining_only_while_open() {
        let play_at = local(2026, 10, 22, 20, 0);
        let now = local(2026, 10, 22, 9, 30);
        let status = window().status(play_at, now).unwrap();
        assert_eq!(status.time_remaining(now), Some(Duration::minutes(90)));

        let closed = window().status(play_at, local(2026, 10, 22, 12, 0)).unwrap();
        assert_eq!(closed.time_remaining(now), None);
    }

    #[test]
    fn test_display_mentions_boundary() {
        let at = Utc.with_ymd_and_hms(2026, 10, 21, 15, 0, 0).unwrap();
        let text = WindowStatus::Closed { closed_at: at }.to_string();
        assert!(text.starts_with("voting closed at 2026-10-21 15:00:00"));
    }

    #[test]
    fn test_monday_of() {
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(monday_of(sunday), monday);
        assert_eq!(monday_of(monday), monday);
    }

    #[test]
    fn test_localize_rejects_skipped_time() {
        // 2026-03-08 02:30 does not exist in Toronto.
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let err = localize(Toronto, date, hm(2, 30)).unwrap_err();
        assert!(matches!(err, ScheduleError::NonexistentLocalTime(_)));
    }
}
