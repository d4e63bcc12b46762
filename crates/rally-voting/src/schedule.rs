//! Schedule registry: maps a slot plus the current instant to a concrete session.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rally_config::{ClubConfig, SlotConfig};
use rally_storage::SlotKey;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::window::{localize, monday_of, VotingWindow};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("slot '{0}' is not configured")]
    UnconfiguredSlot(SlotKey),
    #[error("local time {0} does not exist in the club time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

/// Start of the voting week a given instant belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekAnchor {
    /// Local Monday of the week.
    pub week_of: NaiveDate,
    /// Instant voting opened for that week.
    pub opens_at: DateTime<Utc>,
}

/// A slot resolved to a concrete session occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSlot {
    pub slot: SlotKey,
    pub week_of: NaiveDate,
    pub play_at: DateTime<Utc>,
    pub capacity: u32,
}

#[derive(Clone, Debug)]
pub struct Schedule {
    tz: Tz,
    window: VotingWindow,
    slots: BTreeMap<SlotKey, SlotConfig>,
}

impl Schedule {
    pub fn from_config(config: &ClubConfig) -> Self {
        Self {
            tz: config.timezone,
            window: VotingWindow::new(
                config.timezone,
                config.window.opens_at,
                config.window.closes_at,
            ),
            slots: config.slots.clone(),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn window(&self) -> &VotingWindow {
        &self.window
    }

    /// The most recent local Monday opening time at or before `now`.
    ///
    /// Before Monday's opening the previous week is still current, so a
    /// Sunday-morning session keeps resolving to the week it belongs to.
    pub fn voting_week_anchor(&self, now: DateTime<Utc>) -> Result<WeekAnchor, ScheduleError> {
        let today = now.with_timezone(&self.tz).date_naive();
        let monday = monday_of(today);
        let opens_at = localize(self.tz, monday, self.window.opens_at_time())?;
        if now >= opens_at {
            return Ok(WeekAnchor {
                week_of: monday,
                opens_at,
            });
        }

        let previous = monday - Days::new(7);
        Ok(WeekAnchor {
            week_of: previous,
            opens_at: localize(self.tz, previous, self.window.opens_at_time())?,
        })
    }

    /// The session of `slot` in the voting week current at `now`.
    pub fn resolve(&self, slot: SlotKey, now: DateTime<Utc>) -> Result<SessionSlot, ScheduleError> {
        let anchor = self.voting_week_anchor(now)?;
        self.resolve_in_week(slot, anchor.week_of)
    }

    /// The session of `slot` in the week containing `date`.
    pub fn resolve_in_week(
        &self,
        slot: SlotKey,
        date: NaiveDate,
    ) -> Result<SessionSlot, ScheduleError> {
        let config = self
            .slots
            .get(&slot)
            .ok_or(ScheduleError::UnconfiguredSlot(slot))?;
        let week_of = monday_of(date);
        let play_date = week_of + Days::new(u64::from(slot.days_from_monday()));

        Ok(SessionSlot {
            slot,
            week_of,
            play_at: localize(self.tz, play_date, config.play_time)?,
            capacity: config.capacity,
        })
    }
}
