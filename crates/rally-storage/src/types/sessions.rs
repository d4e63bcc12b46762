//! Session types.

use chrono::{DateTime, NaiveDate, Utc};

use super::{SessionId, SlotKey};

/// One dated occurrence of a recurring slot for a single voting week.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub slot: SlotKey,
    /// Local date of the Monday that opened this voting week.
    pub week_of: NaiveDate,
    pub play_at: DateTime<Utc>,
    /// Main-list limit, fixed when the session is created.
    pub capacity: u32,
    pub main_count: u32,
    pub waitlist_count: u32,
    /// Bumped by every ledger write on this session.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_main_full(&self) -> bool {
        self.main_count >= self.capacity
    }

    pub fn counts(&self) -> ListCounts {
        ListCounts {
            main: self.main_count,
            waitlist: self.waitlist_count,
        }
    }
}

/// Parameters for resolving (and lazily creating) a session
#[derive(Clone, Debug)]
pub struct CreateSessionParams {
    pub slot: SlotKey,
    pub week_of: NaiveDate,
    pub play_at: DateTime<Utc>,
    pub capacity: u32,
    pub created_at: DateTime<Utc>,
}

/// Main and waitlist sizes for a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListCounts {
    pub main: u32,
    pub waitlist: u32,
}
