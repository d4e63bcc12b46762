//! rally-voting - Weekly session voting with waitlist promotion
//!
//! Members register ("vote") for the club's recurring weekly sessions. Each
//! session has a main list capped at its capacity and an unbounded waitlist.
//! When a main-list member withdraws, the earliest waitlisted member is
//! promoted in the same atomic write.
//!
//! # Architecture
//!
//! - [`Schedule`] maps a slot and an instant to a dated session
//! - [`VotingWindow`] decides whether that session accepts changes
//! - [`VotingService`] runs the check-then-write sequences against a
//!   [`rally_storage::Store`], serialized per session in-process and guarded
//!   by the session version across processes
//!
//! Time always comes from the service's [`Clock`], never from the caller.

use rally_storage::StoreError;
use thiserror::Error;

mod clock;
mod locks;
pub mod promotion;
mod schedule;
mod service;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use locks::{SessionGuard, SessionLocks};
pub use schedule::{Schedule, ScheduleError, SessionSlot, WeekAnchor};
pub use service::{CounterCheck, SessionRoster, VotingService, WithdrawOutcome};
pub use window::{VotingWindow, WindowStatus};

/// Voting service errors
#[derive(Debug, Error)]
pub enum VotingError {
    #[error("{0}")]
    VotingClosed(WindowStatus),

    #[error("Member already has a vote for this session")]
    AlreadyVoted,

    #[error("Member has no vote for this session")]
    VoteNotFound,

    #[error("Insufficient balance: {balance_cents} cents, {required_cents} required")]
    InsufficientBalance {
        balance_cents: i64,
        required_cents: i64,
    },

    #[error("Main list is full ({capacity} players)")]
    MainListFull { capacity: u32 },

    #[error("Session was modified concurrently, try again")]
    ConcurrencyConflict,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl VotingError {
    /// Whether the same request may succeed if simply re-submitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VotingError::ConcurrencyConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(VotingError::ConcurrencyConflict.is_retryable());
        assert!(!VotingError::AlreadyVoted.is_retryable());
        assert!(!VotingError::MainListFull { capacity: 20 }.is_retryable());
        assert!(!VotingError::Storage(StoreError::Conflict).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = VotingError::InsufficientBalance {
            balance_cents: 1_200,
            required_cents: 5_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 1200 cents, 5000 required"
        );
        assert_eq!(
            VotingError::MainListFull { capacity: 36 }.to_string(),
            "Main list is full (36 players)"
        );
    }
}
