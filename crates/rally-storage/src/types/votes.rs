//! Vote ledger types.

use chrono::{DateTime, Utc};

use super::{ListKind, Member, MemberId, Session, SessionId, SlotKey, VoteId};

/// A member's registration for a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteEntry {
    pub id: VoteId,
    pub session_id: SessionId,
    pub member: Member,
    pub list: ListKind,
    /// Store-assigned position in the session's write order. FIFO key.
    pub cast_seq: i64,
    pub cast_at: DateTime<Utc>,
    /// Set only when the entry was moved from the waitlist to the main list.
    pub promoted_at: Option<DateTime<Utc>>,
}

/// A vote together with the session it belongs to, for history views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberVote {
    pub vote: VoteEntry,
    pub slot: SlotKey,
    pub play_at: DateTime<Utc>,
}

/// Parameters for appending a vote to the ledger
#[derive(Clone, Debug)]
pub struct CastVoteParams {
    pub session_id: SessionId,
    /// Session version observed when the preconditions were checked.
    pub expected_version: i64,
    pub member: Member,
    pub list: ListKind,
    pub cast_at: DateTime<Utc>,
}

/// Waitlist entry chosen to fill the main-list slot freed by a withdrawal
#[derive(Clone, Debug)]
pub struct PromoteParams {
    pub vote_id: VoteId,
    pub promoted_at: DateTime<Utc>,
}

/// Parameters for removing a vote (and optionally promoting a waitlisted one)
#[derive(Clone, Debug)]
pub struct WithdrawVoteParams {
    pub session_id: SessionId,
    /// Session version observed when the withdrawal was planned.
    pub expected_version: i64,
    pub member_id: MemberId,
    pub promote: Option<PromoteParams>,
}

/// Result of an applied withdrawal.
#[derive(Clone, Debug)]
pub struct Withdrawal {
    pub removed: VoteEntry,
    pub promoted: Option<VoteEntry>,
    /// Session row after the write, counters included.
    pub session: Session,
}
