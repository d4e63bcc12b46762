//! The Store trait that backends implement.

use chrono::NaiveDate;

use crate::types::*;
use crate::StoreError;

/// The storage trait `rally-voting` depends on.
///
/// Every method that changes the vote ledger is a single atomic unit and
/// is **conditional on the session version** the caller observed. When the
/// version has moved the backend must apply nothing and return
/// [`StoreError::Conflict`].
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // ───────────────────────────────────── Sessions ───────────────────────────────────────

    /// Return the session for `(slot, week_of)`, inserting it with zeroed counters
    /// if it does not exist yet. Concurrent callers observe the same row.
    async fn get_or_create_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<Session, StoreError>;

    /// Get session by ID.
    async fn get_session(&self, session_id: &SessionId) -> Result<Session, StoreError>;

    /// List all sessions of one voting week, ordered by play time.
    async fn list_sessions(&self, week_of: NaiveDate) -> Result<Vec<Session>, StoreError>;

    // ───────────────────────────────────── Vote ledger ────────────────────────────────────

    /// Get a member's vote for a session.
    async fn get_vote(
        &self,
        session_id: &SessionId,
        member_id: &MemberId,
    ) -> Result<VoteEntry, StoreError>;

    /// List votes on one list of a session, oldest cast first.
    async fn list_votes(
        &self,
        session_id: &SessionId,
        list: ListKind,
    ) -> Result<Vec<VoteEntry>, StoreError>;

    /// List a member's votes across sessions, newest cast first.
    async fn list_member_votes(
        &self,
        member_id: &MemberId,
        limit: u32,
    ) -> Result<Vec<MemberVote>, StoreError>;

    /// Count ledger entries per list by scanning the votes themselves.
    async fn count_votes(&self, session_id: &SessionId) -> Result<ListCounts, StoreError>;

    /// Append a vote and bump the matching counter.
    ///
    /// Returns `AlreadyExists` if the member already holds an entry for the session.
    async fn cast_vote(&self, params: &CastVoteParams) -> Result<VoteEntry, StoreError>;

    /// Delete a member's vote, adjust counters and apply the planned promotion.
    ///
    /// Returns `NotFound` if the member holds no entry. A promotion target that is not
    /// on the waitlist, or a promotion after removing a waitlist entry, is a `Conflict`.
    async fn withdraw_vote(&self, params: &WithdrawVoteParams) -> Result<Withdrawal, StoreError>;

    /// Overwrite the stored counters with the ledger counts.
    async fn reconcile_counts(&self, session_id: &SessionId) -> Result<Session, StoreError>;
}

/// Read-only view of member wallets.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait BalanceService: Send + Sync {
    /// Current balance in cents. Members without a wallet have a zero balance.
    async fn get_balance_cents(&self, member_id: &MemberId) -> Result<i64, StoreError>;
}
