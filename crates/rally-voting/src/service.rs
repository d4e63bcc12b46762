use chrono::{DateTime, NaiveDate, Utc};
use rally_config::ClubConfig;
use rally_storage::{
    BalanceService, CastVoteParams, CreateSessionParams, ListCounts, ListKind, Member, MemberId,
    MemberVote, PromoteParams, Session, SessionId, SlotKey, Store, StoreError, VoteEntry,
    WithdrawVoteParams,
};
use std::future::Future;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::locks::SessionLocks;
use crate::promotion;
use crate::schedule::{Schedule, SessionSlot, WeekAnchor};
use crate::window::{monday_of, WindowStatus};
use crate::VotingError;

/// Result of a withdrawal
#[derive(Debug, Clone)]
pub struct WithdrawOutcome {
    /// Whether the removed vote held a main-list slot.
    pub was_main_list: bool,
    pub removed: VoteEntry,
    /// Waitlisted entry moved into the freed slot, if any.
    pub promoted: Option<VoteEntry>,
    /// Session after the write.
    pub session: Session,
}

/// Both lists of a session, each in FIFO order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRoster {
    pub session: Session,
    pub main: Vec<VoteEntry>,
    pub waitlist: Vec<VoteEntry>,
    pub window: WindowStatus,
}

/// Stored counters next to the counts derived from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterCheck {
    pub session: Session,
    pub stored: ListCounts,
    pub ledger: ListCounts,
}

impl CounterCheck {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.ledger
    }
}

/// Session voting service
pub struct VotingService<S, B> {
    store: Arc<S>,
    balances: Arc<B>,
    schedule: Schedule,
    min_balance_cents: i64,
    max_conflict_retries: u32,
    clock: Arc<dyn Clock>,
    locks: SessionLocks,
}

impl<S: Store, B: BalanceService> VotingService<S, B> {
    pub fn new(config: &ClubConfig, store: Arc<S>, balances: Arc<B>) -> Self {
        Self {
            store,
            balances,
            schedule: Schedule::from_config(config),
            min_balance_cents: config.min_balance_cents,
            max_conflict_retries: config.max_conflict_retries,
            clock: Arc::new(SystemClock),
            locks: SessionLocks::new(),
        }
    }

    /// Replace the wall clock, e.g. with a [`crate::ManualClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ───────────────────────────────────── Sessions ───────────────────────────────────────

    /// The session of `slot` in the current voting week, created on first access.
    pub async fn current_session(&self, slot: SlotKey) -> Result<Session, VotingError> {
        self.session_at(slot, self.clock.now()).await
    }

    /// The session of `slot` in the voting week current at `at`.
    pub async fn session_at(
        &self,
        slot: SlotKey,
        at: DateTime<Utc>,
    ) -> Result<Session, VotingError> {
        let resolved = self.schedule.resolve(slot, at)?;
        self.ensure_session(resolved).await
    }

    pub fn current_week(&self) -> Result<WeekAnchor, VotingError> {
        Ok(self.schedule.voting_week_anchor(self.clock.now())?)
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, VotingError> {
        self.store.get_session(session_id).await.map_err(|e| match e {
            StoreError::NotFound => VotingError::SessionNotFound,
            other => VotingError::Storage(other),
        })
    }

    /// Sessions already created for the week containing `date`.
    pub async fn list_sessions(&self, date: NaiveDate) -> Result<Vec<Session>, VotingError> {
        Ok(self.store.list_sessions(monday_of(date)).await?)
    }

    pub fn window_status(&self, session: &Session) -> Result<WindowStatus, VotingError> {
        Ok(self
            .schedule
            .window()
            .status(session.play_at, self.clock.now())?)
    }

    async fn ensure_session(&self, resolved: SessionSlot) -> Result<Session, VotingError> {
        let session = self
            .store
            .get_or_create_session(&CreateSessionParams {
                slot: resolved.slot,
                week_of: resolved.week_of,
                play_at: resolved.play_at,
                capacity: resolved.capacity,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::debug!(
            session_id = %session.id.0,
            slot = %session.slot,
            week_of = %session.week_of,
            "Resolved session"
        );
        Ok(session)
    }

    // ───────────────────────────────────── Mutations ──────────────────────────────────────

    /// Register a member on the main list or the waitlist.
    ///
    /// Checks run in a fixed order and the first failure wins: window open,
    /// no existing vote, sufficient balance, main list not full. A full main
    /// list is reported, never turned into a waitlist entry.
    pub async fn cast_vote(
        &self,
        session_id: &SessionId,
        member: &Member,
        list: ListKind,
    ) -> Result<VoteEntry, VotingError> {
        let _guard = self.locks.acquire(session_id).await;
        self.with_retries(session_id, || self.try_cast(session_id, member, list))
            .await
    }

    async fn try_cast(
        &self,
        session_id: &SessionId,
        member: &Member,
        list: ListKind,
    ) -> Result<VoteEntry, VotingError> {
        let session = self.get_session(session_id).await?;
        self.require_open(&session)?;

        match self.store.get_vote(session_id, &member.id).await {
            Ok(_) => return Err(VotingError::AlreadyVoted),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let balance_cents = self.balances.get_balance_cents(&member.id).await?;
        if balance_cents < self.min_balance_cents {
            return Err(VotingError::InsufficientBalance {
                balance_cents,
                required_cents: self.min_balance_cents,
            });
        }

        if list == ListKind::Main && session.is_main_full() {
            return Err(VotingError::MainListFull {
                capacity: session.capacity,
            });
        }

        let entry = self
            .store
            .cast_vote(&CastVoteParams {
                session_id: session_id.clone(),
                expected_version: session.version,
                member: member.clone(),
                list,
                cast_at: self.clock.now(),
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => VotingError::ConcurrencyConflict,
                StoreError::AlreadyExists => VotingError::AlreadyVoted,
                StoreError::NotFound => VotingError::SessionNotFound,
                other => VotingError::Storage(other),
            })?;

        tracing::info!(
            session_id = %session_id.0,
            member_id = %member.id.as_str(),
            list = %list,
            cast_seq = entry.cast_seq,
            "Vote cast"
        );
        Ok(entry)
    }

    /// Remove a member's vote. A main-list withdrawal promotes the earliest
    /// waitlisted member in the same write.
    pub async fn withdraw_vote(
        &self,
        session_id: &SessionId,
        member_id: &MemberId,
    ) -> Result<WithdrawOutcome, VotingError> {
        let _guard = self.locks.acquire(session_id).await;
        self.with_retries(session_id, || self.try_withdraw(session_id, member_id))
            .await
    }

    async fn try_withdraw(
        &self,
        session_id: &SessionId,
        member_id: &MemberId,
    ) -> Result<WithdrawOutcome, VotingError> {
        let session = self.get_session(session_id).await?;
        self.require_open(&session)?;

        let entry = match self.store.get_vote(session_id, member_id).await {
            Ok(entry) => entry,
            Err(StoreError::NotFound) => return Err(VotingError::VoteNotFound),
            Err(e) => return Err(e.into()),
        };

        let was_main_list = entry.list == ListKind::Main;
        let promote = if was_main_list {
            let waitlist = self.store.list_votes(session_id, ListKind::Waitlist).await?;
            promotion::next_in_line(&waitlist).map(|next| PromoteParams {
                vote_id: next.id.clone(),
                promoted_at: self.clock.now(),
            })
        } else {
            None
        };

        let withdrawal = self
            .store
            .withdraw_vote(&WithdrawVoteParams {
                session_id: session_id.clone(),
                expected_version: session.version,
                member_id: member_id.clone(),
                promote,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => VotingError::ConcurrencyConflict,
                StoreError::NotFound => VotingError::VoteNotFound,
                other => VotingError::Storage(other),
            })?;

        tracing::info!(
            session_id = %session_id.0,
            member_id = %member_id.as_str(),
            list = %withdrawal.removed.list,
            "Vote withdrawn"
        );
        if let Some(promoted) = &withdrawal.promoted {
            tracing::info!(
                session_id = %session_id.0,
                member_id = %promoted.member.id.as_str(),
                cast_seq = promoted.cast_seq,
                "Promoted from waitlist"
            );
        }

        Ok(WithdrawOutcome {
            was_main_list,
            removed: withdrawal.removed,
            promoted: withdrawal.promoted,
            session: withdrawal.session,
        })
    }

    fn require_open(&self, session: &Session) -> Result<(), VotingError> {
        let status = self.window_status(session)?;
        if status.is_open() {
            Ok(())
        } else {
            Err(VotingError::VotingClosed(status))
        }
    }

    /// Re-run a check-and-write sequence after losing a version race.
    async fn with_retries<T, F, Fut>(
        &self,
        session_id: &SessionId,
        mut op: F,
    ) -> Result<T, VotingError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VotingError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(VotingError::ConcurrencyConflict) if attempt < self.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(
                        session_id = %session_id.0,
                        attempt,
                        "Session changed underneath, retrying"
                    );
                }
                result => return result,
            }
        }
    }

    // ───────────────────────────────────── Read side ──────────────────────────────────────

    pub async fn roster(&self, session_id: &SessionId) -> Result<SessionRoster, VotingError> {
        let session = self.get_session(session_id).await?;
        let window = self.window_status(&session)?;
        let main = self.store.list_votes(session_id, ListKind::Main).await?;
        let waitlist = self.store.list_votes(session_id, ListKind::Waitlist).await?;
        Ok(SessionRoster {
            session,
            main,
            waitlist,
            window,
        })
    }

    pub async fn member_vote(
        &self,
        session_id: &SessionId,
        member_id: &MemberId,
    ) -> Result<Option<VoteEntry>, VotingError> {
        match self.store.get_vote(session_id, member_id).await {
            Ok(entry) => Ok(Some(entry)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// A member's votes across sessions, newest first.
    pub async fn member_history(
        &self,
        member_id: &MemberId,
        limit: u32,
    ) -> Result<Vec<MemberVote>, VotingError> {
        Ok(self.store.list_member_votes(member_id, limit).await?)
    }

    // ───────────────────────────────────── Counters ───────────────────────────────────────

    pub async fn verify_counters(&self, session_id: &SessionId) -> Result<CounterCheck, VotingError> {
        let session = self.get_session(session_id).await?;
        let ledger = self.store.count_votes(session_id).await?;
        Ok(CounterCheck {
            stored: session.counts(),
            session,
            ledger,
        })
    }

    /// Overwrite stored counters with the ledger counts.
    pub async fn repair_counters(&self, session_id: &SessionId) -> Result<Session, VotingError> {
        let _guard = self.locks.acquire(session_id).await;
        let before = self.get_session(session_id).await?;
        let after = self.store.reconcile_counts(session_id).await.map_err(|e| match e {
            StoreError::NotFound => VotingError::SessionNotFound,
            other => VotingError::Storage(other),
        })?;
        if before.counts() != after.counts() {
            tracing::warn!(
                session_id = %session_id.0,
                stored_main = before.main_count,
                stored_waitlist = before.waitlist_count,
                main = after.main_count,
                waitlist = after.waitlist_count,
                "Repaired session counters"
            );
        }
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::TimeZone;
    use chrono_tz::America::Toronto;
    use rally_storage::{MockBalanceService, MockStore, VoteId};
    use uuid::Uuid;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Toronto
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn thursday(main_count: u32) -> Session {
        Session {
            id: SessionId(Uuid::nil()),
            slot: SlotKey::Thursday,
            week_of: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            play_at: local(2026, 10, 22, 20, 0),
            capacity: 20,
            main_count,
            waitlist_count: 0,
            version: 7,
            created_at: local(2026, 10, 19, 18, 0),
        }
    }

    fn entry(member: &Member, list: ListKind, cast_seq: i64) -> VoteEntry {
        VoteEntry {
            id: VoteId(Uuid::now_v7()),
            session_id: SessionId(Uuid::nil()),
            member: member.clone(),
            list,
            cast_seq,
            cast_at: local(2026, 10, 20, 9, 0),
            promoted_at: None,
        }
    }

    fn service(
        store: MockStore,
        balances: MockBalanceService,
        now: DateTime<Utc>,
    ) -> VotingService<MockStore, MockBalanceService> {
        VotingService::new(&ClubConfig::default(), Arc::new(store), Arc::new(balances))
            .with_clock(Arc::new(ManualClock::new(now)))
    }

    #[tokio::test]
    async fn test_closed_window_checks_nothing_else() {
        let mut store = MockStore::new();
        store.expect_get_session().returning(|_| Ok(thursday(0)));
        store.expect_get_vote().never();
        store.expect_cast_vote().never();
        let mut balances = MockBalanceService::new();
        balances.expect_get_balance_cents().never();

        let svc = service(store, balances, local(2026, 10, 22, 11, 0));
        let member = Member::new("m-1", "Alex", "alex@example.com");
        let err = svc
            .cast_vote(&SessionId(Uuid::nil()), &member, ListKind::Main)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VotingError::VotingClosed(WindowStatus::Closed { .. })
        ));
    }

    #[tokio::test]
    async fn test_cast_gives_up_after_configured_retries() {
        let mut store = MockStore::new();
        store
            .expect_get_session()
            .times(4)
            .returning(|_| Ok(thursday(3)));
        store
            .expect_get_vote()
            .times(4)
            .returning(|_, _| Err(StoreError::NotFound));
        store
            .expect_cast_vote()
            .times(4)
            .returning(|_| Err(StoreError::Conflict));
        let mut balances = MockBalanceService::new();
        balances
            .expect_get_balance_cents()
            .returning(|_| Ok(10_000));

        let svc = service(store, balances, local(2026, 10, 20, 9, 0));
        let member = Member::new("m-1", "Alex", "alex@example.com");
        let err = svc
            .cast_vote(&SessionId(Uuid::nil()), &member, ListKind::Main)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cast_uses_observed_version() {
        let mut store = MockStore::new();
        store.expect_get_session().returning(|_| Ok(thursday(3)));
        store
            .expect_get_vote()
            .returning(|_, _| Err(StoreError::NotFound));
        store
            .expect_cast_vote()
            .withf(|p| p.expected_version == 7 && p.list == ListKind::Waitlist)
            .times(1)
            .returning(|p| {
                let mut e = entry(&p.member, p.list, p.expected_version + 1);
                e.cast_at = p.cast_at;
                Ok(e)
            });
        let mut balances = MockBalanceService::new();
        balances
            .expect_get_balance_cents()
            .returning(|_| Ok(5_000));

        let now = local(2026, 10, 20, 9, 0);
        let svc = service(store, balances, now);
        let member = Member::new("m-1", "Alex", "alex@example.com");
        let cast = svc
            .cast_vote(&SessionId(Uuid::nil()), &member, ListKind::Waitlist)
            .await
            .unwrap();
        assert_eq!(cast.cast_seq, 8);
        assert_eq!(cast.cast_at, now);
    }

    #[tokio::test]
    async fn test_withdraw_plans_promotion_of_earliest_waitlisted() {
        let leaving = Member::new("m-1", "Alex", "alex@example.com");
        let first = Member::new("m-2", "Blair", "blair@example.com");
        let second = Member::new("m-3", "Casey", "casey@example.com");
        let first_entry = entry(&first, ListKind::Waitlist, 4);
        let first_id = first_entry.id.clone();
        let waitlist = vec![entry(&second, ListKind::Waitlist, 9), first_entry];

        let mut store = MockStore::new();
        store.expect_get_session().returning(|_| Ok(thursday(20)));
        let removed = entry(&leaving, ListKind::Main, 2);
        let removed_clone = removed.clone();
        store
            .expect_get_vote()
            .returning(move |_, _| Ok(removed_clone.clone()));
        store
            .expect_list_votes()
            .returning(move |_, _| Ok(waitlist.clone()));
        store
            .expect_withdraw_vote()
            .withf(move |p| {
                p.expected_version == 7
                    && p.promote.as_ref().map(|pr| &pr.vote_id) == Some(&first_id)
            })
            .times(1)
            .returning(move |_| {
                Ok(rally_storage::Withdrawal {
                    removed: removed.clone(),
                    promoted: None,
                    session: thursday(20),
                })
            });

        let svc = service(store, MockBalanceService::new(), local(2026, 10, 20, 9, 0));
        let outcome = svc
            .withdraw_vote(&SessionId(Uuid::nil()), &leaving.id)
            .await
            .unwrap();
        assert!(outcome.was_main_list);
    }

    #[test]
    fn test_counter_check_consistency() {
        let check = CounterCheck {
            session: thursday(2),
            stored: ListCounts { main: 2, waitlist: 0 },
            ledger: ListCounts { main: 1, waitlist: 0 },
        };
        assert!(!check.is_consistent());
    }
}
