use chrono::{DateTime, NaiveDate, Utc};
use rally_storage::{
    BalanceService, CastVoteParams, CreateSessionParams, ListCounts, ListKind, Member, MemberId,
    MemberVote, Session, SessionId, SlotKey, Store, StoreError, VoteEntry, VoteId,
    WithdrawVoteParams, Withdrawal,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type SessionRow = (String, String, String, i64, i64, i64, i64, i64, i64);
type VoteRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    Option<i64>,
);
type MemberVoteRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    Option<i64>,
    String,
    i64,
);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// `~/.rally/rally.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".rally");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("rally.db");
        let url = format!("sqlite://{}", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = pool_options()
            .connect_with(options)
            .await
            .map_err(backend)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Overwrite a member's wallet balance. Used by operators to seed balances.
    pub async fn set_balance_cents(
        &self,
        member_id: &MemberId,
        balance_cents: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO wallets(member_id, balance_cents, updated_at) VALUES(?,?,?)
             ON CONFLICT(member_id)
             DO UPDATE SET balance_cents=excluded.balance_cents,
                           updated_at=excluded.updated_at",
        )
        .bind(member_id.as_str())
        .bind(balance_cents)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

// ────────────────────────────── Row mapping ──────────────────────────────

/// A single connection serializes writers; the version guard covers other
/// processes. It is never recycled, since a `:memory:` database dies with it.
fn pool_options() -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else if s.contains("CHECK constraint failed") || s.contains("database is locked") {
        StoreError::Conflict
    } else {
        StoreError::Backend(s)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp: {}", ms)))
}

fn session_from_row(row: SessionRow) -> Result<Session, StoreError> {
    let (id, slot, week_of, play_at, capacity, main_count, waitlist_count, version, created_at) =
        row;
    Ok(Session {
        id: SessionId(parse_uuid(&id)?),
        slot: SlotKey::from_str(&slot).map_err(|e| StoreError::Backend(e.to_string()))?,
        week_of: NaiveDate::parse_from_str(&week_of, "%Y-%m-%d")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        play_at: from_millis(play_at)?,
        capacity: capacity as u32,
        main_count: main_count as u32,
        waitlist_count: waitlist_count as u32,
        version,
        created_at: from_millis(created_at)?,
    })
}

fn vote_from_row(row: VoteRow) -> Result<VoteEntry, StoreError> {
    let (id, session_id, member_id, name, email, list, cast_seq, cast_at, promoted_at) = row;
    Ok(VoteEntry {
        id: VoteId(parse_uuid(&id)?),
        session_id: SessionId(parse_uuid(&session_id)?),
        member: Member {
            id: MemberId(member_id),
            name,
            email,
        },
        list: ListKind::from_str(&list).map_err(|e| StoreError::Backend(e.to_string()))?,
        cast_seq,
        cast_at: from_millis(cast_at)?,
        promoted_at: promoted_at.map(from_millis).transpose()?,
    })
}

const SESSION_SELECT: &str = "SELECT id, slot_key, week_of, play_at, capacity, main_count, waitlist_count, version, created_at FROM sessions";

const VOTE_SELECT: &str = "SELECT id, session_id, member_id, member_name, member_email, list_kind, cast_seq, cast_at, promoted_at FROM votes";

async fn fetch_session(conn: &mut SqliteConnection, id: &str) -> Result<Session, StoreError> {
    let sql = format!("{} WHERE id=?", SESSION_SELECT);
    let row = sqlx::query_as::<_, SessionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    row.map(session_from_row)
        .unwrap_or(Err(StoreError::NotFound))
}

async fn fetch_vote_by_id(
    conn: &mut SqliteConnection,
    vote_id: &str,
) -> Result<Option<VoteEntry>, StoreError> {
    let sql = format!("{} WHERE id=?", VOTE_SELECT);
    let row = sqlx::query_as::<_, VoteRow>(&sql)
        .bind(vote_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    row.map(vote_from_row).transpose()
}

/// Bump the session version if it still matches, applying counter deltas in the same statement.
async fn bump_session(
    conn: &mut SqliteConnection,
    session_id: &str,
    expected_version: i64,
    main_delta: i64,
    waitlist_delta: i64,
) -> Result<(), StoreError> {
    let res = sqlx::query(
        "UPDATE sessions
            SET version=version+1,
                main_count=main_count+?,
                waitlist_count=waitlist_count+?
          WHERE id=? AND version=?",
    )
    .bind(main_delta)
    .bind(waitlist_delta)
    .bind(session_id)
    .bind(expected_version)
    .execute(&mut *conn)
    .await
    .map_err(map_write_err)?;

    if res.rows_affected() == 1 {
        return Ok(());
    }

    let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sessions WHERE id=?")
        .bind(session_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    match exists {
        None => Err(StoreError::NotFound),
        Some(_) => Err(StoreError::Conflict),
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Sessions ─────────────────────────────

    async fn get_or_create_session(
        &self,
        params: &CreateSessionParams,
    ) -> Result<Session, StoreError> {
        let week_of = params.week_of.format("%Y-%m-%d").to_string();

        sqlx::query(
            "INSERT INTO sessions(id,slot_key,week_of,play_at,capacity,main_count,waitlist_count,version,created_at)
             VALUES(?,?,?,?,?,0,0,0,?)
             ON CONFLICT(slot_key,week_of) DO NOTHING",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(params.slot.as_str())
        .bind(&week_of)
        .bind(params.play_at.timestamp_millis())
        .bind(params.capacity as i64)
        .bind(params.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(map_write_err)?;

        let sql = format!("{} WHERE slot_key=? AND week_of=?", SESSION_SELECT);
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(params.slot.as_str())
            .bind(&week_of)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(session_from_row)
            .unwrap_or(Err(StoreError::NotFound))
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        fetch_session(&mut conn, &session_id.0.to_string()).await
    }

    async fn list_sessions(&self, week_of: NaiveDate) -> Result<Vec<Session>, StoreError> {
        let sql = format!("{} WHERE week_of=? ORDER BY play_at", SESSION_SELECT);
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(week_of.format("%Y-%m-%d").to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(session_from_row).collect()
    }

    // ───────────────────────────── Vote ledger ──────────────────────────

    async fn get_vote(
        &self,
        session_id: &SessionId,
        member_id: &MemberId,
    ) -> Result<VoteEntry, StoreError> {
        let sql = format!("{} WHERE session_id=? AND member_id=?", VOTE_SELECT);
        let row = sqlx::query_as::<_, VoteRow>(&sql)
            .bind(session_id.0.to_string())
            .bind(member_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => vote_from_row(row),
        }
    }

    async fn list_votes(
        &self,
        session_id: &SessionId,
        list: ListKind,
    ) -> Result<Vec<VoteEntry>, StoreError> {
        let sql = format!(
            "{} WHERE session_id=? AND list_kind=? ORDER BY cast_seq",
            VOTE_SELECT
        );
        let rows = sqlx::query_as::<_, VoteRow>(&sql)
            .bind(session_id.0.to_string())
            .bind(list.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(vote_from_row).collect()
    }

    async fn list_member_votes(
        &self,
        member_id: &MemberId,
        limit: u32,
    ) -> Result<Vec<MemberVote>, StoreError> {
        let rows = sqlx::query_as::<_, MemberVoteRow>(
            "SELECT v.id, v.session_id, v.member_id, v.member_name, v.member_email,
                    v.list_kind, v.cast_seq, v.cast_at, v.promoted_at,
                    s.slot_key, s.play_at
               FROM votes v
               JOIN sessions s ON s.id=v.session_id
              WHERE v.member_id=?
              ORDER BY v.cast_at DESC, s.play_at DESC
              LIMIT ?",
        )
        .bind(member_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, sid, mid, name, email, list, seq, cast_at, promoted_at, slot, play_at) in rows {
            out.push(MemberVote {
                vote: vote_from_row((id, sid, mid, name, email, list, seq, cast_at, promoted_at))?,
                slot: SlotKey::from_str(&slot).map_err(|e| StoreError::Backend(e.to_string()))?,
                play_at: from_millis(play_at)?,
            });
        }
        Ok(out)
    }

    async fn count_votes(&self, session_id: &SessionId) -> Result<ListCounts, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT list_kind, COUNT(*) FROM votes WHERE session_id=? GROUP BY list_kind",
        )
        .bind(session_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut counts = ListCounts::default();
        for (list, n) in rows {
            match ListKind::from_str(&list).map_err(|e| StoreError::Backend(e.to_string()))? {
                ListKind::Main => counts.main = n as u32,
                ListKind::Waitlist => counts.waitlist = n as u32,
            }
        }
        Ok(counts)
    }

    async fn cast_vote(&self, params: &CastVoteParams) -> Result<VoteEntry, StoreError> {
        let session_id = params.session_id.0.to_string();
        let (main_delta, waitlist_delta) = match params.list {
            ListKind::Main => (1, 0),
            ListKind::Waitlist => (0, 1),
        };

        let mut tx = self.pool.begin().await.map_err(backend)?;

        bump_session(
            &mut tx,
            &session_id,
            params.expected_version,
            main_delta,
            waitlist_delta,
        )
        .await?;

        // The bumped version doubles as the entry's position in the session's write order.
        let vote_id = Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO votes(id,session_id,member_id,member_name,member_email,list_kind,cast_seq,cast_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(&vote_id)
        .bind(&session_id)
        .bind(params.member.id.as_str())
        .bind(&params.member.name)
        .bind(&params.member.email)
        .bind(params.list.as_str())
        .bind(params.expected_version + 1)
        .bind(params.cast_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;

        let vote = fetch_vote_by_id(&mut tx, &vote_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        tx.commit().await.map_err(backend)?;
        Ok(vote)
    }

    async fn withdraw_vote(&self, params: &WithdrawVoteParams) -> Result<Withdrawal, StoreError> {
        let session_id = params.session_id.0.to_string();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        let sql = format!("{} WHERE session_id=? AND member_id=?", VOTE_SELECT);
        let removed = sqlx::query_as::<_, VoteRow>(&sql)
            .bind(&session_id)
            .bind(params.member_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .map(vote_from_row)
            .transpose()?
            .ok_or(StoreError::NotFound)?;

        let target = match &params.promote {
            None => None,
            Some(promote) => {
                if removed.list != ListKind::Main {
                    return Err(StoreError::Conflict);
                }
                let target = fetch_vote_by_id(&mut tx, &promote.vote_id.0.to_string())
                    .await?
                    .filter(|v| v.session_id == params.session_id)
                    .ok_or(StoreError::Conflict)?;
                if target.list != ListKind::Waitlist {
                    return Err(StoreError::Conflict);
                }
                Some((target, promote.promoted_at))
            }
        };

        let (mut main_delta, mut waitlist_delta) = match removed.list {
            ListKind::Main => (-1, 0),
            ListKind::Waitlist => (0, -1),
        };
        if target.is_some() {
            main_delta += 1;
            waitlist_delta -= 1;
        }

        bump_session(
            &mut tx,
            &session_id,
            params.expected_version,
            main_delta,
            waitlist_delta,
        )
        .await?;

        sqlx::query("DELETE FROM votes WHERE id=?")
            .bind(removed.id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        let promoted = match target {
            None => None,
            Some((target, promoted_at)) => {
                let target_id = target.id.0.to_string();
                sqlx::query("UPDATE votes SET list_kind='main', promoted_at=? WHERE id=?")
                    .bind(promoted_at.timestamp_millis())
                    .bind(&target_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                fetch_vote_by_id(&mut tx, &target_id).await?
            }
        };

        let session = fetch_session(&mut tx, &session_id).await?;

        tx.commit().await.map_err(backend)?;

        Ok(Withdrawal {
            removed,
            promoted,
            session,
        })
    }

    async fn reconcile_counts(&self, session_id: &SessionId) -> Result<Session, StoreError> {
        let id = session_id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let (main, waitlist): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(list_kind='main'),0), COALESCE(SUM(list_kind='waitlist'),0)
               FROM votes WHERE session_id=?",
        )
        .bind(&id)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        let res = sqlx::query(
            "UPDATE sessions SET main_count=?, waitlist_count=?, version=version+1 WHERE id=?",
        )
        .bind(main)
        .bind(waitlist)
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_err)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let session = fetch_session(&mut tx, &id).await?;
        tx.commit().await.map_err(backend)?;
        Ok(session)
    }
}

#[async_trait::async_trait]
impl BalanceService for SqliteStore {
    async fn get_balance_cents(&self, member_id: &MemberId) -> Result<i64, StoreError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT balance_cents FROM wallets WHERE member_id=?")
                .bind(member_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        Ok(row.map(|(cents,)| cents).unwrap_or(0))
    }
}
