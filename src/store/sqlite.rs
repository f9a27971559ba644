use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::model::{
    Deposit, DepositStatus, IncomeType, KycStatus, LedgerEntry, LevelRule, RankRule, RoiSettings,
    RoiStatus, User, Withdrawal, WithdrawalStatus,
};
use crate::scheduler::state::SchedulerState;

use super::{DepositSettleOutcome, PostOutcome, SettleOutcome, Store};

/// sqlite-backed store. One connection behind an async mutex; the atomic
/// primitives run as sqlite transactions, so a failed posting leaves no
/// partial effects behind.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating db directory")?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                      TEXT PRIMARY KEY,
            name                    TEXT NOT NULL,
            referrer_id             TEXT REFERENCES users(id),
            self_deposit            REAL NOT NULL DEFAULT 0,
            balance                 REAL NOT NULL DEFAULT 0,
            roi_income              REAL NOT NULL DEFAULT 0,
            level_income            REAL NOT NULL DEFAULT 0,
            reward                  REAL NOT NULL DEFAULT 0,
            rank                    INTEGER NOT NULL DEFAULT 0,
            power_leg_business      REAL NOT NULL DEFAULT 0,
            other_leg_business      REAL NOT NULL DEFAULT 0,
            is_active               INTEGER NOT NULL DEFAULT 0,
            is_blocked              INTEGER NOT NULL DEFAULT 0,
            kyc_status              TEXT NOT NULL DEFAULT 'pending',
            last_roi_date           TEXT,
            last_level_income_date  TEXT,
            created_at              TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_referrer ON users(referrer_id);

        CREATE TABLE IF NOT EXISTS deposits (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL REFERENCES users(id),
            amount       REAL NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            approved_at  TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_deposits_user ON deposits(user_id, status);

        CREATE TABLE IF NOT EXISTS withdrawals (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id),
            amount      REAL NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL,
            settled_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS ledger (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL REFERENCES users(id),
            income_type  TEXT NOT NULL,
            amount       REAL NOT NULL,
            for_date     TEXT NOT NULL,
            status       TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger(user_id);

        CREATE TABLE IF NOT EXISTS roi_settings (
            id                    INTEGER PRIMARY KEY CHECK (id = 1),
            daily_roi             REAL NOT NULL,
            max_roi               REAL NOT NULL,
            status                TEXT NOT NULL,
            trigger_hour          INTEGER NOT NULL,
            activation_threshold  REAL NOT NULL,
            settings_version      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS level_rules (
            level            INTEGER PRIMARY KEY,
            income_percent   REAL NOT NULL,
            self_investment  REAL NOT NULL,
            team_business    REAL NOT NULL,
            team_size        INTEGER NOT NULL,
            blocked          INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS rank_rules (
            rank                INTEGER PRIMARY KEY,
            total_business      REAL NOT NULL,
            power_leg_business  REAL NOT NULL,
            other_leg_business  REAL NOT NULL,
            reward_income       REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scheduler_state (
            id                INTEGER PRIMARY KEY CHECK (id = 1),
            is_running        INTEGER NOT NULL,
            started_at        TEXT,
            last_run          TEXT,
            next_run          TEXT,
            settings_version  INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Row mapping ──────────────────────────────────────────────────────

fn bad_text(field: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("invalid {field}: {value}").into(),
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let kyc_raw: String = row.get("kyc_status")?;
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        referrer_id: row.get("referrer_id")?,
        self_deposit: row.get("self_deposit")?,
        balance: row.get("balance")?,
        roi_income: row.get("roi_income")?,
        level_income: row.get("level_income")?,
        reward: row.get("reward")?,
        rank: row.get("rank")?,
        power_leg_business: row.get("power_leg_business")?,
        other_leg_business: row.get("other_leg_business")?,
        is_active: row.get("is_active")?,
        is_blocked: row.get("is_blocked")?,
        kyc_status: KycStatus::parse(&kyc_raw).ok_or_else(|| bad_text("kyc_status", &kyc_raw))?,
        last_roi_date: row.get("last_roi_date")?,
        last_level_income_date: row.get("last_level_income_date")?,
        created_at: row.get("created_at")?,
    })
}

fn deposit_from_row(row: &Row<'_>) -> rusqlite::Result<Deposit> {
    let status_raw: String = row.get("status")?;
    Ok(Deposit {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        amount: row.get("amount")?,
        status: DepositStatus::parse(&status_raw)
            .ok_or_else(|| bad_text("deposit status", &status_raw))?,
        approved_at: row.get("approved_at")?,
        created_at: row.get("created_at")?,
    })
}

fn withdrawal_from_row(row: &Row<'_>) -> rusqlite::Result<Withdrawal> {
    let status_raw: String = row.get("status")?;
    Ok(Withdrawal {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        amount: row.get("amount")?,
        status: WithdrawalStatus::parse(&status_raw)
            .ok_or_else(|| bad_text("withdrawal status", &status_raw))?,
        created_at: row.get("created_at")?,
        settled_at: row.get("settled_at")?,
    })
}

fn ledger_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let type_raw: String = row.get("income_type")?;
    Ok(LedgerEntry {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        income_type: IncomeType::parse(&type_raw)
            .ok_or_else(|| bad_text("income_type", &type_raw))?,
        amount: row.get("amount")?,
        for_date: row.get("for_date")?,
        status: row.get("status")?,
        created_at: row.get("created_at")?,
    })
}

const USER_COLUMNS: &str = "id, name, referrer_id, self_deposit, balance, roi_income, \
     level_income, reward, rank, power_leg_business, other_leg_business, is_active, \
     is_blocked, kyc_status, last_roi_date, last_level_income_date, created_at";

// ── Store impl ───────────────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"),
            params![
                user.id,
                user.name,
                user.referrer_id,
                user.self_deposit,
                user.balance,
                user.roi_income,
                user.level_income,
                user.reward,
                user.rank,
                user.power_leg_business,
                user.other_leg_business,
                user.is_active,
                user.is_blocked,
                user.kyc_status.as_str(),
                user.last_roi_date,
                user.last_level_income_date,
                user.created_at,
            ],
        )
        .with_context(|| format!("inserting user {}", user.id))?;
        Ok(())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().await;
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .with_context(|| format!("reading user {id}"))?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock().await;
        let n = conn
            .execute(
                "UPDATE users SET name = ?2, referrer_id = ?3, self_deposit = ?4, balance = ?5, \
                 roi_income = ?6, level_income = ?7, reward = ?8, rank = ?9, \
                 power_leg_business = ?10, other_leg_business = ?11, is_active = ?12, \
                 is_blocked = ?13, kyc_status = ?14, last_roi_date = ?15, \
                 last_level_income_date = ?16 WHERE id = ?1",
                params![
                    user.id,
                    user.name,
                    user.referrer_id,
                    user.self_deposit,
                    user.balance,
                    user.roi_income,
                    user.level_income,
                    user.reward,
                    user.rank,
                    user.power_leg_business,
                    user.other_leg_business,
                    user.is_active,
                    user.is_blocked,
                    user.kyc_status.as_str(),
                    user.last_roi_date,
                    user.last_level_income_date,
                ],
            )
            .with_context(|| format!("updating user {}", user.id))?;
        if n == 0 {
            bail!("user {} not found", user.id);
        }
        Ok(())
    }

    async fn set_kyc_status(&self, user_id: &str, status: KycStatus) -> Result<User> {
        let conn = self.conn.lock().await;
        let n = conn
            .execute(
                "UPDATE users SET kyc_status = ?2 WHERE id = ?1",
                params![user_id, status.as_str()],
            )
            .with_context(|| format!("updating kyc status of {user_id}"))?;
        if n == 0 {
            bail!("user {user_id} not found");
        }
        let user = conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )?;
        Ok(user)
    }

    async fn set_blocked(&self, user_id: &str, blocked: bool) -> Result<User> {
        let conn = self.conn.lock().await;
        let n = conn
            .execute(
                "UPDATE users SET is_blocked = ?2 WHERE id = ?1",
                params![user_id, blocked],
            )
            .with_context(|| format!("updating blocked flag of {user_id}"))?;
        if n == 0 {
            bail!("user {user_id} not found");
        }
        let user = conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )?;
        Ok(user)
    }

    async fn list_payable_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 AND is_blocked = 0 \
             ORDER BY created_at, id"
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("listing payable users")?;
        Ok(users)
    }

    async fn direct_referrals(&self, user_id: &str) -> Result<Vec<User>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE referrer_id = ?1 ORDER BY created_at, id"
        ))?;
        let users = stmt
            .query_map(params![user_id], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("listing referrals of {user_id}"))?;
        Ok(users)
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO deposits (id, user_id, amount, status, approved_at, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                deposit.id,
                deposit.user_id,
                deposit.amount,
                deposit.status.as_str(),
                deposit.approved_at,
                deposit.created_at,
            ],
        )
        .with_context(|| format!("inserting deposit {}", deposit.id))?;
        Ok(())
    }

    async fn get_deposit(&self, id: &str) -> Result<Option<Deposit>> {
        let conn = self.conn.lock().await;
        let deposit = conn
            .query_row(
                "SELECT id, user_id, amount, status, approved_at, created_at \
                 FROM deposits WHERE id = ?1",
                params![id],
                deposit_from_row,
            )
            .optional()
            .with_context(|| format!("reading deposit {id}"))?;
        Ok(deposit)
    }

    async fn approved_deposits(&self, user_id: &str) -> Result<Vec<Deposit>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, status, approved_at, created_at FROM deposits \
             WHERE user_id = ?1 AND status = 'approved' ORDER BY approved_at",
        )?;
        let deposits = stmt
            .query_map(params![user_id], deposit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("listing approved deposits of {user_id}"))?;
        Ok(deposits)
    }

    async fn pending_deposits(&self) -> Result<Vec<Deposit>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, status, approved_at, created_at FROM deposits \
             WHERE status = 'pending' ORDER BY created_at",
        )?;
        let deposits = stmt
            .query_map([], deposit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("listing pending deposits")?;
        Ok(deposits)
    }

    async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO withdrawals (id, user_id, amount, status, created_at, settled_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                withdrawal.id,
                withdrawal.user_id,
                withdrawal.amount,
                withdrawal.status.as_str(),
                withdrawal.created_at,
                withdrawal.settled_at,
            ],
        )
        .with_context(|| format!("inserting withdrawal {}", withdrawal.id))?;
        Ok(())
    }

    async fn get_withdrawal(&self, id: &str) -> Result<Option<Withdrawal>> {
        let conn = self.conn.lock().await;
        let w = conn
            .query_row(
                "SELECT id, user_id, amount, status, created_at, settled_at \
                 FROM withdrawals WHERE id = ?1",
                params![id],
                withdrawal_from_row,
            )
            .optional()
            .with_context(|| format!("reading withdrawal {id}"))?;
        Ok(w)
    }

    async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, status, created_at, settled_at FROM withdrawals \
             WHERE status = 'pending' ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map([], withdrawal_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("listing pending withdrawals")?;
        Ok(rows)
    }

    async fn ledger_for_user(&self, user_id: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, income_type, amount, for_date, status, created_at \
             FROM ledger WHERE user_id = ?1 ORDER BY created_at, id",
        )?;
        let entries = stmt
            .query_map(params![user_id], ledger_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("reading ledger of {user_id}"))?;
        Ok(entries)
    }

    async fn roi_settings(&self) -> Result<RoiSettings> {
        let conn = self.conn.lock().await;
        let settings = conn
            .query_row(
                "SELECT daily_roi, max_roi, status, trigger_hour, activation_threshold, \
                 settings_version FROM roi_settings WHERE id = 1",
                [],
                |row| {
                    let status_raw: String = row.get("status")?;
                    Ok(RoiSettings {
                        daily_roi: row.get("daily_roi")?,
                        max_roi: row.get("max_roi")?,
                        status: RoiStatus::parse(&status_raw)
                            .ok_or_else(|| bad_text("roi status", &status_raw))?,
                        trigger_hour: row.get("trigger_hour")?,
                        activation_threshold: row.get("activation_threshold")?,
                        settings_version: row.get("settings_version")?,
                    })
                },
            )
            .optional()
            .context("reading roi settings")?;
        Ok(settings.unwrap_or_default())
    }

    async fn put_roi_settings(&self, settings: &RoiSettings) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO roi_settings (id, daily_roi, max_roi, status, trigger_hour, \
             activation_threshold, settings_version) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET daily_roi = ?1, max_roi = ?2, status = ?3, \
             trigger_hour = ?4, activation_threshold = ?5, settings_version = ?6",
            params![
                settings.daily_roi,
                settings.max_roi,
                settings.status.as_str(),
                settings.trigger_hour,
                settings.activation_threshold,
                settings.settings_version,
            ],
        )
        .context("writing roi settings")?;
        Ok(())
    }

    async fn level_rules(&self) -> Result<Vec<LevelRule>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT income_percent, self_investment, team_business, team_size, blocked \
             FROM level_rules ORDER BY level",
        )?;
        let rules = stmt
            .query_map([], |row| {
                Ok(LevelRule {
                    income_percent: row.get("income_percent")?,
                    self_investment_condition: row.get("self_investment")?,
                    total_team_business_condition: row.get("team_business")?,
                    total_team_size_condition: row.get("team_size")?,
                    blocked: row.get("blocked")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("reading level rules")?;
        Ok(rules)
    }

    async fn put_level_rules(&self, rules: &[LevelRule]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM level_rules", [])?;
        for (i, rule) in rules.iter().enumerate() {
            tx.execute(
                "INSERT INTO level_rules (level, income_percent, self_investment, \
                 team_business, team_size, blocked) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    (i + 1) as i64,
                    rule.income_percent,
                    rule.self_investment_condition,
                    rule.total_team_business_condition,
                    rule.total_team_size_condition,
                    rule.blocked,
                ],
            )?;
        }
        tx.commit().context("writing level rules")?;
        Ok(())
    }

    async fn rank_rules(&self) -> Result<Vec<RankRule>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT rank, total_business, power_leg_business, other_leg_business, \
             reward_income FROM rank_rules ORDER BY rank",
        )?;
        let rules = stmt
            .query_map([], |row| {
                Ok(RankRule {
                    rank: row.get("rank")?,
                    total_business: row.get("total_business")?,
                    power_leg_business: row.get("power_leg_business")?,
                    other_leg_business: row.get("other_leg_business")?,
                    reward_income: row.get("reward_income")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("reading rank rules")?;
        Ok(rules)
    }

    async fn put_rank_rules(&self, rules: &[RankRule]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM rank_rules", [])?;
        for rule in rules {
            tx.execute(
                "INSERT INTO rank_rules (rank, total_business, power_leg_business, \
                 other_leg_business, reward_income) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    rule.rank,
                    rule.total_business,
                    rule.power_leg_business,
                    rule.other_leg_business,
                    rule.reward_income,
                ],
            )?;
        }
        tx.commit().context("writing rank rules")?;
        Ok(())
    }

    async fn scheduler_state(&self) -> Result<Option<SchedulerState>> {
        let conn = self.conn.lock().await;
        let state = conn
            .query_row(
                "SELECT is_running, started_at, last_run, next_run, settings_version \
                 FROM scheduler_state WHERE id = 1",
                [],
                |row| {
                    Ok(SchedulerState {
                        is_running: row.get("is_running")?,
                        started_at: row.get("started_at")?,
                        last_run: row.get("last_run")?,
                        next_run: row.get("next_run")?,
                        settings_version: row.get("settings_version")?,
                    })
                },
            )
            .optional()
            .context("reading scheduler state")?;
        Ok(state)
    }

    async fn put_scheduler_state(&self, state: &SchedulerState) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO scheduler_state (id, is_running, started_at, last_run, next_run, \
             settings_version) VALUES (1, ?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(id) DO UPDATE SET is_running = ?1, started_at = ?2, last_run = ?3, \
             next_run = ?4, settings_version = ?5",
            params![
                state.is_running,
                state.started_at,
                state.last_run,
                state.next_run,
                state.settings_version,
            ],
        )
        .context("writing scheduler state")?;
        Ok(())
    }

    async fn post_income(
        &self,
        user_id: &str,
        roi_portion: f64,
        level_portion: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PostOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                "SELECT last_roi_date, last_level_income_date FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<NaiveDate>>(0)?,
                        row.get::<_, Option<NaiveDate>>(1)?,
                    ))
                },
            )
            .optional()?;
        let Some((last_roi, last_level)) = row else {
            bail!("posting income: user {user_id} not found");
        };

        // Per-type watermark guard: a posting for a day already covered is
        // silently dropped, which makes re-entry from any trigger a no-op.
        let roi_due = roi_portion > 0.0 && last_roi.is_none_or(|d| for_date > d);
        let level_due = level_portion > 0.0 && last_level.is_none_or(|d| for_date > d);

        if !roi_due && !level_due {
            return Ok(PostOutcome::default());
        }

        if roi_due {
            tx.execute(
                "UPDATE users SET balance = balance + ?2, last_roi_date = ?3 WHERE id = ?1",
                params![user_id, roi_portion, for_date],
            )?;
            tx.execute(
                "INSERT INTO ledger (id, user_id, income_type, amount, for_date, status, \
                 created_at) VALUES (?1, ?2, 'roi', ?3, ?4, 'credited', ?5)",
                params![Uuid::new_v4().to_string(), user_id, roi_portion, for_date, now],
            )?;
        }
        if level_due {
            tx.execute(
                "UPDATE users SET balance = balance + ?2, last_level_income_date = ?3 \
                 WHERE id = ?1",
                params![user_id, level_portion, for_date],
            )?;
            tx.execute(
                "INSERT INTO ledger (id, user_id, income_type, amount, for_date, status, \
                 created_at) VALUES (?1, ?2, 'level', ?3, ?4, 'credited', ?5)",
                params![Uuid::new_v4().to_string(), user_id, level_portion, for_date, now],
            )?;
        }

        tx.commit()
            .with_context(|| format!("committing income posting for {user_id}"))?;

        Ok(PostOutcome {
            roi_credited: if roi_due { roi_portion } else { 0.0 },
            level_credited: if level_due { level_portion } else { 0.0 },
        })
    }

    async fn record_promotion(
        &self,
        user_id: &str,
        rank: u32,
        reward: f64,
        power_leg: f64,
        other_leg: f64,
        for_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let current: Option<u32> = tx
            .query_row(
                "SELECT rank FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            bail!("recording promotion: user {user_id} not found");
        };
        if current >= rank {
            return Ok(false);
        }

        tx.execute(
            "UPDATE users SET rank = ?2, reward = reward + ?3, power_leg_business = ?4, \
             other_leg_business = ?5 WHERE id = ?1",
            params![user_id, rank, reward, power_leg, other_leg],
        )?;
        tx.execute(
            "INSERT INTO ledger (id, user_id, income_type, amount, for_date, status, \
             created_at) VALUES (?1, ?2, 'reward', ?3, ?4, 'credited', ?5)",
            params![Uuid::new_v4().to_string(), user_id, reward, for_date, now],
        )?;

        tx.commit()
            .with_context(|| format!("committing promotion for {user_id}"))?;
        Ok(true)
    }

    async fn settle_deposit(
        &self,
        deposit_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<DepositSettleOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                "SELECT user_id, amount, status, created_at FROM deposits WHERE id = ?1",
                params![deposit_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, DateTime<Utc>>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((user_id, amount, status, created_at)) = row else {
            bail!("deposit {deposit_id} not found");
        };
        if status != "pending" {
            return Ok(DepositSettleOutcome::AlreadySettled);
        }

        let mut deposit = Deposit {
            id: deposit_id.to_string(),
            user_id: user_id.clone(),
            amount,
            status: DepositStatus::Pending,
            approved_at: None,
            created_at,
        };

        if !approve {
            tx.execute(
                "UPDATE deposits SET status = 'rejected' WHERE id = ?1",
                params![deposit_id],
            )?;
            tx.commit()?;
            deposit.status = DepositStatus::Rejected;
            return Ok(DepositSettleOutcome::Rejected(deposit));
        }

        let user_row = tx
            .query_row(
                "SELECT self_deposit, is_active FROM users WHERE id = ?1",
                params![user_id],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, bool>(1)?)),
            )
            .optional()?;
        let Some((self_deposit, is_active)) = user_row else {
            bail!("deposit {deposit_id} references missing user {user_id}");
        };
        let threshold: f64 = tx
            .query_row(
                "SELECT activation_threshold FROM roi_settings WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or_else(|| RoiSettings::default().activation_threshold);
        let newly_active = !is_active && self_deposit + amount >= threshold;

        tx.execute(
            "UPDATE deposits SET status = 'approved', approved_at = ?2 WHERE id = ?1",
            params![deposit_id, now],
        )?;
        tx.execute(
            "UPDATE users SET self_deposit = self_deposit + ?2, \
             is_active = MAX(is_active, ?3) WHERE id = ?1",
            params![user_id, amount, newly_active],
        )?;
        tx.commit()
            .with_context(|| format!("committing deposit settlement {deposit_id}"))?;

        deposit.status = DepositStatus::Approved;
        deposit.approved_at = Some(now);
        Ok(DepositSettleOutcome::Approved {
            deposit,
            newly_active,
        })
    }

    async fn settle_withdrawal(
        &self,
        withdrawal_id: &str,
        approve: bool,
        now: DateTime<Utc>,
    ) -> Result<SettleOutcome> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let row = tx
            .query_row(
                "SELECT user_id, amount, status FROM withdrawals WHERE id = ?1",
                params![withdrawal_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((user_id, amount, status)) = row else {
            bail!("withdrawal {withdrawal_id} not found");
        };
        if status != "pending" {
            return Ok(SettleOutcome::AlreadySettled);
        }

        if !approve {
            tx.execute(
                "UPDATE withdrawals SET status = 'rejected', settled_at = ?2 WHERE id = ?1",
                params![withdrawal_id, now],
            )?;
            tx.commit()?;
            return Ok(SettleOutcome::Rejected);
        }

        let balance: f64 = tx.query_row(
            "SELECT balance FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        if balance < amount {
            tx.execute(
                "UPDATE withdrawals SET status = 'rejected', settled_at = ?2 WHERE id = ?1",
                params![withdrawal_id, now],
            )?;
            tx.commit()?;
            return Ok(SettleOutcome::InsufficientBalance);
        }

        tx.execute(
            "UPDATE users SET balance = balance - ?2 WHERE id = ?1",
            params![user_id, amount],
        )?;
        tx.execute(
            "UPDATE withdrawals SET status = 'approved', settled_at = ?2 WHERE id = ?1",
            params![withdrawal_id, now],
        )?;
        tx.commit()
            .with_context(|| format!("committing withdrawal {withdrawal_id}"))?;
        Ok(SettleOutcome::Approved { amount })
    }

    async fn update_display_caches(
        &self,
        user_id: &str,
        roi_income: f64,
        level_income: f64,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE users SET roi_income = ?2, level_income = ?3 WHERE id = ?1",
            params![user_id, roi_income, level_income],
        )
        .with_context(|| format!("updating display caches for {user_id}"))?;
        Ok(())
    }
}
