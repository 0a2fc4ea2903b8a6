//! Append-only audit persistence (halts, transitions, evaluations, ...).
//!
//! Backed by SQLite (`rusqlite`, bundled), grounded on
//! `funding-fee-farmer/src/persistence/mod.rs`'s connection-wrapper style.
//! Every table named in spec §6 exists; most are strictly append-only
//! (`position_risk` and `daily_risk` are the two mutable-by-key exceptions,
//! matching spec's data model).
//!
//! A failed append on the halt-event table is the one persistence failure
//! that must escalate (spec §4.4 step 2); callers are expected to inspect
//! the `Result` and escalate accordingly rather than this module doing so
//! itself, since escalation means transitioning `SystemState`, which this
//! module has no authority over.

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Thin wrapper around a single SQLite connection guarded by a mutex.
///
/// Writes are infrequent relative to the evaluation hot path (spec §5:
/// Risk Budget Manager evaluation itself never touches I/O), so a coarse
/// mutex around the connection is sufficient and keeps the locking
/// discipline simple: no lock is ever held across a suspension point
/// because every method here is synchronous and short.
pub struct PersistenceLog {
    conn: Mutex<Connection>,
}

impl PersistenceLog {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path.as_ref())?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.init_schema()?;
        Ok(log)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.init_schema()?;
        Ok(log)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS halt_events (
                id TEXT PRIMARY KEY,
                trigger TEXT NOT NULL,
                level TEXT NOT NULL,
                category TEXT NOT NULL,
                reason TEXT NOT NULL,
                monitor_id TEXT,
                correlation_id TEXT,
                snapshot_json TEXT NOT NULL,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS state_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                from_state TEXT NOT NULL,
                to_state TEXT NOT NULL,
                trigger_json TEXT,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS resume_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                operator TEXT NOT NULL,
                reason TEXT NOT NULL,
                acknowledged INTEGER NOT NULL,
                granted INTEGER NOT NULL,
                denial_reason TEXT,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS risk_evaluations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                decision TEXT NOT NULL,
                primary_reason TEXT,
                proposed_risk_pct REAL NOT NULL,
                allowed_risk_pct REAL NOT NULL,
                account_equity REAL NOT NULL,
                duration_ms REAL NOT NULL,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS position_risk (
                position_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                exchange TEXT NOT NULL,
                direction TEXT NOT NULL,
                status TEXT NOT NULL,
                risk_pct REAL NOT NULL,
                opened_at TEXT NOT NULL,
                closed_at TEXT,
                realized_pnl REAL
            );

            CREATE TABLE IF NOT EXISTS daily_risk (
                date TEXT PRIMARY KEY,
                budget_limit_pct REAL NOT NULL,
                consumed_pct REAL NOT NULL,
                peak_open_pct REAL NOT NULL,
                trades_taken INTEGER NOT NULL,
                trades_rejected INTEGER NOT NULL,
                realized_pnl REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS drawdown_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                peak_equity REAL NOT NULL,
                current_equity REAL NOT NULL,
                drawdown_pct REAL NOT NULL,
                triggered_halt INTEGER NOT NULL,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS equity_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_equity REAL NOT NULL,
                peak_equity REAL NOT NULL,
                open_risk_pct REAL NOT NULL,
                daily_risk_used_pct REAL NOT NULL,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS risk_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                ts TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS health_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                final_score REAL NOT NULL,
                state TEXT NOT NULL,
                ts TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn append_halt_event(&self, e: &HaltEventRow) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO halt_events (id, trigger, level, category, reason, monitor_id, correlation_id, snapshot_json, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                e.id, e.trigger, e.level, e.category, e.reason, e.monitor_id, e.correlation_id,
                e.snapshot_json, e.ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn append_state_transition(
        &self,
        from: &str,
        to: &str,
        trigger_json: Option<&str>,
        ts: DateTime<Utc>,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO state_transitions (from_state, to_state, trigger_json, ts) VALUES (?1, ?2, ?3, ?4)",
            params![from, to, trigger_json, ts.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn append_resume_request(
        &self,
        operator: &str,
        reason: &str,
        acknowledged: bool,
        granted: bool,
        denial_reason: Option<&str>,
        ts: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO resume_requests (operator, reason, acknowledged, granted, denial_reason, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![operator, reason, acknowledged as i64, granted as i64, denial_reason, ts.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn append_risk_evaluation(&self, row: &RiskEvaluationRow) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO risk_evaluations (request_id, symbol, decision, primary_reason, proposed_risk_pct, allowed_risk_pct, account_equity, duration_ms, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.request_id, row.symbol, row.decision, row.primary_reason,
                row.proposed_risk_pct, row.allowed_risk_pct, row.account_equity,
                row.duration_ms, row.ts.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn upsert_position_risk(&self, row: &PositionRiskRow) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO position_risk (position_id, symbol, exchange, direction, status, risk_pct, opened_at, closed_at, realized_pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(position_id) DO UPDATE SET
                status = excluded.status,
                risk_pct = excluded.risk_pct,
                closed_at = excluded.closed_at,
                realized_pnl = excluded.realized_pnl",
            params![
                row.position_id, row.symbol, row.exchange, row.direction, row.status,
                row.risk_pct, row.opened_at.to_rfc3339(),
                row.closed_at.map(|t| t.to_rfc3339()), row.realized_pnl,
            ],
        )?;
        Ok(())
    }

    pub fn upsert_daily_risk(&self, row: &DailyRiskRow) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO daily_risk (date, budget_limit_pct, consumed_pct, peak_open_pct, trades_taken, trades_rejected, realized_pnl)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(date) DO UPDATE SET
                consumed_pct = excluded.consumed_pct,
                peak_open_pct = excluded.peak_open_pct,
                trades_taken = excluded.trades_taken,
                trades_rejected = excluded.trades_rejected,
                realized_pnl = excluded.realized_pnl",
            params![
                row.date, row.budget_limit_pct, row.consumed_pct, row.peak_open_pct,
                row.trades_taken, row.trades_rejected, row.realized_pnl,
            ],
        )?;
        Ok(())
    }

    pub fn append_drawdown(
        &self,
        peak_equity: f64,
        current_equity: f64,
        drawdown_pct: f64,
        triggered_halt: bool,
        ts: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO drawdown_history (peak_equity, current_equity, drawdown_pct, triggered_halt, ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![peak_equity, current_equity, drawdown_pct, triggered_halt as i64, ts.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn append_equity_snapshot(
        &self,
        account_equity: f64,
        peak_equity: f64,
        open_risk_pct: f64,
        daily_risk_used_pct: f64,
        ts: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO equity_snapshots (account_equity, peak_equity, open_risk_pct, daily_risk_used_pct, ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![account_equity, peak_equity, open_risk_pct, daily_risk_used_pct, ts.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn append_risk_alert(
        &self,
        severity: &str,
        title: &str,
        message: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO risk_alerts (severity, title, message, ts) VALUES (?1, ?2, ?3, ?4)",
            params![severity, title, message, ts.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn append_health_snapshot(
        &self,
        source: &str,
        final_score: f64,
        state: &str,
        ts: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO health_snapshots (source, final_score, state, ts) VALUES (?1, ?2, ?3, ?4)",
            params![source, final_score, state, ts.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn count_halt_events(&self) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("SELECT COUNT(*) FROM halt_events", [], |r| r.get(0))?)
    }
}

pub struct HaltEventRow {
    pub id: String,
    pub trigger: String,
    pub level: String,
    pub category: String,
    pub reason: String,
    pub monitor_id: Option<String>,
    pub correlation_id: Option<String>,
    pub snapshot_json: String,
    pub ts: DateTime<Utc>,
}

pub struct RiskEvaluationRow {
    pub request_id: String,
    pub symbol: String,
    pub decision: String,
    pub primary_reason: Option<String>,
    pub proposed_risk_pct: f64,
    pub allowed_risk_pct: f64,
    pub account_equity: f64,
    pub duration_ms: f64,
    pub ts: DateTime<Utc>,
}

pub struct PositionRiskRow {
    pub position_id: String,
    pub symbol: String,
    pub exchange: String,
    pub direction: String,
    pub status: String,
    pub risk_pct: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub realized_pnl: Option<f64>,
}

pub struct DailyRiskRow {
    pub date: String,
    pub budget_limit_pct: f64,
    pub consumed_pct: f64,
    pub peak_open_pct: f64,
    pub trades_taken: i64,
    pub trades_rejected: i64,
    pub realized_pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_event_write_failure_is_surfaced_not_swallowed() {
        let log = PersistenceLog::open_in_memory().unwrap();
        assert_eq!(log.count_halt_events().unwrap(), 0);
        log.append_halt_event(&HaltEventRow {
            id: "h1".into(),
            trigger: "CT_DRAWDOWN_EXCEEDED".into(),
            level: "HARD".into(),
            category: "CONTROL".into(),
            reason: "drawdown".into(),
            monitor_id: Some("control".into()),
            correlation_id: None,
            snapshot_json: "{}".into(),
            ts: Utc::now(),
        })
        .unwrap();
        assert_eq!(log.count_halt_events().unwrap(), 1);
    }

    #[test]
    fn position_risk_upsert_is_idempotent_by_position_id() {
        let log = PersistenceLog::open_in_memory().unwrap();
        let row = PositionRiskRow {
            position_id: "p1".into(),
            symbol: "BTCUSDT".into(),
            exchange: "binance".into(),
            direction: "LONG".into(),
            status: "OPEN".into(),
            risk_pct: 0.33,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl: None,
        };
        log.upsert_position_risk(&row).unwrap();
        let mut closed = row;
        closed.status = "CLOSED".into();
        closed.closed_at = Some(Utc::now());
        closed.realized_pnl = Some(12.5);
        log.upsert_position_risk(&closed).unwrap();

        let conn = log.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM position_risk", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let status: String = conn
            .query_row(
                "SELECT status FROM position_risk WHERE position_id = 'p1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(status, "CLOSED");
    }
}
