use crate::analysis::day::DayWindow;
use crate::commands::sources::{HistoryStore, SignalReader};
use crate::errors::{PostureError, PostureResult, SourceError};
use crate::models::signal::*;
use crate::models::snapshot::ScoreSnapshot;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::path::Path;
use std::sync::Mutex;

const DB_SCHEMA_VERSION: i64 = 2;
pub const DATA_DIR_NAME: &str = ".posture";

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("state.db schema v{version} is newer than v{DB_SCHEMA_VERSION}; continuing");
    }

    Ok(())
}

// Signal tables are owned by the record-management layer; only the score log is written here.
fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS security_score_logs (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            score REAL NOT NULL CHECK(score >= 0 AND score <= 100)
        );

        CREATE TABLE IF NOT EXISTS vulnerabilities (
            id TEXT PRIMARY KEY,
            severity TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'open'
        );

        CREATE TABLE IF NOT EXISTS threats (
            id TEXT PRIMARY KEY,
            severity TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS security_events (
            id TEXT PRIMARY KEY,
            severity TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS system_monitors (
            id TEXT PRIMARY KEY,
            system_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unknown',
            last_heartbeat INTEGER NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_score_logs_timestamp ON security_score_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_vulnerabilities_status ON vulnerabilities(status);
        CREATE INDEX IF NOT EXISTS idx_threats_status ON threats(status);
        CREATE INDEX IF NOT EXISTS idx_security_events_timestamp ON security_events(timestamp);
        CREATE INDEX IF NOT EXISTS idx_system_monitors_system_id ON system_monitors(system_id);
        ",
    )
}

/// Open (creating if needed) `<data_dir>/.posture/state.db` with the schema applied.
pub fn get_db_connection(data_dir: &str) -> PostureResult<Connection> {
    let dir = Path::new(data_dir).join(DATA_DIR_NAME);
    std::fs::create_dir_all(&dir).map_err(|e| PostureError::io(e, &dir))?;
    let conn = Connection::open(dir.join("state.db"))?;
    initialize_schema(&conn)?;
    Ok(conn)
}

/// SQLite-backed signal reader and score history.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(data_dir: &str) -> PostureResult<Self> {
        Ok(Self {
            conn: Mutex::new(get_db_connection(data_dir)?),
        })
    }

    pub fn open_in_memory() -> PostureResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> std::result::Result<T, SourceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SourceError::from("state.db connection lock poisoned"))?;
        f(&conn).map_err(SourceError::from)
    }
}

fn millis_to_utc(column: usize, millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}

fn snapshot_from_row(row: &Row<'_>) -> Result<ScoreSnapshot> {
    Ok(ScoreSnapshot {
        id: row.get(0)?,
        timestamp: millis_to_utc(1, row.get(1)?)?,
        score: row.get(2)?,
    })
}

fn severities(conn: &Connection, sql: &str) -> Result<Vec<Severity>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.map(|r| r.map(|raw| Severity::parse(&raw))).collect()
}

impl SignalReader for SqliteStore {
    fn read_open_vulnerabilities(&self) -> std::result::Result<Vec<VulnerabilityRecord>, SourceError> {
        self.with_conn(|conn| {
            let found = severities(
                conn,
                "SELECT severity FROM vulnerabilities WHERE lower(status) = 'open'",
            )?;
            Ok(found.into_iter().map(|severity| VulnerabilityRecord { severity }).collect())
        })
    }

    fn read_active_threats(&self) -> std::result::Result<Vec<ThreatRecord>, SourceError> {
        self.with_conn(|conn| {
            let found = severities(conn, "SELECT severity FROM threats WHERE lower(status) = 'active'")?;
            Ok(found.into_iter().map(|severity| ThreatRecord { severity }).collect())
        })
    }

    fn read_recent_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> std::result::Result<Vec<EventRecord>, SourceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT severity, timestamp FROM security_events
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC",
            )?;
            let rows = stmt.query_map(
                params![window_start.timestamp_millis(), window_end.timestamp_millis()],
                |row| {
                    Ok(EventRecord {
                        severity: Severity::parse(&row.get::<_, String>(0)?),
                        timestamp: millis_to_utc(1, row.get(1)?)?,
                    })
                },
            )?;
            rows.collect()
        })
    }

    fn read_system_health(&self) -> std::result::Result<Vec<HealthRecord>, SourceError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT system_id, status, last_heartbeat FROM system_monitors")?;
            let rows = stmt.query_map([], |row| {
                Ok(HealthRecord {
                    system_id: row.get(0)?,
                    status: HealthStatus::parse(&row.get::<_, String>(1)?),
                    last_heartbeat: millis_to_utc(2, row.get(2)?)?,
                })
            })?;
            rows.collect()
        })
    }
}

impl HistoryStore for SqliteStore {
    fn find_latest_for_day(&self, day: &DayWindow) -> std::result::Result<Option<ScoreSnapshot>, SourceError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, timestamp, score FROM security_score_logs
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                params![day.start.timestamp_millis(), day.end.timestamp_millis()],
                snapshot_from_row,
            )
            .optional()
        })
    }

    fn find_latest(&self) -> std::result::Result<Option<ScoreSnapshot>, SourceError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, timestamp, score FROM security_score_logs
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                [],
                snapshot_from_row,
            )
            .optional()
        })
    }

    fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Vec<ScoreSnapshot>, SourceError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, score FROM security_score_logs
                 WHERE timestamp >= ?1 AND timestamp < ?2
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(
                params![start.timestamp_millis(), end.timestamp_millis()],
                snapshot_from_row,
            )?;
            rows.collect()
        })
    }

    fn append(&self, score: f64, timestamp: DateTime<Utc>) -> std::result::Result<ScoreSnapshot, SourceError> {
        let id = uuid::Uuid::new_v4().to_string();
        // Stored at millisecond precision; hand back what a later read would see.
        let stored_at = millis_to_utc(1, timestamp.timestamp_millis()).map_err(SourceError::from)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO security_score_logs (id, timestamp, score) VALUES (?1, ?2, ?3)",
                params![id, stored_at.timestamp_millis(), score],
            )
        })?;

        Ok(ScoreSnapshot {
            id,
            score,
            timestamp: stored_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::day::DayBoundary;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn seed(store: &SqliteStore, sql: &str) {
        store.conn.lock().unwrap().execute_batch(sql).expect("seed");
    }

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("schema init");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("schema version");
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn schema_init_is_repeatable() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        initialize_schema(&conn).expect("first init");
        initialize_schema(&conn).expect("second init");
    }

    #[test]
    fn latest_for_day_picks_newest_entry_inside_the_window() {
        let store = SqliteStore::open_in_memory().expect("store");
        store.append(70.0, at("2024-05-01T08:00:00Z")).expect("append");
        store.append(72.5, at("2024-05-01T18:00:00Z")).expect("append");
        store.append(90.0, at("2024-05-02T01:00:00Z")).expect("append");

        let day = DayBoundary::Utc.window_containing(at("2024-05-01T12:00:00Z"));
        let found = store.find_latest_for_day(&day).expect("query").expect("entry");
        assert_eq!(found.score, 72.5);

        let empty = DayBoundary::Utc.window_containing(at("2024-04-30T12:00:00Z"));
        assert!(store.find_latest_for_day(&empty).expect("query").is_none());
    }

    #[test]
    fn equal_timestamps_resolve_to_last_insert() {
        let store = SqliteStore::open_in_memory().expect("store");
        let t = at("2024-05-01T08:00:00Z");
        store.append(70.0, t).expect("append");
        store.append(71.0, t).expect("append");

        let latest = store.find_latest().expect("query").expect("entry");
        assert_eq!(latest.score, 71.0);
    }

    #[test]
    fn list_between_is_ascending_and_half_open() {
        let store = SqliteStore::open_in_memory().expect("store");
        store.append(60.0, at("2024-05-01T00:00:00Z")).expect("append");
        store.append(61.0, at("2024-05-01T12:00:00Z")).expect("append");
        store.append(62.0, at("2024-05-02T00:00:00Z")).expect("append");

        let rows = store
            .list_between(at("2024-05-01T00:00:00Z"), at("2024-05-02T00:00:00Z"))
            .expect("list");
        let scores: Vec<f64> = rows.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![60.0, 61.0]);
    }

    #[test]
    fn reads_signals_with_status_and_window_filters() {
        let store = SqliteStore::open_in_memory().expect("store");
        let inside = at("2024-05-01T10:00:00Z").timestamp_millis();
        let outside = at("2024-04-29T10:00:00Z").timestamp_millis();
        seed(
            &store,
            &format!(
                "INSERT INTO vulnerabilities VALUES ('v1', 'CRITICAL', 'open'), ('v2', 'high', 'patched');
                 INSERT INTO threats VALUES ('t1', 'medium', 'active'), ('t2', 'critical', 'closed');
                 INSERT INTO security_events VALUES ('e1', 'low', {inside}), ('e2', 'high', {outside});
                 INSERT INTO system_monitors VALUES ('m1', 'sys-a', 'online', {outside}), ('m2', 'sys-a', 'offline', {inside});"
            ),
        );

        let vulns = store.read_open_vulnerabilities().expect("vulns");
        assert_eq!(vulns, vec![VulnerabilityRecord { severity: Severity::Critical }]);

        let threats = store.read_active_threats().expect("threats");
        assert_eq!(threats, vec![ThreatRecord { severity: Severity::Medium }]);

        let events = store
            .read_recent_events(at("2024-04-30T12:00:00Z"), at("2024-05-01T12:00:00Z"))
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Low);

        assert_eq!(store.read_system_health().expect("health").len(), 2);
    }

    #[test]
    fn rejects_scores_outside_bounds() {
        let store = SqliteStore::open_in_memory().expect("store");
        assert!(store.append(101.0, at("2024-05-01T00:00:00Z")).is_err());
    }
}
