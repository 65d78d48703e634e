//! SQLite persistence for the session store.
//!
//! Three insert-only collections (sessions, interventions, followups) plus a
//! side table holding each session's factor tags so tag lookups can use an
//! index. Every operation opens its own connection; there is no pooling.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, Transaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use symptom_core::{FollowupRecord, InterventionRecord, Session, StoredSession};

use crate::error::{Result, SqliteContext, StoreError};

const SESSION_COLUMNS: &str = "id, started_at_iso, started_at_ms, baseline, factors, note";
const INTERVENTION_COLUMNS: &str = "id, session_id, kind, dose, note, at_iso, at_ms";
const FOLLOWUP_COLUMNS: &str = "id, session_id, minutes_after, intensity, note, at_iso, at_ms";

pub struct Db {
    path: PathBuf,
}

/// Per-collection row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CollectionCounts {
    pub sessions: u64,
    pub interventions: u64,
    pub followups: u64,
}

/// A session row before its factors JSON is decoded.
struct SessionRow {
    id: String,
    started_at_iso: String,
    started_at_ms: i64,
    baseline: u8,
    factors: String,
    note: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            started_at_iso: row.get(1)?,
            started_at_ms: row.get(2)?,
            baseline: row.get(3)?,
            factors: row.get(4)?,
            note: row.get(5)?,
        })
    }
}

impl Db {
    pub fn new(path: PathBuf) -> Result<Self> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Inserts a session and its tags atomically. Fails on a duplicate id.
    pub fn insert_session(&self, stored: &StoredSession) -> Result<()> {
        let factors = serde_json::to_string(&stored.session.factors).map_err(|source| {
            StoreError::Json {
                context: "Failed to serialize session factors",
                source,
            }
        })?;

        self.with_connection(|conn| {
            let tx = conn
                .transaction()
                .context("Failed to begin session insert")?;
            let session = &stored.session;
            tx.execute(
                "INSERT INTO sessions (id, started_at_iso, started_at_ms, baseline, factors, note) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id,
                    session.started_at_iso,
                    session.started_at_ms,
                    session.baseline,
                    factors,
                    session.note
                ],
            )
            .context("Failed to insert session")?;

            for tag in &stored.factor_tags {
                tx.execute(
                    "INSERT INTO session_factor_tags (session_id, tag) VALUES (?1, ?2)",
                    params![session.id, tag],
                )
                .context("Failed to insert session factor tag")?;
            }

            tx.commit().context("Failed to commit session insert")
        })
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        self.with_connection(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                    params![session_id],
                    SessionRow::from_row,
                )
                .optional()
                .context("Failed to query session")?;
            row.map(|row| hydrate_session(conn, row)).transpose()
        })
    }

    /// The session with the greatest `started_at_ms`.
    pub fn latest_session(&self) -> Result<Option<StoredSession>> {
        self.with_connection(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {SESSION_COLUMNS} FROM sessions \
                         ORDER BY started_at_ms DESC, id DESC LIMIT 1"
                    ),
                    [],
                    SessionRow::from_row,
                )
                .optional()
                .context("Failed to query latest session")?;
            row.map(|row| hydrate_session(conn, row)).transpose()
        })
    }

    /// Sessions with `started_at_ms >= cutoff_ms`, oldest first.
    pub fn sessions_started_since(&self, cutoff_ms: i64) -> Result<Vec<StoredSession>> {
        self.query_sessions(
            &format!(
                "SELECT {SESSION_COLUMNS} FROM sessions \
                 WHERE started_at_ms >= ?1 ORDER BY started_at_ms ASC, id ASC"
            ),
            params![cutoff_ms],
        )
    }

    /// Sessions whose factor tags include `tag`, oldest first.
    pub fn sessions_with_tag(&self, tag: &str) -> Result<Vec<StoredSession>> {
        self.query_sessions(
            "SELECT s.id, s.started_at_iso, s.started_at_ms, s.baseline, s.factors, s.note \
             FROM sessions s \
             JOIN session_factor_tags t ON t.session_id = s.id \
             WHERE t.tag = ?1 ORDER BY s.started_at_ms ASC, s.id ASC",
            params![tag],
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interventions
    // ─────────────────────────────────────────────────────────────────────

    pub fn insert_intervention(&self, record: &InterventionRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO interventions (id, session_id, kind, dose, note, at_iso, at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.session_id,
                    record.kind,
                    record.dose,
                    record.note,
                    record.at_iso,
                    record.at_ms
                ],
            )
            .context("Failed to insert intervention")?;
            Ok(())
        })
    }

    /// Interventions for a session, newest first.
    pub fn interventions_for_session(&self, session_id: &str) -> Result<Vec<InterventionRecord>> {
        self.query_interventions(
            &format!(
                "SELECT {INTERVENTION_COLUMNS} FROM interventions \
                 WHERE session_id = ?1 ORDER BY at_ms DESC, id DESC"
            ),
            params![session_id],
        )
    }

    /// Interventions of one type across all sessions, newest first.
    pub fn interventions_of_kind(&self, kind: &str) -> Result<Vec<InterventionRecord>> {
        self.query_interventions(
            &format!(
                "SELECT {INTERVENTION_COLUMNS} FROM interventions \
                 WHERE kind = ?1 ORDER BY at_ms DESC, id DESC"
            ),
            params![kind],
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Followups
    // ─────────────────────────────────────────────────────────────────────

    pub fn insert_followup(&self, record: &FollowupRecord) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO followups \
                    (id, session_id, minutes_after, intensity, note, at_iso, at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.session_id,
                    record.minutes_after,
                    record.intensity,
                    record.note,
                    record.at_iso,
                    record.at_ms
                ],
            )
            .context("Failed to insert followup")?;
            Ok(())
        })
    }

    /// Followups for a session, newest first.
    pub fn followups_for_session(&self, session_id: &str) -> Result<Vec<FollowupRecord>> {
        self.query_followups(
            &format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups \
                 WHERE session_id = ?1 ORDER BY at_ms DESC, id DESC"
            ),
            params![session_id],
        )
    }

    /// Followups whose intensity lies in `min..=max`, lowest intensity first.
    pub fn followups_with_intensity(&self, min: u8, max: u8) -> Result<Vec<FollowupRecord>> {
        self.query_followups(
            &format!(
                "SELECT {FOLLOWUP_COLUMNS} FROM followups \
                 WHERE intensity BETWEEN ?1 AND ?2 ORDER BY intensity ASC, at_ms ASC"
            ),
            params![min, max],
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Maintenance
    // ─────────────────────────────────────────────────────────────────────

    pub fn counts(&self) -> Result<CollectionCounts> {
        self.with_connection(|conn| {
            let count = |table: &str| -> Result<u64> {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|value| value.max(0) as u64)
                .context("Failed to count rows")
            };
            Ok(CollectionCounts {
                sessions: count("sessions")?,
                interventions: count("interventions")?,
                followups: count("followups")?,
            })
        })
    }

    /// Empties every collection in one transaction. Either all are cleared
    /// or, on failure, none are.
    pub fn clear_all(&self) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction().context("Failed to begin clear")?;
            clear_tables(&tx)?;
            tx.commit().context("Failed to commit clear")
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<StoredSession>> {
        self.with_connection(|conn| {
            let rows = {
                let mut stmt = conn.prepare(sql).context("Failed to prepare sessions query")?;
                let mapped = stmt
                    .query_map(params, SessionRow::from_row)
                    .context("Failed to query sessions")?;
                mapped
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .context("Failed to decode session row")?
            };
            rows.into_iter()
                .map(|row| hydrate_session(conn, row))
                .collect()
        })
    }

    fn query_interventions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<InterventionRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .context("Failed to prepare interventions query")?;
            let rows = stmt
                .query_map(params, |row| {
                    Ok(InterventionRecord {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        kind: row.get(2)?,
                        dose: row.get(3)?,
                        note: row.get(4)?,
                        at_iso: row.get(5)?,
                        at_ms: row.get(6)?,
                    })
                })
                .context("Failed to query interventions")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to decode intervention row")
        })
    }

    fn query_followups(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<FollowupRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .context("Failed to prepare followups query")?;
            let rows = stmt
                .query_map(params, |row| {
                    Ok(FollowupRecord {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        minutes_after: row.get(2)?,
                        intensity: row.get(3)?,
                        note: row.get(4)?,
                        at_iso: row.get(5)?,
                        at_ms: row.get(6)?,
                    })
                })
                .context("Failed to query followups")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("Failed to decode followup row")
        })
    }

    fn init_schema(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS sessions (
                    id TEXT PRIMARY KEY,
                    started_at_iso TEXT NOT NULL,
                    started_at_ms INTEGER NOT NULL,
                    baseline INTEGER NOT NULL,
                    factors TEXT NOT NULL,
                    note TEXT NOT NULL DEFAULT ''
                 );
                 CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions (started_at_ms);
                 CREATE INDEX IF NOT EXISTS idx_sessions_baseline ON sessions (baseline);
                 CREATE TABLE IF NOT EXISTS session_factor_tags (
                    session_id TEXT NOT NULL,
                    tag TEXT NOT NULL,
                    PRIMARY KEY (session_id, tag)
                 );
                 CREATE INDEX IF NOT EXISTS idx_session_factor_tags_tag ON session_factor_tags (tag);
                 CREATE TABLE IF NOT EXISTS interventions (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    dose TEXT NOT NULL DEFAULT '',
                    note TEXT NOT NULL DEFAULT '',
                    at_iso TEXT NOT NULL,
                    at_ms INTEGER NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_interventions_session ON interventions (session_id);
                 CREATE INDEX IF NOT EXISTS idx_interventions_at ON interventions (at_ms);
                 CREATE INDEX IF NOT EXISTS idx_interventions_kind ON interventions (kind);
                 CREATE TABLE IF NOT EXISTS followups (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL,
                    minutes_after INTEGER NOT NULL,
                    intensity INTEGER NOT NULL,
                    note TEXT NOT NULL DEFAULT '',
                    at_iso TEXT NOT NULL,
                    at_ms INTEGER NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_followups_session ON followups (session_id);
                 CREATE INDEX IF NOT EXISTS idx_followups_at ON followups (at_ms);
                 CREATE INDEX IF NOT EXISTS idx_followups_minutes_after ON followups (minutes_after);
                 CREATE INDEX IF NOT EXISTS idx_followups_intensity ON followups (intensity);
                 COMMIT;",
            )
            .context("Failed to initialize schema")
        })
    }

    fn with_connection<T>(&self, op: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent).map_err(|source| StoreError::DataDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn =
            Connection::open_with_flags(&self.path, flags).map_err(|source| StoreError::Open {
                path: self.path.clone(),
                source,
            })?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("Failed to set synchronous")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("Failed to set busy_timeout")?;

        Ok(conn)
    }
}

fn clear_tables(tx: &Transaction<'_>) -> Result<()> {
    for (sql, context) in [
        ("DELETE FROM sessions", "Failed to clear sessions"),
        (
            "DELETE FROM session_factor_tags",
            "Failed to clear session factor tags",
        ),
        ("DELETE FROM interventions", "Failed to clear interventions"),
        ("DELETE FROM followups", "Failed to clear followups"),
    ] {
        tx.execute(sql, []).context(context)?;
    }
    Ok(())
}

fn hydrate_session(conn: &Connection, row: SessionRow) -> Result<StoredSession> {
    let factors = serde_json::from_str(&row.factors).map_err(|source| StoreError::Json {
        context: "Failed to parse session factors",
        source,
    })?;

    let mut stmt = conn
        .prepare_cached("SELECT tag FROM session_factor_tags WHERE session_id = ?1 ORDER BY tag")
        .context("Failed to prepare factor tag query")?;
    let factor_tags = stmt
        .query_map(params![row.id], |tag_row| tag_row.get::<_, String>(0))
        .context("Failed to query factor tags")?
        .collect::<rusqlite::Result<BTreeSet<String>>>()
        .context("Failed to decode factor tag row")?;

    Ok(StoredSession {
        session: Session {
            id: row.id,
            started_at_iso: row.started_at_iso,
            started_at_ms: row.started_at_ms,
            baseline: row.baseline,
            factors,
            note: row.note,
        },
        factor_tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use symptom_core::time::from_ms;
    use symptom_core::{NewFollowup, NewInterventionRecord, NewSession};

    fn temp_db() -> (tempfile::TempDir, Db) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Db::new(temp_dir.path().join("tracker.db")).expect("db init");
        (temp_dir, db)
    }

    fn stored_session_at(ms: i64) -> StoredSession {
        StoredSession::from_session(Session::new_at(NewSession::default(), from_ms(ms)))
    }

    fn intervention_at(session_id: &str, kind: &str, ms: i64) -> InterventionRecord {
        InterventionRecord::new_at(
            NewInterventionRecord {
                session_id: session_id.to_string(),
                kind: kind.to_string(),
                ..NewInterventionRecord::default()
            },
            from_ms(ms),
        )
    }

    #[test]
    fn schema_creates_all_collections() {
        let (_temp_dir, db) = temp_db();
        let conn = db.open().expect("open db");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .expect("prepare");
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .expect("query tables")
            .collect::<rusqlite::Result<Vec<_>>>()
            .expect("collect tables");

        for expected in [
            "sessions",
            "session_factor_tags",
            "interventions",
            "followups",
        ] {
            assert!(tables.iter().any(|name| name == expected), "{expected}");
        }
    }

    #[test]
    fn reopening_existing_db_keeps_rows() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("tracker.db");
        let stored = stored_session_at(1_000);
        Db::new(path.clone())
            .expect("db init")
            .insert_session(&stored)
            .expect("insert");

        let reopened = Db::new(path).expect("db reopen");
        assert_eq!(
            reopened.get_session(&stored.session.id).expect("get"),
            Some(stored)
        );
    }

    #[test]
    fn duplicate_session_id_is_rejected_without_partial_tags() {
        let (_temp_dir, db) = temp_db();
        let stored = stored_session_at(1_000);
        db.insert_session(&stored).expect("first insert");

        let mut clash = stored.clone();
        clash.factor_tags.insert("caffeine".to_string());
        let err = db.insert_session(&clash).expect_err("duplicate id");
        assert!(matches!(err, StoreError::Sqlite { .. }));

        let loaded = db.get_session(&stored.session.id).expect("get").expect("row");
        assert!(loaded.factor_tags.is_empty());
    }

    #[test]
    fn latest_session_orders_by_start_time() {
        let (_temp_dir, db) = temp_db();
        assert!(db.latest_session().expect("latest").is_none());

        let newest = stored_session_at(3_000);
        db.insert_session(&stored_session_at(1_000)).expect("insert");
        db.insert_session(&newest).expect("insert");
        db.insert_session(&stored_session_at(2_000)).expect("insert");

        let latest = db.latest_session().expect("latest").expect("some");
        assert_eq!(latest.session.id, newest.session.id);
    }

    #[test]
    fn latest_session_breaks_same_millisecond_ties_by_creation_order() {
        let (_temp_dir, db) = temp_db();
        let sessions: Vec<StoredSession> = (0..5).map(|_| stored_session_at(5_000)).collect();
        for stored in sessions.iter().rev() {
            db.insert_session(stored).expect("insert");
        }

        let latest = db.latest_session().expect("latest").expect("some");
        assert_eq!(latest.session.id, sessions[4].session.id);
    }

    #[test]
    fn sessions_started_since_is_inclusive() {
        let (_temp_dir, db) = temp_db();
        for ms in [1_000, 2_000, 3_000] {
            db.insert_session(&stored_session_at(ms)).expect("insert");
        }
        let starts: Vec<i64> = db
            .sessions_started_since(2_000)
            .expect("query")
            .into_iter()
            .map(|stored| stored.session.started_at_ms)
            .collect();
        assert_eq!(starts, vec![2_000, 3_000]);
    }

    #[test]
    fn interventions_filter_by_session_and_kind() {
        let (_temp_dir, db) = temp_db();
        db.insert_intervention(&intervention_at("s1", "Ibuprofen", 1_000))
            .expect("insert");
        db.insert_intervention(&intervention_at("s1", "Water", 3_000))
            .expect("insert");
        db.insert_intervention(&intervention_at("s2", "Ibuprofen", 2_000))
            .expect("insert");

        let for_s1: Vec<i64> = db
            .interventions_for_session("s1")
            .expect("query")
            .iter()
            .map(|record| record.at_ms)
            .collect();
        assert_eq!(for_s1, vec![3_000, 1_000]);

        let ibuprofen: Vec<String> = db
            .interventions_of_kind("Ibuprofen")
            .expect("query")
            .into_iter()
            .map(|record| record.session_id)
            .collect();
        assert_eq!(ibuprofen, vec!["s2".to_string(), "s1".to_string()]);
    }

    #[test]
    fn followups_filter_by_intensity_range() {
        let (_temp_dir, db) = temp_db();
        for (intensity, ms) in [(8.0, 1_000), (2.0, 2_000), (5.0, 3_000)] {
            let followup = FollowupRecord::new_at(
                NewFollowup {
                    session_id: "s1".to_string(),
                    intensity,
                    ..NewFollowup::default()
                },
                from_ms(ms),
            );
            db.insert_followup(&followup).expect("insert");
        }

        let mid: Vec<u8> = db
            .followups_with_intensity(2, 5)
            .expect("query")
            .iter()
            .map(|record| record.intensity)
            .collect();
        assert_eq!(mid, vec![2, 5]);
    }

    #[test]
    fn clear_all_empties_every_collection() {
        let (_temp_dir, db) = temp_db();
        let mut stored = stored_session_at(1_000);
        stored.factor_tags.insert("low_sleep".to_string());
        db.insert_session(&stored).expect("insert session");
        db.insert_intervention(&intervention_at(&stored.session.id, "Water", 1_500))
            .expect("insert intervention");

        assert_eq!(
            db.counts().expect("counts"),
            CollectionCounts {
                sessions: 1,
                interventions: 1,
                followups: 0
            }
        );

        db.clear_all().expect("clear");
        assert_eq!(db.counts().expect("counts"), CollectionCounts::default());
        assert!(db.sessions_with_tag("low_sleep").expect("query").is_empty());
    }

    #[test]
    fn failed_clear_rolls_back_every_collection() {
        let (_temp_dir, db) = temp_db();
        let mut stored = stored_session_at(1_000);
        stored.factor_tags.insert("low_sleep".to_string());
        db.insert_session(&stored).expect("insert session");
        db.insert_intervention(&intervention_at(&stored.session.id, "Water", 1_500))
            .expect("insert intervention");
        db.insert_followup(&FollowupRecord::new_at(
            NewFollowup {
                session_id: stored.session.id.clone(),
                ..NewFollowup::default()
            },
            from_ms(2_000),
        ))
        .expect("insert followup");

        // Followups are cleared last, after sessions and interventions.
        db.open()
            .expect("open db")
            .execute_batch(
                "CREATE TRIGGER block_followup_delete BEFORE DELETE ON followups
                 BEGIN SELECT RAISE(ABORT, 'followups locked'); END;",
            )
            .expect("install trigger");

        let err = db.clear_all().expect_err("clear must fail");
        assert!(matches!(
            err,
            StoreError::Sqlite {
                context: "Failed to clear followups",
                ..
            }
        ));
        assert_eq!(
            db.counts().expect("counts"),
            CollectionCounts {
                sessions: 1,
                interventions: 1,
                followups: 1
            }
        );
        assert_eq!(db.sessions_with_tag("low_sleep").expect("query").len(), 1);
    }
}
