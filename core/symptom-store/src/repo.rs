//! Session store facade.
//!
//! Each operation maps onto one store call; operations are not coupled
//! transactionally with each other. Failures propagate unchanged.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

use symptom_core::time::MS_PER_DAY;
use symptom_core::{FollowupRecord, InterventionRecord, Session, StoredSession};

use crate::db::{CollectionCounts, Db};
use crate::error::Result;

/// A session with its intervention and followup records, each newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionBundle {
    pub session: StoredSession,
    pub interventions: Vec<InterventionRecord>,
    pub followups: Vec<FollowupRecord>,
}

pub struct SessionStore {
    db: Db,
}

impl SessionStore {
    /// Opens (creating if needed) the store at `path`.
    pub fn open(path: PathBuf) -> Result<Self> {
        let db = Db::new(path)?;
        info!(path = %db.path().display(), "Session store opened");
        Ok(Self { db })
    }

    /// Stores the session with its factor tags derived now. Returns the id.
    pub fn create_session(&self, session: &Session) -> Result<String> {
        let stored = StoredSession::from_session(session.clone());
        self.db.insert_session(&stored)?;
        debug!(
            session_id = %session.id,
            tags = stored.factor_tags.len(),
            "Session created"
        );
        Ok(session.id.clone())
    }

    pub fn add_intervention(&self, record: &InterventionRecord) -> Result<()> {
        self.db.insert_intervention(record)?;
        debug!(
            session_id = %record.session_id,
            kind = %record.kind,
            "Intervention recorded"
        );
        Ok(())
    }

    pub fn add_followup(&self, record: &FollowupRecord) -> Result<()> {
        self.db.insert_followup(record)?;
        debug!(
            session_id = %record.session_id,
            minutes_after = record.minutes_after,
            intensity = record.intensity,
            "Followup recorded"
        );
        Ok(())
    }

    /// The session alone, without its records. `None` when unknown.
    pub fn get_session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        self.db.get_session(session_id)
    }

    pub fn get_latest_session(&self) -> Result<Option<StoredSession>> {
        self.db.latest_session()
    }

    /// `None` when the session id is unknown.
    pub fn get_session_bundle(&self, session_id: &str) -> Result<Option<SessionBundle>> {
        let Some(session) = self.db.get_session(session_id)? else {
            debug!(session_id, "Session bundle requested for unknown session");
            return Ok(None);
        };
        let interventions = self.db.interventions_for_session(session_id)?;
        let followups = self.db.followups_for_session(session_id)?;
        Ok(Some(SessionBundle {
            session,
            interventions,
            followups,
        }))
    }

    /// Sessions started within the last `days` days.
    pub fn get_sessions_in_last_days(&self, days: u32) -> Result<Vec<StoredSession>> {
        self.get_sessions_in_last_days_at(days, Utc::now())
    }

    pub fn get_sessions_in_last_days_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<StoredSession>> {
        let cutoff = now.timestamp_millis() - i64::from(days) * MS_PER_DAY;
        self.db.sessions_started_since(cutoff)
    }

    pub fn get_sessions_with_factor(&self, tag: &str) -> Result<Vec<StoredSession>> {
        self.db.sessions_with_tag(tag)
    }

    pub fn get_interventions_by_type(&self, kind: &str) -> Result<Vec<InterventionRecord>> {
        self.db.interventions_of_kind(kind)
    }

    pub fn get_followups_by_intensity(&self, min: u8, max: u8) -> Result<Vec<FollowupRecord>> {
        self.db.followups_with_intensity(min, max)
    }

    pub fn counts(&self) -> Result<CollectionCounts> {
        self.db.counts()
    }

    /// Empties sessions, interventions and followups atomically.
    pub fn clear_all(&self) -> Result<()> {
        self.db.clear_all()?;
        info!("Session store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symptom_core::time::from_ms;
    use symptom_core::{FactorValue, Factors, NewFollowup, NewInterventionRecord, NewSession};

    fn temp_store() -> (tempfile::TempDir, SessionStore) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let store = SessionStore::open(temp_dir.path().join("tracker.db")).expect("open store");
        (temp_dir, store)
    }

    #[test]
    fn create_session_round_trips_through_bundle() {
        let (_temp_dir, store) = temp_store();
        let mut factors = Factors::new();
        factors.insert("high_stress".to_string(), FactorValue::Flag(true));
        let session = Session::new(NewSession {
            baseline: 7.0,
            factors,
            note: "deadline week".to_string(),
        });

        let id = store.create_session(&session).expect("create");
        assert_eq!(id, session.id);

        let bundle = store
            .get_session_bundle(&id)
            .expect("bundle")
            .expect("known session");
        assert_eq!(bundle.session.session, session);
        assert_eq!(
            bundle.session.factor_tags.iter().collect::<Vec<_>>(),
            vec!["high_stress"]
        );
        assert!(bundle.interventions.is_empty());
        assert!(bundle.followups.is_empty());
    }

    #[test]
    fn bundle_for_unknown_session_is_none() {
        let (_temp_dir, store) = temp_store();
        assert!(store.get_session_bundle("nope").expect("bundle").is_none());
    }

    #[test]
    fn get_session_returns_session_without_records() {
        let (_temp_dir, store) = temp_store();
        let session = Session::new(NewSession::default());
        store.create_session(&session).expect("create");

        let stored = store
            .get_session(&session.id)
            .expect("get")
            .expect("known session");
        assert_eq!(stored.session, session);
        assert!(store.get_session("nope").expect("get").is_none());
    }

    #[test]
    fn bundle_lists_records_newest_first() {
        let (_temp_dir, store) = temp_store();
        let session = Session::new_at(NewSession::default(), from_ms(1_000));
        store.create_session(&session).expect("create");

        for ms in [2_000, 4_000, 3_000] {
            store
                .add_intervention(&InterventionRecord::new_at(
                    NewInterventionRecord {
                        session_id: session.id.clone(),
                        kind: "Water".to_string(),
                        ..NewInterventionRecord::default()
                    },
                    from_ms(ms),
                ))
                .expect("add intervention");
            store
                .add_followup(&FollowupRecord::new_at(
                    NewFollowup {
                        session_id: session.id.clone(),
                        ..NewFollowup::default()
                    },
                    from_ms(ms + 10),
                ))
                .expect("add followup");
        }
        store
            .add_followup(&FollowupRecord::new_at(
                NewFollowup {
                    session_id: "someone-else".to_string(),
                    ..NewFollowup::default()
                },
                from_ms(9_000),
            ))
            .expect("add unrelated followup");

        let bundle = store
            .get_session_bundle(&session.id)
            .expect("bundle")
            .expect("known session");
        let intervention_times: Vec<i64> =
            bundle.interventions.iter().map(|r| r.at_ms).collect();
        let followup_times: Vec<i64> = bundle.followups.iter().map(|r| r.at_ms).collect();
        assert_eq!(intervention_times, vec![4_000, 3_000, 2_000]);
        assert_eq!(followup_times, vec![4_010, 3_010, 2_010]);
    }

    #[test]
    fn sessions_in_last_days_uses_cutoff() {
        let (_temp_dir, store) = temp_store();
        let now = from_ms(100 * MS_PER_DAY);
        let old = Session::new_at(NewSession::default(), from_ms(90 * MS_PER_DAY - 1));
        let edge = Session::new_at(NewSession::default(), from_ms(90 * MS_PER_DAY));
        let recent = Session::new_at(NewSession::default(), from_ms(99 * MS_PER_DAY));
        for session in [&old, &edge, &recent] {
            store.create_session(session).expect("create");
        }

        let ids: Vec<String> = store
            .get_sessions_in_last_days_at(10, now)
            .expect("query")
            .into_iter()
            .map(|stored| stored.session.id)
            .collect();
        assert_eq!(ids, vec![edge.id.clone(), recent.id.clone()]);

        assert!(store
            .get_sessions_in_last_days_at(0, now)
            .expect("query")
            .is_empty());
    }

    #[test]
    fn factor_tags_are_not_resynced_after_write() {
        let (_temp_dir, store) = temp_store();
        let mut session = Session::new(NewSession::default());
        store.create_session(&session).expect("create");

        // Mutating the caller's copy after the write does not reach the store.
        session
            .factors
            .insert("caffeine".to_string(), FactorValue::Flag(true));
        assert!(store
            .get_sessions_with_factor("caffeine")
            .expect("query")
            .is_empty());
    }

    #[test]
    fn clear_all_removes_everything() {
        let (_temp_dir, store) = temp_store();
        let session = Session::new(NewSession::default());
        store.create_session(&session).expect("create");
        store
            .add_followup(&FollowupRecord::new(NewFollowup {
                session_id: session.id.clone(),
                ..NewFollowup::default()
            }))
            .expect("add followup");

        store.clear_all().expect("clear");
        assert!(store.get_latest_session().expect("latest").is_none());
        assert!(store.get_session_bundle(&session.id).expect("bundle").is_none());
        assert_eq!(store.counts().expect("counts"), CollectionCounts::default());
    }
}
