//! Persistent record types: headache sessions, intervention records and
//! followups.
//!
//! Records are built once through their constructors and never updated.
//! Every record gets a ULID id and immutable ISO/epoch-ms timestamps.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};
use ulid::{Generator, Ulid};

use crate::time::iso_timestamp;

pub const MAX_MINUTES_AFTER: u16 = 1440;
pub const DEFAULT_BASELINE: f64 = 5.0;

/// A contextual factor: a yes/no flag or free text (e.g. `other`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Flag(bool),
    Text(String),
}

pub type Factors = BTreeMap<String, FactorValue>;

/// The factor checklist every new session starts from.
pub fn default_factors() -> Factors {
    let mut factors: Factors = [
        "low_sleep",
        "high_stress",
        "dehydration",
        "caffeine",
        "skipped_meal",
        "screen_strain",
        "sickness",
        "exercise",
        "period",
    ]
    .into_iter()
    .map(|name| (name.to_string(), FactorValue::Flag(false)))
    .collect();
    factors.insert("other".to_string(), FactorValue::Text(String::new()));
    factors
}

/// Keys of `factors` whose value is `true`.
pub fn factor_tags(factors: &Factors) -> BTreeSet<String> {
    factors
        .iter()
        .filter(|(_, value)| matches!(value, FactorValue::Flag(true)))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Rounds to the nearest integer and clamps to 0..=10. NaN becomes 0.
pub fn clamp_intensity(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 10.0) as u8
}

/// Rounds to whole minutes and clamps to 0..=1440. NaN becomes 0.
pub fn clamp_minutes(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, f64::from(MAX_MINUTES_AFTER)) as u16
}

static ID_GENERATOR: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

/// Ids created by one process sort in creation order, even within the same
/// millisecond.
fn new_id() -> String {
    let mut generator = ID_GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);
    // Overflows only after 2^80 ids in one millisecond.
    generator
        .generate()
        .unwrap_or_else(|_| Ulid::new())
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════════════════════════

/// One headache episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(rename = "startedAtISO")]
    pub started_at_iso: String,
    pub started_at_ms: i64,
    pub baseline: u8,
    pub factors: Factors,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub baseline: f64,
    /// Overlaid on top of `default_factors()`.
    pub factors: Factors,
    pub note: String,
}

impl Default for NewSession {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE,
            factors: Factors::new(),
            note: String::new(),
        }
    }
}

impl Session {
    pub fn new(params: NewSession) -> Self {
        Self::new_at(params, Utc::now())
    }

    pub fn new_at(params: NewSession, now: DateTime<Utc>) -> Self {
        let mut factors = default_factors();
        factors.extend(params.factors);
        Self {
            id: new_id(),
            started_at_iso: iso_timestamp(now),
            started_at_ms: now.timestamp_millis(),
            baseline: clamp_intensity(params.baseline),
            factors,
            note: params.note,
        }
    }
}

/// A session as persisted: the session plus the factor tags derived from it
/// at write time. Tags are not recomputed if `factors` changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(flatten)]
    pub session: Session,
    pub factor_tags: BTreeSet<String>,
}

impl StoredSession {
    pub fn from_session(session: Session) -> Self {
        let factor_tags = factor_tags(&session.factors);
        Self {
            session,
            factor_tags,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Intervention record
// ═══════════════════════════════════════════════════════════════════════════════

/// Something taken or done during a session (medication, water, rest...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRecord {
    pub id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub dose: String,
    pub note: String,
    #[serde(rename = "atISO")]
    pub at_iso: String,
    pub at_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewInterventionRecord {
    pub session_id: String,
    /// Blank becomes `"Unknown"`.
    pub kind: String,
    pub dose: String,
    pub note: String,
}

impl InterventionRecord {
    pub fn new(params: NewInterventionRecord) -> Self {
        Self::new_at(params, Utc::now())
    }

    pub fn new_at(params: NewInterventionRecord, now: DateTime<Utc>) -> Self {
        let kind = if params.kind.is_empty() {
            "Unknown".to_string()
        } else {
            params.kind
        };
        Self {
            id: new_id(),
            session_id: params.session_id,
            kind,
            dose: params.dose,
            note: params.note,
            at_iso: iso_timestamp(now),
            at_ms: now.timestamp_millis(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Followup record
// ═══════════════════════════════════════════════════════════════════════════════

/// An intensity check some minutes after the session started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupRecord {
    pub id: String,
    pub session_id: String,
    pub minutes_after: u16,
    pub intensity: u8,
    pub note: String,
    #[serde(rename = "atISO")]
    pub at_iso: String,
    pub at_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFollowup {
    pub session_id: String,
    pub minutes_after: f64,
    pub intensity: f64,
    pub note: String,
}

impl Default for NewFollowup {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            minutes_after: 30.0,
            intensity: 5.0,
            note: String::new(),
        }
    }
}

impl FollowupRecord {
    pub fn new(params: NewFollowup) -> Self {
        Self::new_at(params, Utc::now())
    }

    pub fn new_at(params: NewFollowup, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            session_id: params.session_id,
            minutes_after: clamp_minutes(params.minutes_after),
            intensity: clamp_intensity(params.intensity),
            note: params.note,
            at_iso: iso_timestamp(now),
            at_ms: now.timestamp_millis(),
        }
    }
}
