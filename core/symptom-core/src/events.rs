//! The unified event log entry.
//!
//! Intensity snapshots and intervention doses share one insertion-ordered
//! timeline. Each entry carries its epoch-millisecond time and the local day
//! key it falls on; the kind-specific payload lives in [`EventKind`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerEvent {
    pub id: String,
    pub time: i64,
    pub day_key: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    #[serde(rename_all = "camelCase")]
    Intensity { intensity_value: u8 },
    #[serde(rename_all = "camelCase")]
    Intervention {
        intervention_id: String,
        name: String,
        delta: f64,
        amount_after: f64,
        intensity_at_log: u8,
    },
}

impl TrackerEvent {
    /// The intervention this event logged, if it is a dose.
    pub fn intervention_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Intervention {
                intervention_id, ..
            } => Some(intervention_id),
            EventKind::Intensity { .. } => None,
        }
    }

    pub fn is_intensity(&self) -> bool {
        matches!(self.kind, EventKind::Intensity { .. })
    }
}
