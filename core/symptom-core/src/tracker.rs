//! Live tracker: current intensity, intervention ledger, unified event log.
//!
//! Everything here is process-local and lost when the tracker is dropped.
//! Invalid input is rejected silently: a rejected call returns `None`/`false`
//! and leaves every piece of state untouched.
//!
//! ## Invariants
//!
//! - An intervention's `amount` never exceeds its `max` and equals the sum of
//!   the `delta`s logged for it.
//! - Intervention events are only appended with `delta > 0`.
//! - `intensity_at_log` is the intensity at the moment of logging.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::config::{InterventionSeed, TrackerConfig};
use crate::events::{EventKind, TrackerEvent};
use crate::patterns::slugify;
use crate::time::{day_key, now_ms};

pub const DEFAULT_INTENSITY: u8 = 5;
pub const MAX_INTENSITY: u8 = 10;
/// How many history entries a listing shows; older ones stay in memory.
pub const DEFAULT_DISPLAY_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intervention {
    pub id: String,
    pub name: String,
    pub unit: String,
    /// Units logged so far.
    pub amount: f64,
    /// Daily cap.
    pub max: u32,
}

impl Intervention {
    fn water() -> Self {
        Self {
            id: "water".to_string(),
            name: "Drink Water".to_string(),
            unit: "cups".to_string(),
            amount: 0.0,
            max: 8,
        }
    }

    pub fn remaining(&self) -> f64 {
        (f64::from(self.max) - self.amount).max(0.0)
    }

    pub fn is_at_max(&self) -> bool {
        self.amount >= f64::from(self.max)
    }
}

/// Card-style view of one intervention and its most recent dose.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionSummary {
    #[serde(flatten)]
    pub intervention: Intervention,
    pub at_max: bool,
    pub last_logged: Option<LastLogged>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLogged {
    pub delta: f64,
    pub intensity_at_log: u8,
    pub time: i64,
}

/// Raw, not yet submitted quantity text per intervention.
#[derive(Debug, Clone, Default)]
pub struct PendingQuantities {
    inputs: HashMap<String, String>,
}

impl PendingQuantities {
    pub fn set(&mut self, intervention_id: &str, raw: impl Into<String>) {
        self.inputs.insert(intervention_id.to_string(), raw.into());
    }

    /// The current input text; empty when nothing was typed.
    pub fn get(&self, intervention_id: &str) -> &str {
        self.inputs
            .get(intervention_id)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn clear(&mut self, intervention_id: &str) {
        self.inputs.insert(intervention_id.to_string(), String::new());
    }
}

/// Reads a quantity the way a numeric form field would: blank is zero,
/// anything unparsable is NaN.
pub fn parse_quantity(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

#[derive(Debug, Clone)]
pub struct LiveTracker {
    intensity: u8,
    interventions: Vec<Intervention>,
    events: Vec<TrackerEvent>,
    pending: PendingQuantities,
    display_limit: usize,
}

impl Default for LiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTracker {
    /// A tracker seeded with the "Drink Water" intervention.
    pub fn new() -> Self {
        Self::with_interventions(vec![Intervention::water()])
    }

    pub fn with_interventions(interventions: Vec<Intervention>) -> Self {
        Self {
            intensity: DEFAULT_INTENSITY,
            interventions,
            events: Vec::new(),
            pending: PendingQuantities::default(),
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// Builds a tracker from config. Configured seeds go through the same
    /// validation as `create_intervention`; invalid or duplicate seeds are
    /// dropped.
    pub fn from_config(config: &TrackerConfig) -> Self {
        let mut tracker = match &config.interventions {
            Some(seeds) => {
                let mut tracker = Self::with_interventions(Vec::new());
                let now = now_ms();
                for InterventionSeed { name, unit, max } in seeds {
                    tracker.create_intervention_at(name, unit, *max, now);
                }
                tracker
            }
            None => Self::new(),
        };
        tracker.display_limit = config.history.display_limit;
        tracker
    }

    // ─────────────────────────────────────────────────────────────────────
    // Intensity
    // ─────────────────────────────────────────────────────────────────────

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    /// Moves the intensity slider. Values above the scale are clamped.
    pub fn set_intensity(&mut self, value: u8) {
        self.intensity = value.min(MAX_INTENSITY);
    }

    /// Appends a snapshot of the current intensity to the timeline.
    pub fn record_intensity(&mut self) -> &TrackerEvent {
        self.record_intensity_at(now_ms())
    }

    pub fn record_intensity_at(&mut self, now: i64) -> &TrackerEvent {
        let event = TrackerEvent {
            id: format!("intensity-{}", now),
            time: now,
            day_key: day_key(now),
            kind: EventKind::Intensity {
                intensity_value: self.intensity,
            },
        };
        debug!(intensity = self.intensity, time = now, "Intensity recorded");
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interventions
    // ─────────────────────────────────────────────────────────────────────

    pub fn interventions(&self) -> &[Intervention] {
        &self.interventions
    }

    pub fn intervention(&self, intervention_id: &str) -> Option<&Intervention> {
        self.interventions.iter().find(|it| it.id == intervention_id)
    }

    pub fn is_at_max(&self, intervention_id: &str) -> bool {
        self.intervention(intervention_id)
            .map(Intervention::is_at_max)
            .unwrap_or(false)
    }

    /// Adds a new intervention with `amount = 0` and `max = floor(max)`.
    ///
    /// Rejected when the trimmed name or unit is empty, `max` is not a finite
    /// positive number, or an intervention with the same name (ignoring case)
    /// already exists.
    pub fn create_intervention(
        &mut self,
        name: &str,
        unit: &str,
        max: f64,
    ) -> Option<&Intervention> {
        self.create_intervention_at(name, unit, max, now_ms())
    }

    pub fn create_intervention_at(
        &mut self,
        name: &str,
        unit: &str,
        max: f64,
        now: i64,
    ) -> Option<&Intervention> {
        let name = name.trim();
        let unit = unit.trim();
        if name.is_empty() || unit.is_empty() {
            debug!(reason = "blank_field", "Intervention rejected");
            return None;
        }
        if !max.is_finite() || max <= 0.0 {
            debug!(reason = "invalid_max", max, "Intervention rejected");
            return None;
        }

        let name_key = name.to_lowercase();
        if self
            .interventions
            .iter()
            .any(|it| it.name.to_lowercase() == name_key)
        {
            debug!(reason = "duplicate_name", name, "Intervention rejected");
            return None;
        }

        let intervention = Intervention {
            id: format!("{}-{}", slugify(&name_key), now),
            name: name.to_string(),
            unit: unit.to_string(),
            amount: 0.0,
            max: max.floor().min(f64::from(u32::MAX)) as u32,
        };
        debug!(id = %intervention.id, max = intervention.max, "Intervention created");
        self.interventions.push(intervention);
        self.interventions.last()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Logging doses
    // ─────────────────────────────────────────────────────────────────────

    pub fn pending_quantity(&self, intervention_id: &str) -> &str {
        self.pending.get(intervention_id)
    }

    pub fn set_pending_quantity(&mut self, intervention_id: &str, raw: impl Into<String>) {
        self.pending.set(intervention_id, raw);
    }

    /// Logs whatever quantity is typed into the intervention's pending input.
    pub fn log_pending(&mut self, intervention_id: &str) -> Option<TrackerEvent> {
        self.log_pending_at(intervention_id, now_ms())
    }

    pub fn log_pending_at(&mut self, intervention_id: &str, now: i64) -> Option<TrackerEvent> {
        let requested = parse_quantity(self.pending.get(intervention_id));
        self.log_quantity_at(intervention_id, requested, now)
    }

    /// Logs `requested` units, clamped to what is left under the cap.
    ///
    /// Rejected when the intervention is unknown, `requested` is not a finite
    /// positive number, or the cap is already reached. On success the pending
    /// input for the intervention is cleared.
    pub fn log_quantity(
        &mut self,
        intervention_id: &str,
        requested: f64,
    ) -> Option<TrackerEvent> {
        self.log_quantity_at(intervention_id, requested, now_ms())
    }

    pub fn log_quantity_at(
        &mut self,
        intervention_id: &str,
        requested: f64,
        now: i64,
    ) -> Option<TrackerEvent> {
        let Some(target) = self
            .interventions
            .iter_mut()
            .find(|it| it.id == intervention_id)
        else {
            debug!(intervention_id, reason = "unknown_intervention", "Dose rejected");
            return None;
        };
        if !requested.is_finite() || requested <= 0.0 {
            debug!(intervention_id, requested, reason = "invalid_quantity", "Dose rejected");
            return None;
        }

        let remaining = target.remaining();
        let applied = requested.min(remaining);
        if applied <= 0.0 {
            debug!(intervention_id, reason = "at_max", "Dose rejected");
            return None;
        }

        // Pin to the cap exactly so float drift can never push past it.
        let amount_after = if requested >= remaining {
            f64::from(target.max)
        } else {
            target.amount + applied
        };
        target.amount = amount_after;

        let event = TrackerEvent {
            id: format!("{}-{}", intervention_id, now),
            time: now,
            day_key: day_key(now),
            kind: EventKind::Intervention {
                intervention_id: intervention_id.to_string(),
                name: target.name.clone(),
                delta: applied,
                amount_after,
                intensity_at_log: self.intensity,
            },
        };
        debug!(
            intervention_id,
            delta = applied,
            amount_after,
            intensity = self.intensity,
            "Dose logged"
        );
        self.events.push(event.clone());
        self.pending.clear(intervention_id);
        Some(event)
    }

    // ─────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────

    /// Empties the event log. Intervention amounts are left as they are.
    pub fn clear_history(&mut self) {
        debug!(cleared = self.events.len(), "History cleared");
        self.events.clear();
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[TrackerEvent] {
        &self.events
    }

    /// Most recent dose of an intervention. Among equal times the earliest
    /// appended wins.
    pub fn last_event_for(&self, intervention_id: &str) -> Option<&TrackerEvent> {
        self.events
            .iter()
            .filter(|event| event.intervention_id() == Some(intervention_id))
            .fold(None, |best: Option<&TrackerEvent>, event| match best {
                Some(current) if current.time >= event.time => Some(current),
                _ => Some(event),
            })
    }

    /// All events, oldest first.
    pub fn history(&self) -> Vec<&TrackerEvent> {
        let mut sorted: Vec<&TrackerEvent> = self.events.iter().collect();
        sorted.sort_by_key(|event| event.time);
        sorted
    }

    /// The newest `display_limit` events of `history()`, oldest first.
    pub fn recent_history(&self) -> Vec<&TrackerEvent> {
        let mut sorted = self.history();
        let skip = sorted.len().saturating_sub(self.display_limit);
        sorted.drain(..skip);
        sorted
    }

    pub fn is_history_truncated(&self) -> bool {
        self.events.len() > self.display_limit
    }

    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    pub fn events_for_day(&self, day_key: &str) -> Vec<&TrackerEvent> {
        self.history()
            .into_iter()
            .filter(|event| event.day_key == day_key)
            .collect()
    }

    /// History grouped by day key; each bucket is oldest first.
    pub fn history_by_day(&self) -> BTreeMap<String, Vec<&TrackerEvent>> {
        let mut days: BTreeMap<String, Vec<&TrackerEvent>> = BTreeMap::new();
        for event in self.history() {
            days.entry(event.day_key.clone()).or_default().push(event);
        }
        days
    }

    pub fn summaries(&self) -> Vec<InterventionSummary> {
        self.interventions
            .iter()
            .map(|intervention| {
                let last_logged = self.last_event_for(&intervention.id).and_then(|event| {
                    match &event.kind {
                        EventKind::Intervention {
                            delta,
                            intensity_at_log,
                            ..
                        } => Some(LastLogged {
                            delta: *delta,
                            intensity_at_log: *intensity_at_log,
                            time: event.time,
                        }),
                        EventKind::Intensity { .. } => None,
                    }
                });
                InterventionSummary {
                    intervention: intervention.clone(),
                    at_max: intervention.is_at_max(),
                    last_logged,
                }
            })
            .collect()
    }
}
