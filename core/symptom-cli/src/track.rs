//! `symptom track`: drives a live tracker from line commands on stdin.
//!
//! Each input line produces exactly one JSON line on stdout. Rejected input
//! leaves the tracker untouched and answers `{"ok": false, ...}`.

use serde_json::{json, Value};
use std::io::{BufRead, Write};

use symptom_core::{LiveTracker, TrackerConfig};

const HELP: &str = "intensity N | record | add NAME UNIT MAX | qty ID RAW | log ID [QTY] | \
                    list | history | day YYYY-MM-DD | days | clear | quit";

pub fn run(
    config: &TrackerConfig,
    input: impl BufRead,
    mut output: impl Write,
) -> std::io::Result<()> {
    let mut tracker = LiveTracker::from_config(config);

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(reply) = handle_line(&mut tracker, line) else {
            break;
        };
        serde_json::to_writer(&mut output, &reply)?;
        writeln!(output)?;
        output.flush()?;
    }

    Ok(())
}

/// Applies one command. `None` means stop reading.
fn handle_line(tracker: &mut LiveTracker, line: &str) -> Option<Value> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let reply = match tokens.as_slice() {
        ["quit"] | ["exit"] => return None,
        ["intensity", value] => match value.parse::<u8>() {
            Ok(value) => {
                tracker.set_intensity(value);
                json!({ "ok": true, "intensity": tracker.intensity() })
            }
            Err(_) => rejected("intensity must be a whole number 0-10"),
        },
        ["record"] => {
            let event = tracker.record_intensity();
            json!({ "ok": true, "event": event })
        }
        ["add", rest @ ..] if rest.len() >= 3 => {
            let (name_tokens, tail) = rest.split_at(rest.len() - 2);
            let name = name_tokens.join(" ");
            let max = tail[1].parse::<f64>().unwrap_or(f64::NAN);
            match tracker.create_intervention(&name, tail[0], max) {
                Some(intervention) => json!({ "ok": true, "intervention": intervention }),
                None => rejected("invalid or duplicate intervention"),
            }
        }
        ["qty", id, raw] => {
            tracker.set_pending_quantity(id, *raw);
            json!({ "ok": true, "pending": tracker.pending_quantity(id) })
        }
        ["log", id, rest @ ..] if rest.len() <= 1 => {
            if let Some(raw) = rest.first() {
                tracker.set_pending_quantity(id, *raw);
            }
            match tracker.log_pending(id) {
                Some(event) => json!({ "ok": true, "event": event }),
                None => rejected("dose not logged"),
            }
        }
        ["list"] => json!({ "ok": true, "interventions": tracker.summaries() }),
        ["history"] => json!({
            "ok": true,
            "events": tracker.recent_history(),
            "truncated": tracker.is_history_truncated(),
        }),
        ["day", key] => json!({ "ok": true, "events": tracker.events_for_day(key) }),
        ["days"] => {
            let counts: serde_json::Map<String, Value> = tracker
                .history_by_day()
                .into_iter()
                .map(|(day, events)| (day, json!(events.len())))
                .collect();
            json!({ "ok": true, "days": counts })
        }
        ["clear"] => {
            tracker.clear_history();
            json!({ "ok": true })
        }
        _ => rejected(HELP),
    };
    Some(reply)
}

fn rejected(reason: &str) -> Value {
    json!({ "ok": false, "reason": reason })
}
