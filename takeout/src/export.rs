use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{RawPosition, RawRecord};

/// The top level of the export formats we know about. A single file usually only has one of
/// these lists.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    #[serde(default)]
    timeline_edits: Option<Vec<Value>>,
    #[serde(default)]
    timeline_objects: Option<Vec<Value>>,
    #[serde(default)]
    locations: Option<Vec<Value>>,
}

impl Export {
    pub fn into_records(self) -> Vec<RawRecord> {
        let mut records = Vec::new();

        for edit in self.timeline_edits.unwrap_or_default() {
            match edit
                .get("rawSignal")
                .and_then(|raw| raw.get("signal"))
                .cloned()
            {
                Some(Value::Array(signals)) => {
                    records.extend(signals.into_iter().map(from_signal));
                }
                // Some writers don't bother with a list for one signal
                Some(signal @ Value::Object(_)) => {
                    records.push(from_signal(signal));
                }
                _ => {
                    records.push(RawRecord::Unrecognized(edit));
                }
            }
        }

        for obj in self.timeline_objects.unwrap_or_default() {
            let before = records.len();
            if let Some(segment) = obj.get("activitySegment") {
                let duration = segment.get("duration");
                for (loc_key, ts_key) in [
                    ("startLocation", "startTimestamp"),
                    ("endLocation", "endTimestamp"),
                ] {
                    if let Some(Value::Object(loc)) = segment.get(loc_key) {
                        let ts = duration.and_then(|d| d.get(ts_key));
                        records.push(RawRecord::ActivityEndpoint(
                            RawPosition::from_object(loc).with_timestamp(ts),
                        ));
                    }
                }
            }
            if let Some(visit) = obj.get("placeVisit") {
                if let Some(Value::Object(loc)) = visit.get("location") {
                    let ts = visit.get("duration").and_then(|d| d.get("startTimestamp"));
                    records.push(RawRecord::PlaceVisit(
                        RawPosition::from_object(loc).with_timestamp(ts),
                    ));
                }
            }
            if records.len() == before {
                records.push(RawRecord::Unrecognized(obj));
            }
        }

        for loc in self.locations.unwrap_or_default() {
            records.push(match loc {
                Value::Object(ref map) => RawRecord::Location(RawPosition::from_object(map)),
                other => RawRecord::Unrecognized(other),
            });
        }

        if records.is_empty() {
            warn!("No timelineEdits, timelineObjects, or locations found in export");
        }
        records
    }
}

fn from_signal(signal: Value) -> RawRecord {
    match signal_position(&signal) {
        Some(pos) => RawRecord::EditSignal(pos),
        // Wifi scans, activity records, and so on
        None => RawRecord::Unrecognized(signal),
    }
}

fn signal_position(signal: &Value) -> Option<RawPosition> {
    let outer = signal.as_object()?;
    let position: &Map<String, Value> = match outer.get("position") {
        Some(Value::Object(pos)) => pos,
        _ => outer,
    };
    let point = position.get("point")?.as_object()?;
    Some(
        RawPosition::from_object(point)
            .or_inherit(position)
            .or_inherit(outer),
    )
}
