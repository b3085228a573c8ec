use serde_json::{Map, Value};

/// One entry of a location-history export, before any validation. The set of shapes is closed;
/// supporting a new export format means adding a variant here and teaching every `match` about it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRecord {
    /// `timelineEdits[].rawSignal.signal[]`, with the fix under `position.point` or `point`
    EditSignal(RawPosition),
    /// The start or end location of a `timelineObjects[].activitySegment`
    ActivityEndpoint(RawPosition),
    /// The location of a `timelineObjects[].placeVisit`
    PlaceVisit(RawPosition),
    /// A flat `locations[]` entry, as found in `Records.json`
    Location(RawPosition),
    /// Something sitting where records are expected, but matching none of the shapes above
    Unrecognized(Value),
}

impl RawRecord {
    pub fn position(&self) -> Option<&RawPosition> {
        match self {
            RawRecord::EditSignal(pos)
            | RawRecord::ActivityEndpoint(pos)
            | RawRecord::PlaceVisit(pos)
            | RawRecord::Location(pos) => Some(pos),
            RawRecord::Unrecognized(_) => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RawRecord::EditSignal(_) => "edit signal",
            RawRecord::ActivityEndpoint(_) => "activity endpoint",
            RawRecord::PlaceVisit(_) => "place visit",
            RawRecord::Location(_) => "location",
            RawRecord::Unrecognized(_) => "unrecognized record",
        }
    }
}

/// The fields of a fix, exactly as they appeared. Exports disagree about field names and about
/// whether numbers are written as numbers or strings, so nothing is interpreted yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPosition {
    /// From fields explicitly named as E7 fixed-point (`latE7`, `latitudeE7`)
    pub lat_e7: Option<Value>,
    pub lng_e7: Option<Value>,
    /// From plainly named fields (`latitude`, `lat`). Some writers still put E7 values here.
    pub lat: Option<Value>,
    pub lng: Option<Value>,
    pub accuracy: Option<Value>,
    /// ISO-8601 string, or milliseconds since the epoch as a number or numeric string
    pub timestamp: Option<Value>,
}

impl RawPosition {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            lat_e7: first_of(obj, &["latE7", "latitudeE7"]),
            lng_e7: first_of(obj, &["lngE7", "longitudeE7"]),
            lat: first_of(obj, &["latitude", "lat"]),
            lng: first_of(obj, &["longitude", "lng", "lon"]),
            accuracy: first_of(obj, &["accuracyMeters", "accuracy"]),
            timestamp: first_of(obj, &["timestamp", "timestampMs"]),
        }
    }

    /// Fills in fields this position lacks from an enclosing object; what the position already
    /// has wins.
    pub(crate) fn or_inherit(mut self, outer: &Map<String, Value>) -> Self {
        let outer = Self::from_object(outer);
        self.accuracy = self.accuracy.or(outer.accuracy);
        self.timestamp = self.timestamp.or(outer.timestamp);
        self
    }

    pub(crate) fn with_timestamp(mut self, timestamp: Option<&Value>) -> Self {
        if let Some(ts) = timestamp {
            if !ts.is_null() {
                self.timestamp = Some(ts.clone());
            }
        }
        self
    }
}

// Null counts as missing
fn first_of(obj: &Map<String, Value>, keys: &[&str]) -> Option<Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
        .cloned()
}
