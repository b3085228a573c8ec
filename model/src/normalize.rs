use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::Value;

use takeout::{RawPosition, RawRecord};

use crate::point::valid_lat_lon;
use crate::{GeoPoint, Trajectory};

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizeOptions {
    pub max_accuracy_meters: Option<f64>,
    pub dedup_distance_meters: f64,
    pub dedup_min_gap: Duration,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_accuracy_meters: None,
            dedup_distance_meters: 1.0,
            dedup_min_gap: Duration::seconds(60),
        }
    }
}

/// Why records didn't make it into the trajectory. None of these are errors; exports are messy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub unrecognized: usize,
    pub missing_coordinates: usize,
    pub out_of_range: usize,
    pub low_accuracy: usize,
    pub bad_timestamp: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.unrecognized
            + self.missing_coordinates
            + self.out_of_range
            + self.low_accuracy
            + self.bad_timestamp
    }
}

pub struct Normalized {
    pub trajectory: Trajectory,
    pub skipped: SkipCounts,
    /// Dropped because they sat within the dedup distance of the previous kept point
    pub stationary: usize,
    /// Dropped because an earlier record had exactly the same timestamp
    pub timestamp_ties: usize,
}

enum Skip {
    Unrecognized,
    MissingCoordinates,
    OutOfRange,
    LowAccuracy,
    BadTimestamp,
}

/// Turns raw records of any shape into a clean, time-ordered trajectory. Records that can't be
/// understood are counted and skipped.
pub fn normalize(records: &[RawRecord], opts: &NormalizeOptions) -> Normalized {
    let mut skipped = SkipCounts::default();
    let mut points = Vec::new();
    for rec in records {
        match to_point(rec, opts) {
            Ok(pt) => points.push(pt),
            Err(skip) => {
                let counter = match skip {
                    Skip::Unrecognized => &mut skipped.unrecognized,
                    Skip::MissingCoordinates => &mut skipped.missing_coordinates,
                    Skip::OutOfRange => &mut skipped.out_of_range,
                    Skip::LowAccuracy => &mut skipped.low_accuracy,
                    Skip::BadTimestamp => &mut skipped.bad_timestamp,
                };
                *counter += 1;
            }
        }
    }

    // Stable, so records sharing a timestamp keep their input order, and the first one wins below
    points.sort_by_key(|pt| pt.timestamp);

    let mut kept: Vec<GeoPoint> = Vec::with_capacity(points.len());
    let mut stationary = 0;
    let mut timestamp_ties = 0;
    for pt in points {
        if let Some(anchor) = kept.last() {
            if pt.timestamp == anchor.timestamp {
                if pt.latitude != anchor.latitude || pt.longitude != anchor.longitude {
                    debug!(
                        "Two different positions at {}; keeping ({}, {})",
                        pt.timestamp, anchor.latitude, anchor.longitude
                    );
                }
                timestamp_ties += 1;
                continue;
            }
            // Compare against the point that started the stay, not the previous raw point, so a
            // slow drift eventually escapes the radius
            if pt.timestamp - anchor.timestamp <= opts.dedup_min_gap
                && anchor.dist_to(&pt) <= opts.dedup_distance_meters
            {
                stationary += 1;
                continue;
            }
        }
        kept.push(pt);
    }

    let trajectory = if kept.is_empty() {
        Trajectory::empty()
    } else {
        Trajectory::unchecked_new(kept)
    };
    Normalized {
        trajectory,
        skipped,
        stationary,
        timestamp_ties,
    }
}

fn to_point(rec: &RawRecord, opts: &NormalizeOptions) -> Result<GeoPoint, Skip> {
    let pos = match rec.position() {
        Some(pos) => pos,
        None => return Err(Skip::Unrecognized),
    };
    let (latitude, longitude) = coordinates(pos)?;
    if !valid_lat_lon(latitude, longitude) {
        debug!("Skipping {} at ({latitude}, {longitude})", rec.describe());
        return Err(Skip::OutOfRange);
    }

    // Unparseable accuracy is as good as none
    let accuracy_meters = pos.accuracy.as_ref().and_then(number);
    if let (Some(max), Some(accuracy)) = (opts.max_accuracy_meters, accuracy_meters) {
        if accuracy > max {
            return Err(Skip::LowAccuracy);
        }
    }

    let timestamp = match pos.timestamp.as_ref().and_then(parse_timestamp) {
        Some(ts) => ts,
        None => {
            debug!("Skipping {} with timestamp {:?}", rec.describe(), pos.timestamp);
            return Err(Skip::BadTimestamp);
        }
    };

    Ok(GeoPoint {
        timestamp,
        latitude,
        longitude,
        accuracy_meters,
    })
}

/// Degrees, after undoing E7 fixed-point. Fields named as E7 are always divided; plainly named
/// fields are divided too if the pair can't possibly be degrees.
fn coordinates(pos: &RawPosition) -> Result<(f64, f64), Skip> {
    if let (Some(lat), Some(lng)) = (&pos.lat_e7, &pos.lng_e7) {
        return match (number(lat), number(lng)) {
            (Some(lat), Some(lng)) => Ok((lat / 1e7, lng / 1e7)),
            _ => Err(Skip::MissingCoordinates),
        };
    }
    if let (Some(lat), Some(lng)) = (&pos.lat, &pos.lng) {
        return match (number(lat), number(lng)) {
            (Some(lat), Some(lng)) => {
                if lat.abs() > 90.0 || lng.abs() > 180.0 {
                    Ok((lat / 1e7, lng / 1e7))
                } else {
                    Ok((lat, lng))
                }
            }
            _ => Err(Skip::MissingCoordinates),
        };
    }
    Err(Skip::MissingCoordinates)
}

fn number(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// ISO-8601 / RFC 3339 strings, or milliseconds since the epoch as a number or a numeric string.
/// Timestamps without a zone are taken to be UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let ms = match n.as_i64() {
                Some(ms) => ms,
                None => {
                    let ms = n.as_f64()?;
                    if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
                        return None;
                    }
                    ms.round() as i64
                }
            };
            DateTime::from_timestamp_millis(ms)
        }
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) {
                return DateTime::from_timestamp_millis(s.parse().ok()?);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(naive.and_utc());
                }
            }
            None
        }
        _ => None,
    }
}
