use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::{Bounds, GeoPoint};

/// A time-ordered path. Timestamps strictly increase and every coordinate is valid. A trajectory
/// with no points only comes from `Trajectory::empty`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trajectory {
    inner: Vec<GeoPoint>,
}

impl Trajectory {
    pub fn new(raw: Vec<GeoPoint>) -> Result<Self> {
        if raw.is_empty() {
            bail!("Trajectory needs at least 1 point; use Trajectory::empty instead");
        }
        for pt in &raw {
            if !pt.is_valid() {
                bail!(
                    "Trajectory has an invalid position ({}, {}) at {}",
                    pt.latitude,
                    pt.longitude,
                    pt.timestamp
                );
            }
        }
        for pair in raw.windows(2) {
            if pair[0].timestamp >= pair[1].timestamp {
                bail!(
                    "Trajectory input out-of-order: {} then {}",
                    pair[0].timestamp,
                    pair[1].timestamp
                );
            }
        }
        Ok(Self { inner: raw })
    }

    pub fn empty() -> Self {
        Self { inner: Vec::new() }
    }

    /// For stages that build their output in order and have already checked every point.
    pub(crate) fn unchecked_new(inner: Vec<GeoPoint>) -> Self {
        debug_assert!(inner.iter().all(|pt| pt.is_valid()));
        debug_assert!(inner
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp));
        Self { inner }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.inner
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.inner.first().map(|pt| pt.timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.inner.last().map(|pt| pt.timestamp)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.inner)
    }

    /// The position at some time. With `interpolate`, latitude and longitude are each linearly
    /// interpolated between the two surrounding points by elapsed time; otherwise the last point
    /// at or before `time` is held. Times outside the trajectory clamp to the nearest endpoint.
    ///
    /// The result has `time` as its timestamp. An interpolated position doesn't have a
    /// meaningful accuracy, so it's dropped unless `time` lands exactly on an original point.
    pub fn sample(&self, time: DateTime<Utc>, interpolate: bool) -> Option<GeoPoint> {
        let first = self.inner.first()?;
        let last = self.inner.last()?;
        if time <= first.timestamp {
            return Some(GeoPoint { timestamp: time, ..*first });
        }
        if time >= last.timestamp {
            return Some(GeoPoint { timestamp: time, ..*last });
        }

        // The first point strictly after time. Both neighbors exist because of the clamping above.
        let idx = self.inner.partition_point(|pt| pt.timestamp <= time);
        let before = self.inner[idx - 1];
        let after = self.inner[idx];
        if !interpolate || before.timestamp == time {
            return Some(GeoPoint {
                timestamp: time,
                ..before
            });
        }

        let pct = fraction(time - before.timestamp, after.timestamp - before.timestamp);
        Some(GeoPoint {
            timestamp: time,
            latitude: before.latitude + pct * (after.latitude - before.latitude),
            longitude: before.longitude + pct * (after.longitude - before.longitude),
            accuracy_meters: None,
        })
    }

    /// If every pair of adjacent points is the same time apart, that spacing.
    pub fn uniform_step(&self) -> Option<Duration> {
        let mut steps = self
            .inner
            .windows(2)
            .map(|pair| pair[1].timestamp - pair[0].timestamp);
        let step = steps.next()?;
        if steps.all(|s| s == step) {
            Some(step)
        } else {
            None
        }
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut writer = csv::Writer::from_writer(&mut out);
            for pt in &self.inner {
                writer.serialize(ExportPointRow {
                    timestamp: pt.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    latitude: pt.latitude,
                    longitude: pt.longitude,
                    accuracy: pt.accuracy_meters,
                })?;
            }
            writer.flush()?;
        }
        let out = String::from_utf8(out)?;
        Ok(out)
    }

    /// A FeatureCollection with the whole path as one LineString (or a Point, if there's only
    /// one fix), for eyeballing in any GeoJSON viewer.
    pub fn to_geojson(&self) -> Result<String> {
        use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};

        let mut features = Vec::new();
        if let (Some(start), Some(end)) = (self.start_time(), self.end_time()) {
            let geometry = if self.inner.len() == 1 {
                Value::Point(vec![self.inner[0].longitude, self.inner[0].latitude])
            } else {
                Value::LineString(
                    self.inner
                        .iter()
                        .map(|pt| vec![pt.longitude, pt.latitude])
                        .collect(),
                )
            };
            let mut properties = JsonObject::new();
            properties.insert("start".to_string(), start.to_rfc3339().into());
            properties.insert("end".to_string(), end.to_rfc3339().into());
            properties.insert("points".to_string(), self.inner.len().into());
            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(geometry)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            });
        }
        let gj = GeoJson::FeatureCollection(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        });
        Ok(serde_json::to_string_pretty(&gj)?)
    }
}

fn fraction(part: Duration, whole: Duration) -> f64 {
    // Microseconds are plenty of precision, and don't overflow for any realistic span
    match (part.num_microseconds(), whole.num_microseconds()) {
        (Some(part), Some(whole)) if whole > 0 => part as f64 / whole as f64,
        _ => part.num_milliseconds() as f64 / whole.num_milliseconds().max(1) as f64,
    }
}

#[derive(Serialize)]
struct ExportPointRow {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
}
