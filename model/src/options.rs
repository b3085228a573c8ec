use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Deserializer};

use crate::normalize::NormalizeOptions;
use crate::reconstruct::ReconstructOptions;

/// Everything the core can be configured with. Deserializable from JSON, where every field is
/// optional and durations are strings like "30s" or "5min".
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Drop fixes that claim to be worse than this
    pub max_accuracy_meters: Option<f64>,
    /// Consecutive fixes closer than this (and close in time) are one stay
    pub dedup_distance_meters: f64,
    #[serde(deserialize_with = "de_duration")]
    pub dedup_min_gap: Duration,
    /// Regrid the trajectory onto this fixed step
    #[serde(deserialize_with = "de_opt_duration")]
    pub resample_step: Option<Duration>,
    /// When resampling, interpolate between fixes instead of holding the previous one
    pub interpolate: bool,
    /// Number of points in the centered moving average. 1 disables smoothing.
    pub smooth_window: usize,
    /// Playback speed of the encoded video. Doesn't change the number of frames.
    pub fps: u32,
    /// Higher zooms in
    pub zoom: f64,
    /// Resampling that would produce more points than this is skipped
    pub max_frames: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_accuracy_meters: None,
            dedup_distance_meters: 1.0,
            dedup_min_gap: Duration::seconds(60),
            resample_step: None,
            interpolate: true,
            smooth_window: 1,
            fps: 30,
            zoom: 1.0,
            max_frames: 100_000,
        }
    }
}

impl Options {
    pub fn from_json(raw: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(raw)?;
        options.validate()?;
        Ok(options)
    }

    /// Catches the first bad value
    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_accuracy_meters {
            if !(max >= 0.0) {
                bail!("max_accuracy_meters must be non-negative, not {max}");
            }
        }
        if !(self.dedup_distance_meters >= 0.0) {
            bail!(
                "dedup_distance_meters must be non-negative, not {}",
                self.dedup_distance_meters
            );
        }
        if self.dedup_min_gap < Duration::zero() {
            bail!("dedup_min_gap can't be negative");
        }
        if let Some(step) = self.resample_step {
            if step <= Duration::zero() {
                bail!("resample_step must be positive");
            }
        }
        if self.smooth_window == 0 {
            bail!("smooth_window must be at least 1");
        }
        if self.fps == 0 {
            bail!("fps must be positive");
        }
        if !(self.zoom > 0.0) {
            bail!("zoom must be positive, not {}", self.zoom);
        }
        if self.max_frames == 0 {
            bail!("max_frames must be positive");
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            max_accuracy_meters: self.max_accuracy_meters,
            dedup_distance_meters: self.dedup_distance_meters,
            dedup_min_gap: self.dedup_min_gap,
        }
    }

    pub fn reconstruct_options(&self) -> ReconstructOptions {
        ReconstructOptions {
            resample_step: self.resample_step,
            interpolate: self.interpolate,
            smooth_window: self.smooth_window,
            max_points: self.max_frames,
        }
    }
}

/// Parses "500ms", "30s", "30S", "5m", "5min", "5T", "2h", "1d", or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| anyhow!("Can't parse duration {raw:?}"))?;
    let micros_per_unit = match unit.trim() {
        "ms" | "L" => 1_000.0,
        "" | "s" | "S" | "sec" => 1_000_000.0,
        "m" | "min" | "T" => 60_000_000.0,
        "h" | "H" => 3_600_000_000.0,
        "d" | "D" => 86_400_000_000.0,
        other => bail!("Unknown unit {other:?} in duration {raw:?}"),
    };
    let micros = value * micros_per_unit;
    if !micros.is_finite() || micros < 0.0 || micros > i64::MAX as f64 {
        bail!("Duration {raw:?} is out of range");
    }
    Ok(Duration::microseconds(micros.round() as i64))
}

fn de_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(d)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn de_opt_duration<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
