use std::fmt;

use chrono::Duration;

use crate::{GeoPoint, Trajectory};

#[derive(Clone, Debug, PartialEq)]
pub struct ReconstructOptions {
    pub resample_step: Option<Duration>,
    pub interpolate: bool,
    pub smooth_window: usize,
    /// Resampling is skipped rather than produce more points than this
    pub max_points: usize,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            resample_step: None,
            interpolate: true,
            smooth_window: 1,
            max_points: 100_000,
        }
    }
}

/// Something went less than ideally, but there's still a trajectory to render.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    /// Resampling needs at least 2 distinct timestamps
    DegenerateInput { distinct_timestamps: usize },
    NonPositiveStep(Duration),
    ResampleTooDense { points: u64, limit: usize },
    /// The trajectory isn't on a fixed time grid, so a moving average would be meaningless
    SmoothingSkipped { window: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::DegenerateInput {
                distinct_timestamps,
            } => write!(
                f,
                "only {distinct_timestamps} distinct timestamp(s), so resampling was skipped"
            ),
            Warning::NonPositiveStep(step) => {
                write!(f, "resample step {step} isn't positive, so resampling was skipped")
            }
            Warning::ResampleTooDense { points, limit } => write!(
                f,
                "resampling would produce {points} points (more than {limit}), so it was skipped"
            ),
            Warning::SmoothingSkipped { window } => write!(
                f,
                "smoothing window {window} ignored, because the points aren't evenly spaced in time"
            ),
        }
    }
}

pub struct Reconstructed {
    pub trajectory: Trajectory,
    pub warnings: Vec<Warning>,
}

/// Resamples onto a fixed time grid (if asked), then smooths (if asked). The input is never
/// modified; the result is always a new trajectory.
pub fn reconstruct(input: &Trajectory, opts: &ReconstructOptions) -> Reconstructed {
    let mut warnings = Vec::new();

    let resampled = match opts.resample_step {
        Some(step) => match resample(input, step, opts.interpolate, opts.max_points) {
            Ok(trajectory) => Some(trajectory),
            Err(warning) => {
                warnings.push(warning);
                None
            }
        },
        None => None,
    };
    let current = resampled.as_ref().unwrap_or(input);

    let trajectory = if opts.smooth_window <= 1 || current.len() <= 1 {
        current.clone()
    } else if current.uniform_step().is_some() {
        smooth(current, opts.smooth_window)
    } else {
        warnings.push(Warning::SmoothingSkipped {
            window: opts.smooth_window,
        });
        current.clone()
    };

    Reconstructed {
        trajectory,
        warnings,
    }
}

/// Samples the trajectory at `start, start + step, ...` until the grid reaches the end time. If the
/// span isn't a multiple of the step, the last gridpoint lands past the end and is clamped to the
/// final fix, so the path always reaches it.
pub fn resample(
    input: &Trajectory,
    step: Duration,
    interpolate: bool,
    max_points: usize,
) -> Result<Trajectory, Warning> {
    if step <= Duration::zero() {
        return Err(Warning::NonPositiveStep(step));
    }
    let (start, end) = match (input.start_time(), input.end_time()) {
        (Some(start), Some(end)) if input.len() >= 2 => (start, end),
        _ => {
            return Err(Warning::DegenerateInput {
                distinct_timestamps: input.len(),
            })
        }
    };

    // Steps are whole microseconds, so gridpoints land exactly on input points that share the
    // grid, and don't accumulate rounding error
    let step_us = step.num_microseconds().unwrap_or(i64::MAX).max(1);
    let span_us = (end - start).num_microseconds().unwrap_or(i64::MAX);
    let steps = span_us / step_us + i64::from(span_us % step_us != 0);
    let points = steps as u64 + 1;
    if points > max_points as u64 {
        return Err(Warning::ResampleTooDense {
            points,
            limit: max_points,
        });
    }

    let mut grid = Vec::with_capacity(points as usize);
    for k in 0..points as i64 {
        let time = start + Duration::microseconds(k * step_us);
        // Unreachable with a non-empty input
        if let Some(pt) = input.sample(time, interpolate) {
            grid.push(pt);
        }
    }
    Ok(Trajectory::unchecked_new(grid))
}

/// A centered moving average of latitude and longitude, each independently. Near the ends, the
/// window is cut off at the first or last point and averages whatever samples remain, instead of
/// padding. Timestamps and accuracy are untouched.
///
/// For an even window, the extra sample comes from after the point.
pub fn smooth(input: &Trajectory, window: usize) -> Trajectory {
    if window <= 1 {
        return input.clone();
    }
    let pts = input.points();
    let before = (window - 1) / 2;
    let after = window - 1 - before;
    let last = pts.len().saturating_sub(1);

    let mut smoothed = Vec::with_capacity(pts.len());
    for (idx, pt) in pts.iter().enumerate() {
        let lo = idx.saturating_sub(before);
        let hi = (idx + after).min(last);
        let samples = &pts[lo..=hi];
        let n = samples.len() as f64;
        smoothed.push(GeoPoint {
            latitude: samples.iter().map(|p| p.latitude).sum::<f64>() / n,
            longitude: samples.iter().map(|p| p.longitude).sum::<f64>() / n,
            ..*pt
        });
    }
    Trajectory::unchecked_new(smoothed)
}
