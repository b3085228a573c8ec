use std::fmt;

use takeout::RawRecord;

use crate::normalize::{normalize, SkipCounts};
use crate::reconstruct::{reconstruct, Warning};
use crate::schedule::{FrameSpec, Projection, Schedule};
use crate::{Options, Trajectory};

/// Draws frames somewhere. The default `render_all` walks the schedule in order with the
/// amortized cursor; implementations that render in parallel should override it and use
/// `Schedule::frame`.
pub trait FrameRenderer {
    fn render(&self, frame: &FrameSpec) -> anyhow::Result<()>;

    /// Returns the number of frames rendered
    fn render_all<P: Projection + Sync>(&self, schedule: &Schedule<P>) -> anyhow::Result<usize> {
        let mut frames = schedule.frames();
        let mut count = 0;
        while let Some(frame) = frames.next_frame() {
            self.render(&frame)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Turns the rendered frames into a video
pub trait VideoEncoder {
    fn encode(&self, frames: usize, fps: u32) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalStage {
    Render,
    Encode,
}

impl fmt::Display for ExternalStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternalStage::Render => write!(f, "rendering"),
            ExternalStage::Encode => write!(f, "encoding"),
        }
    }
}

/// Any of these means there's no valid video.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no usable location points in {records} records ({skipped} skipped as invalid)")]
    EmptyTrajectory { records: usize, skipped: usize },
    #[error("no frames were scheduled")]
    ZeroFrames,
    #[error("{stage} failed: {cause:#}")]
    External {
        stage: ExternalStage,
        cause: anyhow::Error,
    },
}

/// What happened along the way, for a successful run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    pub records: usize,
    pub skipped: SkipCounts,
    pub stationary: usize,
    pub timestamp_ties: usize,
    pub normalized_points: usize,
    pub trajectory_points: usize,
    pub frames: usize,
    pub warnings: Vec<Warning>,
}

impl Report {
    pub fn log(&self) {
        info!(
            "{} records -> {} points ({} skipped, {} stationary duplicates, {} timestamp ties) -> {} trajectory points -> {} frames",
            self.records,
            self.normalized_points,
            self.skipped.total(),
            self.stationary,
            self.timestamp_ties,
            self.trajectory_points,
            self.frames
        );
        if self.skipped.total() > 0 {
            info!("Skipped records: {:?}", self.skipped);
        }
        for warning in &self.warnings {
            warn!("{warning}");
        }
    }
}

/// The result of normalizing and reconstructing, ready to be scheduled.
pub struct Prepared {
    pub trajectory: Trajectory,
    pub report: Report,
    fps: u32,
}

impl Prepared {
    pub fn schedule<P: Projection>(&self, projection: P) -> Result<Schedule<P>, PipelineError> {
        let schedule = Schedule::new(&self.trajectory, projection, self.fps);
        // Can't happen if the trajectory is non-empty, but an empty video is never OK
        if schedule.is_empty() {
            return Err(PipelineError::ZeroFrames);
        }
        Ok(schedule)
    }

    /// Schedules, renders every frame, then encodes them.
    pub fn render<P, R, E>(
        &self,
        projection: P,
        renderer: &R,
        encoder: &E,
    ) -> Result<Report, PipelineError>
    where
        P: Projection + Sync,
        R: FrameRenderer,
        E: VideoEncoder,
    {
        let schedule = self.schedule(projection)?;
        info!("Scheduled {} frames", schedule.len());

        let rendered = renderer
            .render_all(&schedule)
            .map_err(|cause| PipelineError::External {
                stage: ExternalStage::Render,
                cause,
            })?;
        if rendered != schedule.len() {
            return Err(PipelineError::External {
                stage: ExternalStage::Render,
                cause: anyhow!("only {rendered} of {} frames were rendered", schedule.len()),
            });
        }
        info!("Rendered {rendered} frames");

        encoder
            .encode(rendered, schedule.fps())
            .map_err(|cause| PipelineError::External {
                stage: ExternalStage::Encode,
                cause,
            })?;

        self.report.log();
        Ok(self.report.clone())
    }
}

pub struct Pipeline {
    options: Options,
}

impl Pipeline {
    pub fn new(options: Options) -> anyhow::Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Normalizes, then reconstructs. Fails only if nothing usable is left.
    pub fn prepare(&self, records: &[RawRecord]) -> Result<Prepared, PipelineError> {
        let normalized = normalize(records, &self.options.normalize_options());
        info!(
            "Normalized {} records into {} points",
            records.len(),
            normalized.trajectory.len()
        );
        if normalized.trajectory.is_empty() {
            return Err(PipelineError::EmptyTrajectory {
                records: records.len(),
                skipped: normalized.skipped.total(),
            });
        }

        let reconstructed = reconstruct(
            &normalized.trajectory,
            &self.options.reconstruct_options(),
        );
        info!(
            "Reconstructed a trajectory of {} points",
            reconstructed.trajectory.len()
        );

        let report = Report {
            records: records.len(),
            skipped: normalized.skipped,
            stationary: normalized.stationary,
            timestamp_ties: normalized.timestamp_ties,
            normalized_points: normalized.trajectory.len(),
            trajectory_points: reconstructed.trajectory.len(),
            frames: reconstructed.trajectory.len(),
            warnings: reconstructed.warnings,
        };
        Ok(Prepared {
            trajectory: reconstructed.trajectory,
            report,
            fps: self.options.fps,
        })
    }

    /// The whole thing: prepare, then render and encode. Nothing external is touched unless
    /// there's at least one frame. The projection is built from the final trajectory, so it can
    /// fit the view to it.
    pub fn run<P, F, R, E>(
        &self,
        records: &[RawRecord],
        make_projection: F,
        renderer: &R,
        encoder: &E,
    ) -> Result<Report, PipelineError>
    where
        P: Projection + Sync,
        F: FnOnce(&Trajectory) -> P,
        R: FrameRenderer,
        E: VideoEncoder,
    {
        let prepared = self.prepare(records)?;
        let projection = make_projection(&prepared.trajectory);
        prepared.render(projection, renderer, encoder)
    }
}
