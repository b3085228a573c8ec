//! Turns a location-history export into a clean trajectory, and the trajectory into an ordered
//! sequence of frames for a renderer.
//!
//! Data only flows one way: raw records -> normalized points -> reconstructed trajectory ->
//! frame specs. Every stage returns a new value and never touches its input.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod normalize;
mod options;
mod pipeline;
mod point;
mod reconstruct;
mod schedule;
mod trajectory;

pub use self::normalize::{normalize, parse_timestamp, NormalizeOptions, Normalized, SkipCounts};
pub use self::options::{parse_duration, Options};
pub use self::pipeline::{
    ExternalStage, FrameRenderer, Pipeline, PipelineError, Prepared, Report, VideoEncoder,
};
pub use self::point::{Bounds, GeoPoint, ScreenPt};
pub use self::reconstruct::{reconstruct, resample, smooth, ReconstructOptions, Reconstructed, Warning};
pub use self::schedule::{FrameSpec, Frames, Projection, Schedule};
pub use self::trajectory::Trajectory;

pub use takeout::{RawPosition, RawRecord};
