use std::cell::{Cell, RefCell};

use chrono::Duration;
use serde_json::json;

use model::{
    normalize, reconstruct, ExternalStage, FrameRenderer, FrameSpec, NormalizeOptions, Options,
    Pipeline, PipelineError, RawPosition, RawRecord, ReconstructOptions, Schedule, ScreenPt,
    Trajectory, VideoEncoder, Warning,
};

const T0: i64 = 1_651_399_200;

/// A Records.json-style fix at `T0 + secs`, in plain degrees
fn fix(secs: i64, lat: f64, lon: f64) -> RawRecord {
    RawRecord::Location(RawPosition {
        lat: Some(json!(lat)),
        lng: Some(json!(lon)),
        timestamp: Some(json!((T0 + secs) * 1000)),
        ..Default::default()
    })
}

fn flat(lat: f64, lon: f64) -> ScreenPt {
    ScreenPt::new(lon * 1e6, -lat * 1e6)
}

fn count_frames(traj: &Trajectory) -> usize {
    let schedule = Schedule::new(traj, flat, 30);
    let mut frames = schedule.frames();
    let mut count = 0;
    while frames.next_frame().is_some() {
        count += 1;
    }
    count
}

#[derive(Default)]
struct FakeRenderer {
    indices: RefCell<Vec<usize>>,
    fail_at: Option<usize>,
}

impl FrameRenderer for FakeRenderer {
    fn render(&self, frame: &FrameSpec) -> anyhow::Result<()> {
        if self.fail_at == Some(frame.index) {
            anyhow::bail!("disk full");
        }
        self.indices.borrow_mut().push(frame.index);
        Ok(())
    }
}

#[derive(Default)]
struct FakeEncoder {
    called: Cell<bool>,
    fail: bool,
}

impl VideoEncoder for FakeEncoder {
    fn encode(&self, _frames: usize, _fps: u32) -> anyhow::Result<()> {
        self.called.set(true);
        if self.fail {
            anyhow::bail!("ffmpeg not found");
        }
        Ok(())
    }
}

fn three_points() -> Vec<RawRecord> {
    vec![
        fix(0, 0.0, 0.0),
        fix(10, 0.0, 0.0001),
        fix(20, 0.0, 0.0002),
    ]
}

#[test]
fn scenario_a_three_points_pass_through() {
    let normalized = normalize(&three_points(), &NormalizeOptions::default());
    assert_eq!(normalized.trajectory.len(), 3);

    let out = reconstruct(&normalized.trajectory, &ReconstructOptions::default());
    assert_eq!(out.trajectory, normalized.trajectory);

    let schedule = Schedule::new(&out.trajectory, flat, 30);
    let mut frames = schedule.frames();
    let mut lons = Vec::new();
    while let Some(frame) = frames.next_frame() {
        assert_eq!(frame.current_point.timestamp.timestamp(), T0 + 10 * frame.index as i64);
        lons.push(frame.current_point.longitude);
    }
    assert_eq!(lons, vec![0.0, 0.0001, 0.0002]);
}

#[test]
fn scenario_b_large_epsilon_drops_the_middle_point() {
    let opts = NormalizeOptions {
        dedup_distance_meters: 15.0,
        dedup_min_gap: Duration::seconds(60),
        ..Default::default()
    };
    let normalized = normalize(&three_points(), &opts);
    let times: Vec<i64> = normalized
        .trajectory
        .points()
        .iter()
        .map(|pt| pt.timestamp.timestamp() - T0)
        .collect();
    assert_eq!(times, vec![0, 20]);
    assert_eq!(normalized.stationary, 1);
}

#[test]
fn scenario_c_interpolated_grid() {
    let records = vec![fix(0, 0.0, 0.0), fix(10, 0.0, 1.0)];
    let options = Options {
        resample_step: Some(Duration::seconds(5)),
        interpolate: true,
        ..Default::default()
    };
    let prepared = Pipeline::new(options).unwrap().prepare(&records).unwrap();
    let pts = prepared.trajectory.points();
    let times: Vec<i64> = pts.iter().map(|pt| pt.timestamp.timestamp() - T0).collect();
    assert_eq!(times, vec![0, 5, 10]);
    let lons: Vec<f64> = pts.iter().map(|pt| pt.longitude).collect();
    assert!((lons[0] - 0.0).abs() < 1e-12);
    assert!((lons[1] - 0.5).abs() < 1e-12);
    assert!((lons[2] - 1.0).abs() < 1e-12);

    assert_eq!(count_frames(&prepared.trajectory), 3);
    assert_eq!(prepared.report.frames, 3);
}

#[test]
fn resampled_path_reaches_the_last_fix() {
    let records = vec![fix(0, 0.0, 0.0), fix(10, 0.0, 1.0)];
    let options = Options {
        resample_step: Some(Duration::seconds(3)),
        ..Default::default()
    };
    let prepared = Pipeline::new(options).unwrap().prepare(&records).unwrap();
    let last = prepared.trajectory.points().last().unwrap();
    assert_eq!(last.timestamp.timestamp() - T0, 12);
    assert_eq!(last.longitude, 1.0);
    assert_eq!(prepared.report.frames, 5);
}

#[test]
fn frame_count_matches_trajectory_length() {
    // A noisy, irregular walk with duplicates and a parked stretch
    let mut records = Vec::new();
    let mut secs = 0;
    for i in 0..200 {
        secs += 3 + (i * 7) % 11;
        let lat = 47.0 + (i / 3) as f64 * 0.0003;
        let lon = 8.0 + ((i * 13) % 17) as f64 * 0.0001;
        records.push(fix(secs, lat, lon));
        if i % 5 == 0 {
            records.push(fix(secs, lat, lon));
        }
    }

    for options in [
        Options::default(),
        Options {
            resample_step: Some(Duration::seconds(4)),
            smooth_window: 5,
            ..Default::default()
        },
        Options {
            resample_step: Some(Duration::seconds(30)),
            interpolate: false,
            ..Default::default()
        },
    ] {
        let prepared = Pipeline::new(options).unwrap().prepare(&records).unwrap();
        let pts = prepared.trajectory.points();
        assert!(pts.windows(2).all(|pair| pair[0].timestamp < pair[1].timestamp));
        assert!(pts.iter().all(|pt| pt.latitude.is_finite() && pt.longitude.is_finite()));
        assert_eq!(count_frames(&prepared.trajectory), prepared.trajectory.len());
    }
}

#[test]
fn one_record_means_one_frame() {
    let records = vec![fix(0, 51.5, -0.12)];
    for options in [
        Options::default(),
        Options {
            resample_step: Some(Duration::seconds(1)),
            smooth_window: 9,
            ..Default::default()
        },
    ] {
        let prepared = Pipeline::new(options).unwrap().prepare(&records).unwrap();
        assert_eq!(prepared.trajectory.len(), 1);
        assert_eq!(count_frames(&prepared.trajectory), 1);
    }

    let options = Options {
        resample_step: Some(Duration::seconds(1)),
        ..Default::default()
    };
    let prepared = Pipeline::new(options).unwrap().prepare(&records).unwrap();
    assert_eq!(
        prepared.report.warnings,
        vec![Warning::DegenerateInput {
            distinct_timestamps: 1
        }]
    );
}

#[test]
fn nothing_usable_never_reaches_the_collaborators() {
    let records = vec![
        RawRecord::Unrecognized(json!({"activityRecord": {}})),
        fix(0, 123.0, 0.0),
        RawRecord::Location(RawPosition {
            lat: Some(json!(1.0)),
            lng: Some(json!(1.0)),
            timestamp: Some(json!("whenever")),
            ..Default::default()
        }),
    ];
    let renderer = FakeRenderer::default();
    let encoder = FakeEncoder::default();
    let pipeline = Pipeline::new(Options::default()).unwrap();

    let result = pipeline.run(&records, |_| flat, &renderer, &encoder);
    assert!(matches!(
        result,
        Err(PipelineError::EmptyTrajectory {
            records: 3,
            skipped: 3
        })
    ));
    assert!(renderer.indices.borrow().is_empty());
    assert!(!encoder.called.get());

    assert!(matches!(
        pipeline.run(&[], |_| flat, &renderer, &encoder),
        Err(PipelineError::EmptyTrajectory { .. })
    ));
}

#[test]
fn successful_run_renders_in_order_then_encodes() {
    let renderer = FakeRenderer::default();
    let encoder = FakeEncoder::default();
    let pipeline = Pipeline::new(Options::default()).unwrap();
    let report = pipeline
        .run(&three_points(), |_| flat, &renderer, &encoder)
        .unwrap();
    assert_eq!(*renderer.indices.borrow(), vec![0, 1, 2]);
    assert!(encoder.called.get());
    assert_eq!(report.frames, 3);
    assert_eq!(report.records, 3);
}

#[test]
fn external_failures_are_fatal() {
    let pipeline = Pipeline::new(Options::default()).unwrap();

    let renderer = FakeRenderer {
        fail_at: Some(1),
        ..Default::default()
    };
    let encoder = FakeEncoder::default();
    let err = pipeline
        .run(&three_points(), |_| flat, &renderer, &encoder)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::External {
            stage: ExternalStage::Render,
            ..
        }
    ));
    assert!(err.to_string().contains("disk full"));
    assert!(!encoder.called.get());

    let renderer = FakeRenderer::default();
    let encoder = FakeEncoder {
        fail: true,
        ..Default::default()
    };
    let err = pipeline
        .run(&three_points(), |_| flat, &renderer, &encoder)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::External {
            stage: ExternalStage::Encode,
            ..
        }
    ));
}

#[test]
fn zero_frames_is_checked_on_its_own() {
    let pipeline = Pipeline::new(Options::default()).unwrap();
    let mut prepared = pipeline.prepare(&three_points()).unwrap();
    prepared.trajectory = Trajectory::empty();
    assert!(matches!(
        prepared.schedule(flat),
        Err(PipelineError::ZeroFrames)
    ));
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let options = Options {
        smooth_window: 0,
        ..Default::default()
    };
    assert!(Pipeline::new(options).is_err());
}

#[test]
fn inputs_are_not_modified() {
    let normalized = normalize(&three_points(), &NormalizeOptions::default());
    let before = normalized.trajectory.clone();
    let _ = reconstruct(
        &normalized.trajectory,
        &ReconstructOptions {
            resample_step: Some(Duration::seconds(1)),
            smooth_window: 3,
            ..Default::default()
        },
    );
    assert_eq!(normalized.trajectory, before);
}
