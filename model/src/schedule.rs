use std::borrow::Cow;

use crate::{GeoPoint, ScreenPt, Trajectory};

/// Maps (latitude, longitude) into the renderer's raster space. Must be a pure function; frames
/// may be projected in any order, from any thread.
pub trait Projection {
    fn project(&self, latitude: f64, longitude: f64) -> ScreenPt;
}

impl<F: Fn(f64, f64) -> ScreenPt> Projection for F {
    fn project(&self, latitude: f64, longitude: f64) -> ScreenPt {
        self(latitude, longitude)
    }
}

/// Everything needed to draw one frame: the path so far, where we are now, and where that is on
/// screen.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSpec<'a> {
    pub index: usize,
    /// Trajectory points `0..=index`
    pub path_prefix: &'a [GeoPoint],
    /// `path_prefix`, projected
    pub projected_path: Cow<'a, [ScreenPt]>,
    pub current_point: GeoPoint,
    pub projected_pixel: ScreenPt,
}

/// One frame per trajectory point. `fps` only controls playback speed when encoding; the
/// trajectory's density already decides how many frames there are.
pub struct Schedule<'a, P> {
    trajectory: &'a Trajectory,
    projection: P,
    fps: u32,
}

impl<'a, P: Projection> Schedule<'a, P> {
    pub fn new(trajectory: &'a Trajectory, projection: P, fps: u32) -> Self {
        Self {
            trajectory,
            projection,
            fps,
        }
    }

    pub fn len(&self) -> usize {
        self.trajectory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectory.is_empty()
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Starts from frame 0. Call again to start over.
    pub fn frames(&self) -> Frames<'_, 'a, P> {
        Frames {
            schedule: self,
            next: 0,
            projected: Vec::with_capacity(self.len()),
        }
    }

    /// Builds any one frame on its own, projecting its whole prefix. Independent of every other
    /// frame, so this is the way to render in parallel. Costs O(index) per call.
    pub fn frame(&self, index: usize) -> Option<FrameSpec<'a>> {
        let pts = self.trajectory.points();
        let current_point = *pts.get(index)?;
        let path_prefix = &pts[..=index];
        let projected_path: Vec<ScreenPt> = path_prefix
            .iter()
            .map(|pt| self.projection.project(pt.latitude, pt.longitude))
            .collect();
        let projected_pixel = projected_path[index];
        Some(FrameSpec {
            index,
            path_prefix,
            projected_path: Cow::Owned(projected_path),
            current_point,
            projected_pixel,
        })
    }
}

/// Walks the frames in order, projecting each point exactly once and lending out the growing
/// projected prefix. A frame borrows the cursor, so it has to be dropped before asking for the
/// next one; for out-of-order or parallel use, see `Schedule::frame`.
pub struct Frames<'s, 'a, P> {
    schedule: &'s Schedule<'a, P>,
    next: usize,
    projected: Vec<ScreenPt>,
}

impl<'s, 'a, P: Projection> Frames<'s, 'a, P> {
    pub fn next_frame(&mut self) -> Option<FrameSpec<'_>> {
        let pts = self.schedule.trajectory.points();
        let index = self.next;
        let current_point = *pts.get(index)?;
        let projected_pixel = self
            .schedule
            .projection
            .project(current_point.latitude, current_point.longitude);
        self.projected.push(projected_pixel);
        self.next += 1;

        Some(FrameSpec {
            index,
            path_prefix: &pts[..=index],
            projected_path: Cow::Borrowed(&self.projected),
            current_point,
            projected_pixel,
        })
    }

    pub fn remaining(&self) -> usize {
        self.schedule.len() - self.next
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn trajectory(n: usize) -> Trajectory {
        Trajectory::new(
            (0..n)
                .map(|i| {
                    GeoPoint::new(
                        Utc.timestamp_opt(i as i64 * 10, 0).unwrap(),
                        i as f64 * 0.001,
                        i as f64 * 0.002,
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn flat(lat: f64, lon: f64) -> ScreenPt {
        ScreenPt::new(lon * 1000.0, -lat * 1000.0)
    }

    #[test]
    fn one_frame_per_point() {
        let traj = trajectory(5);
        let schedule = Schedule::new(&traj, flat, 30);
        assert_eq!(schedule.len(), 5);

        let mut frames = schedule.frames();
        let mut seen = 0;
        while let Some(frame) = frames.next_frame() {
            assert_eq!(frame.index, seen);
            assert_eq!(frame.path_prefix.len(), seen + 1);
            assert_eq!(frame.projected_path.len(), seen + 1);
            assert_eq!(frame.current_point, traj.points()[seen]);
            assert_eq!(frame.path_prefix.last(), Some(&frame.current_point));
            assert_eq!(frame.projected_path.last(), Some(&frame.projected_pixel));
            seen += 1;
        }
        assert_eq!(seen, 5);
        assert_eq!(frames.remaining(), 0);
    }

    #[test]
    fn sequential_and_direct_frames_agree() {
        let traj = trajectory(6);
        let schedule = Schedule::new(&traj, flat, 30);
        let mut frames = schedule.frames();
        for idx in 0..6 {
            let direct = schedule.frame(idx).unwrap();
            let sequential = frames.next_frame().unwrap();
            assert_eq!(direct, sequential);
        }
        assert!(schedule.frame(6).is_none());
    }

    #[test]
    fn restartable() {
        let traj = trajectory(3);
        let schedule = Schedule::new(&traj, flat, 30);
        for _ in 0..2 {
            let mut frames = schedule.frames();
            let mut count = 0;
            while frames.next_frame().is_some() {
                count += 1;
            }
            assert_eq!(count, 3);
        }
    }

    #[test]
    fn each_point_projected_once_when_sequential() {
        let traj = trajectory(50);
        let calls = Cell::new(0);
        let counting = |lat: f64, lon: f64| {
            calls.set(calls.get() + 1);
            flat(lat, lon)
        };
        let schedule = Schedule::new(&traj, counting, 30);
        let mut frames = schedule.frames();
        while frames.next_frame().is_some() {}
        assert_eq!(calls.get(), 50);
    }

    #[test]
    fn degenerate_sizes() {
        let single = trajectory(1);
        let schedule = Schedule::new(&single, flat, 30);
        let mut frames = schedule.frames();
        assert!(frames.next_frame().is_some());
        assert!(frames.next_frame().is_none());

        let empty = Trajectory::empty();
        let schedule = Schedule::new(&empty, flat, 30);
        assert!(schedule.is_empty());
        assert!(schedule.frames().next_frame().is_none());
        assert!(schedule.frame(0).is_none());
    }
}
