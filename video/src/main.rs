#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod encode;
mod projection;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use structopt::StructOpt;

use model::{parse_duration, Options, Pipeline, Prepared};

use self::encode::FfmpegEncoder;
use self::projection::WebMercator;
use self::render::{parse_color, MapStyle, PngRenderer, RenderOptions};

/// Turns a Google location-history export into an animated map of the path.
#[derive(StructOpt)]
struct Args {
    /// A location-history .json file, or a Takeout .zip. Repeat to combine several.
    #[structopt(long, required = true, number_of_values = 1)]
    input: Vec<PathBuf>,
    /// Where to write the video
    #[structopt(long, default_value = "output/videos/trajectory.mp4")]
    output: PathBuf,
    /// Where to write the individual frames
    #[structopt(long, default_value = "output/frames")]
    frames_dir: PathBuf,
    /// A JSON file with processing options. Flags below override it.
    #[structopt(long)]
    config: Option<PathBuf>,

    /// Regrid onto a fixed time step, like 30s or 5min
    #[structopt(long)]
    resample: Option<String>,
    /// Hold the previous fix when resampling, instead of interpolating
    #[structopt(long)]
    no_interpolate: bool,
    /// Number of points in the moving average. 1 disables smoothing.
    #[structopt(long)]
    smooth_window: Option<usize>,
    /// Drop fixes less accurate than this many meters
    #[structopt(long)]
    max_accuracy: Option<f64>,
    /// Fixes within this many meters of the last kept one are duplicates...
    #[structopt(long)]
    dedup_distance: Option<f64>,
    /// ...if they're also within this long of it, like 60s
    #[structopt(long)]
    dedup_gap: Option<String>,
    #[structopt(long)]
    fps: Option<u32>,
    /// Above 1 zooms in
    #[structopt(long)]
    zoom: Option<f64>,

    /// light, dark, or minimal
    #[structopt(long, default_value = "light")]
    map_style: MapStyle,
    #[structopt(long, default_value = "#1f77b4")]
    line_color: String,
    #[structopt(long, default_value = "2.0")]
    line_width: f64,
    /// Colour the path from oldest to newest
    #[structopt(long)]
    gradient: bool,
    #[structopt(long, default_value = "1280")]
    width: u32,
    #[structopt(long, default_value = "720")]
    height: u32,
    /// Render one frame at a time
    #[structopt(long)]
    sequential: bool,

    /// Only process the trajectory and report what would be rendered
    #[structopt(long)]
    dry_run: bool,
    /// Also write the final trajectory as CSV
    #[structopt(long)]
    export_csv: Option<PathBuf>,
    /// Also write the final trajectory as GeoJSON
    #[structopt(long)]
    export_geojson: Option<PathBuf>,
    /// debug, info, warn, or error. RUST_LOG takes precedence.
    #[structopt(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn options(&self) -> Result<Options> {
        let mut options = match self.config {
            Some(ref path) => {
                let raw = fs_err::read_to_string(path)?;
                Options::from_json(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            None => Options::default(),
        };

        if let Some(ref step) = self.resample {
            options.resample_step = Some(parse_duration(step)?);
        }
        if self.no_interpolate {
            options.interpolate = false;
        }
        if let Some(window) = self.smooth_window {
            options.smooth_window = window;
        }
        if let Some(max) = self.max_accuracy {
            options.max_accuracy_meters = Some(max);
        }
        if let Some(dist) = self.dedup_distance {
            options.dedup_distance_meters = dist;
        }
        if let Some(ref gap) = self.dedup_gap {
            options.dedup_min_gap = parse_duration(gap)?;
        }
        if let Some(fps) = self.fps {
            options.fps = fps;
        }
        if let Some(zoom) = self.zoom {
            options.zoom = zoom;
        }
        options.validate()?;
        Ok(options)
    }

    fn render_options(&self) -> Result<RenderOptions> {
        Ok(RenderOptions {
            frames_dir: self.frames_dir.clone(),
            width: self.width,
            height: self.height,
            style: self.map_style,
            line_color: parse_color(&self.line_color)?,
            line_width: self.line_width,
            gradient: self.gradient,
            parallel: !self.sequential,
        })
    }
}

fn main() -> Result<()> {
    let args = Args::from_args();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let options = args.options()?;
    let zoom = options.zoom;

    let mut records = Vec::new();
    for path in &args.input {
        records.extend(takeout::load_path(path)?);
    }

    let pipeline = Pipeline::new(options)?;
    let prepared = pipeline.prepare(&records)?;
    export(&args, &prepared)?;

    if args.dry_run {
        let projection = WebMercator::fit(&prepared.trajectory, args.width, args.height, zoom);
        let schedule = prepared.schedule(projection)?;
        prepared.report.log();
        info!(
            "Would render {} frames at zoom level {:.2}, for {:.1}s of video",
            schedule.len(),
            schedule.projection().zoom_level(),
            schedule.len() as f64 / schedule.fps() as f64
        );
        return Ok(());
    }

    let renderer = PngRenderer::new(args.render_options()?)?;
    let encoder = FfmpegEncoder::new(args.frames_dir.clone(), args.output.clone());
    let projection = WebMercator::fit(&prepared.trajectory, args.width, args.height, zoom);
    prepared.render(projection, &renderer, &encoder)?;
    Ok(())
}

fn export(args: &Args, prepared: &Prepared) -> Result<()> {
    if let Some(ref path) = args.export_csv {
        write(path, prepared.trajectory.to_csv()?)?;
    }
    if let Some(ref path) = args.export_geojson {
        write(path, prepared.trajectory.to_geojson()?)?;
    }
    Ok(())
}

fn write(path: &Path, contents: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    fs_err::write(path, contents)?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["trajectory-video", "--input", "history.json"];
        argv.extend_from_slice(extra);
        Args::from_iter_safe(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = args(&[]);
        assert_eq!(args.options().unwrap(), Options::default());
        assert_eq!(args.output, PathBuf::from("output/videos/trajectory.mp4"));
        assert!(args.render_options().unwrap().parallel);
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("options.json");
        fs_err::write(&config, r#"{"resample_step": "1min", "smooth_window": 5, "fps": 10}"#)
            .unwrap();
        let config = config.to_string_lossy().into_owned();

        let args = args(&["--config", &config, "--fps", "24", "--no-interpolate"]);
        let options = args.options().unwrap();
        assert_eq!(options.resample_step, Some(Duration::minutes(1)));
        assert_eq!(options.smooth_window, 5);
        assert_eq!(options.fps, 24);
        assert!(!options.interpolate);
    }

    #[test]
    fn repeated_inputs() {
        let args = args(&["--input", "more.zip"]);
        assert_eq!(
            args.input,
            vec![PathBuf::from("history.json"), PathBuf::from("more.zip")]
        );
    }

    #[test]
    fn bad_values() {
        assert!(args(&["--resample", "fast"]).options().is_err());
        assert!(args(&["--smooth-window", "0"]).options().is_err());
        assert!(args(&["--line-color", "blue-ish"]).render_options().is_err());
        assert!(Args::from_iter_safe(["trajectory-video", "--input", "x", "--map-style", "sepia"])
            .is_err());
    }
}
