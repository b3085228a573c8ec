use std::path::{Path, PathBuf};
use std::str::FromStr;

use ab_glyph::FontRef;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut};
use rayon::prelude::*;

use model::{FrameRenderer, FrameSpec, Projection, Schedule, ScreenPt};

const GRID_SPACING: u32 = 64;
const DOT_RADIUS: i32 = 6;
/// DejaVu Sans; see assets/DejaVuSans-LICENSE
const FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapStyle {
    Light,
    Dark,
    Minimal,
}

impl FromStr for MapStyle {
    type Err = anyhow::Error;

    fn from_str(x: &str) -> Result<Self> {
        match x {
            "light" => Ok(MapStyle::Light),
            "dark" => Ok(MapStyle::Dark),
            "minimal" => Ok(MapStyle::Minimal),
            _ => bail!("unknown map style {x}; try light, dark, or minimal"),
        }
    }
}

struct Theme {
    background: Rgb<u8>,
    grid: Rgb<u8>,
    point: Rgb<u8>,
    text: Rgb<u8>,
}

impl MapStyle {
    fn theme(self) -> Theme {
        match self {
            MapStyle::Light => Theme {
                background: Rgb([0xf8, 0xf9, 0xfa]),
                grid: Rgb([0xe9, 0xec, 0xef]),
                point: Rgb([0xd6, 0x27, 0x28]),
                text: Rgb([0x21, 0x25, 0x29]),
            },
            MapStyle::Dark => Theme {
                background: Rgb([0x1b, 0x1b, 0x1b]),
                grid: Rgb([0x2b, 0x2b, 0x2b]),
                point: Rgb([0xff, 0xbf, 0x00]),
                text: Rgb([0xf8, 0xf9, 0xfa]),
            },
            MapStyle::Minimal => Theme {
                background: Rgb([0xff, 0xff, 0xff]),
                grid: Rgb([0xf2, 0xf2, 0xf2]),
                point: Rgb([0x2c, 0xa0, 0x2c]),
                text: Rgb([0x22, 0x22, 0x22]),
            },
        }
    }
}

/// `#rrggbb`, `#rgb`, with or without the `#`
pub fn parse_color(raw: &str) -> Result<Rgb<u8>> {
    let hex = raw.trim().trim_start_matches('#');
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => bail!("{raw} isn't a hex colour like #1f77b4"),
    };
    let channel = |i: usize| {
        u8::from_str_radix(&expanded[i..i + 2], 16)
            .with_context(|| format!("{raw} isn't a hex colour like #1f77b4"))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

#[derive(Clone, Debug)]
pub struct RenderOptions {
    pub frames_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub style: MapStyle,
    pub line_color: Rgb<u8>,
    pub line_width: f64,
    /// Colour the path from oldest to newest instead of using `line_color`
    pub gradient: bool,
    pub parallel: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("output/frames"),
            width: 1280,
            height: 720,
            style: MapStyle::Light,
            line_color: Rgb([0x1f, 0x77, 0xb4]),
            line_width: 2.0,
            gradient: false,
            parallel: true,
        }
    }
}

/// Writes each frame as `frame_00000.png`, `frame_00001.png`, ... in the frames directory.
pub struct PngRenderer {
    opts: RenderOptions,
    font: FontRef<'static>,
}

impl PngRenderer {
    /// Creates the frames directory and clears out frames left over from an earlier run.
    pub fn new(opts: RenderOptions) -> Result<Self> {
        if opts.width == 0 || opts.height == 0 {
            bail!("The canvas can't be {}x{}", opts.width, opts.height);
        }
        if !(opts.line_width > 0.0) {
            bail!("line width must be positive, not {}", opts.line_width);
        }
        fs_err::create_dir_all(&opts.frames_dir)?;
        let removed = remove_stale_frames(&opts.frames_dir)?;
        if removed > 0 {
            info!(
                "Removed {removed} old frames from {}",
                opts.frames_dir.display()
            );
        }
        let font =
            FontRef::try_from_slice(FONT).map_err(|err| anyhow!("loading the title font: {err}"))?;
        Ok(Self { opts, font })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        frame_path(&self.opts.frames_dir, index)
    }

    pub fn draw(&self, frame: &FrameSpec) -> RgbImage {
        let theme = self.opts.style.theme();
        let mut img = RgbImage::from_pixel(self.opts.width, self.opts.height, theme.background);
        draw_grid(&mut img, theme.grid);

        let path = &frame.projected_path;
        let segments = path.len().saturating_sub(1);
        for (i, pair) in path.windows(2).enumerate() {
            let color = if self.opts.gradient {
                let c = colorous::COOL.eval_continuous((i + 1) as f64 / segments as f64);
                Rgb([c.r, c.g, c.b])
            } else {
                self.opts.line_color
            };
            draw_thick_line(&mut img, pair[0], pair[1], self.opts.line_width, color);
        }

        draw_filled_circle_mut(
            &mut img,
            pixel(frame.projected_pixel),
            DOT_RADIUS,
            theme.point,
        );

        let scale = (self.opts.height as f32 / 32.0).max(12.0);
        let title = format!(
            "Trajectory @ {}",
            frame.current_point.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let margin = (scale / 2.0) as i32;
        draw_text_mut(&mut img, theme.text, margin, margin, scale, &self.font, &title);
        img
    }
}

impl FrameRenderer for PngRenderer {
    fn render(&self, frame: &FrameSpec) -> Result<()> {
        let path = self.frame_path(frame.index);
        self.draw(frame)
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn render_all<P: Projection + Sync>(&self, schedule: &Schedule<P>) -> Result<usize> {
        if self.opts.parallel {
            (0..schedule.len()).into_par_iter().try_for_each(|index| {
                let frame = schedule
                    .frame(index)
                    .ok_or_else(|| anyhow!("frame {index} doesn't exist"))?;
                self.render(&frame)
            })?;
            return Ok(schedule.len());
        }

        let mut frames = schedule.frames();
        let mut count = 0;
        while let Some(frame) = frames.next_frame() {
            self.render(&frame)?;
            count += 1;
        }
        Ok(count)
    }
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

fn remove_stale_frames(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("frame_") && name.ends_with(".png"))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            fs_err::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn draw_grid(img: &mut RgbImage, color: Rgb<u8>) {
    let (width, height) = img.dimensions();
    for x in (0..width).step_by(GRID_SPACING as usize) {
        draw_line_segment_mut(img, (x as f32, 0.0), (x as f32, height as f32), color);
    }
    for y in (0..height).step_by(GRID_SPACING as usize) {
        draw_line_segment_mut(img, (0.0, y as f32), (width as f32, y as f32), color);
    }
}

/// Thin lines are plain segments; thicker ones are stamped with discs every pixel along the way,
/// which also rounds the joints.
fn draw_thick_line(img: &mut RgbImage, from: ScreenPt, to: ScreenPt, width: f64, color: Rgb<u8>) {
    if width <= 1.5 {
        draw_line_segment_mut(
            img,
            (from.x as f32, from.y as f32),
            (to.x as f32, to.y as f32),
            color,
        );
        return;
    }

    let radius = ((width / 2.0).round() as i32).max(1);
    let length = (to.x - from.x).hypot(to.y - from.y);
    let steps = length.ceil().max(1.0) as usize;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let pt = ScreenPt::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
        draw_filled_circle_mut(img, pixel(pt), radius, color);
    }
}

fn pixel(pt: ScreenPt) -> (i32, i32) {
    (pt.x.round() as i32, pt.y.round() as i32)
}
