use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};

use model::VideoEncoder;

/// Shells out to ffmpeg to turn `frame_%05d.png` into an H.264 MP4.
pub struct FfmpegEncoder {
    pub frames_dir: PathBuf,
    pub output: PathBuf,
    pub binary: String,
}

impl FfmpegEncoder {
    pub fn new(frames_dir: PathBuf, output: PathBuf) -> Self {
        Self {
            frames_dir,
            output,
            binary: "ffmpeg".to_string(),
        }
    }

    fn args(&self, frames: usize, fps: u32) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-start_number".to_string(),
            "0".to_string(),
            "-i".to_string(),
            self.frames_dir
                .join("frame_%05d.png")
                .to_string_lossy()
                .into_owned(),
            "-frames:v".to_string(),
            frames.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            self.output.to_string_lossy().into_owned(),
        ]
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames: usize, fps: u32) -> Result<()> {
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let args = self.args(frames, fps);
        debug!("Running {} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .with_context(|| format!("couldn't run {}; is it installed?", self.binary))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            );
        }
        info!("Wrote {}", self.output.display());
        Ok(())
    }
}
