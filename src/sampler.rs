use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Frame sampling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    /// Encoded frames waiting to hit disk. Bounds memory: each decoded
    /// frame is width × height × 3 bytes until its writer finishes.
    pub max_pending_writes: usize,
}

impl Default for SamplerConfig {
    fn default() -> SamplerConfig {
        SamplerConfig {
            frame_rate: 30.0,
            width: 1280,
            height: 720,
            max_pending_writes: 32,
        }
    }
}

/// Decodes `video` into a rescaled, time-subsampled PNG frame sequence
/// under `out_dir`, named `%04d.png` starting at 0001.
///
/// ffmpeg does the decoding and delivers raw rgb24 frames on a pipe; PNG
/// encoding and writing happen on the rayon pool, throttled to
/// `max_pending_writes` outstanding frames with a 1 ms busy-poll backoff.
///
/// Returns the number of frames written.
pub fn sample_video(video: &Path, out_dir: &Path, config: &SamplerConfig) -> Result<usize> {
    if !video.is_file() {
        return Err(Error::MissingInput(video.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| Error::ToolNotFound {
        tool: "ffmpeg".to_string(),
    })?;
    std::fs::create_dir_all(out_dir)?;

    let filter = format!(
        "fps={},scale={}:{}",
        config.frame_rate, config.width, config.height
    );
    let mut child = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(video)
        .args(["-vf", &filter, "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let frame_len = config.width as usize * config.height as usize * 3;
    let mut stdout = child.stdout.take().expect("stdout is piped");

    let pending = Arc::new(AtomicUsize::new(0));
    let write_failed = Arc::new(AtomicBool::new(false));
    let mut frame_count = 0usize;

    loop {
        let mut buf = vec![0u8; frame_len];
        match stdout.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        while pending.load(Ordering::Acquire) >= config.max_pending_writes {
            std::thread::sleep(Duration::from_millis(1));
        }

        frame_count += 1;
        let path = out_dir.join(format!("{:04}.png", frame_count));
        let (width, height) = (config.width, config.height);
        let pending = Arc::clone(&pending);
        let write_failed = Arc::clone(&write_failed);
        pending.fetch_add(1, Ordering::AcqRel);
        rayon::spawn(move || {
            match image::RgbImage::from_raw(width, height, buf) {
                Some(img) => {
                    if let Err(e) = img.save(&path) {
                        log::error!("writing {} failed: {}", path.display(), e);
                        write_failed.store(true, Ordering::Release);
                    }
                }
                None => {
                    log::error!("short frame buffer for {}", path.display());
                    write_failed.store(true, Ordering::Release);
                }
            }
            pending.fetch_sub(1, Ordering::AcqRel);
        });
    }

    while pending.load(Ordering::Acquire) > 0 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let status = child.wait()?;
    if !status.success() {
        return Err(Error::ToolFailed {
            tool: "ffmpeg".to_string(),
            status: status.to_string(),
            detail: format!("decoding {}", video.display()),
        });
    }
    if write_failed.load(Ordering::Acquire) {
        return Err(Error::FrameDump(format!(
            "one or more frame writes under {} failed",
            out_dir.display()
        )));
    }

    log::info!("sampled {} frames from {}", frame_count, video.display());
    Ok(frame_count)
}
