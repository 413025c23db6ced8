//! ffmpeg subprocess frame source
//!
//! Spawns an external ffmpeg process that decodes the stream to raw BGR24
//! on stdout; the byte stream is parsed into discrete frames. `kill_on_drop`
//! guarantees the child never outlives the source, including on timeout.

use crate::error::{Error, Result};
use crate::frame::{Dimensions, Frame};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;

/// Bound on a single frame read so a stop request cannot hang on a dead
/// stream
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the ffprobe run
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolution/codec reported by a stream probe
#[derive(Debug, Clone)]
pub struct StreamProbe {
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

/// Probe a stream with ffprobe (JSON output) for its first video stream
pub async fn probe_stream(url: &str) -> Result<StreamProbe> {
    let mut command = Command::new("ffprobe");
    if url.starts_with("rtsp://") {
        command.args(["-rtsp_transport", "tcp"]);
    }
    let child = command
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,codec_name",
            "-print_format",
            "json",
            "-i",
            url,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Probe(format!("ffprobe spawn failed: {}", e)))?;

    let output = match timeout(PROBE_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(Error::Probe(format!("ffprobe execution failed: {}", e))),
        Err(_) => {
            return Err(Error::Probe(format!(
                "ffprobe timeout ({}s)",
                PROBE_TIMEOUT.as_secs()
            )))
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Probe(format!("ffprobe failed: {}", stderr.trim())));
    }

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let stream = parsed
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| Error::Probe("no video stream found".to_string()))?;

    let width = stream.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(Error::Probe("stream reported zero dimensions".to_string()));
    }

    Ok(StreamProbe {
        width,
        height,
        codec: stream
            .get("codec_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string(),
    })
}

/// External-process raw-frame source
pub struct FfmpegFrameSource {
    url: String,
    dims: Option<Dimensions>,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
}

impl FfmpegFrameSource {
    pub fn new(url: String) -> Self {
        Self {
            url,
            dims: None,
            child: None,
            stdout: None,
        }
    }
}

#[async_trait]
impl super::FrameSource for FfmpegFrameSource {
    async fn connect(&mut self) -> Result<Dimensions> {
        let probe = probe_stream(&self.url)
            .await
            .map_err(|e| Error::Connect(e.to_string()))?;

        let mut command = Command::new("ffmpeg");
        if self.url.starts_with("rtsp://") {
            command.args(["-rtsp_transport", "tcp"]);
        }
        let mut child = command
            .args([
                "-i",
                &self.url,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-loglevel",
                "error",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Connect(format!("ffmpeg spawn failed: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Connect("ffmpeg stdout not captured".to_string()))?;

        let dims = Dimensions {
            width: probe.width,
            height: probe.height,
        };
        tracing::debug!(
            url = %self.url,
            dims = %dims,
            codec = %probe.codec,
            "ffmpeg frame source connected"
        );

        self.child = Some(child);
        self.stdout = Some(stdout);
        self.dims = Some(dims);
        Ok(dims)
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        let dims = self
            .dims
            .ok_or_else(|| Error::Read("source not connected".to_string()))?;
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| Error::Read("source not connected".to_string()))?;

        let frame_len = dims.width as usize * dims.height as usize * 3;
        let mut buf = vec![0u8; frame_len];

        match timeout(READ_TIMEOUT, stdout.read_exact(&mut buf)).await {
            Ok(Ok(_)) => Frame::new(dims.width, dims.height, buf),
            Ok(Err(e)) => Err(Error::Read(format!("ffmpeg pipe read failed: {}", e))),
            Err(_) => Err(Error::Read(format!(
                "frame read timeout ({}s)",
                READ_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(error = %e, "ffmpeg child already gone");
            }
        }
    }
}
