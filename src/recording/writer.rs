//! Video writers
//!
//! The codec is an external capability: a `VideoWriter` accepts BGR frames
//! and produces a playable file. The default implementation pipes raw
//! frames into an ffmpeg child encoding MJPEG into an AVI container.

use crate::error::{Error, Result};
use crate::frame::{Dimensions, Frame};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::timeout;

/// Bound on waiting for the encoder to flush and exit at close
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Appends frames to one output file; `write` must not be called after
/// `close`
#[async_trait]
pub trait VideoWriter: Send + Sync {
    async fn write(&mut self, frame: &Frame) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens writers for new recording files
#[async_trait]
pub trait VideoWriterFactory: Send + Sync {
    async fn open(&self, path: &Path, dims: Dimensions, fps: u32) -> Result<Box<dyn VideoWriter>>;
}

/// ffmpeg-backed MJPEG/AVI writer
pub struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: String,
}

pub struct FfmpegWriterFactory;

#[async_trait]
impl VideoWriterFactory for FfmpegWriterFactory {
    async fn open(&self, path: &Path, dims: Dimensions, fps: u32) -> Result<Box<dyn VideoWriter>> {
        let path_str = path.to_string_lossy().into_owned();
        let mut child = Command::new("ffmpeg")
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-s",
                &dims.to_string(),
                "-r",
                &fps.to_string(),
                "-i",
                "-",
                "-c:v",
                "mjpeg",
                "-q:v",
                "3",
                "-loglevel",
                "error",
                "-y",
                &path_str,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Write(format!("ffmpeg encoder spawn failed: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Write("ffmpeg encoder stdin not captured".to_string()))?;

        Ok(Box::new(FfmpegWriter {
            child: Some(child),
            stdin: Some(stdin),
            path: path_str,
        }))
    }
}

#[async_trait]
impl VideoWriter for FfmpegWriter {
    async fn write(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Write("writer already closed".to_string()))?;
        stdin
            .write_all(frame.data())
            .await
            .map_err(|e| Error::Write(format!("encoder pipe write failed: {}", e)))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping stdin signals EOF so ffmpeg flushes the container
        self.stdin = None;

        if let Some(mut child) = self.child.take() {
            match timeout(CLOSE_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) if status.success() => Ok(()),
                Ok(Ok(status)) => Err(Error::Write(format!(
                    "ffmpeg encoder exited with {} for {}",
                    status, self.path
                ))),
                Ok(Err(e)) => Err(Error::Write(format!("encoder wait failed: {}", e))),
                Err(_) => {
                    let _ = child.kill().await;
                    Err(Error::Write(format!(
                        "encoder close timeout for {}",
                        self.path
                    )))
                }
            }
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
pub mod doubles {
    //! Writer doubles for pipeline/recording tests

    use super::*;
    use std::sync::{Arc, Mutex};

    /// Collects written frames in memory; optionally flushes raw bytes to a
    /// real file on close so file-size accounting can be exercised
    #[derive(Default)]
    pub struct MemoryWriterState {
        pub frames: Vec<Frame>,
        pub closed: bool,
    }

    pub struct MemoryWriter {
        pub state: Arc<Mutex<MemoryWriterState>>,
        pub flush_path: Option<std::path::PathBuf>,
    }

    pub struct MemoryWriterFactory {
        pub states: Arc<Mutex<Vec<Arc<Mutex<MemoryWriterState>>>>>,
        pub flush_to_disk: bool,
    }

    impl MemoryWriterFactory {
        pub fn new(flush_to_disk: bool) -> Self {
            Self {
                states: Arc::new(Mutex::new(Vec::new())),
                flush_to_disk,
            }
        }
    }

    #[async_trait]
    impl VideoWriterFactory for MemoryWriterFactory {
        async fn open(
            &self,
            path: &Path,
            _dims: Dimensions,
            _fps: u32,
        ) -> Result<Box<dyn VideoWriter>> {
            let state = Arc::new(Mutex::new(MemoryWriterState::default()));
            self.states.lock().unwrap().push(state.clone());
            Ok(Box::new(MemoryWriter {
                state,
                flush_path: self.flush_to_disk.then(|| path.to_path_buf()),
            }))
        }
    }

    #[async_trait]
    impl VideoWriter for MemoryWriter {
        async fn write(&mut self, frame: &Frame) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return Err(Error::Write("writer already closed".to_string()));
            }
            state.frames.push(frame.clone());
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.closed = true;
            if let Some(path) = &self.flush_path {
                let bytes: Vec<u8> = state
                    .frames
                    .iter()
                    .flat_map(|f| f.data().to_vec())
                    .collect();
                std::fs::write(path, bytes)?;
            }
            Ok(())
        }
    }

    /// Writer that fails every write; exercises session abandonment
    pub struct FailingWriterFactory;

    #[async_trait]
    impl VideoWriterFactory for FailingWriterFactory {
        async fn open(
            &self,
            _path: &Path,
            _dims: Dimensions,
            _fps: u32,
        ) -> Result<Box<dyn VideoWriter>> {
            Ok(Box::new(FailingWriter))
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl VideoWriter for FailingWriter {
        async fn write(&mut self, _frame: &Frame) -> Result<()> {
            Err(Error::Write("disk full".to_string()))
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
