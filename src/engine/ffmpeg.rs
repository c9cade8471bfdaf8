use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::{Engine, LogSink, ProgressSink};
use crate::assets::EngineAssets;
use crate::error::EngineError;
use crate::resource::ResourceRegistry;

/// Native engine driving an `ffmpeg` binary.
///
/// The private file namespace is a temporary directory owned by the engine
/// and removed when it is dropped.
pub struct FfmpegEngine {
    binary: PathBuf,
    registry: ResourceRegistry,
    workdir: TempDir,
    loaded: AtomicBool,
    log_sink: Mutex<Option<LogSink>>,
    progress_sink: Mutex<Option<ProgressSink>>,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>, registry: ResourceRegistry) -> std::io::Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("ogg-compressor-")
            .tempdir()?;
        Ok(Self {
            binary: binary.into(),
            registry,
            workdir,
            loaded: AtomicBool::new(false),
            log_sink: Mutex::new(None),
            progress_sink: Mutex::new(None),
        })
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, EngineError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(EngineError::new(format!("invalid file name: {name:?}")));
        }
        Ok(self.workdir.path().join(name))
    }

    fn ensure_loaded(&self) -> Result<(), EngineError> {
        if self.loaded.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::new("engine is not loaded"))
        }
    }

    fn log_sink(&self) -> Option<LogSink> {
        self.log_sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn progress_sink(&self) -> Option<ProgressSink> {
        self.progress_sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Engine for FfmpegEngine {
    async fn load(&self, assets: &EngineAssets) -> Result<(), EngineError> {
        for (label, url) in [
            ("core script", &assets.core),
            ("wasm module", &assets.wasm),
            ("worker script", &assets.worker),
        ] {
            match self.registry.resolve(url) {
                Some(resource) if !resource.is_empty() => {
                    log::debug!("{label}: {url} ({} bytes)", resource.len());
                }
                Some(_) => return Err(EngineError::new(format!("{label} at {url} is empty"))),
                None => {
                    return Err(EngineError::new(format!("{label} at {url} does not resolve")))
                }
            }
        }

        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-version"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                EngineError::new(format!("failed to start {}: {e}", self.binary.display()))
            })?;
        if !output.status.success() {
            return Err(EngineError::new(format!(
                "{} -version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        log::info!("Engine: {}", banner.lines().next().unwrap_or("ffmpeg"));
        self.loaded.store(true, Ordering::Release);
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::new(format!("write {name}: {e}")))
    }

    async fn exec(&self, args: &[String]) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        log::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-nostdin", "-y", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .current_dir(self.workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::new(format!("failed to start {}: {e}", self.binary.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::new("progress pipe unavailable"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::new("log pipe unavailable"))?;

        let log_sink = self.log_sink();
        let progress_sink = self.progress_sink();
        let mut tracker = ProgressTracker::default();
        let mut last_line = String::new();

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_open, mut err_open) = (true, true);

        // Both pipes in one loop so the duration and the elapsed time meet.
        while out_open || err_open {
            let fraction = tokio::select! {
                biased;
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => {
                        if let Some(ref sink) = log_sink {
                            sink(&line);
                        }
                        let fraction = tracker.on_log_line(&line);
                        if !line.trim().is_empty() {
                            last_line = line;
                        }
                        fraction
                    }
                    _ => {
                        err_open = false;
                        None
                    }
                },
                line = out_lines.next_line(), if out_open => match line? {
                    Some(line) => tracker.on_progress_line(&line),
                    None => {
                        out_open = false;
                        None
                    }
                },
            };
            if let (Some(fraction), Some(sink)) = (fraction, &progress_sink) {
                sink(fraction);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(EngineError::new(format!(
                "ffmpeg exited with {status}: {last_line}"
            )));
        }
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| EngineError::new(format!("read {name}: {e}")))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| EngineError::new(format!("delete {name}: {e}")))
    }

    fn on_log(&self, sink: LogSink) {
        *self.log_sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    fn on_progress(&self, sink: ProgressSink) {
        *self
            .progress_sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }
}

/// Joins the input duration (stderr banner) with the elapsed time
/// (`-progress` output), whichever arrives first.
#[derive(Debug, Default)]
struct ProgressTracker {
    duration_us: u64,
    elapsed_us: Option<i64>,
    finished: bool,
}

impl ProgressTracker {
    fn on_log_line(&mut self, line: &str) -> Option<f64> {
        if self.duration_us != 0 {
            return None;
        }
        self.duration_us = parse_duration(line)?;
        if self.finished {
            return None;
        }
        let elapsed = self.elapsed_us?;
        progress_fraction(elapsed, self.duration_us)
    }

    fn on_progress_line(&mut self, line: &str) -> Option<f64> {
        if line == "progress=end" {
            self.finished = true;
            return Some(1.0);
        }
        let elapsed = parse_elapsed(line)?;
        self.elapsed_us = Some(elapsed);
        progress_fraction(elapsed, self.duration_us)
    }
}

/// Parse `Duration: HH:MM:SS.ss` from an ffmpeg banner line, in microseconds.
fn parse_duration(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Duration: ")?;
    let stamp = rest.split(',').next()?.trim();
    let mut parts = stamp.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let total = (hours * 3600.0 + minutes * 60.0 + seconds) * 1_000_000.0;
    (total > 0.0).then_some(total as u64)
}

/// Elapsed output time carried by one `-progress` line, in microseconds.
fn parse_elapsed(line: &str) -> Option<i64> {
    // out_time_ms is microseconds too, despite the name.
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    value.trim().parse().ok()
}

fn progress_fraction(elapsed_us: i64, duration_us: u64) -> Option<f64> {
    if duration_us == 0 {
        return None;
    }
    Some((elapsed_us.max(0) as f64 / duration_us as f64).min(1.0))
}
