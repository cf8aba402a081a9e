use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

// Stderr lines kept for the execution error message.
const STDERR_TAIL_LINES: usize = 5;

/// Per-call progress sink; receives a completion ratio in [0, 1].
pub type ProgressFn = Box<dyn Fn(f64) + Send + Sync>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine failed to load: {0}")]
    Load(String),
    #[error("Failed to stage file '{name}': {source}")]
    Stage {
        name: String,
        source: std::io::Error,
    },
    #[error("Failed to read file '{name}': {source}")]
    Read {
        name: String,
        source: std::io::Error,
    },
    #[error("Failed to delete file '{name}': {source}")]
    Delete {
        name: String,
        source: std::io::Error,
    },
    #[error("Invalid staged file name: {0}")]
    InvalidName(String),
    #[error("Execution failed: {0}")]
    Execution(String),
}

/// The transcoding runtime: an isolated file namespace for staging inputs
/// and retrieving outputs, plus argument-vector execution with progress
/// events.
///
/// The progress sink is passed per call and dropped when the call returns,
/// so a listener can never outlive its operation.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
    async fn exec(&self, args: &[String], progress: Option<ProgressFn>)
        -> Result<(), EngineError>;
}

/// One-shot engine initialization, driven exactly once by the session.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, EngineError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

/// `MediaEngine` backed by a system FFmpeg process.
///
/// A scratch directory is the file namespace: staged names are flat file
/// names resolved inside it, and executions run with it as the working
/// directory so argument vectors reference staged names directly.
pub struct ProcessEngine {
    config: EngineConfig,
    scratch: TempDir,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let scratch = TempDir::new()
            .map_err(|e| EngineError::Load(format!("failed to create scratch directory: {e}")))?;
        Ok(Self { config, scratch })
    }

    // Staged names must stay inside the scratch namespace.
    fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return Err(EngineError::InvalidName(name.to_string()));
        }
        Ok(self.scratch.path().join(name))
    }

    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.config.ffprobe_path)
            .args(["-v", "quiet", "-show_entries", "format=duration", "-of", "csv=p=0"])
            .arg(path)
            .output()
            .await
            .ok()?;

        String::from_utf8(output.stdout)
            .ok()?
            .trim()
            .parse::<f64>()
            .ok()
    }

    // Total output time the progress ratio is measured against: the seek
    // window when one is present, otherwise the probed input duration.
    async fn effective_duration(&self, args: &[String]) -> Option<f64> {
        let seek_start = value_after(args, "-ss").and_then(|v| v.parse::<f64>().ok());
        let seek_end = value_after(args, "-to").and_then(|v| v.parse::<f64>().ok());
        if let (Some(start), Some(end)) = (seek_start, seek_end) {
            return Some(end - start);
        }

        let input = value_after(args, "-i")?;
        let path = self.resolve(&input).ok()?;
        self.probe_duration(&path).await
    }
}

#[async_trait]
impl MediaEngine for ProcessEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| EngineError::Stage {
                name: name.to_string(),
                source,
            })
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| EngineError::Read {
                name: name.to_string(),
                source,
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Cleanup is idempotent; a name that was never produced is fine.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EngineError::Delete {
                name: name.to_string(),
                source,
            }),
        }
    }

    async fn exec(
        &self,
        args: &[String],
        progress: Option<ProgressFn>,
    ) -> Result<(), EngineError> {
        let duration = self.effective_duration(args).await;
        tracing::debug!(?args, ?duration, "executing ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .arg("-nostdin")
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-progress")
            .arg("pipe:1")
            .args(args)
            .current_dir(self.scratch.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Execution(format!("failed to start ffmpeg: {e}")))?;

        // Drain stderr concurrently, keeping a tail for the error message.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        if let Some(stdout) = child.stdout.take() {
            let parser = ProgressParser::new();
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let (Some(callback), Some(total)) = (progress.as_ref(), duration) else {
                    continue;
                };
                if let Some(seconds) = parser.parse_line(&line) {
                    if total > 0.0 {
                        callback((seconds / total).clamp(0.0, 1.0));
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| EngineError::Execution(format!("failed to wait for ffmpeg: {e}")))?;
        let diagnostics = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else if diagnostics.is_empty() {
            Err(EngineError::Execution(format!("ffmpeg exited with {status}")))
        } else {
            Err(EngineError::Execution(diagnostics))
        }
    }
}

/// Loads a `ProcessEngine` after verifying the FFmpeg binary responds.
pub struct ProcessEngineLoader {
    config: EngineConfig,
}

impl ProcessEngineLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Default for ProcessEngineLoader {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl EngineLoader for ProcessEngineLoader {
    async fn load(&self) -> Result<Box<dyn MediaEngine>, EngineError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| EngineError::Load(format!("ffmpeg not found: {e}")))?;

        if !output.status.success() {
            return Err(EngineError::Load(
                "ffmpeg is installed but not responding".to_string(),
            ));
        }

        let engine = ProcessEngine::new(self.config.clone())?;
        tracing::info!(scratch = %engine.scratch.path().display(), "process engine loaded");
        Ok(Box::new(engine))
    }
}

fn value_after(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .cloned()
}

struct ProgressParser {
    out_time: Regex,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            out_time: Regex::new(r"out_time_ms=(\d+)").unwrap(),
        }
    }

    // out_time_ms is in microseconds despite the name.
    fn parse_line(&self, line: &str) -> Option<f64> {
        let caps = self.out_time.captures(line)?;
        let microseconds: u64 = caps[1].parse().ok()?;
        Some(microseconds as f64 / 1_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_names_must_be_flat() {
        let engine = ProcessEngine::new(EngineConfig::default()).unwrap();
        assert!(engine.resolve("in-abc.mp4").is_ok());
        assert!(engine.resolve("").is_err());
        assert!(engine.resolve("../escape.mp4").is_err());
        assert!(engine.resolve("nested/name.mp4").is_err());
        assert!(engine.resolve("nested\\name.mp4").is_err());
    }

    #[tokio::test]
    async fn test_staging_round_trip() {
        let engine = ProcessEngine::new(EngineConfig::default()).unwrap();

        engine.write_file("clip.mp4", b"payload").await.unwrap();
        assert_eq!(engine.read_file("clip.mp4").await.unwrap(), b"payload");

        engine.delete_file("clip.mp4").await.unwrap();
        assert!(engine.read_file("clip.mp4").await.is_err());

        // Deleting again is not an error.
        engine.delete_file("clip.mp4").await.unwrap();
    }

    #[test]
    fn test_progress_parser() {
        let parser = ProgressParser::new();
        assert_eq!(parser.parse_line("out_time_ms=2500000"), Some(2.5));
        assert_eq!(parser.parse_line("frame=120"), None);
        assert_eq!(parser.parse_line("progress=continue"), None);
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
