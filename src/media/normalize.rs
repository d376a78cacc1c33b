//! Audio normalization via an external ffmpeg subprocess

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;

use super::UploadedAudio;
use crate::{Error, Result};

/// Target sample rate of normalized audio
pub const NORMALIZED_SAMPLE_RATE: u32 = 16_000;

/// MIME type of normalized audio
pub const NORMALIZED_MIME: &str = "audio/wav";

/// Default time allowed for one ffmpeg run
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Mono 16 kHz PCM16 WAV derived from an upload
#[derive(Debug)]
pub struct NormalizedAudio {
    file: NamedTempFile,
}

impl NormalizedAudio {
    /// Location of the normalized file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the normalized bytes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path()).await?)
    }
}

/// Converts uploads to mono/16 kHz/PCM16 with ffmpeg
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    program: PathBuf,
    timeout: Duration,
}

impl AudioNormalizer {
    /// Create a normalizer invoking `program`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-run timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Normalize `input`, writing the result next to it in `dir`
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocalProcessing`] if ffmpeg cannot be spawned, exits
    /// non-zero, times out, or produces no output
    pub async fn normalize(&self, input: &UploadedAudio, dir: &Path) -> Result<NormalizedAudio> {
        let output = tempfile::Builder::new()
            .prefix("normalized-")
            .suffix(".wav")
            .tempfile_in(dir)
            .map_err(|e| Error::LocalProcessing(format!("failed to create output file: {e}")))?;

        let rate = NORMALIZED_SAMPLE_RATE.to_string();
        let child = Command::new(&self.program)
            .arg("-y")
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args(["-ac", "1", "-ar", &rate, "-sample_fmt", "s16", "-c:a", "pcm_s16le"])
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::LocalProcessing(format!(
                    "failed to spawn {}: {e}",
                    self.program.display()
                ))
            })?;

        let result = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::LocalProcessing(format!("normalization timed out after {:?}", self.timeout))
            })?
            .map_err(|e| Error::LocalProcessing(format!("normalization failed: {e}")))?;

        if !result.status.success() {
            let code = result.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::LocalProcessing(format!(
                "ffmpeg exited with code {code}: {}",
                stderr.trim()
            )));
        }

        let written = tokio::fs::metadata(output.path()).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::LocalProcessing("ffmpeg produced no output".to_string()));
        }

        tracing::debug!(
            input = %input.path().display(),
            output = %output.path().display(),
            bytes = written,
            "normalized audio"
        );

        Ok(NormalizedAudio { file: output })
    }
}
