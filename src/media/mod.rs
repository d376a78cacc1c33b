//! Uploaded audio staging and pre-processing
//!
//! Every transcription request stages its upload in a temporary file and may
//! derive a normalized copy from it. Both are `tempfile` handles owned by the
//! request handler, so they are deleted when the handler's scope ends on every
//! path out of it.

mod normalize;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::Result;

pub use normalize::{AudioNormalizer, NORMALIZED_MIME, NORMALIZED_SAMPLE_RATE, NormalizedAudio};

/// MIME type assumed when the client declares none
pub const DEFAULT_UPLOAD_MIME: &str = "audio/wav";

/// An uploaded audio file staged on disk for one request
#[derive(Debug)]
pub struct UploadedAudio {
    file: NamedTempFile,
    bytes: Vec<u8>,
    mime: String,
    file_name: String,
}

impl UploadedAudio {
    /// Write `bytes` into a fresh temporary file under `dir`
    ///
    /// The write runs on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be written
    pub async fn stage(dir: &Path, bytes: Vec<u8>, mime: &str, file_name: &str) -> Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = extension_for(file_name, mime);

        let (file, bytes) = tokio::task::spawn_blocking(move || {
            write_staged(&dir, &bytes, suffix).map(|file| (file, bytes))
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::debug!(
            path = %file.path().display(),
            bytes = bytes.len(),
            mime,
            "staged uploaded audio"
        );

        Ok(Self {
            file,
            bytes,
            mime: mime.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Location of the staged file
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Declared MIME type
    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    /// Original filename sent by the client
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Uploaded bytes, as submitted when normalization is skipped
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read the staged bytes back
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path()).await?)
    }
}

fn write_staged(dir: &Path, bytes: &[u8], suffix: &str) -> std::io::Result<NamedTempFile> {
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(suffix)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

/// Pick a file suffix so external tools can sniff the container
fn extension_for(file_name: &str, mime: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    let from_name = [".wav", ".webm", ".ogg", ".mp3", ".m4a", ".mp4", ".flac"]
        .into_iter()
        .find(|ext| lower.ends_with(ext));
    if let Some(ext) = from_name {
        return ext;
    }

    match mime.split(';').next().unwrap_or_default().trim() {
        "audio/webm" | "video/webm" => ".webm",
        "audio/ogg" => ".ogg",
        "audio/mpeg" => ".mp3",
        "audio/mp4" | "audio/x-m4a" => ".m4a",
        "audio/flac" => ".flac",
        _ => ".wav",
    }
}
