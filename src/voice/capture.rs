//! Microphone capture

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::session::{CaptureStream, CapturedAudio, Microphone};
use crate::{Error, Result};

/// Preferred capture rate (16kHz mono is what speech-to-text wants)
pub const SAMPLE_RATE: u32 = 16000;

/// Records from the default input device into memory
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// Prefers a 16kHz mono configuration and falls back to the device
    /// default; multi-channel input is downmixed while recording.
    ///
    /// # Errors
    ///
    /// Returns error if no input device or usable configuration exists
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let preferred = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)));

        let config = match preferred {
            Some(c) => c.config(),
            None => device
                .default_input_config()
                .map_err(|e| Error::Audio(format!("no suitable audio config found: {e}")))?
                .config(),
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start recording; a no-op if already recording
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let channels = usize::from(self.config.channels.max(1));

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend(downmix(data, channels));
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop recording and release the device
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the recorded samples, leaving the buffer empty
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Rate of the samples in the buffer
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Average interleaved frames down to mono
fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    #[allow(clippy::cast_precision_loss)]
    let scale = channels as f32;
    data.chunks(channels)
        .map(move |frame| frame.iter().sum::<f32>() / scale)
}

/// Encode mono f32 samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Root-mean-square level of a recording
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = samples.len() as f32;
    (samples.iter().map(|s| s * s).sum::<f32>() / len).sqrt()
}

/// The system microphone as seen by the session orchestrator
#[derive(Debug, Default)]
pub struct CpalMicrophone;

#[async_trait(?Send)]
impl Microphone for CpalMicrophone {
    async fn request_permission(&mut self) -> Result<()> {
        // Desktop hosts grant access implicitly; fail early if there is nothing to open
        cpal::default_host()
            .default_input_device()
            .map(|_| ())
            .ok_or_else(|| Error::Audio("no input device available".to_string()))
    }

    fn open(&mut self) -> Result<Box<dyn CaptureStream>> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        Ok(Box::new(CpalCaptureStream { capture }))
    }
}

/// A live recording; dropping it stops the input stream
struct CpalCaptureStream {
    capture: AudioCapture,
}

impl CaptureStream for CpalCaptureStream {
    fn finish(mut self: Box<Self>) -> Result<CapturedAudio> {
        self.capture.stop();
        let samples = self.capture.take_buffer();
        tracing::debug!(samples = samples.len(), "recording finished");

        if samples.is_empty() {
            return Err(Error::Audio("no audio was recorded".to_string()));
        }

        let wav = samples_to_wav(&samples, self.capture.sample_rate())?;
        Ok(CapturedAudio::wav(wav))
    }
}
