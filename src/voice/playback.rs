//! Speaker playback of synthesized speech

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, StreamConfig};

use crate::session::AudioSink;
use crate::{Error, Result};

/// Rate requested from the output device when it supports it
const PREFERRED_SAMPLE_RATE: u32 = 24000;

/// Frames per resampler chunk
const RESAMPLE_CHUNK: usize = 1024;

/// Mono PCM decoded from an MP3 stream
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device or usable configuration exists
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let preferred = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .filter(|c| c.channels() <= 2)
            .find(|c| {
                c.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
                    && c.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
            })
            .map(|c| c.with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE)));

        let config = match preferred {
            Some(c) => c.config(),
            None => device
                .default_output_config()
                .map_err(|e| Error::Audio(format!("no suitable output config found: {e}")))?
                .config(),
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Decode MP3 bytes and play them to completion
    ///
    /// Blocks the calling thread for the duration of the clip.
    ///
    /// # Errors
    ///
    /// Returns error if decoding, resampling or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let decoded = decode_mp3(mp3_data)?;
        let samples = resample(
            &decoded.samples,
            decoded.sample_rate,
            self.config.sample_rate.0,
        )?;
        self.play_samples_blocking(samples)
    }

    fn play_samples_blocking(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels.max(1));
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            if pos < samples.len() {
                                pos += 1;
                            }
                        }
                        position.store(pos, Ordering::Relaxed);
                        if pos >= samples.len() {
                            finished.store(true, Ordering::Release);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms =
            (sample_count as u64 * 1000) / u64::from(self.config.sample_rate.0.max(1));
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }

        // Let the device drain its last buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

/// Decode MP3 bytes to mono f32 samples at the stream's native rate
///
/// # Errors
///
/// Returns error if the data is not a decodable MP3 stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or_default();
                }
                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let n = chunk.len() as f32;
                    sum / n
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => {}
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("no MP3 frames found".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Resample mono audio between rates
///
/// The final partial chunk is zero-padded so no trailing audio is lost.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(clippy::cast_possible_truncation)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let chunk_len = resampler.input_frames_next();
    let expected = samples.len() * to_rate as usize / from_rate as usize;
    // The resampler lags its input by a fixed delay; keep feeding silence
    // until the delayed tail has come out
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut output = Vec::with_capacity(wanted + resampler.output_frames_max());

    let mut chunks = samples.chunks(chunk_len);
    while output.len() < wanted {
        let mut input: Vec<f64> = chunks
            .next()
            .map(|chunk| chunk.iter().map(|&s| f64::from(s)).collect())
            .unwrap_or_default();
        input.resize(chunk_len, 0.0);
        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

/// The system speakers as seen by the session orchestrator
///
/// Playback blocks a worker thread; requires the multi-threaded runtime.
#[derive(Default)]
pub struct SpeakerSink {
    playback: Option<AudioPlayback>,
}

impl SpeakerSink {
    #[must_use]
    pub const fn new() -> Self {
        Self { playback: None }
    }
}

#[async_trait(?Send)]
impl AudioSink for SpeakerSink {
    async fn play(&mut self, mpeg: &[u8]) -> Result<()> {
        if self.playback.is_none() {
            self.playback = Some(AudioPlayback::new()?);
        }
        let Some(playback) = self.playback.as_ref() else {
            return Ok(());
        };
        tokio::task::block_in_place(|| playback.play_mp3(mpeg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 24000, 24000).unwrap(), samples);
    }

    #[test]
    fn upsampling_scales_length() {
        let samples = vec![0.0; 16000];
        let out = resample(&samples, 16000, 24000).unwrap();
        assert_eq!(out.len(), 24000);
    }

    #[test]
    fn short_clips_survive_resampling() {
        let samples = vec![0.25; 100];
        let out = resample(&samples, 22050, 44100).unwrap();
        assert_eq!(out.len(), 200);
    }

    #[test]
    fn resampling_keeps_the_tail() {
        let samples = vec![0.5; 4000];
        let out = resample(&samples, 24000, 48000).unwrap();
        assert_eq!(out.len(), 8000);

        // Away from the edges the constant signal comes through unchanged
        for &i in &[400, 4000, 7600] {
            assert!((out[i] - 0.5).abs() < 0.05, "sample {i} was {}", out[i]);
        }
    }

    #[test]
    fn garbage_is_not_mp3() {
        assert!(decode_mp3(b"definitely not audio").is_err());
        assert!(decode_mp3(&[]).is_err());
    }
}
