//! Local audio devices for the terminal frontend
//!
//! Capture records the default microphone to WAV for upload; playback decodes
//! the gateway's MPEG speech and plays it on the default speakers. The avatar
//! animates while speech plays.

mod avatar;
mod capture;
mod playback;

pub use avatar::{MouthAnimator, MouthShape};
pub use capture::{AudioCapture, CpalMicrophone, SAMPLE_RATE, rms, samples_to_wav};
pub use playback::{AudioPlayback, DecodedAudio, SpeakerSink, decode_mp3, resample};
