//! Animated avatar mouth shown while the assistant speaks

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::SpeakingIndicator;

/// Mouth shape of the avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouthShape {
    #[default]
    Closed,
    Open,
}

impl MouthShape {
    /// SVG path for this shape
    #[must_use]
    pub const fn svg_path(self) -> &'static str {
        match self {
            Self::Closed => "M130,170 Q150,175 170,170",
            Self::Open => "M130,170 Q150,195 170,170",
        }
    }

    /// Single-glyph rendering for the terminal
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Closed => "(-‿-)",
            Self::Open => "(-o-)",
        }
    }
}

/// Toggles the mouth open and closed while speaking
///
/// The cadence is picked once per [`start`](SpeakingIndicator::start), between
/// 100 and 300 ms. Each tick opens the mouth with 60% probability.
pub struct MouthAnimator {
    tx: watch::Sender<MouthShape>,
    task: Option<JoinHandle<()>>,
}

impl MouthAnimator {
    /// Create an animator at rest (mouth closed)
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MouthShape::Closed);
        Self { tx, task: None }
    }

    /// Watch the current mouth shape
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MouthShape> {
        self.tx.subscribe()
    }

    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.task.is_some()
    }
}

impl Default for MouthAnimator {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeakingIndicator for MouthAnimator {
    fn start(&mut self) {
        if self.task.is_some() {
            return;
        }

        let cadence = Duration::from_millis(rand::thread_rng().gen_range(100..=300));
        let tx = self.tx.clone();
        tracing::trace!(cadence_ms = cadence.as_millis(), "avatar animation started");

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cadence);
            loop {
                ticker.tick().await;
                let shape = if rand::thread_rng().gen_bool(0.6) {
                    MouthShape::Open
                } else {
                    MouthShape::Closed
                };
                tx.send_replace(shape);
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!("avatar animation stopped");
        }
        self.tx.send_replace(MouthShape::Closed);
    }
}

impl Drop for MouthAnimator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
