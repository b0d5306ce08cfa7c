//! Audio output for spoken cues.
//!
//! A session is handed an [`AudioSink`] when it is mounted and keeps it for
//! its lifetime. Cue audio is synthesized by the backend and passed to the
//! sink as encoded bytes; decoding and playback belong to the sink.

use async_trait::async_trait;

use crate::error::Result;

/// Destination for synthesized speech.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Play one encoded clip. `label` is the text that was synthesized.
    async fn play(&self, label: &str, clip: Vec<u8>) -> Result<()>;
}

/// Sink that discards every clip. Used when no audio device is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

#[async_trait]
impl AudioSink for SilentAudio {
    async fn play(&self, label: &str, clip: Vec<u8>) -> Result<()> {
        tracing::debug!(label, bytes = clip.len(), "discarding audio clip");
        Ok(())
    }
}
