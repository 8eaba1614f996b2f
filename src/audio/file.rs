use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::io::Cursor;
use tracing::debug;

use super::artifact::AudioArtifact;

/// Decoded view of a WAV artifact
pub struct AudioFile {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    /// Decode a WAV artifact; other containers are opaque to this crate
    pub fn from_artifact(artifact: &AudioArtifact) -> Result<Self> {
        if artifact.format().file_extension() != "wav" {
            bail!("Cannot decode {} artifact, only WAV is supported", artifact.format());
        }
        Self::from_wav_bytes(artifact.bytes())
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).context("Failed to parse WAV header")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        debug!(
            "WAV decoded: {:.2}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}
