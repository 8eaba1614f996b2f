use anyhow::{Context, Result};
use std::io::Cursor;

/// Convert one float sample to 16-bit PCM, clamping to [-1, 1] first
pub fn float_to_pcm16(sample: f32) -> i16 {
    let clamped = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    (clamped * i16::MAX as f32) as i16
}

/// Encode mono float samples as a canonical 16-bit PCM little-endian WAV.
///
/// No samples yields an empty buffer rather than a header-only file, so the
/// caller's empty-artifact check still sees the capture as silent.
pub fn encode_pcm16_mono(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;

        for &sample in samples {
            writer
                .write_sample(float_to_pcm16(sample))
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}
