//! Minimal WAV container writer.
//!
//! Recorded audio travels as 16-bit little-endian PCM wrapped in a plain
//! RIFF/WAVE header. Both the simulated microphone and the cpal backend
//! finalize through here so the wire shape is identical in tests and on
//! hardware.

use std::time::Duration;

const HEADER_LEN: usize = 44;

/// Wraps raw little-endian PCM16 bytes in a WAV container.
pub fn encode_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * u32::from(channels) * 2;
    let block_align = channels * 2;

    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Duration of a raw PCM16 payload.
pub fn pcm16_duration(data_len: usize, sample_rate: u32, channels: u16) -> Duration {
    if sample_rate == 0 || channels == 0 {
        return Duration::ZERO;
    }
    let frames = data_len as u64 / (u64::from(channels) * 2);
    Duration::from_secs_f64(frames as f64 / f64::from(sample_rate))
}
