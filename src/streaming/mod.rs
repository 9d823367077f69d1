//! Output Sink Domain
//!
//! The engine hands interleaved 16-bit stereo frames to a [`FrameSink`].
//! Sinks here cover the common consumers: an in-memory buffer, a
//! little-endian byte stream, a counting null sink, and a bounded ring
//! buffer for a device callback running on another thread.

pub mod ring_buffer;
pub mod sink;

pub use ring_buffer::{RingBuffer, RingBufferSink};
pub use sink::{BufferSink, ByteSink, FrameSink, NullSink};

pub use crate::replayer::DEFAULT_SAMPLE_RATE;

/// Interleaved output channels (left, right)
pub const OUTPUT_CHANNELS: u16 = 2;

/// Buffer backoff time in microseconds
pub const BUFFER_BACKOFF_MICROS: u64 = 100;

/// Configuration for ring-buffer streaming
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Size of the ring buffer (in interleaved samples)
    /// Larger buffers = more latency but less chance of underrun
    pub ring_buffer_size: usize,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channels: u16,
}

impl StreamConfig {
    /// Create a streaming configuration optimized for low latency
    /// Buffer = 8192 samples ≈ 93ms of stereo @ 44.1kHz
    pub fn low_latency(sample_rate: u32) -> Self {
        StreamConfig {
            ring_buffer_size: 8192,
            sample_rate,
            channels: OUTPUT_CHANNELS,
        }
    }

    /// Create a streaming configuration optimized for stability
    /// Buffer = 32768 samples ≈ 372ms of stereo @ 44.1kHz
    pub fn stable(sample_rate: u32) -> Self {
        StreamConfig {
            ring_buffer_size: 32768,
            sample_rate,
            channels: OUTPUT_CHANNELS,
        }
    }

    /// Get latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        let frames = self.ring_buffer_size as f32 / f32::from(self.channels.max(1));
        frames / (self.sample_rate as f32) * 1000.0
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::stable(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_latency() {
        let latency = StreamConfig::low_latency(44100).latency_ms();
        assert!(latency > 90.0 && latency < 95.0);
        assert!(StreamConfig::default().latency_ms() > 300.0);
    }

    #[test]
    fn test_default_rate_matches_renderer() {
        assert_eq!(StreamConfig::default().sample_rate, crate::replayer::DEFAULT_SAMPLE_RATE);
        assert_eq!(StreamConfig::default().sample_rate, 44_100);
    }
}
