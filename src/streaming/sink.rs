//! Frame sinks
//!
//! Every sink accepts interleaved stereo `i16` samples (`[l0, r0, l1, r1, ...]`).

use crate::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Consumer of rendered frames
pub trait FrameSink {
    /// Accept interleaved stereo samples
    fn write_frames(&mut self, samples: &[i16]) -> Result<()>;

    /// Push any buffered output downstream
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        (**self).write_frames(samples)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        (**self).write_frames(samples)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Shared sink, so a caller can inspect what a playback thread wrote
impl<S: FrameSink> FrameSink for Arc<Mutex<S>> {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        self.lock().write_frames(samples)
    }

    fn flush(&mut self) -> Result<()> {
        self.lock().flush()
    }
}

/// Collects everything in memory
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    samples: Vec<i16>,
}

impl BufferSink {
    /// Create an empty buffer sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Interleaved samples written so far
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Stereo frames written so far
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Take the collected samples
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl FrameSink for BufferSink {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }
}

/// Writes 16-bit little-endian PCM to any `Write`
#[derive(Debug)]
pub struct ByteSink<W: Write> {
    writer: W,
}

impl<W: Write> ByteSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        ByteSink { writer }
    }

    /// Get the inner writer back
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for ByteSink<W> {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        for &sample in samples {
            self.writer.write_i16::<LittleEndian>(sample)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards frames, counting them
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink {
    frames: u64,
}

impl NullSink {
    /// Create a null sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Stereo frames discarded so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for NullSink {
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        self.frames += (samples.len() / 2) as u64;
        Ok(())
    }
}
