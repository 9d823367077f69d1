//! Ring buffer for concurrent rendering and device playback
//!
//! A ring buffer (circular buffer) lets two threads run concurrently:
//! - Producer thread: a playback session writing rendered frames
//! - Consumer thread: an audio device callback reading them
//!
//! Memory is fixed at `capacity * size_of::<i16>()` regardless of duration.
//! Positions are monotonic counters; `pos & mask` gives the slot.

use super::sink::FrameSink;
use super::{StreamConfig, BUFFER_BACKOFF_MICROS};
use crate::{ModMixError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ring buffer of interleaved 16-bit samples
///
/// # Thread Safety
/// - One producer thread, one consumer thread
/// - Slot storage behind a `parking_lot::Mutex`, positions in atomics
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Mutex<Vec<i16>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    closed: AtomicBool,
    capacity: usize,
    mask: usize,
}

impl RingBuffer {
    /// Largest accepted capacity (64 MB of samples)
    const MAX_CAPACITY: usize = 64 * 1024 * 1024 / std::mem::size_of::<i16>();

    /// Create a ring buffer; capacity is rounded up to a power of two
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(ModMixError::InvalidArgument(
                "ring buffer capacity must be greater than 0".to_string(),
            ));
        }
        let capacity = requested_capacity.next_power_of_two();
        if capacity > Self::MAX_CAPACITY {
            return Err(ModMixError::InvalidArgument(format!(
                "ring buffer capacity {capacity} exceeds maximum {}",
                Self::MAX_CAPACITY
            )));
        }

        Ok(RingBuffer {
            buffer: Mutex::new(vec![0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples ready to read
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Free slots
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Write as many samples as fit; returns the count written
    pub fn write(&self, samples: &[i16]) -> usize {
        let mut buf = self.buffer.lock();
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let to_write = samples.len().min(self.available_write());
        if to_write == 0 {
            return 0;
        }

        let start = write_pos & self.mask;
        let first = to_write.min(self.capacity - start);
        buf[start..start + first].copy_from_slice(&samples[..first]);
        buf[..to_write - first].copy_from_slice(&samples[first..to_write]);
        drop(buf);

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Read up to `dest.len()` samples; returns the count read
    pub fn read(&self, dest: &mut [i16]) -> usize {
        let buf = self.buffer.lock();
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let to_read = dest.len().min(self.available_read());
        if to_read == 0 {
            return 0;
        }

        let start = read_pos & self.mask;
        let first = to_read.min(self.capacity - start);
        dest[..first].copy_from_slice(&buf[start..start + first]);
        dest[first..to_read].copy_from_slice(&buf[..to_read - first]);
        drop(buf);

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discard all pending samples
    pub fn flush(&self) {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }

    /// Mark the consumer as gone; blocked writers fail instead of waiting
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether the consumer has gone away
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fill level, 0.0 to 1.0
    pub fn fill_percentage(&self) -> f32 {
        (self.available_read() as f32) / (self.capacity as f32)
    }
}

/// Blocking producer side of a [`RingBuffer`]
#[derive(Debug, Clone)]
pub struct RingBufferSink {
    buffer: Arc<RingBuffer>,
    config: StreamConfig,
}

impl RingBufferSink {
    /// Create a sink with a fresh buffer sized by `config`
    pub fn new(config: StreamConfig) -> Result<Self> {
        Ok(RingBufferSink {
            buffer: Arc::new(RingBuffer::new(config.ring_buffer_size)?),
            config,
        })
    }

    /// Shared buffer for the consumer thread
    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Buffer latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.config.latency_ms()
    }
}

impl FrameSink for RingBufferSink {
    /// Blocks while the buffer is full, until everything is written or the
    /// consumer closes the buffer
    fn write_frames(&mut self, samples: &[i16]) -> Result<()> {
        let mut remaining = samples;
        while !remaining.is_empty() {
            if self.buffer.is_closed() {
                return Err(ModMixError::Playback(
                    "ring buffer consumer closed".to_string(),
                ));
            }
            let written = self.buffer.write(remaining);
            if written == 0 {
                std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
            } else {
                remaining = &remaining[written..];
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_power_of_two() {
        let rb = RingBuffer::new(1000).unwrap();
        assert_eq!(rb.capacity(), 1024);
        assert!(RingBuffer::new(0).is_err());
    }

    #[test]
    fn test_write_and_read() {
        let rb = RingBuffer::new(16).unwrap();
        assert_eq!(rb.write(&[1, 2, 3, 4]), 4);
        assert_eq!(rb.available_read(), 4);

        let mut dest = [0i16; 4];
        assert_eq!(rb.read(&mut dest), 4);
        assert_eq!(dest, [1, 2, 3, 4]);
        assert_eq!(rb.available_read(), 0);
    }

    #[test]
    fn test_ring_buffer_wrap() {
        let rb = RingBuffer::new(16).unwrap();
        assert_eq!(rb.write(&[1; 10]), 10);
        let mut dest = [0i16; 8];
        assert_eq!(rb.read(&mut dest), 8);

        let data: Vec<i16> = (0..12).collect();
        assert_eq!(rb.write(&data), 12);
        assert_eq!(rb.available_read(), 14);

        let mut dest = [0i16; 14];
        assert_eq!(rb.read(&mut dest), 14);
        assert_eq!(&dest[..2], &[1, 1]);
        assert_eq!(&dest[2..], &data[..]);
    }

    #[test]
    fn test_full_buffer() {
        let rb = RingBuffer::new(8).unwrap();
        assert_eq!(rb.write(&[5; 12]), 8);
        assert_eq!(rb.available_write(), 0);
        assert_eq!(rb.write(&[1]), 0);
        rb.flush();
        assert_eq!(rb.available_write(), 8);
    }

    #[test]
    fn test_sink_with_consumer_thread() {
        let mut sink = RingBufferSink::new(StreamConfig {
            ring_buffer_size: 16,
            sample_rate: 8000,
            channels: 2,
        })
        .unwrap();
        let buffer = sink.buffer();

        let consumer = std::thread::spawn(move || {
            let mut received = Vec::new();
            let mut chunk = [0i16; 8];
            while received.len() < 100 {
                let n = buffer.read(&mut chunk);
                received.extend_from_slice(&chunk[..n]);
                if n == 0 {
                    std::thread::yield_now();
                }
            }
            received
        });

        let data: Vec<i16> = (0..100).collect();
        sink.write_frames(&data).unwrap();
        assert_eq!(consumer.join().unwrap(), data);
    }

    #[test]
    fn test_closed_buffer_fails_writer() {
        let mut sink = RingBufferSink::new(StreamConfig {
            ring_buffer_size: 4,
            sample_rate: 8000,
            channels: 2,
        })
        .unwrap();
        sink.buffer().close();
        assert!(matches!(
            sink.write_frames(&[0; 16]),
            Err(ModMixError::Playback(_))
        ));
    }
}
