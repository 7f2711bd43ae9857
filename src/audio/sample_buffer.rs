//! Chunk accumulator for a single capture window
//!
//! Chunks are kept as delivered by the device and only concatenated once, when
//! the capture ends. This avoids repeatedly growing one large vector while the
//! audio callback is running.
//!
//! # Memory Budget
//!
//! At 48kHz mono f32 with 4096-sample chunks:
//! - Chunk size: 4096 samples × 4 bytes = 16 KB
//! - 7 seconds: ~83 chunks = ~1.3 MB (plus the same again during merge)

/// A chunk of captured samples with its arrival position
#[derive(Debug, Clone)]
pub struct SampleChunk {
    /// Mono f32 samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Arrival order within the session (monotonically increasing)
    pub sequence: u64,
}

/// Accumulates sample chunks in arrival order.
///
/// Single use: [`SampleBuffer::merge`] consumes the buffer.
///
/// Thread-safety: This struct is NOT internally synchronized. It is meant to
/// have exactly one consumer draining the device channel.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    chunks: Vec<SampleChunk>,
    next_sequence: u64,
    total_samples: usize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Returns the sequence number assigned to it.
    pub fn push(&mut self, samples: Vec<f32>) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.total_samples += samples.len();

        self.chunks.push(SampleChunk { samples, sequence });
        sequence
    }

    /// Number of chunks pushed so far
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of all pushed chunk lengths
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    /// Buffered audio duration in milliseconds at the given rate
    pub fn duration_ms(&self, sample_rate: u32) -> u64 {
        if sample_rate == 0 {
            return 0;
        }
        (self.total_samples as u64 * 1000) / sample_rate as u64
    }

    /// Concatenate every chunk, in push order, into one contiguous sequence.
    pub fn merge(self) -> Vec<f32> {
        let mut merged = Vec::with_capacity(self.total_samples);
        for chunk in self.chunks {
            merged.extend_from_slice(&chunk.samples);
        }
        merged
    }
}
