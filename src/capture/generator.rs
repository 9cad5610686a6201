//! Synthetic frame sources feeding the producer

use bytes::{Bytes, BytesMut};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::debug;

use super::frame::PixelFormat;

/// Yields packed RGB24 pixel buffers of the requested size.
///
/// Called repeatedly from a single producer thread. Generation is assumed
/// to always succeed.
pub trait FrameSource: Send {
    fn generate(&mut self, width: u32, height: u32) -> Bytes;
}

impl<F> FrameSource for F
where
    F: FnMut(u32, u32) -> Bytes + Send,
{
    fn generate(&mut self, width: u32, height: u32) -> Bytes {
        self(width, height)
    }
}

/// Uniform random noise, the worst case for every encoder
pub struct NoiseSource {
    rng: SmallRng,
    scratch: BytesMut,
}

impl NoiseSource {
    /// Seeded sources produce the same frame sequence on every run
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => {
                debug!("Noise source seeded with {}", seed);
                SmallRng::seed_from_u64(seed)
            }
            None => SmallRng::from_entropy(),
        };
        Self {
            rng,
            scratch: BytesMut::new(),
        }
    }
}

impl FrameSource for NoiseSource {
    fn generate(&mut self, width: u32, height: u32) -> Bytes {
        let len = PixelFormat::Rgb24.frame_len(width, height);
        self.scratch.resize(len, 0);
        self.rng.fill_bytes(&mut self.scratch[..]);
        self.scratch.split().freeze()
    }
}

/// Diagonal gradient that shifts by one step per frame.
/// Cheap to generate and compresses well.
#[derive(Default)]
pub struct PatternSource {
    phase: u8,
}

impl PatternSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for PatternSource {
    fn generate(&mut self, width: u32, height: u32) -> Bytes {
        let mut buf = Vec::with_capacity(PixelFormat::Rgb24.frame_len(width, height));
        for y in 0..height {
            for x in 0..width {
                let v = (x as u8).wrapping_add(y as u8).wrapping_add(self.phase);
                buf.extend_from_slice(&[v, v.wrapping_mul(3), 255 - v]);
            }
        }
        self.phase = self.phase.wrapping_add(1);
        Bytes::from(buf)
    }
}
