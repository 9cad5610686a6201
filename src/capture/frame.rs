use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Frame data with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable pixel data - moved through the queue without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: FrameMetadata,
}

/// Frame metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Producer-assigned, starts at 0 and increases by one per generated frame
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }

    /// Buffer length for a tightly packed frame of the given size
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

impl Frame {
    pub fn new(sequence: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            data,
            meta: FrameMetadata {
                sequence,
                width,
                height,
                format: PixelFormat::Rgb24,
            },
        }
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("meta", &self.meta)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_rgb24() {
        assert_eq!(PixelFormat::Rgb24.frame_len(4, 2), 24);
        assert_eq!(PixelFormat::Rgb24.frame_len(1920, 1280), 1920 * 1280 * 3);
    }

    #[test]
    fn test_debug_omits_pixels() {
        let frame = Frame::new(7, 2, 2, Bytes::from(vec![0u8; 12]));
        let dbg = format!("{frame:?}");
        assert!(dbg.contains("sequence: 7"));
        assert!(dbg.contains("len: 12"));
    }
}
