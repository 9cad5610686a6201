pub mod frame;
pub mod generator;

pub use frame::Frame;
pub use frame::PixelFormat;
pub use generator::{FrameSource, NoiseSource, PatternSource};
