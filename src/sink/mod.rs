pub mod writer;

pub use writer::{FrameSink, ImageFileSink, MemorySink, OutputFormat, OutputId};
