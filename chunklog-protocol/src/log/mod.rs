mod chunk;
mod line;
mod range;

pub use chunk::LogChunkInfo;
pub use line::LogLine;
pub use range::{LineVerdict, TimeRange};
