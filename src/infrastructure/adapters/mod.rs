//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod audio;
pub mod muxer;
pub mod source;
pub mod tts;

pub use audio::*;
pub use muxer::*;
pub use source::*;
pub use tts::*;
