//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_codec;
mod audio_muxer;
mod chapter_source;
mod progress_observer;
mod tts_engine;

pub use audio_codec::{AudioCodecPort, AudioInfo, CodecError, ConcatPiece};
pub use audio_muxer::{AudioMuxerPort, MuxError, MuxRequest};
pub use chapter_source::{ChapterSourcePort, SourceError};
pub use progress_observer::ProgressObserver;
pub use tts_engine::{FailureClass, SynthesizedAudio, TtsEnginePort, TtsError};
