//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TtsEngine、AudioCodec、AudioMuxer、ChapterSource 等）
//! - pipeline: 转换流水线（重试、章节生产、封装、编排）
//! - workspace: 工作目录布局
//! - error: 应用层错误定义

pub mod error;
pub mod pipeline;
pub mod ports;
pub mod workspace;

pub use error::ConversionError;

pub use pipeline::{
    AudiobookAssembler, ChapterAudioProducer, ChapterOutcome, ChapterProducerConfig,
    ConversionOptions, ConversionOrchestrator, OrchestratorState, ProgressTracker, RetryPolicy,
    RetryingTtsEngine,
};

pub use ports::{
    AudioCodecPort, AudioInfo, AudioMuxerPort, ChapterSourcePort, CodecError, ConcatPiece,
    MuxError, MuxRequest, ProgressObserver, SourceError, SynthesizedAudio, TtsEnginePort, TtsError,
};

pub use workspace::WorkspaceLayout;
