//! 转换流水线
//!
//! - retry: TTS 重试包装层
//! - chapter_producer: 章节音频生产
//! - assembler: 最终容器封装
//! - progress_tracker: 进度快照与回调
//! - orchestrator: 顶层状态机

mod assembler;
mod chapter_producer;
mod orchestrator;
mod progress_tracker;
mod retry;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::AudiobookAssembler;
pub use chapter_producer::{ChapterAudioProducer, ChapterOutcome, ChapterProducerConfig};
pub use orchestrator::{ConversionOptions, ConversionOrchestrator, OrchestratorState};
pub use progress_tracker::ProgressTracker;
pub use retry::{RetryPolicy, RetryingTtsEngine, DEFAULT_RETRY_CEILING};
