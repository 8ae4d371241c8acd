//! Domain Layer - 领域层
//!
//! - Audiobook Context: 章节、片段、章节音频、章节标记
//! - 进度快照
//! - 文本分割器与文本规范化（纯函数，无 IO）

pub mod audiobook;
pub mod progress;

mod text_normalizer;
mod text_segmenter;

pub use progress::{ConversionProgress, ConversionStep};
pub use text_normalizer::{normalize_text, number_to_zh, NormalizationLevel};
pub use text_segmenter::{segment_chapter, segment_text, SegmentConfig, DEFAULT_MAX_SEGMENT_CHARS};
