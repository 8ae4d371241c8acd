//! Audiobook Context - 有声书转换限界上下文
//!
//! 职责:
//! - 章节记录（来自外部 EPUB 提取器）
//! - 文本片段 / 音频片段 / 章节音频实体
//! - 章节时间轴（章节标记）

mod entities;
mod value_objects;

pub use entities::{
    AudioSegment, BookContent, BookMetadata, ChapterAudio, ChapterMark, ChapterRecord,
    CoverImage, TextSegment,
};
pub use value_objects::{segment_cache_key, ChapterSlug};
