//! 应用层错误定义
//!
//! 一次转换运行的终止错误：每个变体标明失败的阶段和原因

use thiserror::Error;

use super::ports::{MuxError, SourceError};

/// 转换错误
#[derive(Debug, Error)]
pub enum ConversionError {
    /// 输入不可读或为空
    #[error("Input error: {0}")]
    Input(String),

    /// 章节的全部片段都合成失败
    #[error("Chapter {index} failed: {reason}")]
    ChapterFailed { index: usize, reason: String },

    /// 封装失败或没有可封装的章节
    #[error("Assembly failed: {0}")]
    Assembly(String),

    /// 工作目录不可写、磁盘耗尽等
    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Conversion cancelled")]
    Cancelled,

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ConversionError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    pub fn chapter_failed(index: usize, reason: impl Into<String>) -> Self {
        Self::ChapterFailed {
            index,
            reason: reason.into(),
        }
    }

    pub fn assembly(message: impl Into<String>) -> Self {
        Self::Assembly(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Self::Resource(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 失败阶段名称
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Input(_) => "parsing",
            Self::ChapterFailed { .. } => "synthesizing",
            Self::Assembly(_) => "assembling",
            Self::Resource(_) => "workspace",
            Self::Cancelled => "cancelled",
            Self::InvalidState(_) => "orchestration",
        }
    }

    /// 是否只影响单个章节（运行可以继续）
    pub fn is_chapter_local(&self) -> bool {
        matches!(self, Self::ChapterFailed { .. })
    }
}

impl From<SourceError> for ConversionError {
    fn from(err: SourceError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<MuxError> for ConversionError {
    fn from(err: MuxError) -> Self {
        Self::Assembly(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(ConversionError::input("empty").stage(), "parsing");
        assert_eq!(ConversionError::chapter_failed(2, "all failed").stage(), "synthesizing");
        assert_eq!(ConversionError::assembly("no chapters").stage(), "assembling");
        assert_eq!(ConversionError::resource("disk full").stage(), "workspace");
        assert_eq!(ConversionError::Cancelled.stage(), "cancelled");
    }

    #[test]
    fn test_conversions() {
        let err: ConversionError = SourceError::NotFound("book.json".into()).into();
        assert!(matches!(err, ConversionError::Input(_)));

        let err: ConversionError = MuxError::ToolNotFound("ffmpeg".into()).into();
        assert!(matches!(err, ConversionError::Assembly(_)));
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn test_chapter_local() {
        assert!(ConversionError::chapter_failed(1, "x").is_chapter_local());
        assert!(!ConversionError::Cancelled.is_chapter_local());
    }
}
