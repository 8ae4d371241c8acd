//! Audio Muxer Port - 最终容器封装
//!
//! 外部封装工具（ffmpeg）的抽象：接收有序的章节音频、章节时间表和书籍元数据，
//! 在调用方指定的路径生成带章节的音频容器。

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audiobook::{BookMetadata, ChapterMark};

/// 封装错误
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("Muxing tool not found: {0}")]
    ToolNotFound(String),

    #[error("Muxing tool failed (status {status}): {stderr}")]
    ProcessFailed { status: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 封装请求
#[derive(Debug, Clone)]
pub struct MuxRequest {
    /// 按 chapter_index 排好序的章节音频文件
    pub inputs: Vec<PathBuf>,
    /// 与 inputs 一一对应的章节标记
    pub chapters: Vec<ChapterMark>,
    pub metadata: BookMetadata,
    /// 已写入工作目录的封面文件
    pub cover: Option<PathBuf>,
    pub output_path: PathBuf,
    /// 存放中间文件（元数据、拼接列表）的目录
    pub work_dir: PathBuf,
}

/// Audio Muxer Port
#[async_trait]
pub trait AudioMuxerPort: Send + Sync {
    /// 执行一次封装，成功时返回容器路径
    async fn mux(&self, request: &MuxRequest) -> Result<PathBuf, MuxError>;
}
