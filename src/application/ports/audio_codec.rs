//! Audio Codec Port - 片段音频探测与章节拼接

use std::path::{Path, PathBuf};

use thiserror::Error;

/// 编解码错误
#[derive(Debug, Error)]
pub enum CodecError {
    /// 读写文件失败（工作目录不可写、磁盘已满等）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoding error: {0}")]
    Decode(String),

    /// 同一章节内的片段采样率或声道数不一致
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),
}

/// 音频基本信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// 拼接输入项
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcatPiece {
    /// 已合成的片段文件
    Audio(PathBuf),
    /// 失败片段的占位静音
    Silence { duration_ms: u64 },
}

/// Audio Codec Port
///
/// 同步接口：调用方负责放到阻塞线程池中执行
pub trait AudioCodecPort: Send + Sync {
    /// 解析音频数据，返回时长与格式
    fn probe(&self, data: &[u8]) -> Result<AudioInfo, CodecError>;

    /// 按顺序拼接片段并写入 output
    ///
    /// 输出格式取第一个音频片段的格式；全部为静音时返回 Decode 错误
    fn concat(&self, pieces: &[ConcatPiece], output: &Path) -> Result<AudioInfo, CodecError>;
}
