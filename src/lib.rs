//! Bookcast - 电子书转有声书
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Audiobook: 章节、片段、章节标记等实体
//! - 文本规范化与分段
//! - 转换进度
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TtsEngine, AudioCodec, AudioMuxer, ChapterSource, ProgressObserver）
//! - Pipeline: 重试、章节生产、进度跟踪、封装、编排
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: TTS 服务商客户端、WAV 编解码、ffmpeg 封装、清单输入
//! - Events: 进度事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
