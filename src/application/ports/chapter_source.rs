//! Chapter Source Port - 书籍内容输入边界
//!
//! EPUB 提取由外部协作者完成，这里只约定它交付的内容：
//! 按阅读顺序排列的章节、书名/作者以及可选封面。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audiobook::BookContent;

/// 输入错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Source unreadable: {0}")]
    Unreadable(String),

    #[error("Malformed source: {0}")]
    Malformed(String),
}

/// Chapter Source Port
#[async_trait]
pub trait ChapterSourcePort: Send + Sync {
    /// 读取整本书的内容
    async fn load(&self) -> Result<BookContent, SourceError>;
}
