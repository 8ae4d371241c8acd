//! Manifest Source - 从 JSON 清单读取书籍内容
//!
//! 清单由外部 EPUB 提取器生成：
//!
//! ```json
//! {
//!   "title": "书名",
//!   "author": "作者",
//!   "cover": "cover.jpg",
//!   "chapters": [
//!     { "title": "第一章", "text": "正文……" },
//!     { "title": "第二章", "file": "chapters/002.txt" }
//!   ]
//! }
//! ```
//!
//! 相对路径以清单所在目录为基准

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{ChapterSourcePort, SourceError};
use crate::domain::audiobook::{BookContent, BookMetadata, ChapterRecord, CoverImage};

const DEFAULT_COVER_EXTENSION: &str = "jpg";

#[derive(Debug, Deserialize)]
struct Manifest {
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    cover: Option<PathBuf>,
    chapters: Vec<ManifestChapter>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestChapter {
    Inline { title: String, text: String },
    File { title: String, file: PathBuf },
}

fn read_error(path: &Path, e: std::io::Error) -> SourceError {
    if e.kind() == std::io::ErrorKind::NotFound {
        SourceError::NotFound(path.display().to_string())
    } else {
        SourceError::Unreadable(format!("{}: {}", path.display(), e))
    }
}

/// JSON 清单输入
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            return relative.to_path_buf();
        }
        match self.path.parent() {
            Some(dir) => dir.join(relative),
            None => relative.to_path_buf(),
        }
    }

    async fn read_cover(&self, cover: &Path) -> Result<CoverImage, SourceError> {
        let path = self.resolve(cover);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| read_error(&path, e))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| DEFAULT_COVER_EXTENSION.to_string());
        Ok(CoverImage { data, extension })
    }
}

#[async_trait]
impl ChapterSourcePort for ManifestSource {
    async fn load(&self) -> Result<BookContent, SourceError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| read_error(&self.path, e))?;

        let manifest: Manifest = serde_json::from_slice(&raw).map_err(|e| {
            SourceError::Malformed(format!("{}: {}", self.path.display(), e))
        })?;

        let mut chapters = Vec::with_capacity(manifest.chapters.len());
        for (position, chapter) in manifest.chapters.into_iter().enumerate() {
            let index = position + 1;
            let record = match chapter {
                ManifestChapter::Inline { title, text } => ChapterRecord::new(index, title, text),
                ManifestChapter::File { title, file } => {
                    let path = self.resolve(&file);
                    let text = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(|e| read_error(&path, e))?;
                    ChapterRecord::new(index, title, text)
                }
            };
            chapters.push(record);
        }

        let cover = match &manifest.cover {
            Some(cover) => Some(self.read_cover(cover).await?),
            None => None,
        };

        tracing::info!(
            manifest = %self.path.display(),
            title = %manifest.title,
            chapters = chapters.len(),
            has_cover = cover.is_some(),
            "Book manifest loaded"
        );

        Ok(BookContent {
            metadata: BookMetadata::new(manifest.title, manifest.author),
            cover,
            chapters,
        })
    }
}
