//! Workspace Layout - 单次转换运行独占的工作目录
//!
//! ```text
//! <root>/
//!   cover.jpg                         可选，提取出的封面
//!   audio_chapters/
//!     chapter_001_<slug>.wav          章节音频
//!   temp_chapter_1/
//!     segment_0000_<key>.wav          片段音频（按内容 + 音色缓存）
//! ```

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::domain::audiobook::{ChapterSlug, CoverImage};

use super::error::ConversionError;

const CHAPTERS_DIR: &str = "audio_chapters";
const SEGMENT_KEY_CHARS: usize = 12;
const ROOT_KEY_CHARS: usize = 12;

/// 工作目录布局
///
/// 作为值传给编排器，由一次运行独占
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 按清单路径推导的默认工作目录
    ///
    /// 同一本书的重复运行落在同一目录，可复用中断前已合成的片段
    pub fn default_root_for(manifest: &Path) -> PathBuf {
        let manifest =
            std::fs::canonicalize(manifest).unwrap_or_else(|_| manifest.to_path_buf());
        let digest = format!("{:x}", md5::compute(manifest.to_string_lossy().as_bytes()));
        std::env::temp_dir().join(format!("bookcast_{}", &digest[..ROOT_KEY_CHARS]))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chapters_dir(&self) -> PathBuf {
        self.root.join(CHAPTERS_DIR)
    }

    pub fn chapter_temp_dir(&self, chapter_index: usize) -> PathBuf {
        self.root.join(format!("temp_chapter_{}", chapter_index))
    }

    pub fn chapter_audio_path(&self, chapter_index: usize, title: &str) -> PathBuf {
        let slug = ChapterSlug::from_title(title);
        self.chapters_dir()
            .join(format!("chapter_{:03}_{}.wav", chapter_index, slug))
    }

    pub fn segment_path(
        &self,
        chapter_index: usize,
        segment_index: usize,
        cache_key: &str,
    ) -> PathBuf {
        let key: String = cache_key.chars().take(SEGMENT_KEY_CHARS).collect();
        self.chapter_temp_dir(chapter_index)
            .join(format!("segment_{:04}_{}.wav", segment_index, key))
    }

    pub fn cover_path(&self, extension: &str) -> PathBuf {
        self.root.join(format!("cover.{}", extension))
    }

    /// 创建根目录和章节目录
    pub async fn prepare(&self) -> Result<(), ConversionError> {
        fs::create_dir_all(self.chapters_dir()).await.map_err(|e| {
            ConversionError::resource(format!(
                "Failed to create workspace {}: {}",
                self.root.display(),
                e
            ))
        })?;

        tracing::debug!(workspace = %self.root.display(), "Workspace prepared");
        Ok(())
    }

    pub async fn prepare_chapter(&self, chapter_index: usize) -> Result<PathBuf, ConversionError> {
        let dir = self.chapter_temp_dir(chapter_index);
        fs::create_dir_all(&dir).await.map_err(|e| {
            ConversionError::resource(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        Ok(dir)
    }

    /// 把封面写到工作目录根部
    pub async fn write_cover(&self, cover: &CoverImage) -> Result<PathBuf, ConversionError> {
        let path = self.cover_path(&cover.extension);
        fs::write(&path, &cover.data).await.map_err(|e| {
            ConversionError::resource(format!("Failed to write cover {}: {}", path.display(), e))
        })?;
        Ok(path)
    }

    /// 路径是否位于工作目录内
    pub fn contains(&self, path: &Path) -> bool {
        let root = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        let target = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
            }
            _ => return false,
        };
        target.starts_with(&root)
    }

    /// 删除整个工作目录
    pub async fn cleanup(&self) -> std::io::Result<()> {
        if fs::try_exists(&self.root).await? {
            fs::remove_dir_all(&self.root).await?;
            tracing::info!(workspace = %self.root.display(), "Workspace removed");
        }
        Ok(())
    }
}
