//! 有声书封装
//!
//! 把存活下来的章节音频按 chapter_index 排序，计算累计时间轴，
//! 调用一次封装工具。失败不重试。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::error::ConversionError;
use crate::application::ports::{AudioMuxerPort, MuxRequest};
use crate::domain::audiobook::{BookMetadata, ChapterAudio, ChapterMark};

pub struct AudiobookAssembler {
    muxer: Arc<dyn AudioMuxerPort>,
}

impl AudiobookAssembler {
    pub fn new(muxer: Arc<dyn AudioMuxerPort>) -> Self {
        Self { muxer }
    }

    pub async fn assemble(
        &self,
        chapters: &[ChapterAudio],
        metadata: &BookMetadata,
        cover: Option<PathBuf>,
        output_path: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, ConversionError> {
        if chapters.is_empty() {
            return Err(ConversionError::assembly(
                "no chapter audio survived production, nothing to assemble",
            ));
        }

        let mut ordered = chapters.to_vec();
        ordered.sort_by_key(|chapter| chapter.chapter_index);

        let marks = ChapterMark::timeline(&ordered);
        let total_ms = marks.last().map(|mark| mark.end_ms).unwrap_or(0);

        tracing::info!(
            chapters = ordered.len(),
            total_ms,
            output = %output_path.display(),
            "Assembling audiobook"
        );

        let request = MuxRequest {
            inputs: ordered.iter().map(|chapter| chapter.path.clone()).collect(),
            chapters: marks,
            metadata: metadata.clone(),
            cover,
            output_path: output_path.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
        };

        let path = self.muxer.mux(&request).await?;
        tracing::info!(path = %path.display(), "Audiobook written");
        Ok(path)
    }
}
