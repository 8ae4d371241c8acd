//! Audiobook Context - Entities

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 章节记录 - 由外部 EPUB 提取器提供
///
/// 不变量:
/// - index 为阅读顺序序号（从 1 开始），整个转换过程中保持顺序
/// - 创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    index: usize,
    title: String,
    text: String,
}

impl ChapterRecord {
    pub fn new(index: usize, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            index,
            title: title.into(),
            text: text.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// 章节是否没有可朗读的内容
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// 书籍元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

impl BookMetadata {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }
}

/// 封面图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    /// 文件扩展名（不含点），如 `jpg`、`png`
    pub extension: String,
}

/// 外部提取器交付的完整书籍内容
#[derive(Debug, Clone)]
pub struct BookContent {
    pub metadata: BookMetadata,
    pub cover: Option<CoverImage>,
    /// 按阅读顺序排列
    pub chapters: Vec<ChapterRecord>,
}

/// 文本片段 - 单次语音合成调用的文本单位
///
/// 不变量:
/// - content 非空
/// - char_count == content 的字符数
/// - char_count <= max_segment_chars，除非该片段只包含一个超长句子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub chapter_index: usize,
    pub segment_index: usize,
    pub content: String,
    pub char_count: usize,
}

impl TextSegment {
    pub fn new(chapter_index: usize, segment_index: usize, content: String) -> Self {
        let char_count = content.chars().count();
        Self {
            chapter_index,
            segment_index,
            content,
            char_count,
        }
    }
}

/// 音频片段 - 一个 TextSegment 成功合成后的产物
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    pub chapter_index: usize,
    pub segment_index: usize,
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// 章节音频 - 按 segment_index 顺序拼接后的单个音频文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterAudio {
    pub chapter_index: usize,
    pub title: String,
    pub path: PathBuf,
    pub duration_ms: u64,
    /// 以静音填补的失败片段数量
    pub missing_segments: usize,
}

/// 章节标记 - 最终容器中的一条章节导航
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMark {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ChapterMark {
    /// 根据章节时长计算累计时间轴
    ///
    /// 第 i 章的起点 = 第 0..i-1 章时长之和
    pub fn timeline(chapters: &[ChapterAudio]) -> Vec<ChapterMark> {
        let mut start_ms = 0u64;
        chapters
            .iter()
            .map(|chapter| {
                let end_ms = start_ms + chapter.duration_ms;
                let mark = ChapterMark {
                    title: chapter.title.clone(),
                    start_ms,
                    end_ms,
                };
                start_ms = end_ms;
                mark
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter_audio(index: usize, duration_ms: u64) -> ChapterAudio {
        ChapterAudio {
            chapter_index: index,
            title: format!("第{}章", index),
            path: PathBuf::from(format!("chapter_{:03}.wav", index)),
            duration_ms,
            missing_segments: 0,
        }
    }

    #[test]
    fn test_timeline_is_cumulative() {
        let chapters = vec![
            chapter_audio(1, 1_500),
            chapter_audio(2, 2_000),
            chapter_audio(3, 750),
        ];

        let marks = ChapterMark::timeline(&chapters);
        let starts: Vec<u64> = marks.iter().map(|m| m.start_ms).collect();
        assert_eq!(starts, vec![0, 1_500, 3_500]);
        assert_eq!(marks[2].end_ms, 4_250);
        assert_eq!(marks[1].title, "第2章");
    }

    #[test]
    fn test_timeline_empty() {
        assert!(ChapterMark::timeline(&[]).is_empty());
    }

    #[test]
    fn test_text_segment_counts_chars_not_bytes() {
        let segment = TextSegment::new(1, 0, "你好。".to_string());
        assert_eq!(segment.char_count, 3);
    }

    #[test]
    fn test_blank_chapter() {
        assert!(ChapterRecord::new(1, "空", " \n\t ").is_blank());
        assert!(!ChapterRecord::new(1, "正文", "内容").is_blank());
    }
}
