//! Audiobook Context - Value Objects

use serde::{Deserialize, Serialize};

/// 文件名 slug 的最大字符数
const MAX_SLUG_CHARS: usize = 50;

/// 章节标题的文件名安全形式
///
/// 不变量:
/// - 不包含路径分隔符、保留字符、控制字符或空白
/// - 非空（空标题回退为 `untitled`）
/// - 最多 50 个字符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterSlug(String);

impl ChapterSlug {
    pub fn from_title(title: &str) -> Self {
        let slug: String = title
            .trim()
            .chars()
            .map(|ch| {
                if matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
                    || ch.is_control()
                    || ch.is_whitespace()
                {
                    '_'
                } else {
                    ch
                }
            })
            .take(MAX_SLUG_CHARS)
            .collect();

        let slug = slug.trim_matches(|c| c == '_' || c == '.').to_string();
        if slug.is_empty() {
            Self("untitled".to_string())
        } else {
            Self(slug)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChapterSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 生成片段缓存 key
///
/// 相同文本 + 相同音色 => 相同 key，用于在同一工作目录中复用已合成的片段
pub fn segment_cache_key(content: &str, voice: &str) -> String {
    let mut context = md5::Context::new();
    context.consume(content.as_bytes());
    context.consume([0u8]);
    context.consume(voice.as_bytes());
    format!("{:x}", context.compute())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_replaces_reserved_chars() {
        let slug = ChapterSlug::from_title("第一章: 开始/结束?");
        assert_eq!(slug.as_str(), "第一章__开始_结束");
    }

    #[test]
    fn test_slug_truncates_long_titles() {
        let title = "长".repeat(80);
        let slug = ChapterSlug::from_title(&title);
        assert_eq!(slug.as_str().chars().count(), 50);
    }

    #[test]
    fn test_slug_empty_title() {
        assert_eq!(ChapterSlug::from_title("   ").as_str(), "untitled");
        assert_eq!(ChapterSlug::from_title("???").as_str(), "untitled");
    }

    #[test]
    fn test_cache_key_depends_on_voice() {
        let a = segment_cache_key("你好。", "zh-CN-XiaoxiaoNeural");
        let b = segment_cache_key("你好。", "zh-CN-YunxiNeural");
        assert_ne!(a, b);
        assert_eq!(a, segment_cache_key("你好。", "zh-CN-XiaoxiaoNeural"));
        assert_eq!(a.len(), 32);
    }
}
