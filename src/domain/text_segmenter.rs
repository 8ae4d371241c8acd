//! 文本分割器
//!
//! 将任意长度的章节文本切分为长度受限、以句子为边界的片段。
//!
//! 分割策略：
//! 1. 按句末标点和换行切分为句子单元（单元是原文的连续切片）
//! 2. 只含引号的单元并入前一个单元
//! 3. 贪心合并相邻单元，直到再加一个单元就会超过 max_chars
//! 4. 单个超长句子保持完整，成为一个超长片段（绝不在句中截断）

use std::ops::Range;

use super::audiobook::TextSegment;

/// 默认最大片段字符数
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 500;

/// 文本分割配置
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// 单个片段的最大字符数（Unicode 标量值计数）
    pub max_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_SEGMENT_CHARS,
        }
    }
}

impl SegmentConfig {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

/// 检查是否为句末标点
#[inline]
fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '。' | '？' | '！' | '.' | '?' | '!' | '…')
}

/// 检查是否为紧跟句末标点的闭合符号（归属于前一个句子）
#[inline]
fn is_closing_mark(ch: char) -> bool {
    matches!(
        ch,
        '"' | '\'' | '\u{201D}' | '\u{2019}' | '」' | '』' | '）' | ')' | '】' | ']' | '》'
    )
}

/// 检查单元是否只包含引号或空白（应该被合并）
#[inline]
fn is_trivial_unit(s: &str) -> bool {
    // 中文引号: " (\u{201C}) " (\u{201D})  中文单引号: ' (\u{2018}) ' (\u{2019})
    s.chars().all(|c| {
        matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\'' | '\u{2018}' | '\u{2019}')
            || c.is_whitespace()
    })
}

/// 去掉首尾空白后的字节区间，空区间返回 None
fn trimmed_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let trimmed_start = slice.trim_start();
    if trimmed_start.is_empty() {
        return None;
    }
    let start = range.start + (slice.len() - trimmed_start.len());
    let end = start + trimmed_start.trim_end().len();
    Some(start..end)
}

fn push_unit(text: &str, range: Range<usize>, units: &mut Vec<Range<usize>>) {
    let Some(range) = trimmed_range(text, range) else {
        return;
    };

    if is_trivial_unit(&text[range.clone()]) {
        if let Some(last) = units.last_mut() {
            last.end = range.end;
            return;
        }
    }
    units.push(range);
}

/// 切分句子单元，返回原文中的字节区间（有序、互不重叠）
fn split_units(text: &str) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        if ch == '\n' {
            push_unit(text, start..pos, &mut units);
            start = pos + ch.len_utf8();
            continue;
        }

        if !is_sentence_terminator(ch) {
            continue;
        }

        // 3.14 / example.com 中的 ASCII 标点不是句子边界
        if ch.is_ascii() {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_alphanumeric() {
                    continue;
                }
            }
        }

        let mut end = pos + ch.len_utf8();
        while let Some(&(next_pos, next)) = chars.peek() {
            if is_sentence_terminator(next) || is_closing_mark(next) {
                end = next_pos + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        push_unit(text, start..end, &mut units);
        start = end;
    }

    push_unit(text, start..text.len(), &mut units);
    units
}

/// 贪心合并句子单元
fn pack_units(text: &str, units: Vec<Range<usize>>, max_chars: usize) -> Vec<Range<usize>> {
    let mut packed: Vec<Range<usize>> = Vec::new();
    let mut current: Option<Range<usize>> = None;

    for unit in units {
        current = match current.take() {
            None => Some(unit),
            Some(cur) => {
                let merged = cur.start..unit.end;
                if text[merged.clone()].chars().count() <= max_chars {
                    Some(merged)
                } else {
                    packed.push(cur);
                    Some(unit)
                }
            }
        };
    }

    if let Some(cur) = current {
        packed.push(cur);
    }
    packed
}

/// 对文本进行分段
///
/// 空文本或只含空白的文本返回空列表，调用方应将其视为"跳过该章节"。
pub fn segment_text(text: &str, config: &SegmentConfig) -> Vec<String> {
    let units = split_units(text);
    pack_units(text, units, config.max_chars)
        .into_iter()
        .map(|range| text[range].to_string())
        .collect()
}

/// 对章节文本分段，生成带序号的 TextSegment
pub fn segment_chapter(
    chapter_index: usize,
    text: &str,
    config: &SegmentConfig,
) -> Vec<TextSegment> {
    segment_text(text, config)
        .into_iter()
        .enumerate()
        .map(|(segment_index, content)| TextSegment::new(chapter_index, segment_index, content))
        .collect()
}
