//! 转换进度

use serde::{Deserialize, Serialize};

/// 合成阶段在总进度中所占的百分比，剩余部分归属封装阶段
const SYNTHESIS_SHARE: f64 = 95.0;

/// 转换步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStep {
    /// 读取书籍内容
    Parsing,
    /// 合成章节音频
    Synthesizing,
    /// 封装最终容器
    Assembling,
    /// 已完成
    Completed,
}

impl ConversionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStep::Parsing => "parsing",
            ConversionStep::Synthesizing => "synthesizing",
            ConversionStep::Assembling => "assembling",
            ConversionStep::Completed => "completed",
        }
    }
}

/// 转换进度快照
///
/// 只由编排器修改，以不可变快照的形式交给外部回调
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProgress {
    /// 当前章节序号（从 1 开始，0 表示尚未开始）
    pub current_chapter: usize,
    pub total_chapters: usize,
    pub current_step: ConversionStep,
    pub chapter_title: String,
    /// 当前章节内 (已完成片段, 总片段)
    pub segments: Option<(usize, usize)>,
}

impl ConversionProgress {
    pub fn new(step: ConversionStep) -> Self {
        Self {
            current_chapter: 0,
            total_chapters: 0,
            current_step: step,
            chapter_title: String::new(),
            segments: None,
        }
    }

    /// 总体进度百分比 (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        match self.current_step {
            ConversionStep::Parsing => 0.0,
            ConversionStep::Synthesizing => {
                if self.total_chapters == 0 {
                    return 0.0;
                }
                let segment_fraction = match self.segments {
                    Some((done, total)) if total > 0 => done.min(total) as f64 / total as f64,
                    _ => 0.0,
                };
                let finished = self.current_chapter.saturating_sub(1) as f64 + segment_fraction;
                (finished / self.total_chapters as f64 * SYNTHESIS_SHARE).min(SYNTHESIS_SHARE)
            }
            ConversionStep::Assembling => SYNTHESIS_SHARE,
            ConversionStep::Completed => 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizing(
        current: usize,
        total: usize,
        segments: Option<(usize, usize)>,
    ) -> ConversionProgress {
        ConversionProgress {
            current_chapter: current,
            total_chapters: total,
            current_step: ConversionStep::Synthesizing,
            chapter_title: String::new(),
            segments,
        }
    }

    #[test]
    fn test_percentage_by_step() {
        assert_eq!(ConversionProgress::new(ConversionStep::Parsing).percentage(), 0.0);
        assert_eq!(ConversionProgress::new(ConversionStep::Assembling).percentage(), 95.0);
        assert_eq!(ConversionProgress::new(ConversionStep::Completed).percentage(), 100.0);
    }

    #[test]
    fn test_percentage_during_synthesis() {
        assert_eq!(synthesizing(1, 4, None).percentage(), 0.0);
        assert_eq!(synthesizing(3, 4, None).percentage(), 47.5);
        assert_eq!(synthesizing(1, 2, Some((5, 10))).percentage(), 23.75);
        assert_eq!(synthesizing(2, 2, Some((10, 10))).percentage(), 95.0);
    }

    #[test]
    fn test_percentage_zero_chapters() {
        assert_eq!(synthesizing(0, 0, None).percentage(), 0.0);
    }

    #[test]
    fn test_progress_serializes_step_snake_case() {
        let json = serde_json::to_string(&synthesizing(1, 1, None)).unwrap();
        assert!(json.contains("\"current_step\":\"synthesizing\""));
    }
}
