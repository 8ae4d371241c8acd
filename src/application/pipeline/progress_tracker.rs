//! 进度跟踪器
//!
//! 单写者：只有编排器持有 `&mut ProgressTracker`。每次更新后同步调用观察者，
//! 因此回调之间不会并发。

use std::sync::Arc;

use crate::application::ports::ProgressObserver;
use crate::domain::{ConversionProgress, ConversionStep};

pub struct ProgressTracker {
    current: ConversionProgress,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ProgressTracker {
    pub fn new(observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            current: ConversionProgress::new(ConversionStep::Parsing),
            observer,
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> ConversionProgress {
        self.current.clone()
    }

    fn publish(&self) {
        tracing::debug!(
            step = self.current.current_step.as_str(),
            chapter = self.current.current_chapter,
            total = self.current.total_chapters,
            percentage = self.current.percentage(),
            "Progress updated"
        );
        if let Some(observer) = &self.observer {
            observer.on_progress(&self.current);
        }
    }

    pub fn parsing(&mut self) {
        self.current = ConversionProgress::new(ConversionStep::Parsing);
        self.publish();
    }

    /// 开始处理第 position 个章节（从 1 开始，按本次运行实际处理的章节计数）
    pub fn start_chapter(&mut self, position: usize, total: usize, title: &str) {
        self.current = ConversionProgress {
            current_chapter: position,
            total_chapters: total,
            current_step: ConversionStep::Synthesizing,
            chapter_title: title.to_string(),
            segments: None,
        };
        self.publish();
    }

    pub fn segment_done(&mut self, done: usize, total: usize) {
        self.current.segments = Some((done, total));
        self.publish();
    }

    pub fn assembling(&mut self) {
        self.current.current_step = ConversionStep::Assembling;
        self.current.segments = None;
        self.publish();
    }

    pub fn completed(&mut self) {
        self.current.current_step = ConversionStep::Completed;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_observer_receives_every_update() {
        let seen: Arc<Mutex<Vec<ConversionProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: Arc<dyn ProgressObserver> = Arc::new(move |p: &ConversionProgress| {
            sink.lock().unwrap().push(p.clone());
        });

        let mut tracker = ProgressTracker::new(Some(observer));
        tracker.parsing();
        tracker.start_chapter(1, 2, "序章");
        tracker.segment_done(1, 2);
        tracker.segment_done(2, 2);
        tracker.start_chapter(2, 2, "第一章");
        tracker.assembling();
        tracker.completed();

        let seen = seen.lock().unwrap();
        let steps: Vec<_> = seen.iter().map(|p| p.current_step).collect();
        assert_eq!(
            steps,
            vec![
                ConversionStep::Parsing,
                ConversionStep::Synthesizing,
                ConversionStep::Synthesizing,
                ConversionStep::Synthesizing,
                ConversionStep::Synthesizing,
                ConversionStep::Assembling,
                ConversionStep::Completed,
            ]
        );
        assert_eq!(seen[2].segments, Some((1, 2)));
        assert_eq!(seen[4].chapter_title, "第一章");
        assert_eq!(seen[4].segments, None);

        // 百分比单调不减
        let percentages: Vec<f64> = seen.iter().map(|p| p.percentage()).collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_without_observer() {
        let mut tracker = ProgressTracker::new(None);
        tracker.start_chapter(1, 1, "only");
        tracker.completed();
        assert_eq!(tracker.snapshot().current_step, ConversionStep::Completed);
        assert_eq!(tracker.snapshot().percentage(), 100.0);
    }
}
