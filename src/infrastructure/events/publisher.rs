//! Progress Event Publisher
//!
//! 把编排器的进度快照转成可序列化事件，通过 broadcast 通道推送给订阅者

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::ProgressObserver;
use crate::application::ConversionError;
use crate::domain::{ConversionProgress, ConversionStep};

const DEFAULT_CAPACITY: usize = 256;

/// 进度事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ProgressEvent {
    /// 进度更新
    Progress {
        step: ConversionStep,
        current_chapter: usize,
        total_chapters: usize,
        chapter_title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        segments_done: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        segments_total: Option<usize>,
        percentage: f64,
        timestamp: DateTime<Utc>,
    },
    /// 转换成功
    Finished {
        output: String,
        timestamp: DateTime<Utc>,
    },
    /// 转换失败
    Failed {
        stage: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn from_progress(progress: &ConversionProgress) -> Self {
        ProgressEvent::Progress {
            step: progress.current_step,
            current_chapter: progress.current_chapter,
            total_chapters: progress.total_chapters,
            chapter_title: progress.chapter_title.clone(),
            segments_done: progress.segments.map(|(done, _)| done),
            segments_total: progress.segments.map(|(_, total)| total),
            percentage: progress.percentage(),
            timestamp: Utc::now(),
        }
    }
}

/// 进度事件发布器
pub struct ProgressPublisher {
    channel: broadcast::Sender<ProgressEvent>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅进度事件
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.channel.subscribe()
    }

    /// 发布转换成功事件
    pub fn publish_finished(&self, output: &Path) {
        self.publish(ProgressEvent::Finished {
            output: output.display().to_string(),
            timestamp: Utc::now(),
        });
    }

    /// 发布转换失败事件
    pub fn publish_failed(&self, error: &ConversionError) {
        self.publish(ProgressEvent::Failed {
            stage: error.stage().to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: ProgressEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(error = %e, "Failed to publish progress event (no receivers)");
        }
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressPublisher {
    fn on_progress(&self, progress: &ConversionProgress) {
        self.publish(ProgressEvent::from_progress(progress));
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
            chapter_title: format!("第{}章", current),
            segments,
        }
    }

    #[tokio::test]
    async fn test_progress_is_broadcast() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.on_progress(&synthesizing(2, 4, Some((1, 2))));

        match rx.recv().await.unwrap() {
            ProgressEvent::Progress {
                step,
                current_chapter,
                segments_done,
                segments_total,
                percentage,
                ..
            } => {
                assert_eq!(step, ConversionStep::Synthesizing);
                assert_eq!(current_chapter, 2);
                assert_eq!(segments_done, Some(1));
                assert_eq!(segments_total, Some(2));
                assert!((percentage - 35.625).abs() < 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = ProgressPublisher::new();
        publisher.on_progress(&ConversionProgress::new(ConversionStep::Parsing));
        publisher.publish_finished(Path::new("book.m4b"));
    }

    #[tokio::test]
    async fn test_failed_event_carries_stage() {
        let publisher = ProgressPublisher::new();
        let mut rx = publisher.subscribe();

        publisher.publish_failed(&ConversionError::assembly("ffmpeg exited with 1"));

        match rx.recv().await.unwrap() {
            ProgressEvent::Failed { stage, error, .. } => {
                assert_eq!(stage, "assembling");
                assert!(error.contains("ffmpeg exited with 1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = ProgressEvent::from_progress(&ConversionProgress::new(ConversionStep::Parsing));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "Progress");
        assert_eq!(json["data"]["step"], "parsing");
        assert_eq!(json["data"]["percentage"], 0.0);
        assert!(json["data"].get("segments_done").is_none());
    }
}
