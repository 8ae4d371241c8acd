//! Progress Observer Port - 进度回调

use crate::domain::ConversionProgress;

/// 进度观察者
///
/// 在每个步骤/片段/章节边界被同步调用，不保证运行在独立线程上，
/// 实现方不应在回调中阻塞。
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &ConversionProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ConversionProgress) + Send + Sync,
{
    fn on_progress(&self, progress: &ConversionProgress) {
        self(progress)
    }
}
