//! 转换编排器
//!
//! 状态机: Idle -> Parsing -> SynthesizingChapters -> Assembling -> Done，
//! 任何阶段的致命错误进入 Failed。章节按阅读顺序依次处理，
//! 并发只存在于单个章节内部的片段合成。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::error::ConversionError;
use crate::application::ports::{ChapterSourcePort, ProgressObserver};
use crate::application::workspace::WorkspaceLayout;
use crate::domain::ConversionProgress;

use super::assembler::AudiobookAssembler;
use super::chapter_producer::{ChapterAudioProducer, ChapterOutcome};
use super::progress_tracker::ProgressTracker;

/// 编排器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Parsing,
    SynthesizingChapters,
    Assembling,
    Done,
    Failed,
}

/// 运行选项
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    pub output_path: PathBuf,
    /// 只处理阅读顺序的前 N 章
    pub max_chapters: Option<usize>,
    /// 成功后保留工作目录
    pub keep_workspace: bool,
}

impl ConversionOptions {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            max_chapters: None,
            keep_workspace: false,
        }
    }
}

pub struct ConversionOrchestrator {
    source: Arc<dyn ChapterSourcePort>,
    producer: ChapterAudioProducer,
    assembler: AudiobookAssembler,
    workspace: WorkspaceLayout,
    options: ConversionOptions,
    tracker: ProgressTracker,
    cancel: CancellationToken,
    state: OrchestratorState,
    cleanup_task: Option<JoinHandle<()>>,
}

impl ConversionOrchestrator {
    pub fn new(
        source: Arc<dyn ChapterSourcePort>,
        producer: ChapterAudioProducer,
        assembler: AudiobookAssembler,
        workspace: WorkspaceLayout,
        options: ConversionOptions,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Self {
        Self {
            source,
            producer,
            assembler,
            workspace,
            options,
            tracker: ProgressTracker::new(observer),
            cancel: CancellationToken::new(),
            state: OrchestratorState::Idle,
            cleanup_task: None,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn progress(&self) -> ConversionProgress {
        self.tracker.snapshot()
    }

    /// 运行级取消信号
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn transition(&mut self, next: OrchestratorState) {
        tracing::debug!(from = ?self.state, to = ?next, "Orchestrator transition");
        self.state = next;
    }

    /// 执行一次完整转换，成功时返回容器路径
    ///
    /// 每个编排器只能运行一次。工作目录的删除在后台进行，
    /// 进程退出前用 `wait_for_cleanup` 等待它结束
    pub async fn run(&mut self) -> Result<PathBuf, ConversionError> {
        if self.state != OrchestratorState::Idle {
            return Err(ConversionError::invalid_state(format!(
                "orchestrator already used (state {:?})",
                self.state
            )));
        }

        match self.execute().await {
            Ok(path) => {
                self.transition(OrchestratorState::Done);
                self.spawn_cleanup(&path);
                Ok(path)
            }
            Err(e) => {
                self.transition(OrchestratorState::Failed);
                tracing::error!(
                    stage = e.stage(),
                    error = %e,
                    workspace = %self.workspace.root().display(),
                    "Conversion failed, workspace left in place"
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<PathBuf, ConversionError> {
        self.transition(OrchestratorState::Parsing);
        self.tracker.parsing();

        let book = self.source.load().await?;
        if book.chapters.is_empty() {
            return Err(ConversionError::input("book contains no chapters"));
        }

        tracing::info!(
            title = %book.metadata.title,
            author = %book.metadata.author,
            chapters = book.chapters.len(),
            "Book loaded"
        );

        self.workspace.prepare().await?;
        let cover = match &book.cover {
            Some(cover) => Some(self.workspace.write_cover(cover).await?),
            None => None,
        };

        self.transition(OrchestratorState::SynthesizingChapters);

        let limit = self
            .options
            .max_chapters
            .unwrap_or(book.chapters.len())
            .min(book.chapters.len());
        if limit < book.chapters.len() {
            tracing::info!(
                max_chapters = limit,
                available = book.chapters.len(),
                "Truncating chapters"
            );
        }
        let chapters = &book.chapters[..limit];
        let total = chapters.len();

        let mut produced = Vec::with_capacity(total);
        for (position, chapter) in chapters.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ConversionError::Cancelled);
            }

            self.tracker.start_chapter(position + 1, total, chapter.title());

            let tracker = &mut self.tracker;
            let mut on_segment =
                |done: usize, segments: usize| tracker.segment_done(done, segments);
            let outcome = self
                .producer
                .produce(chapter, &self.workspace, &self.cancel, &mut on_segment)
                .await;

            match outcome {
                Ok(ChapterOutcome::Produced(audio)) => produced.push(audio),
                Ok(ChapterOutcome::Skipped) => {}
                Err(e) if e.is_chapter_local() => {
                    tracing::warn!(
                        chapter = chapter.index(),
                        title = chapter.title(),
                        error = %e,
                        "Chapter excluded from audiobook"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        self.transition(OrchestratorState::Assembling);
        self.tracker.assembling();

        let path = self
            .assembler
            .assemble(
                &produced,
                &book.metadata,
                cover,
                &self.options.output_path,
                self.workspace.root(),
            )
            .await?;

        self.tracker.completed();
        Ok(path)
    }

    /// 成功后在后台删除工作目录，失败只记录日志
    fn spawn_cleanup(&mut self, output: &Path) {
        if self.options.keep_workspace {
            tracing::info!(workspace = %self.workspace.root().display(), "Keeping workspace");
            return;
        }
        if self.workspace.contains(output) {
            tracing::warn!(
                output = %output.display(),
                "Output lies inside the workspace, skipping cleanup"
            );
            return;
        }

        let workspace = self.workspace.clone();
        self.cleanup_task = Some(tokio::spawn(async move {
            if let Err(e) = workspace.cleanup().await {
                tracing::warn!(
                    workspace = %workspace.root().display(),
                    error = %e,
                    "Failed to remove workspace"
                );
            }
        }));
    }

    /// 等待后台清理结束；没有清理任务时立即返回
    pub async fn wait_for_cleanup(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Workspace cleanup task failed");
            }
        }
    }
}
