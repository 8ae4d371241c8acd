//! 章节音频生产者
//!
//! 一个章节: 规范化 -> 分段 -> 有界并发合成 -> 按 segment_index 拼接。
//! 单个片段失败只降低章节质量（以静音填补）；全部失败时章节失败。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::application::error::ConversionError;
use crate::application::ports::{
    AudioCodecPort, AudioInfo, CodecError, ConcatPiece, TtsEnginePort, TtsError,
};
use crate::application::workspace::WorkspaceLayout;
use crate::domain::audiobook::{
    segment_cache_key, AudioSegment, ChapterAudio, ChapterRecord, TextSegment,
};
use crate::domain::{
    normalize_text, segment_chapter, NormalizationLevel, SegmentConfig, DEFAULT_MAX_SEGMENT_CHARS,
};

/// 生产者配置
#[derive(Debug, Clone)]
pub struct ChapterProducerConfig {
    pub voice: String,
    pub max_segment_chars: usize,
    /// 同时进行的合成调用上限
    pub concurrency: usize,
    /// 失败片段以多长的静音填补
    pub gap_silence_ms: u64,
    pub normalization: NormalizationLevel,
}

impl ChapterProducerConfig {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            concurrency: 2,
            gap_silence_ms: 500,
            normalization: NormalizationLevel::Basic,
        }
    }
}

/// 单个章节的处理结果
#[derive(Debug)]
pub enum ChapterOutcome {
    Produced(ChapterAudio),
    /// 章节没有可朗读的文本
    Skipped,
}

/// 单个片段的失败原因
#[derive(Debug)]
enum SegmentFailure {
    Synthesis(TtsError),
    Codec(CodecError),
    /// 片段文件写入失败，属于资源错误
    Io(std::io::Error),
    Cancelled,
}

impl std::fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentFailure::Synthesis(e) => write!(f, "{}", e),
            SegmentFailure::Codec(e) => write!(f, "{}", e),
            SegmentFailure::Io(e) => write!(f, "IO error: {}", e),
            SegmentFailure::Cancelled => write!(f, "cancelled"),
        }
    }
}

type SegmentResult = Result<AudioSegment, SegmentFailure>;

pub struct ChapterAudioProducer {
    tts: Arc<dyn TtsEnginePort>,
    codec: Arc<dyn AudioCodecPort>,
    config: ChapterProducerConfig,
}

impl ChapterAudioProducer {
    pub fn new(
        tts: Arc<dyn TtsEnginePort>,
        codec: Arc<dyn AudioCodecPort>,
        config: ChapterProducerConfig,
    ) -> Self {
        Self { tts, codec, config }
    }

    pub fn config(&self) -> &ChapterProducerConfig {
        &self.config
    }

    /// 生产一个章节的音频
    ///
    /// `on_segment(done, total)` 在每个片段结束（成功或失败）时同步调用
    pub async fn produce(
        &self,
        chapter: &ChapterRecord,
        workspace: &WorkspaceLayout,
        cancel: &CancellationToken,
        on_segment: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Result<ChapterOutcome, ConversionError> {
        let segments = if chapter.is_blank() {
            Vec::new()
        } else {
            let text = normalize_text(chapter.text(), self.config.normalization);
            segment_chapter(
                chapter.index(),
                &text,
                &SegmentConfig::new(self.config.max_segment_chars),
            )
        };

        if segments.is_empty() {
            tracing::info!(
                chapter = chapter.index(),
                title = chapter.title(),
                "Chapter has no readable text, skipping"
            );
            return Ok(ChapterOutcome::Skipped);
        }

        workspace.prepare_chapter(chapter.index()).await?;

        let total = segments.len();
        tracing::info!(
            chapter = chapter.index(),
            title = chapter.title(),
            segments = total,
            "Synthesizing chapter"
        );

        let slots = self.synthesize_all(segments, workspace, cancel, on_segment).await;

        if cancel.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let mut pieces = Vec::with_capacity(total);
        let mut missing = 0usize;
        let mut last_failure = None;

        for (segment_index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(segment)) => pieces.push(ConcatPiece::Audio(segment.path)),
                Some(Err(SegmentFailure::Io(e))) => {
                    return Err(ConversionError::resource(format!(
                        "Failed to write segment {} of chapter {}: {}",
                        segment_index,
                        chapter.index(),
                        e
                    )));
                }
                other => {
                    let reason = match other {
                        Some(Err(failure)) => failure.to_string(),
                        _ => "synthesis task aborted".to_string(),
                    };
                    tracing::warn!(
                        chapter = chapter.index(),
                        segment = segment_index,
                        reason = %reason,
                        "Segment failed, filling with silence"
                    );
                    missing += 1;
                    last_failure = Some(reason);
                    pieces.push(ConcatPiece::Silence {
                        duration_ms: self.config.gap_silence_ms,
                    });
                }
            }
        }

        if missing == total {
            return Err(ConversionError::chapter_failed(
                chapter.index(),
                format!(
                    "all {} segments failed, last error: {}",
                    total,
                    last_failure.unwrap_or_default()
                ),
            ));
        }

        let output = workspace.chapter_audio_path(chapter.index(), chapter.title());
        let duration_ms = self.concat(pieces, output.clone(), chapter.index()).await?;

        tracing::info!(
            chapter = chapter.index(),
            duration_ms,
            missing_segments = missing,
            path = %output.display(),
            "Chapter audio ready"
        );

        Ok(ChapterOutcome::Produced(ChapterAudio {
            chapter_index: chapter.index(),
            title: chapter.title().to_string(),
            path: output,
            duration_ms,
            missing_segments: missing,
        }))
    }

    /// 并发合成所有片段，结果按 segment_index 放入对应槽位
    async fn synthesize_all(
        &self,
        segments: Vec<TextSegment>,
        workspace: &WorkspaceLayout,
        cancel: &CancellationToken,
        on_segment: &mut (dyn FnMut(usize, usize) + Send),
    ) -> Vec<Option<SegmentResult>> {
        let total = segments.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for segment in segments {
            let cache_key = segment_cache_key(&segment.content, &self.config.voice);
            let path =
                workspace.segment_path(segment.chapter_index, segment.segment_index, &cache_key);
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let tts = self.tts.clone();
            let codec = self.codec.clone();
            let voice = self.config.voice.clone();

            tasks.spawn(async move {
                let segment_index = segment.segment_index;
                let result = Self::synthesize_segment(
                    segment, path, &voice, tts, codec, semaphore, cancel,
                )
                .await;
                (segment_index, result)
            });
        }

        let mut slots: Vec<Option<SegmentResult>> = (0..total).map(|_| None).collect();
        let mut done = 0usize;

        while let Some(joined) = tasks.join_next().await {
            done += 1;
            match joined {
                Ok((segment_index, result)) => slots[segment_index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Segment task panicked"),
            }
            on_segment(done, total);
        }

        slots
    }

    async fn synthesize_segment(
        segment: TextSegment,
        path: PathBuf,
        voice: &str,
        tts: Arc<dyn TtsEnginePort>,
        codec: Arc<dyn AudioCodecPort>,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
    ) -> SegmentResult {
        // 等待许可期间取消则直接退出，不再发起新调用
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SegmentFailure::Cancelled),
            permit = semaphore.acquire_owned() => permit,
        };
        let _permit = permit.map_err(|_| SegmentFailure::Cancelled)?;

        if let Some(cached) = Self::load_cached(&segment, &path, &codec).await {
            return Ok(cached);
        }

        let audio = match tts
            .synthesize_cancellable(&segment.content, voice, &cancel)
            .await
        {
            Ok(audio) => audio,
            Err(TtsError::Cancelled) => return Err(SegmentFailure::Cancelled),
            Err(e) => return Err(SegmentFailure::Synthesis(e)),
        };

        let (info, audio_data) = Self::probe(&codec, audio.audio_data)
            .await
            .map_err(SegmentFailure::Codec)?;

        fs::write(&path, &audio_data)
            .await
            .map_err(SegmentFailure::Io)?;

        tracing::debug!(
            chapter = segment.chapter_index,
            segment = segment.segment_index,
            chars = segment.char_count,
            duration_ms = info.duration_ms,
            "Segment synthesized"
        );

        Ok(AudioSegment {
            chapter_index: segment.chapter_index,
            segment_index: segment.segment_index,
            path,
            duration_ms: info.duration_ms,
        })
    }

    /// 在阻塞线程池中解码探测，返回探测结果和原数据
    async fn probe(
        codec: &Arc<dyn AudioCodecPort>,
        data: Vec<u8>,
    ) -> Result<(AudioInfo, Vec<u8>), CodecError> {
        let codec = codec.clone();
        tokio::task::spawn_blocking(move || codec.probe(&data).map(|info| (info, data)))
            .await
            .map_err(|e| CodecError::Decode(format!("probe task failed: {}", e)))?
    }

    /// 复用上一次运行留在工作目录中的片段
    async fn load_cached(
        segment: &TextSegment,
        path: &Path,
        codec: &Arc<dyn AudioCodecPort>,
    ) -> Option<AudioSegment> {
        let data = fs::read(path).await.ok()?;
        match Self::probe(codec, data).await {
            Ok((info, _)) => {
                tracing::debug!(
                    chapter = segment.chapter_index,
                    segment = segment.segment_index,
                    "Segment cache hit"
                );
                Some(AudioSegment {
                    chapter_index: segment.chapter_index,
                    segment_index: segment.segment_index,
                    path: path.to_path_buf(),
                    duration_ms: info.duration_ms,
                })
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Discarding unreadable cached segment"
                );
                None
            }
        }
    }

    async fn concat(
        &self,
        pieces: Vec<ConcatPiece>,
        output: PathBuf,
        chapter_index: usize,
    ) -> Result<u64, ConversionError> {
        let codec = self.codec.clone();
        let joined = tokio::task::spawn_blocking(move || codec.concat(&pieces, &output)).await;

        match joined {
            Ok(Ok(info)) => Ok(info.duration_ms),
            Ok(Err(CodecError::Io(e))) => Err(ConversionError::resource(format!(
                "Failed to write chapter {} audio: {}",
                chapter_index, e
            ))),
            Ok(Err(e)) => Err(ConversionError::chapter_failed(chapter_index, e.to_string())),
            Err(e) => Err(ConversionError::chapter_failed(
                chapter_index,
                format!("concatenation task failed: {}", e),
            )),
        }
    }
}
