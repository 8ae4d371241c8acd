//! Bookcast - 电子书转有声书
//!
//! 读取外部提取器生成的书籍清单，逐章合成语音，封装为带章节的 m4b

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::broadcast;

use bookcast::application::{
    AudiobookAssembler, ChapterAudioProducer, ChapterProducerConfig, ConversionOptions,
    ConversionOrchestrator, ProgressObserver, RetryPolicy, RetryingTtsEngine, WorkspaceLayout,
};
use bookcast::config::{load_config, load_config_from_path, print_config, AppConfig};
use bookcast::infrastructure::adapters::{
    build_tts_engine, FfmpegMuxer, FfmpegMuxerConfig, ManifestSource, WavCodec,
};
use bookcast::infrastructure::{ProgressEvent, ProgressPublisher};

fn init_tracing(config: &AppConfig) {
    let log_filter = format!("{},bookcast={}", config.log.level, config.log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// 把进度事件写入日志，直到发布器被释放
async fn log_progress(mut rx: broadcast::Receiver<ProgressEvent>) {
    loop {
        match rx.recv().await {
            Ok(ProgressEvent::Progress {
                step,
                current_chapter,
                total_chapters,
                chapter_title,
                percentage,
                ..
            }) => {
                tracing::info!(
                    step = step.as_str(),
                    chapter = current_chapter,
                    total = total_chapters,
                    title = %chapter_title,
                    "{:.1}%",
                    percentage
                );
            }
            Ok(ProgressEvent::Finished { output, .. }) => {
                tracing::info!(output = %output, "Audiobook ready");
            }
            Ok(ProgressEvent::Failed { stage, error, .. }) => {
                tracing::error!(stage = %stage, "Conversion failed: {}", error);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值），可选参数为配置文件路径
    let config = match std::env::args().nth(1) {
        Some(path) => load_config_from_path(Some(PathBuf::from(path).as_path())),
        None => load_config(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Bookcast - 电子书转有声书");
    print_config(&config);

    let manifest = config
        .book
        .manifest
        .clone()
        .context("book.manifest is required")?;
    let output = config.book.output.clone().context("book.output is required")?;
    let provider = config.tts.resolve_provider()?;

    // 创建 TTS 引擎（带重试）
    let engine = build_tts_engine(&config.tts, provider)?;
    let conversion = &config.conversion;
    let policy = RetryPolicy::new(
        conversion.retry_ceiling,
        Duration::from_millis(conversion.retry_base_delay_ms),
        Duration::from_millis(conversion.retry_max_delay_ms),
    );
    let tts = Arc::new(RetryingTtsEngine::new(engine, policy));

    // 检查 ffmpeg
    let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
        ffmpeg_path: config.audio.ffmpeg_path.clone(),
        bitrate: config.audio.bitrate.clone(),
        filter_chain: config.audio.filter_chain.clone(),
    });
    muxer.check_available().await?;

    let workspace_root = conversion
        .workspace
        .clone()
        .unwrap_or_else(|| WorkspaceLayout::default_root_for(&manifest));
    tracing::info!(workspace = %workspace_root.display(), "Using workspace");

    let producer = ChapterAudioProducer::new(
        tts,
        Arc::new(WavCodec::new()),
        ChapterProducerConfig {
            voice: conversion.voice.clone(),
            max_segment_chars: conversion.max_segment_chars,
            concurrency: conversion.synthesis_concurrency,
            gap_silence_ms: conversion.gap_silence_ms,
            normalization: conversion.text_normalization,
        },
    );

    // 创建进度发布器
    let publisher = ProgressPublisher::new().arc();
    let log_task = tokio::spawn(log_progress(publisher.subscribe()));

    let mut options = ConversionOptions::new(output);
    options.max_chapters = conversion.max_chapters;
    options.keep_workspace = conversion.keep_workspace;

    let observer: Arc<dyn ProgressObserver> = publisher.clone();
    let mut orchestrator = ConversionOrchestrator::new(
        Arc::new(ManifestSource::new(manifest)),
        producer,
        AudiobookAssembler::new(Arc::new(muxer)),
        WorkspaceLayout::new(workspace_root),
        options,
        Some(observer),
    );

    // Ctrl-C 取消转换
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received shutdown signal, cancelling conversion");
            cancel.cancel();
        }
    });

    let result = orchestrator.run().await;
    match &result {
        Ok(path) => publisher.publish_finished(path),
        Err(e) => publisher.publish_failed(e),
    }
    orchestrator.wait_for_cleanup().await;

    // 释放所有发布器引用，日志任务随之结束
    drop(orchestrator);
    drop(publisher);
    if let Err(e) = log_task.await {
        tracing::debug!("Progress log task ended abnormally: {}", e);
    }

    let path = result?;
    println!("{}", path.display());
    Ok(())
}
