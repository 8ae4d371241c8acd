//! FFmpeg Muxer - 调用外部 ffmpeg 生成带章节的 m4b
//!
//! 一次 ffmpeg 调用完成：
//! - concat demuxer 按序拼接章节 WAV
//! - FFMETADATA 文件写入书名、作者和章节时间表
//! - 可选封面作为 attached_pic
//! - AAC 编码，可选滤镜链

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::application::ports::{AudioMuxerPort, MuxError, MuxRequest};
use crate::domain::audiobook::{BookMetadata, ChapterMark};

const METADATA_FILE: &str = "ffmetadata.txt";
const CONCAT_LIST_FILE: &str = "concat_list.txt";
const STDERR_TAIL_CHARS: usize = 2000;

/// FFmpeg 封装配置
#[derive(Debug, Clone)]
pub struct FfmpegMuxerConfig {
    /// ffmpeg 可执行文件
    pub ffmpeg_path: String,
    /// AAC 比特率，如 `64k`
    pub bitrate: String,
    /// 可选滤镜链，原样传给 `-af`
    pub filter_chain: Option<String>,
}

impl Default for FfmpegMuxerConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            bitrate: "64k".to_string(),
            filter_chain: None,
        }
    }
}

/// FFMETADATA 值中的特殊字符需要反斜杠转义
fn escape_metadata(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '=' | ';' | '#' | '\\' | '\n' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            '\r' => {}
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// 生成 FFMETADATA1 文本
pub fn build_ffmetadata(metadata: &BookMetadata, chapters: &[ChapterMark]) -> String {
    let mut text = String::from(";FFMETADATA1\n");
    text.push_str(&format!("title={}\n", escape_metadata(&metadata.title)));
    text.push_str(&format!("artist={}\n", escape_metadata(&metadata.author)));
    text.push_str(&format!("album={}\n", escape_metadata(&metadata.title)));
    text.push_str("genre=Audiobook\n");

    for chapter in chapters {
        text.push_str("\n[CHAPTER]\nTIMEBASE=1/1000\n");
        text.push_str(&format!("START={}\n", chapter.start_ms));
        text.push_str(&format!("END={}\n", chapter.end_ms));
        text.push_str(&format!("title={}\n", escape_metadata(&chapter.title)));
    }

    text
}

/// 生成 concat demuxer 列表，单引号按 `'\''` 转义
pub fn build_concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| {
            let quoted = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", quoted)
        })
        .collect()
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    output.with_file_name(name)
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let chars: Vec<char> = text.trim_end().chars().collect();
    let start = chars.len().saturating_sub(STDERR_TAIL_CHARS);
    chars[start..].iter().collect()
}

pub struct FfmpegMuxer {
    config: FfmpegMuxerConfig,
}

impl FfmpegMuxer {
    pub fn new(config: FfmpegMuxerConfig) -> Self {
        Self { config }
    }

    fn map_spawn_error(&self, e: std::io::Error) -> MuxError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MuxError::ToolNotFound(self.config.ffmpeg_path.clone())
        } else {
            MuxError::Io(e)
        }
    }

    /// 启动前检查 ffmpeg 是否可用
    pub async fn check_available(&self) -> Result<(), MuxError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            return Err(MuxError::ProcessFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(
            version = %version.lines().next().unwrap_or_default(),
            "ffmpeg available"
        );
        Ok(())
    }

    /// 组装 ffmpeg 参数
    fn build_args(
        &self,
        concat_list: &Path,
        metadata_file: &Path,
        cover: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            concat_list.to_string_lossy().into_owned(),
            "-i".into(),
            metadata_file.to_string_lossy().into_owned(),
        ];

        if let Some(cover) = cover {
            args.push("-i".into());
            args.push(cover.to_string_lossy().into_owned());
        }

        args.extend(["-map".into(), "0:a".into()]);
        if cover.is_some() {
            args.extend([
                "-map".into(),
                "2:v".into(),
                "-c:v".into(),
                "copy".into(),
                "-disposition:v:0".into(),
                "attached_pic".into(),
            ]);
        }

        args.extend([
            "-map_metadata".into(),
            "1".into(),
            "-map_chapters".into(),
            "1".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            self.config.bitrate.clone(),
        ]);

        if let Some(filter) = &self.config.filter_chain {
            args.push("-af".into());
            args.push(filter.clone());
        }

        args.extend([
            "-f".into(),
            "mp4".into(),
            output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

#[async_trait]
impl AudioMuxerPort for FfmpegMuxer {
    async fn mux(&self, request: &MuxRequest) -> Result<PathBuf, MuxError> {
        tokio::fs::create_dir_all(&request.work_dir).await?;
        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let metadata_file = request.work_dir.join(METADATA_FILE);
        tokio::fs::write(
            &metadata_file,
            build_ffmetadata(&request.metadata, &request.chapters),
        )
        .await?;

        let concat_list = request.work_dir.join(CONCAT_LIST_FILE);
        tokio::fs::write(&concat_list, build_concat_list(&request.inputs)).await?;

        let partial = part_path(&request.output_path);
        let args = self.build_args(
            &concat_list,
            &metadata_file,
            request.cover.as_deref(),
            &partial,
        );

        tracing::info!(
            chapters = request.chapters.len(),
            output = %request.output_path.display(),
            "Running ffmpeg"
        );
        tracing::debug!(args = ?args, "ffmpeg arguments");

        let output = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            if let Err(e) = tokio::fs::remove_file(&partial).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %partial.display(),
                        "Failed to remove partial output: {}",
                        e
                    );
                }
            }
            return Err(MuxError::ProcessFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        tokio::fs::rename(&partial, &request.output_path).await?;
        tracing::info!(output = %request.output_path.display(), "ffmpeg finished");

        Ok(request.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks() -> Vec<ChapterMark> {
        vec![
            ChapterMark {
                title: "第一章 开端".to_string(),
                start_ms: 0,
                end_ms: 1200,
            },
            ChapterMark {
                title: "A=B; #2".to_string(),
                start_ms: 1200,
                end_ms: 2000,
            },
        ]
    }

    fn request(dir: &Path) -> MuxRequest {
        MuxRequest {
            inputs: vec![dir.join("chapter_001.wav"), dir.join("chapter_002.wav")],
            chapters: marks(),
            metadata: BookMetadata::new("测试之书", "佚名"),
            cover: None,
            output_path: dir.join("out").join("book.m4b"),
            work_dir: dir.join("work"),
        }
    }

    #[test]
    fn test_ffmetadata() {
        let text = build_ffmetadata(&BookMetadata::new("书", "作者"), &marks());
        assert!(text.starts_with(";FFMETADATA1\n"));
        assert!(text.contains("title=书\nartist=作者\n"));
        assert_eq!(text.matches("[CHAPTER]").count(), 2);
        assert!(text.contains("TIMEBASE=1/1000\nSTART=1200\nEND=2000\ntitle=A\\=B\\; \\#2\n"));
    }

    #[test]
    fn test_concat_list_quotes() {
        let list =
            build_concat_list(&[PathBuf::from("/tmp/a.wav"), PathBuf::from("/tmp/it's.wav")]);
        assert_eq!(list, "file '/tmp/a.wav'\nfile '/tmp/it'\\''s.wav'\n");
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/data/book.m4b")),
            PathBuf::from("/data/book.m4b.part")
        );
    }

    #[test]
    fn test_args_with_cover_and_filter() {
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
            filter_chain: Some("loudnorm".to_string()),
            ..Default::default()
        });
        let args = muxer.build_args(
            Path::new("list.txt"),
            Path::new("meta.txt"),
            Some(Path::new("cover.jpg")),
            Path::new("book.m4b.part"),
        );

        let joined = args.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i list.txt -i meta.txt -i cover.jpg"));
        assert!(joined.contains("-map 2:v -c:v copy -disposition:v:0 attached_pic"));
        assert!(joined.contains("-map_metadata 1 -map_chapters 1 -c:a aac -b:a 64k"));
        assert!(joined.contains("-af loudnorm"));
        assert_eq!(args.last().unwrap(), "book.m4b.part");
    }

    #[test]
    fn test_args_without_cover() {
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig::default());
        let args = muxer.build_args(Path::new("l"), Path::new("m"), None, Path::new("o"));
        assert!(!args.iter().any(|a| a == "attached_pic"));
        assert!(!args.iter().any(|a| a == "-af"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
            ffmpeg_path: "/nonexistent/ffmpeg-bookcast".to_string(),
            ..Default::default()
        });

        assert!(matches!(muxer.check_available().await, Err(MuxError::ToolNotFound(_))));
        let err = muxer.mux(&request(dir.path())).await.unwrap_err();
        assert!(matches!(err, MuxError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_process_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let muxer = FfmpegMuxer::new(FfmpegMuxerConfig {
            ffmpeg_path: "false".to_string(),
            ..Default::default()
        });
        let req = request(dir.path());

        let err = muxer.mux(&req).await.unwrap_err();
        assert!(matches!(err, MuxError::ProcessFailed { .. }));
        assert!(!req.output_path.exists());
        assert!(!part_path(&req.output_path).exists());

        // 中间文件已写入工作目录
        let metadata = std::fs::read_to_string(req.work_dir.join(METADATA_FILE)).unwrap();
        assert!(metadata.contains("title=测试之书"));
        assert!(req.work_dir.join(CONCAT_LIST_FILE).exists());
    }
}
