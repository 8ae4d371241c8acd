//! 流水线测试用的内存端口实现

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{
    AudioCodecPort, AudioInfo, AudioMuxerPort, ChapterSourcePort, CodecError, ConcatPiece,
    MuxError, MuxRequest, SourceError, SynthesizedAudio, TtsEnginePort, TtsError,
};
use crate::domain::audiobook::{BookContent, BookMetadata, ChapterRecord};

/// 音频数据就是文本本身，便于断言拼接顺序
pub struct MockTts {
    pub calls: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    texts: Mutex<Vec<String>>,
    delay: Option<(u64, u64)>,
    failure: Option<(String, fn() -> TtsError)>,
    timeouts_left: AtomicUsize,
}

impl MockTts {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            delay: None,
            failure: None,
            timeouts_left: AtomicUsize::new(0),
        }
    }

    /// 前 n 次调用以超时失败
    pub fn timing_out_first(self, n: usize) -> Self {
        self.timeouts_left.store(n, Ordering::SeqCst);
        self
    }

    /// 每段文本得到一个由 seed 决定的伪随机延迟
    pub fn with_random_delay(mut self, seed: u64, max_ms: u64) -> Self {
        self.delay = Some((seed, max_ms.max(1)));
        self
    }

    /// 文本包含 pattern 时失败
    pub fn failing_on(mut self, pattern: &str, make: fn() -> TtsError) -> Self {
        self.failure = Some((pattern.to_string(), make));
        self
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn delay_for(&self, text: &str) -> Option<Duration> {
        let (seed, max_ms) = self.delay?;
        let hash = text.bytes().fold(0xcbf2_9ce4_8422_2325_u64 ^ seed, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x0100_0000_01b3)
        });
        Some(Duration::from_millis(hash % max_ms))
    }
}

#[async_trait]
impl TtsEnginePort for MockTts {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<SynthesizedAudio, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay_for(text) {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let timed_out = self
            .timeouts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if timed_out {
            return Err(TtsError::Timeout);
        }

        if let Some((pattern, make)) = &self.failure {
            if text.contains(pattern.as_str()) {
                return Err(make());
            }
        }

        Ok(SynthesizedAudio {
            audio_data: text.as_bytes().to_vec(),
            duration_ms: None,
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

pub fn silence_marker(duration_ms: u64) -> String {
    format!("<silence {}>", duration_ms)
}

/// 每个字符 100ms；拼接就是把文本首尾相连
pub struct MockCodec;

impl MockCodec {
    pub fn duration_of(text: &str) -> u64 {
        text.chars().count() as u64 * 100
    }

    fn info(duration_ms: u64) -> AudioInfo {
        AudioInfo {
            duration_ms,
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl AudioCodecPort for MockCodec {
    fn probe(&self, data: &[u8]) -> Result<AudioInfo, CodecError> {
        if data.is_empty() {
            return Err(CodecError::Decode("empty audio".to_string()));
        }
        Ok(Self::info(Self::duration_of(&String::from_utf8_lossy(data))))
    }

    fn concat(&self, pieces: &[ConcatPiece], output: &Path) -> Result<AudioInfo, CodecError> {
        if !pieces.iter().any(|p| matches!(p, ConcatPiece::Audio(_))) {
            return Err(CodecError::Decode("no audio pieces".to_string()));
        }

        let mut joined = String::new();
        let mut duration_ms = 0;
        for piece in pieces {
            match piece {
                ConcatPiece::Audio(path) => {
                    let text = std::fs::read_to_string(path)?;
                    duration_ms += Self::duration_of(&text);
                    joined.push_str(&text);
                }
                ConcatPiece::Silence { duration_ms: ms } => {
                    duration_ms += ms;
                    joined.push_str(&silence_marker(*ms));
                }
            }
        }

        std::fs::write(output, joined)?;
        Ok(Self::info(duration_ms))
    }
}

/// 记录每次封装请求
pub struct RecordingMuxer {
    pub requests: Mutex<Vec<MuxRequest>>,
    failure: Option<String>,
}

impl RecordingMuxer {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(stderr.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<MuxRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AudioMuxerPort for RecordingMuxer {
    async fn mux(&self, request: &MuxRequest) -> Result<PathBuf, MuxError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(stderr) = &self.failure {
            return Err(MuxError::ProcessFailed {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            });
        }

        std::fs::write(&request.output_path, b"container")?;
        Ok(request.output_path.clone())
    }
}

pub struct StaticSource {
    content: Option<BookContent>,
}

impl StaticSource {
    pub fn new(content: BookContent) -> Self {
        Self {
            content: Some(content),
        }
    }

    pub fn missing() -> Self {
        Self { content: None }
    }
}

#[async_trait]
impl ChapterSourcePort for StaticSource {
    async fn load(&self) -> Result<BookContent, SourceError> {
        self.content
            .clone()
            .ok_or_else(|| SourceError::NotFound("book.epub".to_string()))
    }
}

/// 构造测试书籍，章节序号从 1 开始
pub fn book(chapters: &[(&str, &str)]) -> BookContent {
    BookContent {
        metadata: BookMetadata::new("测试之书", "佚名"),
        cover: None,
        chapters: chapters
            .iter()
            .enumerate()
            .map(|(i, (title, text))| ChapterRecord::new(i + 1, *title, *text))
            .collect(),
    }
}
