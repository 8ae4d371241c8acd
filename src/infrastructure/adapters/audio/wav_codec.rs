//! WAV Codec - 基于 symphonia 解码、hound 写出的片段拼接器
//!
//! 所有片段统一解码为交错的 f32 样本，输出为 16 位 PCM WAV

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioCodecPort, AudioInfo, CodecError, ConcatPiece};

const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// 解码后的 PCM 数据
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

impl DecodedAudio {
    fn duration_ms(&self) -> u64 {
        frames_to_ms(self.samples.len() as u64 / self.channels.max(1) as u64, self.sample_rate)
    }
}

fn frames_to_ms(frames: u64, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    frames * 1000 / sample_rate as u64
}

fn map_hound_error(e: hound::Error) -> CodecError {
    match e {
        hound::Error::IoError(io) => CodecError::Io(io),
        other => CodecError::Decode(format!("WAV write failed: {}", other)),
    }
}

/// WAV 编解码器
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

impl WavCodec {
    pub fn new() -> Self {
        Self
    }

    /// 使用 symphonia 解码为交错 PCM
    fn decode(&self, data: &[u8]) -> Result<DecodedAudio, CodecError> {
        if data.is_empty() {
            return Err(CodecError::Decode("Empty audio data".to_string()));
        }

        let cursor = Cursor::new(data.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| CodecError::Decode(format!("Probe failed: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| CodecError::Decode("No audio track found".to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| CodecError::Decode("Unknown sample rate".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| CodecError::Decode("Unknown channel count".to_string()))?;

        let bits_per_sample = track
            .codec_params
            .bits_per_sample
            .map(|b| b as u16)
            .unwrap_or(OUTPUT_BITS_PER_SAMPLE);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| CodecError::Decode(format!("Decoder creation failed: {}", e)))?;

        let track_id = track.id;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(CodecError::Decode(format!("Packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Decode error (skipping packet): {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            let num_frames = decoded.frames();
            let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let actual_samples = num_frames * spec.channels.count();
            samples.extend(&sample_buf.samples()[..actual_samples]);
        }

        Ok(DecodedAudio {
            samples,
            sample_rate,
            channels,
            bits_per_sample,
        })
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioCodecPort for WavCodec {
    fn probe(&self, data: &[u8]) -> Result<AudioInfo, CodecError> {
        let decoded = self.decode(data)?;
        Ok(AudioInfo {
            duration_ms: decoded.duration_ms(),
            sample_rate: decoded.sample_rate,
            channels: decoded.channels,
            bits_per_sample: decoded.bits_per_sample,
        })
    }

    fn concat(&self, pieces: &[ConcatPiece], output: &Path) -> Result<AudioInfo, CodecError> {
        // 先解码全部片段，确定输出格式后再写文件
        let mut decoded: Vec<Option<DecodedAudio>> = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                ConcatPiece::Audio(path) => {
                    let data = std::fs::read(path)?;
                    let audio = self.decode(&data).map_err(|e| match e {
                        CodecError::Decode(msg) => {
                            CodecError::Decode(format!("{}: {}", path.display(), msg))
                        }
                        other => other,
                    })?;
                    decoded.push(Some(audio));
                }
                ConcatPiece::Silence { .. } => decoded.push(None),
            }
        }

        let (sample_rate, channels) = decoded
            .iter()
            .flatten()
            .next()
            .map(|a| (a.sample_rate, a.channels))
            .ok_or_else(|| CodecError::Decode("No audio pieces to concatenate".to_string()))?;

        for audio in decoded.iter().flatten() {
            if audio.sample_rate != sample_rate || audio.channels != channels {
                return Err(CodecError::FormatMismatch(format!(
                    "expected {}Hz/{}ch, got {}Hz/{}ch",
                    sample_rate, channels, audio.sample_rate, audio.channels
                )));
            }
        }

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
            sample_format: hound::SampleFormat::Int,
        };

        let file = BufWriter::new(File::create(output)?);
        let mut writer = hound::WavWriter::new(file, spec).map_err(map_hound_error)?;
        let mut frames: u64 = 0;

        for (piece, audio) in pieces.iter().zip(&decoded) {
            match (piece, audio) {
                (_, Some(audio)) => {
                    for &sample in &audio.samples {
                        writer.write_sample(to_i16(sample)).map_err(map_hound_error)?;
                    }
                    frames += audio.samples.len() as u64 / channels as u64;
                }
                (ConcatPiece::Silence { duration_ms }, None) => {
                    let silent_frames = sample_rate as u64 * duration_ms / 1000;
                    for _ in 0..silent_frames * channels as u64 {
                        writer.write_sample(0i16).map_err(map_hound_error)?;
                    }
                    frames += silent_frames;
                }
                (ConcatPiece::Audio(_), None) => {}
            }
        }

        writer.finalize().map_err(map_hound_error)?;

        let info = AudioInfo {
            duration_ms: frames_to_ms(frames, sample_rate),
            sample_rate,
            channels,
            bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        };

        tracing::debug!(
            pieces = pieces.len(),
            duration_ms = info.duration_ms,
            output = %output.display(),
            "Concatenated chapter audio"
        );

        Ok(info)
    }
}
