//! Audio Adapters - 片段探测与章节拼接

mod wav_codec;

pub use wav_codec::WavCodec;
