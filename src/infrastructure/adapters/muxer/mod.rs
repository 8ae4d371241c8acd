//! Muxer Adapters - 最终容器封装

mod ffmpeg_muxer;

pub use ffmpeg_muxer::{build_concat_list, build_ffmetadata, FfmpegMuxer, FfmpegMuxerConfig};
