//! yt2mp3 - A Rust CLI tool for saving YouTube audio and transcripts
//!
//! This library wraps yt-dlp and ffmpeg to download audio as MP3 (optionally
//! clipped), trim silence, batch over playlists and searches, watch the
//! clipboard for video links, and convert caption tracks to text, SRT or JSON.

pub mod batch;
pub mod captions;
pub mod cli;
pub mod config;
pub mod download;
pub mod extractors;
pub mod output;
pub mod timecode;
pub mod transcode;
pub mod utils;
pub mod watcher;

pub use captions::{CaptionDocument, Cue, Segment};
pub use cli::{AudioQuality, Cli, Commands, TranscriptFormat};
pub use config::{ConfigStore, FileConfigStore, Settings};
pub use download::Downloader;
pub use extractors::{MediaExtractor, PlaylistEntry, PlaylistInfo};
pub use timecode::{parse_time, ClipRange, TimeParseError};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to yt2mp3
#[derive(thiserror::Error, Debug)]
pub enum Yt2Mp3Error {
    #[error("Unsupported URL format: {0}")]
    UnsupportedUrl(String),

    #[error("yt-dlp failed: {0}")]
    ExtractionFailed(String),

    #[error("ffmpeg failed: {0}")]
    TranscodeFailed(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(usize),

    #[error("File operation failed: {0}")]
    FileError(String),
}
