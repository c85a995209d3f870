use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

pub mod ytdlp;

use crate::cli::AudioQuality;
use crate::timecode::ClipRange;
use crate::Result;

/// One item of a flat extraction (playlist member or search hit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<f64>,
    pub channel: Option<String>,
    pub url: String,
}

/// Result of flat-extracting a playlist or search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub channel: Option<String>,
    pub entries: Vec<PlaylistEntry>,
}

/// Basic metadata of a single video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMeta {
    pub id: String,
    pub title: String,
    pub channel: Option<String>,
}

/// What to fetch for an audio download
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub url: String,
    pub output_dir: PathBuf,
    pub quality: AudioQuality,
    /// File stem; the video title is used when absent
    pub filename: Option<String>,
    pub clip: Option<ClipRange>,
}

/// Which caption track to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRequest {
    pub language: String,
    pub include_auto: bool,
}

/// Outcome of a caption fetch; `markup_path` is `None` when the video has no
/// matching track
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleDownload {
    pub video: VideoMeta,
    pub markup_path: Option<PathBuf>,
}

/// Download progress reported while a transfer runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// 0.0 to 100.0
    pub percent: f64,
}

pub type ProgressSender = UnboundedSender<DownloadProgress>;

/// Media extraction collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Download and convert audio to MP3, returning the final file path
    async fn download_audio(
        &self,
        request: &AudioRequest,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf>;

    /// List entries of a playlist or `ytsearch<N>:<query>` target without
    /// resolving streams
    async fn flat_extract(&self, target: &str) -> Result<PlaylistInfo>;

    /// Write the caption markup of `url` into `dest_dir`
    async fn download_subtitles(
        &self,
        url: &str,
        request: &SubtitleRequest,
        dest_dir: &Path,
    ) -> Result<SubtitleDownload>;

    /// Get the name of this collaborator
    fn platform_name(&self) -> &'static str;
}

/// Does the URL point at a playlist rather than a single video
pub fn is_playlist_url(url: &str) -> bool {
    url.to_lowercase().contains("playlist") || url.contains("list=")
}

/// Pseudo-URL understood by yt-dlp for keyword search
pub fn search_target(query: &str, max_results: usize) -> String {
    format!("ytsearch{}:{}", max_results, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_playlist_url() {
        assert!(is_playlist_url("https://www.youtube.com/playlist?list=PL123"));
        assert!(is_playlist_url("https://www.youtube.com/watch?v=abc&list=PL123"));
        assert!(!is_playlist_url("https://youtu.be/abc"));
    }

    #[test]
    fn test_search_target() {
        assert_eq!(search_target("lofi hip hop", 5), "ytsearch5:lofi hip hop");
    }
}
