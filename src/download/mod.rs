use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::captions;
use crate::cli::{AudioQuality, TranscriptFormat};
use crate::config::{expand_home, Settings};
use crate::extractors::{
    search_target, AudioRequest, MediaExtractor, PlaylistEntry, PlaylistInfo, ProgressSender,
    SubtitleRequest,
};
use crate::timecode::ClipRange;
use crate::utils::{sanitize_filename, validate_and_normalize_url};
use crate::Yt2Mp3Error;

/// Options for an MP3 download
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadOptions {
    /// Overrides the configured output directory
    pub output_dir: Option<PathBuf>,
    pub quality: AudioQuality,
    pub filename: Option<String>,
    pub clip: Option<ClipRange>,
}

/// Options for a transcript download
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptOptions {
    /// Overrides `<transcripts_dir>/<creator>/<playlist>/`
    pub output_dir: Option<PathBuf>,
    pub language: String,
    pub include_auto: bool,
    pub format: TranscriptFormat,
}

impl Default for TranscriptOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            language: "en".to_string(),
            include_auto: true,
            format: TranscriptFormat::Txt,
        }
    }
}

/// An MP3 in the output directory
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

impl DownloadedFile {
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
    }
}

/// Main download pipeline
#[derive(Clone)]
pub struct Downloader {
    extractor: Arc<dyn MediaExtractor>,
    settings: Settings,
}

impl Downloader {
    pub fn new(extractor: Arc<dyn MediaExtractor>, settings: Settings) -> Self {
        Self {
            extractor,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Output directory for audio, created if missing
    pub fn audio_dir(&self, output: Option<&Path>) -> Result<PathBuf> {
        let dir = expand_home(output.unwrap_or(&self.settings.output_dir));
        ensure_dir(&dir)
    }

    /// Download a video as MP3
    pub async fn download_as_mp3(
        &self,
        url: &str,
        options: &DownloadOptions,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf> {
        let url = validate_and_normalize_url(url)?;
        let output_dir = self.audio_dir(options.output_dir.as_deref())?;

        let request = AudioRequest {
            url,
            output_dir,
            quality: options.quality,
            filename: options.filename.as_deref().map(sanitize_filename),
            clip: options.clip,
        };

        tracing::info!(
            "Downloading {} at {} kbps via {}",
            request.url,
            request.quality.kbps(),
            self.extractor.platform_name()
        );
        let path = self.extractor.download_audio(&request, progress).await?;
        tracing::info!("Saved {}", path.display());
        Ok(path)
    }

    /// Search by keyword, returning up to `max_results` entries
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<PlaylistEntry>> {
        let info = self.extractor.flat_extract(&search_target(query, max_results)).await?;
        Ok(info.entries)
    }

    /// Flat listing of a playlist
    pub async fn playlist_info(&self, url: &str) -> Result<PlaylistInfo> {
        let url = validate_and_normalize_url(url)?;
        self.extractor.flat_extract(&url).await
    }

    /// Directory transcripts of a playlist are written to
    pub fn playlist_transcript_dir(&self, info: &PlaylistInfo, options: &TranscriptOptions) -> PathBuf {
        match &options.output_dir {
            Some(dir) => expand_home(dir),
            None => self
                .settings
                .transcripts_dir
                .join(sanitize_filename(info.channel.as_deref().unwrap_or("Unknown")))
                .join(sanitize_filename(&info.title)),
        }
    }

    /// Fetch a video's captions and write them in the requested format.
    ///
    /// `dir` overrides where the file goes; otherwise the options' output dir
    /// or `<transcripts_dir>/<creator>/` is used. Returns `Ok(None)` when the
    /// video has no captions in the requested language.
    pub async fn download_transcript(
        &self,
        url: &str,
        options: &TranscriptOptions,
        dir: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        let url = validate_and_normalize_url(url)?;
        let scratch = TempDir::new().context("Failed to create temporary directory")?;
        let request = SubtitleRequest {
            language: options.language.clone(),
            include_auto: options.include_auto,
        };

        let fetched = self
            .extractor
            .download_subtitles(&url, &request, scratch.path())
            .await?;

        let Some(markup_path) = fetched.markup_path else {
            return Ok(None);
        };

        let markup = fs_err::read_to_string(&markup_path)?;
        if !markup.contains(captions::BOUNDARY_ARROW) {
            tracing::info!("Caption track for {} has no cues", url);
            return Ok(None);
        }

        let content = captions::render(&markup, &options.format)?;

        let target_dir = match (dir, &options.output_dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => expand_home(dir),
            (None, None) => self.settings.transcripts_dir.join(sanitize_filename(
                fetched.video.channel.as_deref().unwrap_or("Unknown"),
            )),
        };
        let target_dir = ensure_dir(&target_dir)?;

        let path = target_dir.join(format!(
            "{}.{}",
            sanitize_filename(&fetched.video.title),
            options.format.extension()
        ));
        fs_err::write(&path, content)?;

        tracing::info!("Transcript written to {}", path.display());
        Ok(Some(path))
    }

    /// Transcript download for one playlist entry; a missing track is a failure
    pub async fn download_entry_transcript(
        &self,
        entry: &PlaylistEntry,
        options: &TranscriptOptions,
        dir: &Path,
    ) -> Result<PathBuf> {
        match self.download_transcript(&entry.url, options, Some(dir)).await? {
            Some(path) => Ok(path),
            None => anyhow::bail!("No '{}' captions available", options.language),
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    fs_err::create_dir_all(dir)?;
    Ok(fs_err::canonicalize(dir)?)
}

/// MP3 files in `dir`, newest first
pub fn list_downloads(dir: &Path) -> Result<Vec<DownloadedFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        let is_mp3 = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mp3"))
            .unwrap_or(false);
        if !is_mp3 || !path.is_file() {
            continue;
        }

        let metadata = fs_err::metadata(&path)?;
        files.push(DownloadedFile {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_bytes: metadata.len(),
            modified: DateTime::<Local>::from(metadata.modified()?),
            path,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(files)
}

/// Pick the 1-based `index` from search results.
///
/// `None` and `Some(0)` both mean nothing was selected.
pub fn select_result(results: &[PlaylistEntry], index: Option<usize>) -> Result<Option<&PlaylistEntry>> {
    match index {
        None | Some(0) => Ok(None),
        Some(i) => results
            .get(i - 1)
            .map(Some)
            .ok_or_else(|| Yt2Mp3Error::InvalidSelection(i).into()),
    }
}

/// URLs from the command line plus an optional file (one per line, `#`
/// comments and blank lines skipped)
pub fn collect_urls(urls: &[String], file: Option<&Path>) -> Result<Vec<String>> {
    let mut list: Vec<String> = urls.to_vec();

    if let Some(file) = file {
        let content = fs_err::read_to_string(file)?;
        list.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    Ok(list)
}
