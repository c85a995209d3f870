use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::{Result, Yt2Mp3Error};

/// Silence removal settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceTrim {
    /// Level below which audio counts as silence
    pub threshold_db: f64,
    /// Shortest run of silence worth removing, in seconds
    pub min_silence: f64,
    pub trim_start: bool,
    pub trim_end: bool,
}

impl Default for SilenceTrim {
    fn default() -> Self {
        Self {
            threshold_db: -50.0,
            min_silence: 0.1,
            trim_start: true,
            trim_end: true,
        }
    }
}

impl SilenceTrim {
    /// ffmpeg `-af` filter chain, `None` when nothing is to be trimmed.
    ///
    /// Trailing silence is removed by reversing, trimming the (new) start and
    /// reversing back.
    pub fn filter(&self) -> Option<String> {
        let remove = format!(
            "silenceremove=start_periods=1:start_threshold={}dB:start_silence={}",
            self.threshold_db, self.min_silence
        );

        let mut chain = Vec::new();
        if self.trim_start {
            chain.push(remove.clone());
        }
        if self.trim_end {
            chain.push("areverse".to_string());
            chain.push(remove);
            chain.push("areverse".to_string());
        }

        if chain.is_empty() {
            None
        } else {
            Some(chain.join(","))
        }
    }
}

/// Before/after durations of a trimmed file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimReport {
    pub before: f64,
    pub after: f64,
}

impl TrimReport {
    pub fn removed(&self) -> f64 {
        (self.before - self.after).max(0.0)
    }

    /// Less than a tenth of a second is noise from re-encoding
    pub fn found_silence(&self) -> bool {
        self.before - self.after > 0.1
    }
}

/// Audio transcoding collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Duration of a media file in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Apply an audio filter chain, writing `output`
    async fn apply_filter(&self, input: &Path, output: &Path, filter: &str) -> Result<()>;
}

/// ffmpeg/ffprobe backed transcoder
pub struct Ffmpeg {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Ffmpeg {
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                &path.to_string_lossy(),
            ])
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(Yt2Mp3Error::TranscodeFailed(format!(
                "could not probe {}: {}",
                path.display(),
                error.trim()
            ))
            .into());
        }

        let info: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        parse_probe_duration(&info).ok_or_else(|| {
            Yt2Mp3Error::TranscodeFailed(format!("no duration reported for {}", path.display())).into()
        })
    }

    async fn apply_filter(&self, input: &Path, output: &Path, filter: &str) -> Result<()> {
        tracing::debug!("Filtering {} with {}", input.display(), filter);

        let result = Command::new(&self.ffmpeg_path)
            .args([
                "-v", "error",
                "-i", &input.to_string_lossy(),
                "-af", filter,
                "-y", // Overwrite output file
                &output.to_string_lossy(),
            ])
            .output()
            .await?;

        if !result.status.success() {
            let error = String::from_utf8_lossy(&result.stderr);
            return Err(Yt2Mp3Error::TranscodeFailed(error.trim().to_string()).into());
        }

        Ok(())
    }
}

fn parse_probe_duration(info: &serde_json::Value) -> Option<f64> {
    info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
}

/// Remove silence from an MP3 in place.
///
/// The filtered audio is written next to the original and renamed over it, so
/// a failed run leaves the original untouched.
pub async fn trim_silence(
    transcoder: &dyn Transcoder,
    path: &Path,
    options: &SilenceTrim,
) -> Result<TrimReport> {
    let before = transcoder.probe_duration(path).await?;

    let Some(filter) = options.filter() else {
        return Ok(TrimReport { before, after: before });
    };

    let temp_path = sibling_temp_path(path);
    if let Err(e) = transcoder.apply_filter(path, &temp_path, &filter).await {
        let _ = fs_err::remove_file(&temp_path);
        return Err(e);
    }
    fs_err::rename(&temp_path, path)?;

    let after = transcoder.probe_duration(path).await?;
    tracing::info!("Trimmed {}: {:.1}s -> {:.1}s", path.display(), before, after);
    Ok(TrimReport { before, after })
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let name = format!(".trim_{}.mp3", &uuid::Uuid::new_v4().to_string()[..8]);
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
