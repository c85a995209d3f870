use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use super::{
    AudioRequest, DownloadProgress, MediaExtractor, PlaylistEntry, PlaylistInfo, ProgressSender,
    SubtitleDownload, SubtitleRequest, VideoMeta,
};
use crate::{Result, Yt2Mp3Error};

static PROGRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid progress regex"));

/// Subset of the yt-dlp info JSON we care about
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    #[serde(default)]
    entries: Vec<InfoJson>,
}

impl InfoJson {
    fn creator(&self) -> Option<String> {
        self.channel.clone().or_else(|| self.uploader.clone())
    }

    fn into_entry(self) -> PlaylistEntry {
        let creator = self.creator();
        let url = self
            .webpage_url
            .or(self.url)
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", self.id));
        PlaylistEntry {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            duration_seconds: self.duration,
            channel: creator,
            url,
            id: self.id,
        }
    }
}

/// yt-dlp backed extractor
pub struct YtDlpExtractor {
    yt_dlp_path: String,
}

impl YtDlpExtractor {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: path.into(),
        }
    }

    /// Build the argument list for an MP3 download
    fn audio_args(request: &AudioRequest) -> Vec<String> {
        let template = match &request.filename {
            Some(name) => request.output_dir.join(format!("{}.%(ext)s", name)),
            None => request.output_dir.join("%(title)s.%(ext)s"),
        };

        let mut args: Vec<String> = vec![
            "--format".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            "mp3".into(),
            "--audio-quality".into(),
            format!("{}K", request.quality.kbps()),
            "--output".into(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--progress".into(),
            "--newline".into(),
            "--print".into(),
            "after_move:filepath".into(),
        ];

        if let Some(clip) = &request.clip {
            let ffmpeg_args = clip.ffmpeg_args();
            if !ffmpeg_args.is_empty() {
                args.push("--downloader".into());
                args.push("ffmpeg".into());
                args.push("--downloader-args".into());
                args.push(format!("ffmpeg_i:{}", ffmpeg_args.join(" ")));
            }
        }

        args.push(request.url.clone());
        args
    }

    fn subtitle_args(url: &str, request: &SubtitleRequest, dest_dir: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--skip-download".into(),
            "--write-subs".into(),
        ];
        if request.include_auto {
            args.push("--write-auto-subs".into());
        }
        args.extend([
            "--sub-langs".to_string(),
            request.language.clone(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--output".to_string(),
            dest_dir.join("%(id)s.%(ext)s").to_string_lossy().into_owned(),
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ]);
        args
    }

    async fn run_json(&self, args: &[String]) -> Result<InfoJson> {
        tracing::debug!("Running {} {}", self.yt_dlp_path, args.join(" "));

        let output = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(Yt2Mp3Error::ExtractionFailed(error.trim().to_string()).into());
        }

        let json_str = String::from_utf8(output.stdout)?;
        let line = json_str
            .lines()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| Yt2Mp3Error::ExtractionFailed("yt-dlp printed no metadata".to_string()))?;
        Ok(serde_json::from_str(line)?)
    }
}

/// Percentage from a `[download]  42.1% of ...` line
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let caps = PROGRESS_PATTERN.captures(line.trim())?;
    caps[1].parse().ok()
}

/// Read `reader` to the end, forwarding progress lines to `progress` and
/// returning every other non-empty line
async fn drain_lines<R>(reader: Option<R>, progress: Option<&ProgressSender>) -> std::io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::new();
    let Some(reader) = reader else {
        return Ok(kept);
    };

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(percent) = parse_progress_line(&line) {
            if let Some(tx) = progress {
                let _ = tx.send(DownloadProgress { percent });
            }
        } else if !line.trim().is_empty() {
            kept.push(line);
        }
    }
    Ok(kept)
}

/// First `.vtt` file in `dir` (yt-dlp names it `<id>.<lang>.vtt`)
fn find_markup_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut found = None;
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("vtt") {
            found = Some(path);
            break;
        }
    }
    Ok(found)
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn download_audio(
        &self,
        request: &AudioRequest,
        progress: Option<ProgressSender>,
    ) -> Result<PathBuf> {
        let args = Self::audio_args(request);
        tracing::debug!("Running {} {}", self.yt_dlp_path, args.join(" "));

        let mut child = Command::new(&self.yt_dlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Both pipes are drained together so a chatty stderr can't stall stdout
        let (stdout_lines, stderr_lines) = tokio::try_join!(
            drain_lines(child.stdout.take(), progress.as_ref()),
            drain_lines(child.stderr.take(), progress.as_ref()),
        )?;

        let status = child.wait().await?;
        if !status.success() {
            let diagnostics = stderr_lines.join("\n");
            let message = match diagnostics.trim() {
                "" => format!("exited with {}", status),
                text => text.to_string(),
            };
            return Err(Yt2Mp3Error::ExtractionFailed(message).into());
        }

        let reported_path = stdout_lines
            .iter()
            .rev()
            .find(|line| !line.starts_with('['))
            .map(|line| PathBuf::from(line.trim()));

        if let Some(tx) = &progress {
            let _ = tx.send(DownloadProgress { percent: 100.0 });
        }

        match &request.filename {
            Some(name) => Ok(request.output_dir.join(format!("{}.mp3", name))),
            None => reported_path.ok_or_else(|| {
                Yt2Mp3Error::ExtractionFailed("yt-dlp did not report an output file".to_string())
                    .into()
            }),
        }
    }

    async fn flat_extract(&self, target: &str) -> Result<PlaylistInfo> {
        let args: Vec<String> = vec![
            "--flat-playlist".into(),
            "--dump-single-json".into(),
            "--no-warnings".into(),
            target.to_string(),
        ];
        let info = self.run_json(&args).await?;
        let channel = info.creator();
        let title = info.title.clone().unwrap_or_else(|| "Unknown".to_string());

        let entries: Vec<PlaylistEntry> = info.entries.into_iter().map(InfoJson::into_entry).collect();
        tracing::info!("Flat extraction of {} returned {} entries", target, entries.len());

        Ok(PlaylistInfo {
            title,
            channel,
            entries,
        })
    }

    async fn download_subtitles(
        &self,
        url: &str,
        request: &SubtitleRequest,
        dest_dir: &Path,
    ) -> Result<SubtitleDownload> {
        let args = Self::subtitle_args(url, request, dest_dir);
        let info = self.run_json(&args).await?;
        let markup_path = find_markup_file(dest_dir)?;

        if markup_path.is_none() {
            tracing::info!("No '{}' captions for {}", request.language, url);
        }

        Ok(SubtitleDownload {
            video: VideoMeta {
                channel: info.creator(),
                title: info.title.unwrap_or_else(|| info.id.clone()),
                id: info.id,
            },
            markup_path,
        })
    }

    fn platform_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AudioQuality;
    use crate::timecode::ClipRange;

    fn request() -> AudioRequest {
        AudioRequest {
            url: "https://youtu.be/abc".to_string(),
            output_dir: PathBuf::from("/music"),
            quality: AudioQuality::High,
            filename: None,
            clip: None,
        }
    }

    #[test]
    fn test_audio_args_defaults() {
        let args = YtDlpExtractor::audio_args(&request());
        assert!(args.windows(2).any(|w| w[0] == "--audio-quality" && w[1] == "320K"));
        assert!(args.contains(&"/music/%(title)s.%(ext)s".to_string()));
        assert!(!args.contains(&"--downloader".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
    }

    #[test]
    fn test_audio_args_with_name_and_clip() {
        let mut req = request();
        req.filename = Some("song".to_string());
        req.clip = Some(ClipRange { start: 12.0, end: Some(32.0) });

        let args = YtDlpExtractor::audio_args(&req);
        assert!(args.contains(&"/music/song.%(ext)s".to_string()));
        assert!(args.contains(&"ffmpeg_i:-ss 12 -to 32".to_string()));
    }

    #[test]
    fn test_subtitle_args() {
        let req = SubtitleRequest {
            language: "de".to_string(),
            include_auto: false,
        };
        let args = YtDlpExtractor::subtitle_args("URL", &req, Path::new("/tmp/x"));
        assert!(!args.contains(&"--write-auto-subs".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--sub-langs" && w[1] == "de"));

        let auto = SubtitleRequest { include_auto: true, ..req };
        assert!(YtDlpExtractor::subtitle_args("URL", &auto, Path::new("/tmp/x"))
            .contains(&"--write-auto-subs".to_string()));
    }

    #[test]
    fn test_parse_progress_line() {
        assert_eq!(parse_progress_line("[download]  42.3% of 3.10MiB at 1.2MiB/s"), Some(42.3));
        assert_eq!(parse_progress_line("[download] 100% of 3.10MiB"), Some(100.0));
        assert_eq!(parse_progress_line("[ExtractAudio] Destination: a.mp3"), None);
    }

    #[test]
    fn test_flat_info_json_to_entries() {
        let json = r#"{
            "id": "PL1", "title": "Mix", "uploader": "Someone",
            "entries": [
                {"id": "a1", "title": "First", "duration": 61.0, "channel": "Chan", "url": "https://www.youtube.com/watch?v=a1"},
                {"id": "b2"}
            ]
        }"#;
        let info: InfoJson = serde_json::from_str(json).unwrap();
        assert_eq!(info.creator().as_deref(), Some("Someone"));

        let entries: Vec<PlaylistEntry> = info.entries.into_iter().map(InfoJson::into_entry).collect();
        assert_eq!(entries[0].title, "First");
        assert_eq!(entries[0].duration_seconds, Some(61.0));
        assert_eq!(entries[0].channel.as_deref(), Some("Chan"));
        assert_eq!(entries[1].title, "Unknown");
        assert_eq!(entries[1].url, "https://www.youtube.com/watch?v=b2");
    }

    #[test]
    fn test_find_markup_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_markup_file(dir.path()).unwrap().is_none());
        fs_err::write(dir.path().join("abc.en.vtt"), "WEBVTT").unwrap();
        assert_eq!(
            find_markup_file(dir.path()).unwrap(),
            Some(dir.path().join("abc.en.vtt"))
        );
    }

    // Writing an executable while another test forks can fail with ETXTBSY
    #[cfg(unix)]
    static FAKE_TOOL_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[cfg(unix)]
    fn fake_yt_dlp(dir: &Path, body: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_survives_noisy_stderr() {
        let _guard = FAKE_TOOL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let script = fake_yt_dlp(
            dir.path(),
            r#"i=0
while [ $i -lt 3000 ]; do
  echo "[download]  $((i % 100)).0% of 3.10MiB at 1.00MiB/s ETA 00:01" >&2
  i=$((i + 1))
done
echo "[ExtractAudio] Destination: /music/song.mp3"
echo "/music/song.mp3""#,
        );
        let extractor = YtDlpExtractor::with_path(script.to_string_lossy());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let path = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            extractor.download_audio(&request(), Some(tx)),
        )
        .await
        .expect("download_audio should not stall on stderr output")
        .unwrap();
        assert_eq!(path, PathBuf::from("/music/song.mp3"));

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update.percent);
        }
        assert!(updates.len() > 3000);
        assert_eq!(updates.last(), Some(&100.0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_failure_keeps_stderr_text() {
        let _guard = FAKE_TOOL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let script = fake_yt_dlp(
            dir.path(),
            "echo \"[download]   5.0% of 1MiB\" >&2\necho \"ERROR: Video unavailable\" >&2\nexit 1",
        );
        let extractor = YtDlpExtractor::with_path(script.to_string_lossy());

        let err = extractor.download_audio(&request(), None).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ERROR: Video unavailable"));
        assert!(!message.contains("5.0%"));
    }
}
