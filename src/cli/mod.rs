use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "yt2mp3",
    about = "yt2mp3 - Download YouTube audio as MP3, clip it, trim silence and grab transcripts",
    version,
    long_about = "A CLI tool for saving audio from YouTube videos, playlists and searches as MP3 files. Uses yt-dlp for fetching and ffmpeg for conversion, clipping and silence removal."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a YouTube video as MP3
    #[command(visible_alias = "d")]
    Download {
        /// Video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory for this download
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Audio quality in kbps
        #[arg(short, long, value_enum, default_value = "192")]
        quality: AudioQuality,

        /// Custom filename (without extension)
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,

        /// Start time (e.g. 12, 1:30, 1m30s)
        #[arg(short, long = "start", value_name = "TIME")]
        start: Option<String>,

        /// Duration to capture (e.g. 20, 20s, 1:00)
        #[arg(short, long, value_name = "TIME")]
        duration: Option<String>,

        /// End time (ignored when a duration is given)
        #[arg(short, long = "end", value_name = "TIME")]
        end: Option<String>,
    },

    /// Download multiple videos as MP3
    Batch {
        /// Video URLs
        #[arg(value_name = "URL")]
        urls: Vec<String>,

        /// File containing URLs (one per line, # for comments)
        #[arg(short, long = "file", value_name = "FILE")]
        file: Option<PathBuf>,

        /// Output directory for downloads
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Audio quality in kbps
        #[arg(short, long, value_enum, default_value = "192")]
        quality: AudioQuality,
    },

    /// List downloaded MP3 files
    List {
        /// Number of files to show
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },

    /// Set the default output directory
    SetDir {
        /// New output directory
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Show current configuration
    Config,

    /// Open the output directory in the file browser
    Open,

    /// Watch the clipboard for YouTube URLs and download them
    Watch {
        /// Audio quality in kbps
        #[arg(short, long, value_enum, default_value = "192")]
        quality: AudioQuality,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Download without prompting
        #[arg(short, long)]
        yes: bool,

        /// Clipboard check interval in seconds
        #[arg(short, long, default_value = "1.0")]
        interval: f64,
    },

    /// Search YouTube and optionally download a result
    Search {
        /// Search terms
        #[arg(value_name = "QUERY", required = true)]
        query: Vec<String>,

        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Download result by number
        #[arg(short, long = "download", value_name = "N")]
        download: Option<usize>,

        /// Audio quality in kbps
        #[arg(short, long, value_enum, default_value = "192")]
        quality: AudioQuality,
    },

    /// Download an entire playlist as MP3
    Playlist {
        /// Playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Audio quality in kbps
        #[arg(short, long, value_enum, default_value = "192")]
        quality: AudioQuality,

        /// Max videos to download
        #[arg(short = 'n', long = "max", value_name = "N")]
        max: Option<usize>,

        /// Show playlist info without downloading
        #[arg(long)]
        info: bool,
    },

    /// Remove silence from the beginning/end of MP3 files
    Trim {
        /// MP3 file to trim
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Trim all files in the output directory
        #[arg(long)]
        all: bool,

        /// Trim silence at the start (default)
        #[arg(long, overrides_with = "no_start")]
        start: bool,

        /// Keep silence at the start
        #[arg(long, overrides_with = "start")]
        no_start: bool,

        /// Trim silence at the end (default)
        #[arg(long, overrides_with = "no_end")]
        end: bool,

        /// Keep silence at the end
        #[arg(long, overrides_with = "end")]
        no_end: bool,

        /// Silence threshold in dB
        #[arg(short, long, default_value = "-50", allow_hyphen_values = true)]
        threshold: f64,
    },

    /// Download transcript/captions for a video or playlist
    #[command(visible_alias = "t")]
    Transcript {
        /// Video or playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Language code
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "txt")]
        format: TranscriptFormat,

        /// Skip auto-generated captions
        #[arg(long)]
        no_auto: bool,

        /// Max videos for playlists
        #[arg(short = 'n', long = "max", value_name = "N")]
        max: Option<usize>,

        /// Show playlist info without downloading
        #[arg(long)]
        info: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioQuality {
    /// 128 kbps
    #[value(name = "128")]
    Low,
    /// 192 kbps
    #[value(name = "192")]
    Standard,
    /// 320 kbps
    #[value(name = "320")]
    High,
}

impl AudioQuality {
    pub fn kbps(&self) -> u32 {
        match self {
            AudioQuality::Low => 128,
            AudioQuality::Standard => 192,
            AudioQuality::High => 320,
        }
    }
}

impl Default for AudioQuality {
    fn default() -> Self {
        AudioQuality::Standard
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranscriptFormat {
    /// Plain text, duplicate lines collapsed
    Txt,
    /// SRT subtitle format
    Srt,
    /// JSON segments with timestamps
    Json,
}

impl TranscriptFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TranscriptFormat::Txt => "txt",
            TranscriptFormat::Srt => "srt",
            TranscriptFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for TranscriptFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timecode::ClipRange;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_alias_and_clip_options() {
        let cli = Cli::try_parse_from(["yt2mp3", "d", "URL", "-s", "1:30", "-e", "2:00", "-q", "320"]).unwrap();
        match cli.command {
            Commands::Download { url, quality, start, end, duration, .. } => {
                assert_eq!(url, "URL");
                assert_eq!(quality.kbps(), 320);
                assert_eq!(start.as_deref(), Some("1:30"));
                assert_eq!(end.as_deref(), Some("2:00"));
                assert!(duration.is_none());
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_duration_wins_over_end() {
        let cli = Cli::try_parse_from(["yt2mp3", "download", "URL", "-s", "10", "-d", "20", "-e", "1:00"]).unwrap();
        match cli.command {
            Commands::Download { start, duration, end, .. } => {
                let clip = ClipRange::from_options(start.as_deref(), duration.as_deref(), end.as_deref())
                    .unwrap()
                    .unwrap();
                assert_eq!(clip.start, 10.0);
                assert_eq!(clip.end, Some(30.0));
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_rejects_unknown_quality() {
        assert!(Cli::try_parse_from(["yt2mp3", "download", "URL", "-q", "256"]).is_err());
    }

    #[test]
    fn test_transcript_alias_defaults() {
        let cli = Cli::try_parse_from(["yt2mp3", "t", "URL"]).unwrap();
        match cli.command {
            Commands::Transcript { lang, format, no_auto, .. } => {
                assert_eq!(lang, "en");
                assert_eq!(format, TranscriptFormat::Txt);
                assert!(!no_auto);
            }
            _ => panic!("expected transcript command"),
        }
    }

    #[test]
    fn test_trim_negative_threshold() {
        let cli = Cli::try_parse_from(["yt2mp3", "trim", "a.mp3", "-t", "-40", "--no-end"]).unwrap();
        match cli.command {
            Commands::Trim { threshold, no_end, no_start, .. } => {
                assert_eq!(threshold, -40.0);
                assert!(no_end);
                assert!(!no_start);
            }
            _ => panic!("expected trim command"),
        }
    }

    #[test]
    fn test_trim_positive_flags_override_negative() {
        let cli = Cli::try_parse_from(["yt2mp3", "trim", "a.mp3", "--no-start", "--start", "--end"]).unwrap();
        match cli.command {
            Commands::Trim { no_start, no_end, .. } => {
                assert!(!no_start);
                assert!(!no_end);
            }
            _ => panic!("expected trim command"),
        }

        let cli = Cli::try_parse_from(["yt2mp3", "trim", "a.mp3", "--end", "--no-end"]).unwrap();
        match cli.command {
            Commands::Trim { no_end, .. } => assert!(no_end),
            _ => panic!("expected trim command"),
        }
    }
}
