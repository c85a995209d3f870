use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt2mp3::batch;
use yt2mp3::cli::{Cli, Commands};
use yt2mp3::config::{self, ConfigStore, FileConfigStore};
use yt2mp3::download::{self, DownloadOptions, Downloader, TranscriptOptions};
use yt2mp3::extractors::{is_playlist_url, ytdlp::YtDlpExtractor, PlaylistEntry};
use yt2mp3::output;
use yt2mp3::timecode::ClipRange;
use yt2mp3::transcode::{self, Ffmpeg, SilenceTrim};
use yt2mp3::utils;
use yt2mp3::watcher::{ClipboardWatcher, SystemClipboard};
use yt2mp3::Yt2Mp3Error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "yt2mp3=debug" } else { "yt2mp3=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn needs_collaborators(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::List { .. } | Commands::SetDir { .. } | Commands::Config | Commands::Open
    )
}

async fn run(cli: Cli) -> Result<()> {
    // Check for required external dependencies (non-fatal)
    if needs_collaborators(&cli.command) {
        let missing_deps = utils::check_dependencies().await;
        if !missing_deps.is_empty() {
            eprintln!("⚠️  Dependency check warnings:");
            for dep in missing_deps {
                eprintln!("   • {}", dep);
            }
            eprintln!("   (Continuing anyway - tools may be available)");
        }
    }

    let store = FileConfigStore::default_location()?;
    let settings = store.load()?;
    let downloader = Downloader::new(Arc::new(YtDlpExtractor::new()), settings.clone());
    let quiet = cli.quiet;

    match cli.command {
        Commands::Download {
            url,
            output,
            quality,
            name,
            start,
            duration,
            end,
        } => {
            let clip = ClipRange::from_options(start.as_deref(), duration.as_deref(), end.as_deref())?;
            let options = DownloadOptions {
                output_dir: output,
                quality,
                filename: name,
                clip,
            };

            println!("Downloading: {}", url);
            println!("Quality: {} kbps", quality.kbps());
            if let Some(clip) = &clip {
                println!("Clip: {}", clip.describe());
            }
            println!("Output: {}", downloader.audio_dir(options.output_dir.as_deref())?.display());
            println!();

            let path = download_with_progress(&downloader, &url, &options, quiet).await?;
            output::print_saved(&path);
        }

        Commands::Batch {
            urls,
            file,
            output,
            quality,
        } => {
            let url_list = download::collect_urls(&urls, file.as_deref())?;
            if url_list.is_empty() {
                anyhow::bail!("No URLs provided. Pass URLs as arguments or use -f/--file.");
            }

            let options = DownloadOptions {
                output_dir: output,
                quality,
                ..Default::default()
            };

            println!("Downloading {} videos...", url_list.len());
            println!("Quality: {} kbps", quality.kbps());
            println!("Output: {}", downloader.audio_dir(options.output_dir.as_deref())?.display());
            println!();

            let tally = batch::run(
                url_list,
                |url: String| {
                    let downloader = downloader.clone();
                    let options = options.clone();
                    async move { downloader.download_as_mp3(&url, &options, None).await }
                },
                |event| output::report_batch_event(event, |url: &String| url.clone()),
            )
            .await;
            output::print_tally(&tally, |url: &String| url.clone());
        }

        Commands::List { count } => {
            let files = download::list_downloads(&settings.output_dir)?;
            output::print_downloads(&settings.output_dir, &files, count);
        }

        Commands::SetDir { path } => {
            let stored = config::set_output_dir(&store, &path)?;
            output::print_saved_setting("Output directory set to", &stored);
        }

        Commands::Config => {
            settings.display();
            println!("Config file: {}", store.path().display());
            let files = download::list_downloads(&settings.output_dir)?;
            output::print_library_summary(&files);
        }

        Commands::Open => {
            open_in_file_browser(&settings.output_dir).await?;
            println!("Opened: {}", settings.output_dir.display());
        }

        Commands::Watch {
            quality,
            output,
            yes,
            interval,
        } => {
            let options = DownloadOptions {
                output_dir: output,
                quality,
                ..Default::default()
            };

            println!("Watching clipboard for YouTube URLs...");
            println!("Quality: {} kbps", quality.kbps());
            println!("Output: {}", downloader.audio_dir(options.output_dir.as_deref())?.display());
            if yes {
                println!("Auto-download: ON");
            }
            println!("Press Ctrl+C to stop.\n");

            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = stop_tx.send(true);
                }
            });

            let interval = Duration::from_secs_f64(interval.max(0.1));
            let clipboard = SystemClipboard::new();
            let mut watcher = ClipboardWatcher::new();
            watcher
                .run(&clipboard, interval, stop_rx, |url| {
                    let downloader = downloader.clone();
                    let options = options.clone();
                    async move {
                        println!("\nDetected: {}", url);
                        if !yes && !confirm("Download? [Y/n] ").await {
                            println!("Skipped.");
                            return;
                        }

                        println!("Downloading...");
                        match download_with_progress(&downloader, &url, &options, quiet).await {
                            Ok(path) => output::print_saved(&path),
                            Err(e) => output::print_error(&format!("{:#}", e)),
                        }
                        println!("\nWatching...");
                    }
                })
                .await;

            println!("\nStopped watching.");
        }

        Commands::Search {
            query,
            count,
            download,
            quality,
        } => {
            let query = query.join(" ");
            let progress = output::spinner(&format!("Searching: {}...", query), quiet);
            let results = downloader.search(&query, count).await;
            progress.finish_and_clear();
            let results = results?;

            if results.is_empty() {
                output::print_notice("No results found.");
                return Ok(());
            }

            println!();
            output::print_entries(&results, true);

            match download::select_result(&results, download)? {
                Some(selected) => {
                    println!();
                    println!("Downloading: {}", selected.title);

                    let options = DownloadOptions {
                        quality,
                        ..Default::default()
                    };
                    let path = download_with_progress(&downloader, &selected.url, &options, quiet).await?;
                    output::print_saved(&path);
                }
                None => {
                    println!();
                    println!("Use -d N to download a result, e.g.: yt2mp3 search \"query\" -d 1");
                }
            }
        }

        Commands::Playlist {
            url,
            output,
            quality,
            max,
            info,
        } => {
            let progress = output::spinner("Fetching playlist info...", quiet);
            let playlist = downloader.playlist_info(&url).await;
            progress.finish_and_clear();
            let playlist = playlist?;

            print_playlist_header(&playlist.title, playlist.channel.as_deref(), playlist.entries.len());
            if info {
                println!();
                output::print_entries(&playlist.entries, false);
                return Ok(());
            }

            let entries = limit_entries(playlist.entries, max);
            println!("Downloading {} videos...", entries.len());
            println!();

            let options = DownloadOptions {
                output_dir: output,
                quality,
                ..Default::default()
            };
            let tally = batch::run(
                entries,
                |entry: PlaylistEntry| {
                    let downloader = downloader.clone();
                    let options = options.clone();
                    async move { downloader.download_as_mp3(&entry.url, &options, None).await }
                },
                |event| output::report_batch_event(event, |entry: &PlaylistEntry| entry.title.clone()),
            )
            .await;
            output::print_tally(&tally, |entry: &PlaylistEntry| entry.title.clone());
        }

        Commands::Trim {
            file,
            all,
            no_start,
            no_end,
            threshold,
            ..
        } => {
            let targets: Vec<PathBuf> = match (file, all) {
                (_, true) => {
                    let files = download::list_downloads(&settings.output_dir)?;
                    if files.is_empty() {
                        println!("No MP3 files found in {}", settings.output_dir.display());
                        return Ok(());
                    }
                    println!("Trimming {} files in {}...", files.len(), settings.output_dir.display());
                    files.into_iter().map(|f| f.path).collect()
                }
                (Some(file), false) => {
                    utils::check_file_accessible(&file)?;
                    vec![file]
                }
                (None, false) => anyhow::bail!("Specify a file or use --all to trim all files."),
            };

            let options = SilenceTrim {
                threshold_db: threshold,
                trim_start: !no_start,
                trim_end: !no_end,
                ..Default::default()
            };
            let ffmpeg = Ffmpeg::new();

            for path in targets {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                print!("Trimming: {}...", name);
                let _ = std::io::stdout().flush();

                match transcode::trim_silence(&ffmpeg, &path, &options).await {
                    Ok(report) if report.found_silence() => {
                        println!("{}", console::style(format!(" removed {:.1}s", report.removed())).green());
                    }
                    Ok(_) => println!(" no silence found"),
                    Err(e) => println!("{}", console::style(format!(" error: {:#}", e)).red()),
                }
            }
        }

        Commands::Transcript {
            url,
            output,
            lang,
            format,
            no_auto,
            max,
            info,
        } => {
            let options = TranscriptOptions {
                output_dir: output,
                language: lang,
                include_auto: !no_auto,
                format,
            };

            if is_playlist_url(&url) {
                let progress = output::spinner("Fetching playlist info...", quiet);
                let playlist = downloader.playlist_info(&url).await;
                progress.finish_and_clear();
                let playlist = playlist?;

                print_playlist_header(&playlist.title, playlist.channel.as_deref(), playlist.entries.len());
                if info {
                    println!();
                    output::print_entries(&playlist.entries, false);
                    return Ok(());
                }

                let dir = downloader.playlist_transcript_dir(&playlist, &options);
                let entries = limit_entries(playlist.entries, max);
                println!("Downloading {} transcripts...", entries.len());
                println!("Format: {}", options.format);
                println!();

                let tally = batch::run(
                    entries,
                    |entry: PlaylistEntry| {
                        let downloader = downloader.clone();
                        let options = options.clone();
                        let dir = dir.clone();
                        async move { downloader.download_entry_transcript(&entry, &options, &dir).await }
                    },
                    |event| output::report_batch_event(event, |entry: &PlaylistEntry| entry.title.clone()),
                )
                .await;
                output::print_tally(&tally, |entry: &PlaylistEntry| entry.title.clone());
                println!("Output: {}", dir.display());
            } else {
                println!("Downloading transcript: {}", url);
                println!("Format: {}", options.format);
                println!();

                let progress = output::spinner("Fetching captions...", quiet);
                let result = downloader.download_transcript(&url, &options, None).await;
                progress.finish_and_clear();

                match result? {
                    Some(path) => output::print_saved(&path),
                    None => output::print_notice("No captions available for this video."),
                }
            }
        }
    }

    Ok(())
}

/// Download one URL while driving a progress bar from collaborator output
async fn download_with_progress(
    downloader: &Downloader,
    url: &str,
    options: &DownloadOptions,
    quiet: bool,
) -> Result<PathBuf> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress = output::download_progress_bar(quiet);

    let download = downloader.download_as_mp3(url, options, Some(tx));
    let render = async {
        while let Some(update) = rx.recv().await {
            progress.set_position(update.percent.clamp(0.0, 100.0) as u64);
        }
    };

    let (result, _) = tokio::join!(download, render);
    match &result {
        Ok(_) => progress.finish_with_message("Download complete"),
        Err(_) => progress.abandon_with_message("Download failed"),
    }
    result
}

fn limit_entries(entries: Vec<PlaylistEntry>, max: Option<usize>) -> Vec<PlaylistEntry> {
    match max {
        Some(max) => entries.into_iter().take(max).collect(),
        None => entries,
    }
}

fn print_playlist_header(title: &str, channel: Option<&str>, count: usize) {
    println!("\nPlaylist: {}", title);
    println!("Channel: {}", channel.unwrap_or("Unknown"));
    println!("Videos: {}", count);
}

/// Ask a yes/no question on stdin, defaulting to yes
async fn confirm(prompt: &str) -> bool {
    print!("{}", prompt);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    match stdin.read_line(&mut answer).await {
        Ok(_) => {
            let answer = answer.trim().to_lowercase();
            answer.is_empty() || answer == "y" || answer == "yes"
        }
        Err(_) => false,
    }
}

async fn open_in_file_browser(dir: &std::path::Path) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };

    fs_err::create_dir_all(dir)?;
    tokio::process::Command::new(opener)
        .arg(dir)
        .spawn()
        .map_err(|e| Yt2Mp3Error::FileError(format!("could not launch {}: {}", opener, e)))?;
    Ok(())
}
