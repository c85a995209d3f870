use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use crate::batch::{BatchEvent, ItemOutcome, Tally};
use crate::download::DownloadedFile;
use crate::extractors::PlaylistEntry;
use crate::utils::{format_file_size, format_timestamp};

/// Green "Saved: <path>" line
pub fn print_saved(path: &Path) {
    println!("{}", style(format!("Saved: {}", path.display())).green());
}

/// Green "<label>: <path>" line for a stored setting
pub fn print_saved_setting(label: &str, path: &Path) {
    println!("{}", style(format!("{}: {}", label, path.display())).green());
}

/// Red "Error: <message>" line on stderr
pub fn print_error(message: &str) {
    eprintln!("{}", style(format!("Error: {}", message)).red());
}

/// Yellow neutral message, used for "nothing found" outcomes
pub fn print_notice(message: &str) {
    println!("{}", style(message).yellow());
}

/// Percent progress bar for a single download
pub fn download_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    progress.set_message("Downloading");
    progress
}

/// Spinner for collaborator calls without progress output
pub fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(std::time::Duration::from_millis(100));
    progress
}

/// Duration column for entry listings, `?` when unknown
pub fn entry_duration(entry: &PlaylistEntry) -> String {
    entry
        .duration_seconds
        .map(format_timestamp)
        .unwrap_or_else(|| "?".to_string())
}

/// Numbered listing of search results or playlist members
pub fn print_entries(entries: &[PlaylistEntry], show_channel: bool) {
    for (i, entry) in entries.iter().enumerate() {
        println!("  {:3}. [{:>7}] {}", i + 1, entry_duration(entry), entry.title);
        if show_channel {
            if let Some(channel) = &entry.channel {
                println!("        {}", style(channel).dim());
            }
        }
    }
}

/// Listing of downloaded files, `count` at most
pub fn print_downloads(dir: &Path, files: &[DownloadedFile], count: usize) {
    if files.is_empty() {
        println!("No MP3 files in {}", dir.display());
        return;
    }

    println!("MP3 files in {}:\n", dir.display());
    for file in files.iter().take(count) {
        println!(
            "  {:>7.2} MB  {}  {}",
            file.size_mb(),
            style(file.modified.format("%Y-%m-%d %H:%M")).dim(),
            file.name
        );
    }

    if files.len() > count {
        println!("\n  ... and {} more files", files.len() - count);
    }
}

/// Summary for the `config` command
pub fn print_library_summary(files: &[DownloadedFile]) {
    let total: u64 = files.iter().map(|f| f.size_bytes).sum();
    println!("Total files: {}", files.len());
    println!("Total size: {}", format_file_size(total));
}

/// Render one batch event as console lines
pub fn report_batch_event<T>(event: &BatchEvent<T, PathBuf>, label: impl Fn(&T) -> String) {
    match event {
        BatchEvent::Started { total } => {
            tracing::debug!("Batch of {} items started", total);
        }
        BatchEvent::ItemStarted { index, total, item } => {
            println!("[{}/{}] {}", index, total, label(item));
        }
        BatchEvent::ItemFinished { outcome, .. } => match outcome {
            ItemOutcome::Succeeded(success) => {
                let name = success
                    .artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| success.artifact.display().to_string());
                println!("  {}", style(format!("-> {}", name)).green());
            }
            ItemOutcome::Failed(failure) => {
                println!("  {}", style(format!("Error: {}", failure.message)).red());
            }
        },
        BatchEvent::Finished(_) => {}
    }
}

/// Final `Completed: S/N succeeded` line plus the failed items
pub fn print_tally<T, A>(tally: &Tally<T, A>, label: impl Fn(&T) -> String) {
    println!();
    println!("Completed: {}/{} succeeded", tally.succeeded_count(), tally.total());

    if !tally.failed.is_empty() {
        println!("{}", style(format!("Failed ({}):", tally.failed_count())).red());
        for failure in &tally.failed {
            println!("  {}", label(&failure.item));
        }
    }
}
