//! Clipboard polling for video links.

use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::Result;

static VIDEO_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"https?://(?:www\.)?youtube\.com/watch\?v=[\w-]+",
        r"|https?://youtu\.be/[\w-]+",
        r"|https?://(?:www\.)?youtube\.com/shorts/[\w-]+",
        r"|https?://music\.youtube\.com/watch\?v=[\w-]+",
    ))
    .expect("valid video url regex")
});

/// First recognized video URL in `text`
pub fn extract_video_url(text: &str) -> Option<&str> {
    VIDEO_URL_PATTERN.find(text).map(|m| m.as_str())
}

/// Something that can be polled for its current text content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipboardSource: Send + Sync {
    async fn read(&self) -> Result<String>;
}

/// The system clipboard
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClipboardSource for SystemClipboard {
    async fn read(&self) -> Result<String> {
        let text = tokio::task::spawn_blocking(|| -> std::result::Result<String, arboard::Error> {
            let mut clipboard = arboard::Clipboard::new()?;
            clipboard.get_text()
        })
        .await
        .context("Clipboard reader task failed")??;

        Ok(text.trim().to_string())
    }
}

/// Result of observing one clipboard snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Detected(String),
}

/// Remembers the last snapshot and every URL already reported
#[derive(Debug, Default)]
pub struct ClipboardWatcher {
    seen: HashSet<String>,
    last_snapshot: String,
}

impl ClipboardWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one clipboard snapshot.
    ///
    /// Only a changed snapshot containing a URL not reported before yields
    /// `Detected`.
    pub fn observe(&mut self, snapshot: &str) -> WatchState {
        if snapshot == self.last_snapshot {
            return WatchState::Idle;
        }
        self.last_snapshot = snapshot.to_string();

        match extract_video_url(snapshot) {
            Some(url) if self.seen.insert(url.to_string()) => WatchState::Detected(url.to_string()),
            _ => WatchState::Idle,
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Poll `source` every `interval` until `stop` turns true, calling
    /// `on_detect` for each new URL.
    ///
    /// Read failures count as "no change". The callback runs to completion
    /// before the next poll.
    pub async fn run<S, F, Fut>(
        &mut self,
        source: &S,
        interval: Duration,
        mut stop: watch::Receiver<bool>,
        mut on_detect: F,
    ) where
        S: ClipboardSource + ?Sized,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        loop {
            if *stop.borrow() {
                break;
            }

            match source.read().await {
                Ok(snapshot) => {
                    if let WatchState::Detected(url) = self.observe(&snapshot) {
                        tracing::info!("Detected URL on clipboard: {}", url);
                        on_detect(url).await;
                    }
                }
                Err(e) => tracing::debug!("Clipboard read failed: {:#}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Stopped watching clipboard after {} URLs", self.seen.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const VIDEO: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn test_extract_video_url_shapes() {
        assert_eq!(extract_video_url(&format!("look {} !", VIDEO)), Some(VIDEO));
        assert_eq!(extract_video_url("https://youtu.be/abc-_1"), Some("https://youtu.be/abc-_1"));
        assert!(extract_video_url("http://youtube.com/shorts/xyz").is_some());
        assert!(extract_video_url("https://music.youtube.com/watch?v=abc").is_some());
        assert!(extract_video_url("https://vimeo.com/123").is_none());
        assert!(extract_video_url("").is_none());
    }

    #[test]
    fn test_observe_fires_once_per_transition() {
        let mut watcher = ClipboardWatcher::new();
        let states: Vec<WatchState> = ["plain text", "plain text", VIDEO, "plain text"]
            .iter()
            .map(|s| watcher.observe(s))
            .collect();

        assert_eq!(
            states,
            vec![
                WatchState::Idle,
                WatchState::Idle,
                WatchState::Detected(VIDEO.to_string()),
                WatchState::Idle
            ]
        );
    }

    #[test]
    fn test_observe_ignores_already_seen_urls() {
        let mut watcher = ClipboardWatcher::new();
        assert!(matches!(watcher.observe(VIDEO), WatchState::Detected(_)));
        assert_eq!(watcher.observe("something else"), WatchState::Idle);
        assert_eq!(watcher.observe(VIDEO), WatchState::Idle);
        assert_eq!(watcher.seen_count(), 1);
    }

    #[tokio::test]
    async fn test_system_clipboard_read_completes() {
        // No clipboard on headless machines, so only completion is checked
        let result = tokio::time::timeout(Duration::from_secs(10), SystemClipboard::new().read()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_polls_until_stopped() {
        let snapshots = Arc::new(Mutex::new(
            vec![
                Ok("a".to_string()),
                Ok("a".to_string()),
                Ok(VIDEO.to_string()),
                Err(()),
                Ok("a".to_string()),
            ]
            .into_iter(),
        ));
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut source = MockClipboardSource::new();
        let remaining = snapshots.clone();
        source.expect_read().returning(move || {
            let next = remaining.lock().unwrap().next();
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(())) => Err(anyhow::anyhow!("clipboard busy")),
                None => {
                    let _ = stop_tx.send(true);
                    Ok("a".to_string())
                }
            }
        });

        let detected = Arc::new(Mutex::new(Vec::new()));
        let sink = detected.clone();
        let mut watcher = ClipboardWatcher::new();
        watcher
            .run(&source, Duration::from_millis(1), stop_rx, |url| {
                sink.lock().unwrap().push(url);
                async {}
            })
            .await;

        assert_eq!(*detected.lock().unwrap(), vec![VIDEO.to_string()]);
    }
}
