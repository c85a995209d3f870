//! WebVTT caption handling.
//!
//! Raw markup written by yt-dlp is parsed into [`CaptionDocument`]s and rendered
//! into plain text, SRT, or timestamped JSON segments by the functions in
//! [`formatters`].

use once_cell::sync::Lazy;
use regex::Regex;

pub mod formatters;

pub use formatters::*;

/// Marker separating the two timestamps of a cue boundary line
pub const BOUNDARY_ARROW: &str = "-->";

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

static BOUNDARY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:\d+:)?\d{2}:\d{2}\.\d{3})\s*-->\s*((?:\d+:)?\d{2}:\d{2}\.\d{3})")
        .expect("valid boundary regex")
});

/// One timed caption entry
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Start timestamp as written in the markup (`00:00:01.000`)
    pub start: String,

    /// End timestamp as written in the markup
    pub end: String,

    /// Tag-stripped, non-empty text lines
    pub lines: Vec<String>,
}

impl Cue {
    /// Text lines joined by a single space
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Ordered cues parsed from one markup blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionDocument {
    cues: Vec<Cue>,
}

impl CaptionDocument {
    /// Parse WebVTT-style markup.
    ///
    /// Boundary lines whose timestamps do not match the expected pattern are
    /// skipped together with their text block, and cues without any text are
    /// dropped. Markup without a single boundary yields an empty document.
    pub fn parse(markup: &str) -> Self {
        let mut cues = Vec::new();
        let mut current: Option<Cue> = None;
        // true while inside a block whose boundary failed to parse
        let mut skipping = false;

        for line in markup.lines() {
            if line.contains(BOUNDARY_ARROW) {
                push_cue(&mut cues, current.take());
                match parse_boundary(line) {
                    Some((start, end)) => {
                        current = Some(Cue { start, end, lines: Vec::new() });
                        skipping = false;
                    }
                    None => {
                        tracing::debug!("Skipping malformed cue boundary: {}", line);
                        skipping = true;
                    }
                }
                continue;
            }

            if line.trim().is_empty() {
                push_cue(&mut cues, current.take());
                skipping = false;
                continue;
            }

            if skipping {
                continue;
            }

            if let Some(cue) = current.as_mut() {
                let text = strip_tags(line);
                let text = text.trim();
                if !text.is_empty() {
                    cue.lines.push(text.to_string());
                }
            }
        }
        push_cue(&mut cues, current);

        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}

fn push_cue(cues: &mut Vec<Cue>, cue: Option<Cue>) {
    if let Some(cue) = cue {
        if !cue.lines.is_empty() {
            cues.push(cue);
        }
    }
}

/// Extract `(start, end)` from a boundary line, ignoring cue settings after the
/// second timestamp
pub fn parse_boundary(line: &str) -> Option<(String, String)> {
    let caps = BOUNDARY_PATTERN.captures(line)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Remove every `<...>` span from a caption line
pub fn strip_tags(line: &str) -> String {
    TAG_PATTERN.replace_all(line, "").into_owned()
}

/// Header, index and blank lines carry no caption text.
///
/// Header prefixes only match at the very start of the line.
pub(crate) fn is_non_text_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || line.starts_with("WEBVTT")
        || line.starts_with("Kind:")
        || line.starts_with("Language:")
        || trimmed.chars().all(|c| c.is_ascii_digit())
}
