use anyhow::Result;
use serde::Serialize;

use super::{is_non_text_line, strip_tags, CaptionDocument, BOUNDARY_ARROW};
use crate::cli::TranscriptFormat;

/// A timestamped caption segment for JSON output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Render raw caption markup in the requested format
pub fn render(markup: &str, format: &TranscriptFormat) -> Result<String> {
    let content = match format {
        TranscriptFormat::Txt => format_as_text(markup),
        TranscriptFormat::Srt => format_as_srt(markup),
        TranscriptFormat::Json => format_as_json(markup)?,
    };
    Ok(content)
}

/// Plain text with headers, timings and tags removed.
///
/// Consecutive identical lines are collapsed, which undoes the rolling
/// repetition of auto-generated captions.
pub fn format_as_text(markup: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for line in markup.lines() {
        if is_non_text_line(line) || line.contains(BOUNDARY_ARROW) {
            continue;
        }

        let text = strip_tags(line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if kept.last().map(String::as_str) != Some(text) {
            kept.push(text.to_string());
        }
    }

    kept.join("\n")
}

/// SubRip output: one numbered block per boundary line, comma decimals
pub fn format_as_srt(markup: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut counter = 0usize;
    let mut in_block = false;

    for line in markup.lines() {
        if line.contains(BOUNDARY_ARROW) {
            if in_block {
                out.push(String::new());
            }
            counter += 1;
            out.push(counter.to_string());
            out.push(srt_timing_line(line));
            in_block = true;
            continue;
        }

        if line.trim().is_empty() {
            if in_block {
                out.push(String::new());
                in_block = false;
            }
            continue;
        }

        if in_block {
            let text = strip_tags(line);
            let text = text.trim();
            if !text.is_empty() {
                out.push(text.to_string());
            }
        }
    }

    if in_block {
        out.push(String::new());
    }

    out.join("\n")
}

/// `00:00:01.000 --> 00:00:02.000 align:start` becomes `00:00:01,000 --> 00:00:02,000`
fn srt_timing_line(line: &str) -> String {
    let (left, right) = line.split_once(BOUNDARY_ARROW).unwrap_or((line, ""));
    let start = left.trim();
    let end = right.split_whitespace().next().unwrap_or("");
    format!("{} --> {}", start.replace('.', ","), end.replace('.', ","))
}

/// Cues with text, as `{start, end, text}` records
pub fn to_segments(markup: &str) -> Vec<Segment> {
    CaptionDocument::parse(markup)
        .cues()
        .iter()
        .map(|cue| Segment {
            start: cue.start.clone(),
            end: cue.end.clone(),
            text: cue.text(),
        })
        .collect()
}

/// Pretty-printed JSON array of segments
pub fn format_as_json(markup: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_segments(markup))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPEATED: &str = "WEBVTT

00:00:01.000 --> 00:00:02.000
Hello world

00:00:02.000 --> 00:00:02.000

00:00:03.000 --> 00:00:04.000
Hello world
Hello world
";

    const AUTO_GENERATED: &str = "WEBVTT
Kind: captions
Language: en

00:00:00.320 --> 00:00:02.270 align:start position:0%

so<00:00:00.640><c> today</c><00:00:00.960><c> we</c>

00:00:02.270 --> 00:00:02.280 align:start position:0%
so today we


00:00:02.280 --> 00:00:04.550 align:start position:0%
so today we
are<00:00:02.560><c> going</c>
";

    #[test]
    fn test_text_collapses_adjacent_duplicates_across_empty_cues() {
        assert_eq!(format_as_text(REPEATED), "Hello world");
    }

    #[test]
    fn test_segments_skip_empty_cues() {
        let segments = to_segments(REPEATED);
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| !s.text.is_empty()));
        assert_eq!(segments[1].text, "Hello world Hello world");
        assert_eq!(segments[1].start, "00:00:03.000");
    }

    #[test]
    fn test_srt_counts_every_boundary() {
        let srt = format_as_srt(REPEATED);
        let expected = "1
00:00:01,000 --> 00:00:02,000
Hello world

2
00:00:02,000 --> 00:00:02,000

3
00:00:03,000 --> 00:00:04,000
Hello world
Hello world
";
        assert_eq!(srt, expected);
    }

    #[test]
    fn test_malformed_boundary_kept_in_srt_dropped_from_segments() {
        let markup = "WEBVTT

00:00:01.000 --> 00:00:02.000
first

1:2 --> 3:4
odd timing

00:00:03.000 --> 00:00:04.000
last
";
        let srt = format_as_srt(markup);
        let counters: Vec<&str> = srt
            .lines()
            .filter(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_digit()))
            .collect();
        assert_eq!(counters, vec!["1", "2", "3"]);
        assert!(srt.contains("2\n1:2 --> 3:4\nodd timing\n"));

        let segments = to_segments(markup);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[1].text, "last");
        assert!(segments.iter().all(|s| s.text != "odd timing"));

        assert_eq!(format_as_text(markup), "first\nodd timing\nlast");
    }

    #[test]
    fn test_srt_strips_positioning_and_tags() {
        let srt = format_as_srt(AUTO_GENERATED);
        assert!(srt.starts_with("1\n00:00:00,320 --> 00:00:02,270\n"));
        assert!(!srt.contains("align:"));
        assert!(!srt.contains("<c>"));
        let counters: Vec<&str> = srt
            .lines()
            .filter(|l| l.chars().all(|c| c.is_ascii_digit()) && !l.is_empty())
            .collect();
        assert_eq!(counters, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_text_of_auto_generated_track() {
        assert_eq!(
            format_as_text(AUTO_GENERATED),
            "so today we\nare going"
        );
    }

    #[test]
    fn test_text_dedup_is_idempotent() {
        let once = format_as_text(AUTO_GENERATED);
        assert_eq!(format_as_text(&once), once);
        let lines: Vec<&str> = once.lines().collect();
        assert!(lines.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_empty_markup_renders_empty() {
        for markup in ["", "WEBVTT\nKind: captions\n\n"] {
            assert_eq!(format_as_text(markup), "");
            assert_eq!(format_as_srt(markup), "");
            assert!(to_segments(markup).is_empty());
            assert_eq!(format_as_json(markup).unwrap(), "[]");
        }
    }

    #[test]
    fn test_json_shape() {
        let json = format_as_json("00:00:01.000 --> 00:00:02.000\n<b>hi</b>\n").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{ "start": "00:00:01.000", "end": "00:00:02.000", "text": "hi" }])
        );
    }

    #[test]
    fn test_render_dispatches_on_format() {
        let markup = "00:00:01.000 --> 00:00:02.000\nhi\n";
        assert_eq!(render(markup, &TranscriptFormat::Txt).unwrap(), "hi");
        assert!(render(markup, &TranscriptFormat::Srt).unwrap().starts_with("1\n"));
        assert!(render(markup, &TranscriptFormat::Json).unwrap().starts_with('['));
    }
}
