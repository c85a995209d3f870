use once_cell::sync::Lazy;
use regex::Regex;

/// `1h2m30s`, `2m`, `90s`, `12.5` ... every group optional, whole string consumed
static UNIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+(?:\.\d+)?)s?)?$").expect("valid unit regex")
});

/// Errors raised when a time expression cannot be reduced to seconds
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TimeParseError {
    #[error("Expected MM:SS or HH:MM:SS, got {parts} colon-separated parts in '{input}'")]
    PartCount { input: String, parts: usize },

    #[error("Invalid time component '{component}' in '{input}'")]
    InvalidComponent { input: String, component: String },

    #[error("Invalid time expression: '{0}'")]
    Unrecognized(String),
}

/// Parse a human time expression into seconds.
///
/// Accepted shapes, checked in this order:
/// - colon-delimited: `1:30`, `1:02:30`
/// - unit-suffixed: `1h2m30s`, `2m`, `90s`
/// - bare seconds: `12`, `12s`, `0.5`
///
/// Empty input maps to `0.0`.
pub fn parse_time(text: &str) -> Result<f64, TimeParseError> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(0.0);
    }

    if normalized.contains(':') {
        let parts: Vec<&str> = normalized.split(':').collect();
        let component = |part: &str| parse_component(&normalized, part);
        return match parts.as_slice() {
            [mins, secs] => Ok(component(mins)? * 60.0 + component(secs)?),
            [hours, mins, secs] => {
                Ok(component(hours)? * 3600.0 + component(mins)? * 60.0 + component(secs)?)
            }
            _ => Err(TimeParseError::PartCount {
                input: text.to_string(),
                parts: parts.len(),
            }),
        };
    }

    if let Some(caps) = UNIT_PATTERN.captures(&normalized) {
        let group = |idx: usize| -> f64 {
            caps.get(idx)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        return Ok(group(1) * 3600.0 + group(2) * 60.0 + group(3));
    }

    let bare = normalized.trim_end_matches('s');
    match bare.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(TimeParseError::Unrecognized(text.to_string())),
    }
}

fn parse_component(input: &str, part: &str) -> Result<f64, TimeParseError> {
    match part.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(TimeParseError::InvalidComponent {
            input: input.to_string(),
            component: part.to_string(),
        }),
    }
}

/// A time window to cut out of the source media, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRange {
    pub start: f64,
    pub end: Option<f64>,
}

impl ClipRange {
    /// Build a clip from the `--start`, `--duration` and `--end` options.
    ///
    /// `duration` wins over `end` when both are given. Returns `None` when no
    /// option was supplied at all.
    pub fn from_options(
        start: Option<&str>,
        duration: Option<&str>,
        end: Option<&str>,
    ) -> anyhow::Result<Option<Self>> {
        if start.is_none() && duration.is_none() && end.is_none() {
            return Ok(None);
        }

        let start = start.map(parse_time).transpose()?.unwrap_or(0.0);
        let end = match (duration, end) {
            (Some(duration), _) => Some(start + parse_time(duration)?),
            (None, Some(end)) => Some(parse_time(end)?),
            (None, None) => None,
        };

        if let Some(end) = end {
            if end <= start {
                anyhow::bail!("Clip end ({}s) must be after clip start ({}s)", end, start);
            }
        }

        Ok(Some(Self { start, end }))
    }

    /// ffmpeg input arguments selecting this window
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.start > 0.0 {
            args.push("-ss".to_string());
            args.push(self.start.to_string());
        }
        if let Some(end) = self.end {
            args.push("-to".to_string());
            args.push(end.to_string());
        }
        args
    }

    /// One-line summary for console output
    pub fn describe(&self) -> String {
        match self.end {
            Some(end) => format!("{} -> {}", crate::utils::format_timestamp(self.start), crate::utils::format_timestamp(end)),
            None => format!("{} -> end", crate::utils::format_timestamp(self.start)),
        }
    }
}
