//! Minimal subtitle parsing and rendering.
//!
//! LRC is the system's interchange format (`[mm:ss.xx]text` lines); SRT
//! and JSON are alternative renderings for transcription output.

use serde::{Deserialize, Serialize};

use crate::orchestration::types::OutputFormat;

/// Duration assigned to an LRC line when the next timestamp does not
/// bound it.
const DEFAULT_ENTRY_SECS: f64 = 3.0;

/// A timed subtitle line. Times are seconds from the start of the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Parse LRC content into entries.
///
/// Lines that do not carry a `[mm:ss.xx]` timestamp (metadata tags like
/// `[ti:...]`, blanks, malformed lines) are skipped, not errors. An
/// entry ends where the next one starts, or after a default duration
/// for the last line.
pub fn parse_lrc(content: &str) -> Vec<SubtitleEntry> {
    let mut entries: Vec<SubtitleEntry> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('[') else {
            continue;
        };
        let Some((time_str, text)) = rest.split_once(']') else {
            continue;
        };
        let Some(start) = parse_timestamp(time_str) else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        entries.push(SubtitleEntry {
            start,
            end: start + DEFAULT_ENTRY_SECS,
            text: text.to_owned(),
        });
    }

    // Tighten each end time to the start of the following entry.
    for i in 0..entries.len().saturating_sub(1) {
        let next_start = entries[i + 1].start;
        if next_start > entries[i].start && next_start < entries[i].end {
            entries[i].end = next_start;
        }
    }
    entries
}

/// `mm:ss` or `mm:ss.xx` → seconds. Returns `None` for anything else
/// (including LRC metadata tags, whose "minutes" field is not numeric).
fn parse_timestamp(time_str: &str) -> Option<f64> {
    let (minutes, seconds) = time_str.split_once(':')?;
    let minutes: f64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(minutes * 60.0 + seconds)
}

/// Render entries as an LRC document.
pub fn render_lrc(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let minutes = (entry.start / 60.0).floor() as u64;
        let seconds = entry.start - (minutes as f64) * 60.0;
        out.push_str(&format!("[{minutes:02}:{seconds:05.2}]{}\n", entry.text));
    }
    out
}

/// Render entries as an SRT document.
pub fn render_srt(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for (index, entry) in entries.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            srt_timestamp(entry.start),
            srt_timestamp(entry.end),
            entry.text
        ));
    }
    out
}

fn srt_timestamp(seconds: f64) -> String {
    let total_millis = (seconds * 1000.0).round() as u64;
    let h = total_millis / 3_600_000;
    let m = (total_millis % 3_600_000) / 60_000;
    let s = (total_millis % 60_000) / 1000;
    let ms = total_millis % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Render entries in the requested output format. JSON output is the
/// serialized entry list.
pub fn render(entries: &[SubtitleEntry], format: OutputFormat) -> String {
    match format {
        OutputFormat::Lrc => render_lrc(entries),
        OutputFormat::Srt => render_srt(entries),
        OutputFormat::Json => {
            serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "[ti:ignored metadata]\n[00:01.50]first line\n\n[00:03.00]second line\nnot a timestamp\n[00:10.25]last line\n";

    #[test]
    fn parse_lrc_skips_metadata_and_malformed_lines() {
        let entries = parse_lrc(SAMPLE);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].text, "first line");
        assert!((entries[0].start - 1.5).abs() < 1e-9);
        // Bounded by the next entry's start.
        assert!((entries[0].end - 3.0).abs() < 1e-9);
        // Last entry gets the default duration.
        assert!((entries[2].end - (10.25 + DEFAULT_ENTRY_SECS)).abs() < 1e-9);
    }

    #[test]
    fn parse_lrc_empty_input_yields_no_entries() {
        assert!(parse_lrc("").is_empty());
        assert!(parse_lrc("no timestamps here\nat all\n").is_empty());
    }

    #[test]
    fn lrc_render_round_trips_through_parse() {
        let entries = parse_lrc(SAMPLE);
        let rendered = render_lrc(&entries);
        let reparsed = parse_lrc(&rendered);
        assert_eq!(entries.len(), reparsed.len());
        for (a, b) in entries.iter().zip(&reparsed) {
            assert_eq!(a.text, b.text);
            assert!((a.start - b.start).abs() < 0.01);
        }
    }

    #[test]
    fn srt_render_formats_timestamps() {
        let entries = vec![SubtitleEntry {
            start: 61.5,
            end: 63.0,
            text: "hello".to_owned(),
        }];
        let srt = render_srt(&entries);
        assert!(srt.starts_with("1\n00:01:01,500 --> 00:01:03,000\nhello\n"));
    }

    #[test]
    fn json_render_is_parseable() {
        let entries = parse_lrc(SAMPLE);
        let json = render(&entries, OutputFormat::Json);
        let parsed: Vec<SubtitleEntry> = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed, entries);
    }
}
