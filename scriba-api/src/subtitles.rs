//! Heuristic subtitle generation
//!
//! Used when no provider-native subtitle export exists for a transcript.
//! The transcript is split into sentences on terminal punctuation; each
//! sentence becomes one cue whose duration is proportional to its length,
//! clamped to [2, 5] seconds, and cues are laid out back-to-back from t=0.

use std::fmt;

/// Seconds of display time per 20 characters of text
const CHARS_PER_SECOND: f64 = 20.0;
/// Shortest cue duration in seconds
const MIN_CUE_SECONDS: f64 = 2.0;
/// Longest cue duration in seconds
const MAX_CUE_SECONDS: f64 = 5.0;

/// Supported subtitle file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "srt" => Some(SubtitleFormat::Srt),
            "vtt" => Some(SubtitleFormat::Vtt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }

    /// MIME type served with the file body
    pub fn content_type(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "application/x-subrip",
            SubtitleFormat::Vtt => "text/vtt",
        }
    }

    /// Fraction separator mandated by each format's standard
    fn fraction_separator(&self) -> char {
        match self {
            SubtitleFormat::Srt => ',',
            SubtitleFormat::Vtt => '.',
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a complete subtitle file body from plain transcript text
pub fn generate(text: &str, format: SubtitleFormat) -> String {
    let sentences = split_sentences(text);

    let mut output = match format {
        SubtitleFormat::Vtt => "WEBVTT\n\n".to_string(),
        SubtitleFormat::Srt => String::new(),
    };

    let mut start_time = 0.0_f64;
    for (index, sentence) in sentences.iter().enumerate() {
        let end_time = start_time + cue_duration(sentence.chars().count());

        if format == SubtitleFormat::Srt {
            output.push_str(&format!("{}\n", index + 1));
        }
        output.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(start_time, format),
            format_timestamp(end_time, format),
            sentence.trim()
        ));

        start_time = end_time;
    }

    output
}

/// Cue display duration for a sentence of `len` characters (not bytes)
pub fn cue_duration(len: usize) -> f64 {
    (len as f64 / CHARS_PER_SECOND).clamp(MIN_CUE_SECONDS, MAX_CUE_SECONDS)
}

/// Split transcript text into sentences on terminal punctuation.
///
/// Each returned chunk keeps its trailing punctuation (runs like "?!" stay
/// attached to one sentence). A trailing fragment without terminal
/// punctuation is dropped; only text with no terminal punctuation at all
/// is returned whole, as a single sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut in_terminal_run = false;

    for ch in text.chars() {
        let terminal = matches!(ch, '.' | '!' | '?');
        if in_terminal_run && !terminal {
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            in_terminal_run = false;
        }
        current.push(ch);
        if terminal {
            in_terminal_run = true;
        }
    }

    if in_terminal_run {
        sentences.push(current);
    } else if sentences.is_empty() && !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Format a seconds value as `hh:mm:ss{sep}mmm`, zero-padded, with the
/// fraction separator the format requires.
pub fn format_timestamp(seconds: f64, format: SubtitleFormat) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours,
        minutes,
        secs,
        format.fraction_separator(),
        millis
    )
}
