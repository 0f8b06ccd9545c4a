use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::translation::TranslationMap;

// @module: WebVTT parsing and export

// @const: VTT timing line, hours optional
static TIMING_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})\s+-->\s+(?:(\d+):)?(\d{2}):(\d{2})\.(\d{3})").unwrap()
});

// @const: Video and subtitle extensions dropped from export names
static EXPORT_EXTENSION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(mp4|mkv|avi|webm|vtt)$").unwrap());

/// Name used when no source filename is known
pub const DEFAULT_EXPORT_FILENAME: &str = "subtitles_ru.vtt";

// @struct: Single timed subtitle cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    // @field: Zero-based position in the track
    pub index: usize,

    // @field: Start time in seconds
    pub start_time: f64,

    // @field: End time in seconds
    pub end_time: f64,

    // @field: Cue text, lines joined with '\n'
    pub text: String,
}

impl Cue {
    pub fn new(index: usize, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Duration of the cue in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} --> {}", format_vtt_time(self.start_time), format_vtt_time(self.end_time))?;
        writeln!(f, "{}", self.text)
    }
}

/// A parsed subtitle file together with the raw text it came from
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Source filename
    pub source_file: PathBuf,

    /// Parsed cues in file order
    pub cues: Vec<Cue>,

    /// Raw file content, used for cache addressing
    pub raw_text: String,

    /// Whether the file already holds Russian text
    pub is_translated: bool,
}

impl SubtitleTrack {
    /// Read and parse a VTT file from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw_text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;

        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        Self::from_string(raw_text, &filename).map(|mut track| {
            track.source_file = path.to_path_buf();
            track
        })
    }

    /// Parse VTT content that came from a file called `filename`
    pub fn from_string(raw_text: String, filename: &str) -> Result<Self> {
        let cues = parse_vtt_string(&raw_text)?;
        let is_translated = is_translated_vtt(filename);

        if is_translated {
            debug!("{} is already translated", filename);
        }

        Ok(Self {
            source_file: PathBuf::from(filename),
            cues,
            raw_text,
            is_translated,
        })
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Source: {:?}", self.source_file)?;
        writeln!(f, "Cues: {}", self.cues.len())?;
        writeln!(f, "Translated: {}", self.is_translated)
    }
}

/// Parse WebVTT content into cues.
///
/// The `WEBVTT` header is required. Cue identifiers, cue settings and
/// NOTE/STYLE/REGION blocks are ignored. Cues are numbered by position.
pub fn parse_vtt_string(content: &str) -> Result<Vec<Cue>> {
    let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");

    let mut blocks = normalized
        .split("\n\n")
        .map(|b| b.trim_matches('\n'))
        .filter(|b| !b.trim().is_empty());

    let header = blocks.next().ok_or_else(|| anyhow!("VTT content is empty"))?;
    if !header.trim_start().starts_with("WEBVTT") {
        return Err(anyhow!("Missing WEBVTT header"));
    }

    let mut cues = Vec::new();

    for block in blocks {
        let lines: Vec<&str> = block.lines().collect();
        let first = lines.first().map(|l| l.trim()).unwrap_or_default();

        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION") {
            continue;
        }

        let Some(timing_pos) = lines.iter().position(|l| l.contains("-->")) else {
            warn!("Skipping VTT block without timing line: {}", first);
            continue;
        };

        let Some((start_time, end_time)) = parse_timing_line(lines[timing_pos].trim()) else {
            warn!("Skipping VTT block with invalid timing: {}", lines[timing_pos]);
            continue;
        };

        if end_time <= start_time {
            warn!("Skipping cue with non-positive duration at {}", lines[timing_pos]);
            continue;
        }

        let text = lines[timing_pos + 1..].iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n");

        cues.push(Cue::new(cues.len(), start_time, end_time, text));
    }

    if cues.is_empty() {
        return Err(anyhow!("No subtitle cues were found in the VTT content"));
    }

    Ok(cues)
}

// @returns: (start, end) in seconds, None when a field is out of range
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let caps = TIMING_REGEX.captures(line)?;
    Some((timestamp_from_captures(&caps, 1)?, timestamp_from_captures(&caps, 5)?))
}

fn timestamp_from_captures(caps: &regex::Captures, start_idx: usize) -> Option<f64> {
    let part = |offset: usize| -> Option<u64> {
        caps.get(start_idx + offset)
            .map_or(Some(0), |m| m.as_str().parse().ok())
    };

    let millis = part(0)?
        .checked_mul(3600)?
        .checked_add(part(1)? * 60 + part(2)?)?
        .checked_mul(1000)?
        .checked_add(part(3)?)?;
    Some(millis as f64 / 1000.0)
}

/// Format seconds as a VTT timestamp (HH:MM:SS.mmm)
pub fn format_vtt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Render cues with their translations as a VTT document.
///
/// Cues without a (non-empty) translation are left out.
pub fn generate_vtt(cues: &[Cue], translations: &TranslationMap) -> String {
    let mut content = String::from("WEBVTT\n\n");

    for cue in cues {
        let Some(translation) = translations.get(&cue.index).filter(|t| !t.is_empty()) else {
            continue;
        };

        content.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_time(cue.start_time),
            format_vtt_time(cue.end_time),
            translation
        ));
    }

    content
}

/// Export filename for a source video or subtitle name: `movie.mp4` becomes `movie_ru.vtt`
pub fn export_filename(original: &str) -> String {
    if original.is_empty() {
        return DEFAULT_EXPORT_FILENAME.to_string();
    }

    let stem = EXPORT_EXTENSION_REGEX.replace(original, "");
    format!("{}_ru.vtt", stem)
}

/// Whether a VTT filename marks an already-translated track
pub fn is_translated_vtt(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with("_ru.vtt") || lower.ends_with(".ru.vtt")
}
