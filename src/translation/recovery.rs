/*!
 * Recovery of translation arrays from free-form model output.
 *
 * Models are asked for a bare JSON array of strings but regularly wrap it in
 * markdown fences, double-escape it, get cut off mid-array or bury it in
 * prose. The pipeline below tries progressively looser strategies, stopping
 * at the first one that yields a non-empty array:
 *
 * 1. strip code fences and parse as JSON
 * 2. repair escaping artifacts and parse again
 * 3. cut a truncated array back to its last complete string and close it
 * 4. parse the outermost `[` .. `]` span, or scan for quoted strings
 * 5. give up and emit error placeholders
 *
 * Whatever is recovered is then padded or truncated to the expected count.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Placeholder for slots whose response could not be parsed at all
pub const TRANSLATION_ERROR_PLACEHOLDER: &str = "[Translation error]";

/// Placeholder for slots the model did not answer
pub const TRANSLATION_PENDING_PLACEHOLDER: &str = "[Translation pending]";

static CODE_FENCE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static QUOTED_STRING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap());

/// How the translations were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// The response was a well-formed array of the expected length
    Parsed,
    /// Something was recovered, but only after repairs or count reconciliation
    PartiallyRecovered,
    /// Nothing could be recovered; every slot holds a placeholder
    Failed,
}

/// Result of running the recovery pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// Recovery status
    pub status: ParseStatus,
    /// Exactly `expected` translations
    pub data: Vec<String>,
}

impl ParseOutcome {
    fn failed(expected: usize) -> Self {
        Self {
            status: ParseStatus::Failed,
            data: vec![TRANSLATION_ERROR_PLACEHOLDER.to_string(); expected],
        }
    }
}

/// Recover exactly `expected` translations from a raw model response
pub fn recover_translations(text: &str, expected: usize) -> ParseOutcome {
    if expected == 0 {
        return ParseOutcome {
            status: ParseStatus::Parsed,
            data: Vec::new(),
        };
    }

    if text.trim().is_empty() {
        warn!("Empty model response, using {} error placeholders", expected);
        return ParseOutcome::failed(expected);
    }

    let cleaned = strip_code_fences(text);

    if let Some(items) = parse_string_array(&cleaned) {
        debug!("Parsed response directly: {} items", items.len());
        let exact = items.len() == expected;
        return finish(items, expected, exact);
    }

    if let Some(items) = parse_string_array(&repair_escaping(&cleaned)) {
        debug!("Parsed response after escape repair: {} items", items.len());
        return finish(items, expected, false);
    }

    if let Some(items) = repair_truncation(&cleaned).and_then(|fixed| parse_string_array(&fixed)) {
        debug!("Parsed truncated response: {} items", items.len());
        return finish(items, expected, false);
    }

    let items = brute_force_extract(&cleaned);
    if !items.is_empty() {
        warn!("Recovered {} items by brute-force extraction", items.len());
        return finish(items, expected, false);
    }

    warn!("All recovery strategies failed, using {} error placeholders", expected);
    ParseOutcome::failed(expected)
}

fn finish(items: Vec<String>, expected: usize, exact: bool) -> ParseOutcome {
    let status = if exact {
        ParseStatus::Parsed
    } else {
        ParseStatus::PartiallyRecovered
    };

    ParseOutcome {
        status,
        data: reconcile_count(items, expected),
    }
}

/// Pad with pending placeholders or truncate to exactly `expected` items
pub fn reconcile_count(mut items: Vec<String>, expected: usize) -> Vec<String> {
    if items.len() < expected {
        warn!("Got {}/{} translations, padding", items.len(), expected);
        items.resize(expected, TRANSLATION_PENDING_PLACEHOLDER.to_string());
    } else if items.len() > expected {
        warn!("Got {}/{} translations, trimming", items.len(), expected);
        items.truncate(expected);
    }
    items
}

/// Remove markdown code fences (with or without a `json` tag)
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE_REGEX.replace_all(text.trim(), "").trim().to_string()
}

/// Parse a non-empty JSON array; non-string items keep their JSON rendering
fn parse_string_array(text: &str) -> Option<Vec<String>> {
    let values: Vec<Value> = serde_json::from_str(text).ok()?;
    if values.is_empty() {
        return None;
    }

    Some(
        values
            .into_iter()
            .map(|value| match value {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
    )
}

/// Undo common escaping artifacts: literal `\n`, whitespace runs, `\ "`
fn repair_escaping(text: &str) -> String {
    let without_newlines = text.replace("\\n", " ");
    let collapsed = WHITESPACE_REGEX.replace_all(&without_newlines, " ");
    collapsed.replace("\\ \"", "\"")
}

/// Close an array that was cut off mid-stream.
///
/// Returns `None` when the text already ends with `]` or holds no complete
/// string to cut back to.
fn repair_truncation(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    if trimmed.ends_with(']') {
        return None;
    }

    let mut quote_count = 0usize;
    let mut last_closing = None;
    let mut escaped = false;

    for (pos, ch) in trimmed.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => {
                quote_count += 1;
                if quote_count % 2 == 0 {
                    last_closing = Some(pos);
                }
            }
            _ => {}
        }
    }

    last_closing.map(|pos| format!("{}]", &trimmed[..=pos]))
}

/// Last-resort extraction from arbitrary text
fn brute_force_extract(text: &str) -> Vec<String> {
    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if end > start {
            if let Some(items) = parse_string_array(&text[start..=end]) {
                return items;
            }
        }
    }

    QUOTED_STRING_REGEX
        .captures_iter(text)
        .filter_map(|caps| {
            let unescaped = unescape(caps.get(1)?.as_str());
            let trimmed = unescaped.trim();
            (trimmed.chars().count() > 2).then(|| trimmed.to_string())
        })
        .collect()
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }

        match chars.next() {
            Some('"') => result.push('"'),
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
