use anyhow::{anyhow, Result};
use isolang::Language;

/// Language utilities for the fixed translation pair
///
/// The pipeline always translates English into Russian; these helpers turn
/// the ISO 639-1 codes into the names used in prompts and log output.

/// ISO 639-1 code of the subtitle source language
pub const SOURCE_LANGUAGE: &str = "en";

/// ISO 639-1 code of the translation target language
pub const TARGET_LANGUAGE: &str = "ru";

/// Resolve an ISO 639-1 or ISO 639-3 code to a language
fn resolve(code: &str) -> Result<Language> {
    let normalized = code.trim().to_lowercase();

    let language = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    };

    language.ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    Ok(resolve(code)?.to_name().to_string())
}

/// Names of the source and target languages, in that order
pub fn pair_names() -> (String, String) {
    let name = |code: &str| get_language_name(code).unwrap_or_else(|_| code.to_string());
    (name(SOURCE_LANGUAGE), name(TARGET_LANGUAGE))
}
