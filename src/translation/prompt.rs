/*!
 * Prompt template for batch subtitle translation.
 *
 * The model receives the batch as a pretty-printed JSON array and is told to
 * answer with a JSON array of the same length and order, nothing else.
 */

use crate::language_utils;

/// Batch translation prompt with placeholders
pub const BATCH_TRANSLATION_TEMPLATE: &str = r#"You are a professional translator specializing in subtitles for programming tutorials.

TASK: Translate these {source_language} subtitles to {target_language}.

INPUT (JSON array):
{input_json}

RULES:
1. Return ONLY a JSON array with translations
2. Keep the EXACT same number of items ({count} items)
3. Preserve the order
4. Keep translations natural and conversational
5. Do NOT add markdown, explanations, or extra text

OUTPUT FORMAT:
["перевод 1", "перевод 2", ...]

Translate NOW:"#;

/// Render the batch prompt for the given texts and language names
pub fn render_batch_prompt(texts: &[String], source_language: &str, target_language: &str) -> String {
    // Serializing a slice of strings cannot fail
    let input_json = serde_json::to_string_pretty(texts).unwrap_or_else(|_| "[]".to_string());

    BATCH_TRANSLATION_TEMPLATE
        .replace("{source_language}", source_language)
        .replace("{target_language}", target_language)
        .replace("{count}", &texts.len().to_string())
        .replace("{input_json}", &input_json)
}

/// Render the batch prompt for the fixed English to Russian pair
pub fn build_batch_prompt(texts: &[String]) -> String {
    let (source, target) = language_utils::pair_names();
    render_batch_prompt(texts, &source, &target)
}
