use eyre::Result;

use crate::Transcript;
use crate::pipeline::RunContext;

const SENTENCE_BREAK: &str = ". ";

/// Fragments ending in one of these are not treated as a sentence end
const ABBREVIATIONS: &[&str] = &["mr", "mrs", "ms", "dr", "prof", "st", "vs", "etc", "e.g", "i.e"];

/// Render transcript as one space-joined blob
pub fn render_raw(transcript: &Transcript) -> String {
    transcript.text()
}

/// Split text into sentences on `". "` boundaries.
///
/// A break directly after a common abbreviation, or one that would leave an
/// empty fragment, is not a sentence end. Joining the result with `". "`
/// gives back the trimmed input.
pub fn segment_sentences(text: &str) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;

    for fragment in text.trim().split(SENTENCE_BREAK) {
        let current = match pending.take() {
            Some(mut head) => {
                head.push_str(SENTENCE_BREAK);
                head.push_str(fragment);
                head
            }
            None => fragment.to_string(),
        };

        if fragment.is_empty() || ends_with_abbreviation(&current) {
            pending = Some(current);
        } else {
            sentences.push(current);
        }
    }

    if let Some(rest) = pending.filter(|r| !r.is_empty()) {
        sentences.push(rest);
    }
    sentences
}

fn ends_with_abbreviation(fragment: &str) -> bool {
    let last_word = fragment.rsplit(' ').next().unwrap_or("").to_lowercase();
    ABBREVIATIONS.contains(&last_word.as_str())
}

/// Render sentences one per line
pub fn render_segmented(sentences: &[String]) -> String {
    sentences.join("\n")
}

/// Render the whole run, caption entries included, as pretty JSON
pub fn render_json(ctx: &RunContext) -> Result<String> {
    Ok(serde_json::to_string_pretty(ctx)?)
}
