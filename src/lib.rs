pub mod config;
pub mod error;
pub mod notify;
pub mod output;
pub mod pipeline;
pub mod secrets;
pub mod summarize;
pub mod transcript;
pub mod youtube;

use serde::Serialize;

/// A single timed caption fragment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionEntry {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Caption entries for a video plus the language they were actually obtained in
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    pub language: String,
    pub entries: Vec<CaptionEntry>,
}

impl Transcript {
    /// All entry texts joined by single spaces; timing is dropped
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

const SHORT_LINK_MARKER: &str = "youtu.be/";
const LONG_LINK_MARKER: &str = "youtube.com";

/// Extract a video ID from a short link, a watch link, or return the input as-is.
///
/// Nothing here checks the shape of the ID; a bad ID fails later at retrieval.
pub fn extract_video_id(input: &str) -> String {
    let input = input.trim();

    if input.contains(SHORT_LINK_MARKER) {
        let tail = input.rsplit('/').next().unwrap_or(input);
        return tail.split('?').next().unwrap_or(tail).to_string();
    }

    if input.contains(LONG_LINK_MARKER) {
        if let Some(pos) = input.find("v=") {
            let value = &input[pos + 2..];
            return value.split('&').next().unwrap_or(value).to_string();
        }
    }

    input.to_string()
}
