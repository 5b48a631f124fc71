use thiserror::Error;

use crate::youtube::TrackInfo;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("no suitable transcript found; {} available: {}", .available.len(), describe_tracks(.available))]
    NoSuitableTranscript { available: Vec<TrackInfo> },

    #[error("transcript unavailable: {preferred}; listing caption tracks also failed: {listing}")]
    Unavailable { preferred: String, listing: String },

    #[error("failed to fetch {language} captions: {reason}")]
    Fetch { language: String, reason: String },

    #[error("{language} caption track contained no text")]
    Empty { language: String },
}

#[derive(Error, Debug, Clone)]
pub enum SummarizeError {
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),

    #[error("summarization failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("no email credentials configured (checked Vault, environment and credentials file)")]
    MissingCredentials,

    #[error("invalid email address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("email delivery failed: {0}")]
    Transport(String),
}

fn describe_tracks(tracks: &[TrackInfo]) -> String {
    if tracks.is_empty() {
        return "none".to_string();
    }
    tracks
        .iter()
        .map(|t| {
            format!(
                "{} (generated: {}, translatable: {})",
                t.language_code, t.is_generated, t.is_translatable
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, generated: bool, translatable: bool) -> TrackInfo {
        TrackInfo {
            language_code: lang.to_string(),
            is_generated: generated,
            is_translatable: translatable,
            base_url: String::new(),
        }
    }

    #[test]
    fn test_no_suitable_transcript_lists_every_language() {
        let err = RetrievalError::NoSuitableTranscript {
            available: vec![track("fr", false, true), track("ja", false, false)],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 available"));
        assert!(msg.contains("fr (generated: false, translatable: true)"));
        assert!(msg.contains("ja (generated: false, translatable: false)"));
    }

    #[test]
    fn test_no_suitable_transcript_with_zero_tracks() {
        let err = RetrievalError::NoSuitableTranscript { available: vec![] };
        assert_eq!(err.to_string(), "no suitable transcript found; 0 available: none");
    }

    #[test]
    fn test_unavailable_mentions_both_failures() {
        let err = RetrievalError::Unavailable {
            preferred: "no en captions".to_string(),
            listing: "connection refused".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("no en captions"));
        assert!(msg.contains("connection refused"));
    }
}
