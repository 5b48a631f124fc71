use log::{info, warn};
use serde::Serialize;

use crate::error::{RetrievalError, SummarizeError};
use crate::summarize::Summarizer;
use crate::youtube::CaptionSource;
use crate::{Transcript, extract_video_id, output, transcript};

/// Outcome of the optional summarization stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "lowercase")]
pub enum SummaryState {
    Ready(String),
    /// The model could not be loaded
    Unavailable(String),
    /// The model loaded but inference failed
    Failed(String),
    Skipped,
}

impl SummaryState {
    pub fn text(&self) -> Option<&str> {
        match self {
            SummaryState::Ready(text) => Some(text),
            _ => None,
        }
    }
}

/// What the user can do with a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputOption {
    ShowRaw,
    ShowSegmented,
    ShowSummary,
    EmailTranscript,
    EmailSummary,
}

/// Pipeline step about to start, reported to the caller's progress hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Retrieving,
    /// Only reached after a transcript was obtained
    Summarizing,
}

/// Everything one transcription request produced
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub transcript: Transcript,
    pub text: String,
    pub sentences: Vec<String>,
    pub summary: SummaryState,
}

impl RunContext {
    pub fn options(&self) -> Vec<OutputOption> {
        let mut options = vec![OutputOption::ShowRaw, OutputOption::ShowSegmented];
        if self.summary.text().is_some() {
            options.push(OutputOption::ShowSummary);
        }
        options.push(OutputOption::EmailTranscript);
        if self.summary.text().is_some() {
            options.push(OutputOption::EmailSummary);
        }
        options
    }
}

/// Preferred and fallback caption languages for a run
#[derive(Debug, Clone)]
pub struct Languages {
    pub preferred: String,
    pub secondary: String,
}

/// Extract, retrieve, normalize and optionally summarize one video reference.
///
/// Retrieval failure ends the run before the summarizer is touched. A
/// summarizer problem is recorded in [`RunContext::summary`] and the run
/// still succeeds.
pub async fn run(
    source: &dyn CaptionSource,
    summarizer: Option<&Summarizer>,
    reference: &str,
    languages: &Languages,
    progress: &dyn Fn(Stage),
) -> Result<RunContext, RetrievalError> {
    let video_id = extract_video_id(reference);
    info!("Processing {reference} as video {video_id}");

    progress(Stage::Retrieving);
    let transcript = transcript::retrieve(source, &video_id, &languages.preferred, &languages.secondary).await?;
    if transcript.language != languages.preferred {
        info!(
            "Requested {} captions, got {} instead",
            languages.preferred, transcript.language
        );
    }

    let text = output::render_raw(&transcript);
    let sentences = output::segment_sentences(&text);

    let summary = match summarizer {
        None => SummaryState::Skipped,
        Some(summarizer) => {
            progress(Stage::Summarizing);
            match summarizer.summarize(&text).await {
                Ok(summary) => SummaryState::Ready(summary),
                Err(SummarizeError::Unavailable(reason)) => {
                    warn!("Continuing without summary: {reason}");
                    SummaryState::Unavailable(reason)
                }
                Err(SummarizeError::Inference(reason)) => {
                    warn!("Summary failed: {reason}");
                    SummaryState::Failed(reason)
                }
            }
        }
    };

    Ok(RunContext {
        transcript,
        text,
        sentences,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::summarize::tests::{echo_model, summarizer};
    use crate::transcript::tests::{FakeSource, entries, track};

    fn langs(preferred: &str) -> Languages {
        Languages {
            preferred: preferred.to_string(),
            secondary: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_short_link_preferred_language() {
        let source = FakeSource::new(vec![(track("en", false), entries("Hello there. General Kenobi."))]);
        let model = echo_model(false);
        let (s, _) = summarizer(Some(model.clone()), 4000);

        let ctx = run(&source, Some(&s), "https://youtu.be/ABC123?t=5", &langs("en"), &|_: Stage| {})
            .await
            .unwrap();

        assert_eq!(ctx.transcript.video_id, "ABC123");
        assert_eq!(ctx.transcript.language, "en");
        assert_eq!(ctx.text, "Hello there. General Kenobi.");
        assert_eq!(ctx.sentences, vec!["Hello there", "General Kenobi."]);
        assert!(matches!(ctx.summary, SummaryState::Ready(_)));
        assert!(ctx.options().contains(&OutputOption::ShowSummary));
        assert!(ctx.options().contains(&OutputOption::EmailSummary));
    }

    #[tokio::test]
    async fn test_summary_options_hidden_without_model() {
        let source = FakeSource::new(vec![(track("en", false), entries("Hello there."))]);
        let (s, _) = summarizer(None, 4000);

        let ctx = run(&source, Some(&s), "https://youtu.be/ABC123?t=5", &langs("en"), &|_: Stage| {})
            .await
            .unwrap();

        assert!(matches!(ctx.summary, SummaryState::Unavailable(_)));
        assert_eq!(
            ctx.options(),
            vec![
                OutputOption::ShowRaw,
                OutputOption::ShowSegmented,
                OutputOption::EmailTranscript
            ]
        );
    }

    #[tokio::test]
    async fn test_generated_fallback_is_summarized() {
        let source = FakeSource::new(vec![(track("de", true), entries("Guten Tag. Wie geht es."))]);
        let model = echo_model(false);
        let (s, _) = summarizer(Some(model.clone()), 4000);

        let ctx = run(&source, Some(&s), "https://youtu.be/ABC123?t=5", &langs("en"), &|_: Stage| {})
            .await
            .unwrap();

        assert_eq!(ctx.transcript.language, "de");
        assert_eq!(ctx.text, "Guten Tag. Wie geht es.");
        assert_eq!(model.inputs.lock().unwrap().as_slice(), ["Guten Tag. Wie geht es."]);
        assert!(ctx.summary.text().is_some());
    }

    #[tokio::test]
    async fn test_no_tracks_aborts_before_summary() {
        let source = FakeSource::new(vec![]);
        let model = echo_model(false);
        let (s, calls) = summarizer(Some(model.clone()), 4000);

        let err = run(&source, Some(&s), "https://youtu.be/ABC123?t=5", &langs("en"), &|_: Stage| {})
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no suitable transcript"));
        assert!(err.to_string().contains("0 available"));
        assert!(model.inputs.lock().unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stages_reported_in_order() {
        let source = FakeSource::new(vec![(track("en", false), entries("Hello there."))]);
        let (s, calls) = summarizer(Some(echo_model(false)), 4000);
        let seen = Mutex::new(Vec::new());

        run(&source, Some(&s), "ABC123", &langs("en"), &|stage: Stage| seen.lock().unwrap().push(stage))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Stage::Retrieving, Stage::Summarizing]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_retrieval_never_reaches_summarizing() {
        let source = FakeSource::new(vec![(track("fr", false), entries("Bonjour."))]);
        let (s, calls) = summarizer(Some(echo_model(false)), 4000);
        let seen = Mutex::new(Vec::new());

        let result = run(&source, Some(&s), "ABC123", &langs("de"), &|stage: Stage| seen.lock().unwrap().push(stage)).await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![Stage::Retrieving]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!s.is_available());
    }

    #[tokio::test]
    async fn test_inference_failure_degrades() {
        let source = FakeSource::new(vec![(track("en", false), entries("Some words."))]);
        let (s, _) = summarizer(Some(echo_model(true)), 4000);

        let ctx = run(&source, Some(&s), "ABC123", &langs("en"), &|_: Stage| {}).await.unwrap();
        assert!(matches!(ctx.summary, SummaryState::Failed(_)));
        assert!(!ctx.options().contains(&OutputOption::ShowSummary));
    }

    #[tokio::test]
    async fn test_summary_skipped_without_summarizer() {
        let source = FakeSource::new(vec![(track("en", false), entries("Some words."))]);
        let ctx = run(&source, None, "ABC123", &langs("en"), &|_: Stage| {}).await.unwrap();
        assert_eq!(ctx.summary, SummaryState::Skipped);
    }

    #[tokio::test]
    async fn test_long_transcript_truncated_for_model() {
        let words = vec!["word"; 2000].join(" ");
        let source = FakeSource::new(vec![(track("en", false), entries(&words))]);
        let model = echo_model(false);
        let (s, _) = summarizer(Some(model.clone()), 4000);

        let ctx = run(&source, Some(&s), "ABC123", &langs("en"), &|_: Stage| {}).await.unwrap();
        assert_eq!(ctx.text.chars().count(), 9999);
        assert_eq!(model.inputs.lock().unwrap()[0].chars().count(), 4000);
    }

    #[tokio::test]
    async fn test_json_rendering_includes_entries() {
        let source = FakeSource::new(vec![(track("en", false), entries("Hi."))]);
        let ctx = run(&source, None, "ABC123", &langs("en"), &|_: Stage| {}).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&output::render_json(&ctx).unwrap()).unwrap();
        assert_eq!(json["transcript"]["video_id"], "ABC123");
        assert_eq!(json["transcript"]["language"], "en");
        assert!(json.get("video_id").is_none());
        assert!(json.get("language").is_none());
        assert_eq!(json["transcript"]["entries"][0]["text"], "Hi.");
        assert_eq!(json["summary"]["status"], "skipped");
    }
}
