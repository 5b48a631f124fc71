use clap::Parser;
use std::path::PathBuf;

use ytdigest::summarize::Backend;

pub const SUPPORTED_LANGS: [&str; 6] = ["en", "de", "es", "fr", "it", "pt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Show {
    /// Transcript as one block of text
    Raw,
    /// Transcript split into sentences, one per line
    Segmented,
    /// Model summary (when a summarizer is available)
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EmailContent {
    Transcript,
    Summary,
}

#[derive(Parser)]
#[command(
    name = "ytdigest",
    about = "Fetch, summarize and email YouTube transcripts",
    version
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads one per line from stdin if omitted)
    pub url: Option<String>,

    /// Preferred caption language
    #[arg(short, long, value_parser = SUPPORTED_LANGS)]
    pub lang: Option<String>,

    /// What to print (repeatable)
    #[arg(short, long, value_enum, default_values_t = vec![Show::Raw])]
    pub show: Vec<Show>,

    /// Print the whole run as JSON instead
    #[arg(long)]
    pub json: bool,

    /// Skip summarization entirely
    #[arg(long)]
    pub no_summary: bool,

    /// Summarization backend
    #[arg(long, value_enum)]
    pub summarizer: Option<Backend>,

    /// Email the result to this address
    #[arg(long, value_name = "ADDRESS")]
    pub email_to: Option<String>,

    /// What to put in the email body
    #[arg(long, value_enum, default_value_t = EmailContent::Transcript)]
    pub email_content: EmailContent,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show extraction details on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["ytdigest", "https://youtu.be/ABC123"]).unwrap();
        assert_eq!(cli.url.as_deref(), Some("https://youtu.be/ABC123"));
        assert_eq!(cli.show, vec![Show::Raw]);
        assert_eq!(cli.email_content, EmailContent::Transcript);
        assert!(cli.lang.is_none());
        assert!(!cli.no_summary);
    }

    #[test]
    fn test_repeated_show() {
        let cli = Cli::try_parse_from(["ytdigest", "ABC", "-s", "segmented", "-s", "summary"]).unwrap();
        assert_eq!(cli.show, vec![Show::Segmented, Show::Summary]);
    }

    #[test]
    fn test_unsupported_language_rejected() {
        assert!(Cli::try_parse_from(["ytdigest", "ABC", "--lang", "xx"]).is_err());
    }

    #[test]
    fn test_email_options() {
        let cli = Cli::try_parse_from([
            "ytdigest",
            "ABC",
            "--email-to",
            "me@example.com",
            "--email-content",
            "summary",
            "--summarizer",
            "openai",
        ])
        .unwrap();
        assert_eq!(cli.email_to.as_deref(), Some("me@example.com"));
        assert_eq!(cli.email_content, EmailContent::Summary);
        assert_eq!(cli.summarizer, Some(Backend::OpenAi));
    }
}
