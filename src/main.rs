use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

mod cli;

use cli::{Cli, EmailContent, Show};
use ytdigest::config::Config;
use ytdigest::notify::{self, Notifier, SmtpRelay};
use ytdigest::pipeline::{self, Languages, OutputOption, RunContext, Stage, SummaryState};
use ytdigest::summarize::{self, Backend, BackendLoader, Summarizer, SummaryLength};
use ytdigest::youtube::InnerTubeSource;
use ytdigest::{output, secrets};

const DEFAULT_LANG: &str = "en";

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytdigest.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytdigest")
        .join("logs")
}

fn env_status(names: &[&str]) -> String {
    match names.iter().find(|n| std::env::var(n).is_ok()) {
        Some(name) => format!("  \x1b[32m✅\x1b[0m {name}"),
        None => format!("  \x1b[31m❌\x1b[0m {}", names.join(" / ")),
    }
}

fn build_after_help() -> String {
    format!(
        "\nSUMMARIZER KEYS:\n{}\n{}\n{}\n\nEMAIL CREDENTIALS (first match wins):\n{}\n{}\n  credentials file: {}\n\nConfig: {}\nLogs are written to: {}",
        env_status(&["HF_TOKEN", "HUGGINGFACE_API_TOKEN"]),
        env_status(&["ANTHROPIC_API_KEY"]),
        env_status(&["OPENAI_API_KEY"]),
        env_status(&["VAULT_ADDR"]),
        env_status(&["YTDIGEST_SMTP_USER"]),
        secrets::credentials_path().display(),
        ytdigest::config::config_path().display(),
        log_dir().join("ytdigest.log").display(),
    )
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn build_summarizer(cli: &Cli, config: &Config, client: &reqwest::Client) -> Option<Summarizer> {
    let backend = cli.summarizer.or(config.summarizer).unwrap_or_default();
    if cli.no_summary || backend == Backend::None {
        debug!("Summarization disabled");
        return None;
    }

    let defaults = SummaryLength::default();
    let length = SummaryLength {
        min: config.summary_min_length.unwrap_or(defaults.min),
        max: config.summary_max_length.unwrap_or(defaults.max),
    };
    let loader = BackendLoader::new(client.clone(), backend, config.summary_model.clone());
    Some(Summarizer::new(
        Box::new(loader),
        config.max_input_chars.unwrap_or(summarize::DEFAULT_MAX_INPUT_CHARS),
        length,
    ))
}

/// Spinner text for a pipeline stage; the first summarization also loads the model
fn stage_message(stage: Stage, reference: &str, summarizer: Option<&Summarizer>) -> String {
    match stage {
        Stage::Retrieving => format!("Transcribing {reference}..."),
        Stage::Summarizing if summarizer.is_some_and(|s| !s.is_available()) => {
            "Loading summarization model and summarizing...".to_string()
        }
        Stage::Summarizing => "Summarizing...".to_string(),
    }
}

/// Truncate the output file once so every run in this invocation lands in it
fn open_output(path: &Path) -> Result<File> {
    Ok(File::create(path)?)
}

fn emit(out: &mut impl Write, rendered: &str) -> Result<()> {
    writeln!(out, "{rendered}")?;
    Ok(())
}

async fn build_notifier(config: &Config, client: &reqwest::Client) -> Notifier {
    let stores = secrets::default_stores(client.clone(), config.vault_path.clone());
    let credentials = secrets::resolve(&stores).await;
    let relay = SmtpRelay::new(
        config.smtp_host.clone().unwrap_or_else(|| notify::DEFAULT_SMTP_HOST.to_string()),
        config.smtp_port.unwrap_or(notify::DEFAULT_SMTP_PORT),
    );
    Notifier::new(Box::new(relay), credentials, config.email_sender.clone())
}

fn render(cli: &Cli, ctx: &RunContext) -> Result<String> {
    if cli.json {
        return output::render_json(ctx);
    }

    let mut sections = Vec::new();
    for show in &cli.show {
        match show {
            Show::Raw => sections.push(ctx.text.clone()),
            Show::Segmented => sections.push(output::render_segmented(&ctx.sentences)),
            Show::Summary => match &ctx.summary {
                SummaryState::Ready(text) => sections.push(format!("--- Summary ---\n{text}")),
                SummaryState::Skipped => eprintln!("Summary not available: summarization disabled"),
                SummaryState::Unavailable(reason) | SummaryState::Failed(reason) => {
                    eprintln!("Summary not available: {reason}")
                }
            },
        }
    }
    Ok(sections.join("\n\n"))
}

async fn deliver(notifier: &Notifier, recipient: &str, subject: &str, content: EmailContent, ctx: &RunContext) {
    let body = match content {
        EmailContent::Transcript => ctx.text.as_str(),
        EmailContent::Summary => {
            if !ctx.options().contains(&OutputOption::EmailSummary) {
                eprintln!("Cannot email summary: no summary was produced for {}", ctx.transcript.video_id);
                return;
            }
            ctx.summary.text().unwrap_or_default()
        }
    };

    match notifier.send(recipient, subject, body).await {
        Ok(request) => eprintln!("Email sent to {}", request.recipient),
        Err(e) => eprintln!("Error sending email: {e}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_default();

    let languages = Languages {
        preferred: cli
            .lang
            .clone()
            .or_else(|| config.default_lang.clone())
            .unwrap_or_else(|| DEFAULT_LANG.to_string()),
        secondary: config.fallback_lang.clone().unwrap_or_else(|| DEFAULT_LANG.to_string()),
    };

    if cli.verbose {
        let config_path = ytdigest::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Languages: {} (fallback {})", languages.preferred, languages.secondary);
    }

    let client = reqwest::Client::new();
    let source = InnerTubeSource::new(client.clone());

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };
    let urls: Vec<String> = urls.into_iter().map(|u| u.trim().to_string()).filter(|u| !u.is_empty()).collect();

    if urls.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytdigest <URL>\n       echo <URL> | ytdigest");
    }

    let summarizer = build_summarizer(&cli, &config, &client);
    let mut out_file = match cli.output {
        Some(ref path) => Some(open_output(path)?),
        None => None,
    };

    let notifier = match cli.email_to {
        Some(_) => Some(build_notifier(&config, &client).await),
        None => None,
    };
    if let Some(ref notifier) = notifier {
        if !notifier.has_credentials() {
            eprintln!("Warning: no email credentials found; email will not be sent");
        }
    }
    let subject = config
        .email_subject
        .clone()
        .unwrap_or_else(|| notify::DEFAULT_SUBJECT.to_string());

    let mut failures = 0;
    let mut warned_unavailable = false;
    for reference in &urls {
        let spinner = create_spinner(&stage_message(Stage::Retrieving, reference, None));
        let progress = |stage: Stage| spinner.set_message(stage_message(stage, reference, summarizer.as_ref()));
        let result = pipeline::run(&source, summarizer.as_ref(), reference, &languages, &progress).await;
        spinner.finish_and_clear();

        let ctx = match result {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("Error: {reference}: {e}");
                failures += 1;
                continue;
            }
        };

        if cli.verbose {
            eprintln!(
                "Video: {}\nLanguage: {}\nEntries: {}\nSentences: {}\nOptions: {:?}",
                ctx.transcript.video_id,
                ctx.transcript.language,
                ctx.transcript.entries.len(),
                ctx.sentences.len(),
                ctx.options(),
            );
        }

        if let SummaryState::Unavailable(ref reason) = ctx.summary {
            if !warned_unavailable {
                eprintln!("Summarizer unavailable ({reason}); continuing with transcript only");
                warned_unavailable = true;
            }
        }

        let rendered = render(&cli, &ctx)?;
        if let Some(ref mut file) = out_file {
            emit(file, &rendered)?;
            if cli.verbose {
                if let Some(ref path) = cli.output {
                    eprintln!("Output appended to: {}", path.display());
                }
            }
        } else if !rendered.is_empty() {
            println!("{rendered}");
        }

        if let (Some(notifier), Some(recipient)) = (&notifier, &cli.email_to) {
            deliver(notifier, recipient, &subject, cli.email_content, &ctx).await;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} transcription request(s) failed", urls.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_keeps_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "stale contents").unwrap();

        let mut file = open_output(&path).unwrap();
        emit(&mut file, "first video").unwrap();
        emit(&mut file, "second video").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first video\nsecond video\n");
    }

    #[test]
    fn test_stage_message_without_summarizer() {
        assert_eq!(stage_message(Stage::Retrieving, "ABC", None), "Transcribing ABC...");
        assert_eq!(stage_message(Stage::Summarizing, "ABC", None), "Summarizing...");
    }
}
