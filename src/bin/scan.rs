//! Scan text for PII from the command line.
//!
//! Reads a file (or stdin), prints the analysis as JSON on stdout and logs to
//! stderr.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use zentinel_agent_data_guardian::{
    AnalysisResult, DataGuardianConfig, DataGuardianConfigJson, Engine, Language, RedactionStyle,
};

/// Detect PII in a text and score its risk
#[derive(Parser, Debug)]
#[command(name = "data-guardian-scan")]
#[command(version, about, long_about = None)]
struct Args {
    /// File to scan (stdin when omitted)
    file: Option<PathBuf>,

    /// JSON configuration file (same keys as the agent configuration)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Language of the text: en, tr (detected when omitted)
    #[arg(long, short)]
    language: Option<Language>,

    /// Also print the redacted text
    #[arg(long, short)]
    redact: bool,

    /// Redaction style: mask-all, partial, hash
    #[arg(long, short)]
    style: Option<RedactionStyle>,

    /// Enable verbose debug logging
    #[arg(long, short, default_value = "false")]
    verbose: bool,
}

#[derive(Serialize)]
struct ScanOutput {
    #[serde(flatten)]
    analysis: AnalysisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    redacted: Option<String>,
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = match &args.config {
        Some(path) => DataGuardianConfigJson::from_file(path)?,
        None => DataGuardianConfigJson::default(),
    };
    let mut policy = DataGuardianConfig::from(json).policy;
    if let Some(language) = args.language {
        policy.language = Some(language);
    }
    if let Some(style) = args.style {
        policy.redaction.style = style;
    }

    let engine = Engine::new(policy, None)?;
    let text = read_input(args.file.as_ref())?;
    debug!(chars = text.chars().count(), "Scanning input");

    let analysis = engine.analyze(&text);
    let redacted = args.redact.then(|| engine.redact(&text, &analysis.hits));

    let output = ScanOutput { analysis, redacted };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
