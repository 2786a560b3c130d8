//! Data Guardian Agent CLI for Zentinel proxy.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use zentinel_agent_data_guardian::{DataGuardianAgent, DataGuardianConfig, DataGuardianConfigJson};
use zentinel_agent_protocol::v2::GrpcAgentServerV2;
use zentinel_agent_protocol::AgentServer;

/// Data Guardian Agent for Zentinel proxy
///
/// Detects PII in request and response bodies, scores the risk, and tags,
/// redacts or blocks based on that score.
#[derive(Parser, Debug)]
#[command(name = "zentinel-data-guardian-agent")]
#[command(version, about, long_about = None)]
struct Args {
    /// Unix socket path for agent communication (UDS transport)
    #[arg(
        long,
        env = "AGENT_SOCKET",
        default_value = "/tmp/zentinel-data-guardian.sock"
    )]
    socket: String,

    /// gRPC address for agent communication (e.g., 0.0.0.0:50051)
    /// When specified, the agent will use gRPC transport instead of UDS
    #[arg(long, env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    /// JSON configuration file (kebab-case keys); flags override its values
    #[arg(long, short, env = "DATA_GUARDIAN_CONFIG")]
    config: Option<PathBuf>,

    /// Action on analyzed requests: none, tag, redact, block
    #[arg(long, env = "ACTION")]
    action: Option<String>,

    /// Block when risk >= this value (negative = never)
    #[arg(long, env = "BLOCK_AT", allow_hyphen_values = true)]
    block_at: Option<f64>,

    /// Redact when risk >= this value
    #[arg(long, env = "REDACT_AT")]
    redact_at: Option<f64>,

    /// Redaction style: mask-all, partial, hash
    #[arg(long, env = "REDACTION_STYLE")]
    redaction_style: Option<String>,

    /// Language of request bodies: auto, en, tr
    #[arg(long, env = "LANGUAGE")]
    language: Option<String>,

    /// Prefix of emitted headers
    #[arg(long, env = "HEADER_PREFIX")]
    header_prefix: Option<String>,

    /// Add risk headers (true/false)
    #[arg(long, env = "EMIT_HEADERS")]
    emit_headers: Option<bool>,

    /// Bodies larger than this many bytes are not analyzed
    #[arg(long, env = "MAX_BODY_SIZE")]
    max_body_size: Option<usize>,

    /// Analyze response bodies (true/false)
    #[arg(long, env = "ANALYZE_RESPONSES")]
    analyze_responses: Option<bool>,

    /// Enable verbose debug logging
    #[arg(long, short, env = "VERBOSE", default_value = "false")]
    verbose: bool,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides
    fn config_json(&self) -> Result<DataGuardianConfigJson> {
        let mut json = match &self.config {
            Some(path) => DataGuardianConfigJson::from_file(path)?,
            None => DataGuardianConfigJson::default(),
        };

        if let Some(action) = &self.action {
            json.action = action.clone();
        }
        if let Some(block_at) = self.block_at {
            json.block_at = block_at;
        }
        if let Some(redact_at) = self.redact_at {
            json.redact_at = redact_at;
        }
        if let Some(style) = &self.redaction_style {
            json.redaction_style = style.clone();
        }
        if let Some(language) = &self.language {
            json.language = language.clone();
        }
        if let Some(prefix) = &self.header_prefix {
            json.header_prefix = prefix.clone();
        }
        if let Some(emit) = self.emit_headers {
            json.emit_headers = emit;
        }
        if let Some(max) = self.max_body_size {
            json.max_body_size_bytes = max;
        }
        if let Some(analyze) = self.analyze_responses {
            json.analyze_responses = analyze;
        }

        Ok(json)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config: DataGuardianConfig = args.config_json()?.into();

    info!("Starting Data Guardian Agent");
    info!("  Socket: {}", args.socket);
    if let Some(path) = &args.config {
        info!("  Config file: {}", path.display());
    }
    info!("  Action: {:?}", config.action);
    info!("  Block at: {}", config.block_at);
    info!("  Redact at: {}", config.policy.redaction.threshold);
    info!("  Redaction style: {:?}", config.policy.redaction.style);
    info!(
        "  Language: {}",
        config
            .policy
            .language
            .map_or("auto".to_string(), |l| l.to_string())
    );
    info!("  Header prefix: {}", config.header_prefix);
    info!("  Emit headers: {}", config.emit_headers);
    info!("  Max body size: {} bytes", config.max_body_size_bytes);
    info!("  Analyze responses: {}", config.analyze_responses);

    let agent = DataGuardianAgent::new(config)?;

    // Choose transport based on CLI arguments
    if let Some(grpc_addr) = args.grpc_address {
        // Use gRPC transport (v2 protocol)
        info!("Starting Data Guardian Agent with gRPC transport on {}", grpc_addr);
        let addr: std::net::SocketAddr = grpc_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid gRPC address '{}': {}", grpc_addr, e))?;
        let server = GrpcAgentServerV2::new("data-guardian", Box::new(agent));
        server.run(addr).await?;
    } else {
        // Use UDS transport (v1 protocol for backward compatibility)
        info!("Starting Data Guardian Agent with UDS transport on {}", args.socket);
        let server = AgentServer::new("data-guardian", &args.socket, Box::new(agent));
        server.run().await?;
    }

    Ok(())
}
