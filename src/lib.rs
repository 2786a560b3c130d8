//! Data Guardian agent for Zentinel proxy.
//!
//! Scans request and response bodies for personally identifiable
//! information and acts on the result:
//! - Pattern recognizers with checksum validation (cards, IBANs, national IDs)
//! - Optional NER entities from a pluggable backend
//! - Bounded risk score from weighted, capped per-type counts
//! - Redaction with mask, partial-mask and hash styles
//! - Tagging via headers, blocking above a risk threshold, or redacting
//!   response bodies

pub mod buffer;
pub mod detection;
pub mod engine;
pub mod error;
pub mod language;
pub mod merge;
pub mod ner;
pub mod policy;
pub mod redact;
pub mod risk;

pub use detection::{PiiHit, PiiType};
pub use engine::{AnalysisResult, Engine};
pub use error::{Error, Result};
pub use language::{detect_language, Language};
pub use ner::{NerBackend, NerEntity, NerError};
pub use policy::{NerSettings, Policy, TypeFilter};
pub use redact::{RedactionPolicy, RedactionStyle};
pub use risk::RiskWeights;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use buffer::{BodyBuffer, BodyError, ChunkOutcome, PendingBodies};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zentinel_agent_protocol::{
    AgentHandler, AgentResponse, AuditMetadata, BodyMutation, ConfigureEvent, HeaderOp,
    RequestBodyChunkEvent, RequestCompleteEvent, RequestHeadersEvent, ResponseBodyChunkEvent,
    ResponseHeadersEvent,
};

/// Body returned for blocked requests and responses
pub const BLOCK_MESSAGE: &str = "Blocked by DataGuardian policy.";

/// Action to take on analyzed bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionMode {
    /// Analyze only
    None,
    /// Emit risk headers
    #[default]
    Tag,
    /// Redact response bodies at or above the redaction threshold; requests
    /// are marked with a header
    Redact,
    /// Block requests and responses at or above the block threshold
    Block,
}

impl std::str::FromStr for ActionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(ActionMode::None),
            "tag" => Ok(ActionMode::Tag),
            "redact" => Ok(ActionMode::Redact),
            "block" => Ok(ActionMode::Block),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

/// JSON-serializable configuration for the Data Guardian agent
///
/// Used for parsing configuration from the on_configure() event or a config
/// file. Field names use kebab-case to match typical YAML/JSON config style.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DataGuardianConfigJson {
    /// Risk weight per type tag (replaces the built-in table)
    pub weights: RiskWeights,
    /// Hits of one type counted towards the risk at most this often
    pub max_count_per_type: usize,
    /// Risk sensitivity
    pub k: f64,
    /// Only report these types (empty = all)
    pub include_entity_types: Vec<String>,
    /// Never report these types
    pub exclude_entity_types: Vec<String>,
    /// "auto", "en" or "tr"
    pub language: String,
    /// "none", "tag", "redact" or "block"
    pub action: String,
    /// Block when risk >= this value (negative = never)
    pub block_at: f64,
    /// Redact when risk >= this value
    pub redact_at: f64,
    /// "mask-all", "partial" or "hash"
    pub redaction_style: String,
    /// Types that get redacted
    pub redact_types: Vec<String>,
    /// Add risk headers
    pub emit_headers: bool,
    /// Prefix of emitted headers
    pub header_prefix: String,
    /// Analyze request bodies
    pub analyze_requests: bool,
    /// Analyze response bodies
    pub analyze_responses: bool,
    /// Content types (prefix match) whose bodies are analyzed
    pub analyzable_content_types: Vec<String>,
    /// Bodies larger than this are not analyzed
    pub max_body_size_bytes: usize,
    /// Seconds a body buffer may wait for its last chunk before eviction
    pub pending_ttl_secs: u64,
    /// Only analyze paths with these prefixes (empty = all)
    pub include_paths: Vec<String>,
    /// Never analyze paths with these prefixes
    pub exclude_paths: Vec<String>,
    /// Only analyze these methods (empty = all)
    pub include_methods: Vec<String>,
    /// Never analyze these methods
    pub exclude_methods: Vec<String>,
    /// Use the NER backend, if the agent was given one
    pub enable_ner: bool,
    /// Minimum NER confidence
    pub min_ner_confidence: f64,
    /// Characters of input handed to the NER backend
    pub ner_max_input_chars: usize,
}

impl Default for DataGuardianConfigJson {
    fn default() -> Self {
        let policy = Policy::default();
        Self {
            weights: policy.weights,
            max_count_per_type: policy.max_count_per_type,
            k: policy.k,
            include_entity_types: Vec::new(),
            exclude_entity_types: Vec::new(),
            language: "auto".to_string(),
            action: "tag".to_string(),
            block_at: -1.0,
            redact_at: policy.redaction.threshold,
            redaction_style: "mask-all".to_string(),
            redact_types: policy
                .redaction
                .redactable_types
                .into_iter()
                .map(String::from)
                .collect(),
            emit_headers: true,
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
            analyze_requests: true,
            analyze_responses: true,
            analyzable_content_types: DEFAULT_CONTENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_body_size_bytes: DEFAULT_MAX_BODY_SIZE,
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
            include_paths: Vec::new(),
            exclude_paths: Vec::new(),
            include_methods: Vec::new(),
            exclude_methods: Vec::new(),
            enable_ner: false,
            min_ner_confidence: policy.ner.min_confidence,
            ner_max_input_chars: policy.ner.max_input_chars,
        }
    }
}

impl DataGuardianConfigJson {
    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

const DEFAULT_HEADER_PREFIX: &str = "X-DataGuardian";

const DEFAULT_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "text/plain",
    "application/xml",
    "application/x-www-form-urlencoded",
];

const DEFAULT_MAX_BODY_SIZE: usize = 512 * 1024;

const DEFAULT_PENDING_TTL_SECS: u64 = 300;

fn type_set(tags: Vec<String>) -> BTreeSet<PiiType> {
    tags.into_iter()
        .filter(|t| !t.trim().is_empty())
        .map(PiiType::from)
        .collect()
}

impl From<DataGuardianConfigJson> for DataGuardianConfig {
    fn from(json: DataGuardianConfigJson) -> Self {
        let action = json.action.parse::<ActionMode>().unwrap_or_else(|e| {
            warn!("{}, defaulting to 'tag'", e);
            ActionMode::Tag
        });
        let style = json
            .redaction_style
            .parse::<RedactionStyle>()
            .unwrap_or_else(|e| {
                warn!("{}, defaulting to 'mask-all'", e);
                RedactionStyle::MaskAll
            });
        let language = language::parse_language_setting(&json.language).unwrap_or_else(|e| {
            warn!("{}, detecting language per request", e);
            None
        });

        Self {
            policy: Policy {
                weights: json.weights,
                max_count_per_type: json.max_count_per_type,
                k: json.k,
                filter: TypeFilter {
                    include: type_set(json.include_entity_types),
                    exclude: type_set(json.exclude_entity_types),
                },
                language,
                redaction: RedactionPolicy {
                    style,
                    redactable_types: type_set(json.redact_types),
                    threshold: json.redact_at,
                },
                ner: NerSettings {
                    min_confidence: json.min_ner_confidence,
                    max_input_chars: json.ner_max_input_chars,
                },
            },
            action,
            block_at: json.block_at,
            emit_headers: json.emit_headers,
            header_prefix: json.header_prefix,
            analyze_requests: json.analyze_requests,
            analyze_responses: json.analyze_responses,
            analyzable_content_types: json.analyzable_content_types,
            max_body_size_bytes: json.max_body_size_bytes,
            pending_ttl: Duration::from_secs(json.pending_ttl_secs.max(1)),
            include_paths: json.include_paths,
            exclude_paths: json.exclude_paths,
            include_methods: json.include_methods.iter().map(|m| m.to_uppercase()).collect(),
            exclude_methods: json.exclude_methods.iter().map(|m| m.to_uppercase()).collect(),
            enable_ner: json.enable_ner,
        }
    }
}

/// Configuration for the Data Guardian agent
#[derive(Debug, Clone)]
pub struct DataGuardianConfig {
    /// Engine policy
    pub policy: Policy,
    /// Action to take on analyzed requests
    pub action: ActionMode,
    /// Block when risk >= this value (negative = never)
    pub block_at: f64,
    /// Add risk headers
    pub emit_headers: bool,
    /// Prefix of emitted headers
    pub header_prefix: String,
    /// Analyze request bodies
    pub analyze_requests: bool,
    /// Analyze response bodies
    pub analyze_responses: bool,
    /// Content types (prefix match) whose bodies are analyzed
    pub analyzable_content_types: Vec<String>,
    /// Bodies larger than this are not analyzed
    pub max_body_size_bytes: usize,
    /// How long a body buffer may wait for its last chunk
    pub pending_ttl: Duration,
    /// Only analyze paths with these prefixes (empty = all)
    pub include_paths: Vec<String>,
    /// Never analyze paths with these prefixes
    pub exclude_paths: Vec<String>,
    /// Only analyze these methods, upper case (empty = all)
    pub include_methods: Vec<String>,
    /// Never analyze these methods, upper case
    pub exclude_methods: Vec<String>,
    /// Use the NER backend, if the agent was given one
    pub enable_ner: bool,
}

impl Default for DataGuardianConfig {
    fn default() -> Self {
        DataGuardianConfigJson::default().into()
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}

impl DataGuardianConfig {
    /// Full header name for a suffix, e.g. `X-DataGuardian-Request-Risk`
    pub fn header_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.header_prefix, suffix)
    }

    /// Whether a request passes the path and method filters
    pub fn should_inspect(&self, method: &str, uri: &str) -> bool {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let method = method.to_uppercase();

        if !self.include_paths.is_empty()
            && !self
                .include_paths
                .iter()
                .any(|p| starts_with_ignore_case(path, p))
        {
            return false;
        }
        if self
            .exclude_paths
            .iter()
            .any(|p| starts_with_ignore_case(path, p))
        {
            return false;
        }
        if !self.include_methods.is_empty() && !self.include_methods.contains(&method) {
            return false;
        }
        !self.exclude_methods.contains(&method)
    }

    /// Whether a body of this content type is analyzed
    pub fn is_analyzable_content_type(&self, content_type: &str) -> bool {
        !content_type.is_empty()
            && self
                .analyzable_content_types
                .iter()
                .any(|ct| starts_with_ignore_case(content_type, ct))
    }

    /// Whether a risk value triggers blocking
    pub fn blocks(&self, risk: f64) -> bool {
        self.action == ActionMode::Block && self.block_at >= 0.0 && risk >= self.block_at
    }
}

/// Which side of the exchange a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Request,
    Response,
}

impl Direction {
    /// Header name segment, e.g. `Request` in `X-DataGuardian-Request-Risk`
    fn label(self) -> &'static str {
        match self {
            Direction::Request => "Request",
            Direction::Response => "Response",
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Direction::Request => "request",
            Direction::Response => "response",
        }
    }

    /// Add a header on this side of the exchange
    fn set_header(self, response: AgentResponse, name: String, value: String) -> AgentResponse {
        let op = HeaderOp::Set { name, value };
        match self {
            Direction::Request => response.add_request_header(op),
            Direction::Response => response.add_response_header(op),
        }
    }
}

/// Data Guardian Agent
pub struct DataGuardianAgent {
    config: RwLock<DataGuardianConfig>,
    engine: RwLock<Arc<Engine>>,
    ner: Option<Arc<dyn NerBackend>>,
    /// Request bodies being buffered, keyed by correlation ID
    requests: Arc<Mutex<PendingBodies>>,
    /// Response bodies of inspected exchanges, keyed by correlation ID
    responses: Arc<Mutex<PendingBodies>>,
}

/// Build an engine for a configuration, attaching the NER backend only when
/// the configuration enables it
fn build_engine(config: &DataGuardianConfig, ner: Option<&Arc<dyn NerBackend>>) -> Result<Engine> {
    let ner = if config.enable_ner {
        if ner.is_none() {
            warn!("NER enabled but no backend available, using pattern recognizers only");
        }
        ner.cloned()
    } else {
        None
    };
    Engine::new(config.policy.clone(), ner)
}

impl DataGuardianAgent {
    /// Create a new agent with pattern recognizers only
    pub fn new(config: DataGuardianConfig) -> Result<Self> {
        Self::with_ner(config, None)
    }

    /// Create a new agent with an optional NER backend
    pub fn with_ner(config: DataGuardianConfig, ner: Option<Arc<dyn NerBackend>>) -> Result<Self> {
        let engine = build_engine(&config, ner.as_ref())?;
        let ttl = config.pending_ttl;
        Ok(Self {
            config: RwLock::new(config),
            engine: RwLock::new(Arc::new(engine)),
            ner,
            requests: Arc::new(Mutex::new(PendingBodies::new(ttl))),
            responses: Arc::new(Mutex::new(PendingBodies::new(ttl))),
        })
    }

    /// Reconfigure the agent with new settings
    ///
    /// An invalid policy leaves the current configuration in place.
    pub async fn reconfigure(&self, config: DataGuardianConfig) -> Result<()> {
        info!("Reconfiguring Data Guardian agent");

        let engine = build_engine(&config, self.ner.as_ref())?;
        debug!(ner = engine.has_ner(), "Engine rebuilt");
        self.requests.lock().await.set_ttl(config.pending_ttl);
        self.responses.lock().await.set_ttl(config.pending_ttl);
        {
            let mut current_engine = self.engine.write().await;
            *current_engine = Arc::new(engine);
        }
        {
            let mut current_config = self.config.write().await;
            *current_config = config;
        }

        debug!("Data Guardian agent reconfigured successfully");
        Ok(())
    }

    /// Current engine
    pub async fn engine(&self) -> Arc<Engine> {
        self.engine.read().await.clone()
    }

    /// Number of request bodies currently buffered
    pub async fn pending_requests(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Number of exchanges whose response is still awaited or buffered
    pub async fn pending_responses(&self) -> usize {
        self.responses.lock().await.len()
    }

    /// Snapshot config and engine for one body
    async fn snapshot(&self) -> (DataGuardianConfig, Arc<Engine>) {
        let config = self.config.read().await.clone();
        (config, self.engine().await)
    }

    /// Process the complete request body
    async fn finish_request(&self, buffer: BodyBuffer) -> AgentResponse {
        let (config, engine) = self.snapshot().await;
        match buffer.text() {
            Ok(text) => {
                let result = engine.analyze(&text);
                respond(&config, &engine, Direction::Request, &result)
            }
            Err(e) => skipped(e, Direction::Request, buffer.bytes(), &config),
        }
    }

    /// Process the complete response body
    ///
    /// When chunks were held back, the final chunk carries the whole body:
    /// redacted when redaction is due, otherwise unchanged.
    async fn finish_response(
        &self,
        buffer: BodyBuffer,
        outcome: ChunkOutcome,
        chunk_index: u32,
    ) -> AgentResponse {
        let (config, engine) = self.snapshot().await;
        let text = match buffer.text() {
            Ok(text) => text,
            Err(e) => {
                let response = skipped(e, Direction::Response, buffer.bytes(), &config);
                return with_chunk_outcome(response, outcome, chunk_index);
            }
        };

        let result = engine.analyze(&text);
        let response = respond(&config, &engine, Direction::Response, &result);
        if config.blocks(result.risk) || !buffer.is_holding() {
            return response;
        }

        let body = if redaction_due(&config, &engine, &result) {
            engine.redact(&text, &result.hits)
        } else {
            text
        };
        response.with_response_body_mutation(BodyMutation::replace(
            chunk_index,
            BASE64.encode(body),
        ))
    }
}

/// Whether the configured action redacts this result
fn redaction_due(config: &DataGuardianConfig, engine: &Engine, result: &AnalysisResult) -> bool {
    config.action == ActionMode::Redact && engine.should_redact(result)
}

/// Apply what the body buffer decided for the current response chunk
fn with_chunk_outcome(
    response: AgentResponse,
    outcome: ChunkOutcome,
    chunk_index: u32,
) -> AgentResponse {
    match outcome {
        ChunkOutcome::Forward => response,
        ChunkOutcome::Held => {
            response.with_response_body_mutation(BodyMutation::drop_chunk(chunk_index))
        }
        ChunkOutcome::Release(bytes) => response.with_response_body_mutation(
            BodyMutation::replace(chunk_index, BASE64.encode(bytes)),
        ),
    }
}

/// Allow a body that could not be analyzed, recording why
fn skipped(
    error: BodyError,
    direction: Direction,
    bytes: usize,
    config: &DataGuardianConfig,
) -> AgentResponse {
    let tag = match error {
        BodyError::TooLarge => {
            debug!(
                direction = direction.tag(),
                bytes = bytes,
                limit = config.max_body_size_bytes,
                "Body too large, skipping analysis"
            );
            "body-too-large"
        }
        BodyError::InvalidEncoding | BodyError::InvalidUtf8 => {
            warn!(
                direction = direction.tag(),
                reason = error.reason_code(),
                "Body could not be decoded, skipping analysis"
            );
            "error"
        }
    };
    AgentResponse::default_allow().with_audit(AuditMetadata {
        tags: vec![
            "data-guardian".to_string(),
            direction.tag().to_string(),
            tag.to_string(),
        ],
        reason_codes: vec![error.reason_code().to_string()],
        ..Default::default()
    })
}

/// Turn an analysis into headers, audit metadata and a decision
fn respond(
    config: &DataGuardianConfig,
    engine: &Engine,
    direction: Direction,
    result: &AnalysisResult,
) -> AgentResponse {
    let mut response = AgentResponse::default_allow();
    let mut tags = vec!["data-guardian".to_string(), direction.tag().to_string()];
    let mut reason_codes = Vec::new();
    let risk = format!("{:.2}", result.risk);
    let detected = result.format_counts();
    let risk_header = config.header_name(&format!("{}-Risk", direction.label()));
    let detected_header = config.header_name(&format!("{}-Detected", direction.label()));

    if config.emit_headers {
        response = direction.set_header(response, risk_header.clone(), risk.clone());
        response = direction.set_header(response, detected_header.clone(), detected.clone());
    }

    if result.has_pii() {
        warn!(direction = direction.tag(), risk = %risk, detected = %detected, "PII detected");
        tags.push(format!("risk:{}", risk));
        tags.extend(result.counts.keys().map(|t| format!("pii:{}", t)));
        reason_codes.push("PII_DETECTED".to_string());
    }

    if config.blocks(result.risk) {
        tags.push("blocked".to_string());
        reason_codes.push("PII_RISK_BLOCKED".to_string());
        info!(
            direction = direction.tag(),
            risk = %risk,
            block_at = config.block_at,
            "Blocked by risk threshold"
        );

        let mut blocked = AgentResponse::block(403, Some(BLOCK_MESSAGE.to_string()))
            .add_response_header(HeaderOp::Set {
                name: config.header_name("Blocked"),
                value: "true".to_string(),
            });
        if config.emit_headers {
            blocked = blocked
                .add_response_header(HeaderOp::Set {
                    name: risk_header,
                    value: risk,
                })
                .add_response_header(HeaderOp::Set {
                    name: detected_header,
                    value: detected,
                });
        }
        return blocked.with_audit(AuditMetadata {
            tags,
            reason_codes,
            ..Default::default()
        });
    }

    if redaction_due(config, engine, result) {
        match direction {
            Direction::Request => {
                debug!(risk = %risk, "Request requires redaction");
                tags.push("redaction-required".to_string());
                if config.emit_headers {
                    response = direction.set_header(
                        response,
                        config.header_name("Request-Redaction"),
                        "required".to_string(),
                    );
                }
            }
            Direction::Response => {
                debug!(risk = %risk, "Redacting response body");
                tags.push("redacted".to_string());
                reason_codes.push("PII_REDACTED".to_string());
            }
        }
    }

    response.with_audit(AuditMetadata {
        tags,
        reason_codes,
        ..Default::default()
    })
}

/// First value of a header, matching the name case-insensitively
fn header_value<'a>(headers: &'a HashMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// Whether the headers declare an empty body
fn declares_empty_body(headers: &HashMap<String, Vec<String>>) -> bool {
    header_value(headers, "content-length")
        .and_then(|len| len.trim().parse::<u64>().ok())
        .map_or(false, |len| len == 0)
}

/// Whether a request can carry a body worth waiting for
fn request_has_body(method: &str, headers: &HashMap<String, Vec<String>>) -> bool {
    if header_value(headers, "content-length").is_some() {
        return !declares_empty_body(headers);
    }
    if header_value(headers, "transfer-encoding").is_some() {
        return true;
    }
    matches!(method.to_uppercase().as_str(), "POST" | "PUT" | "PATCH")
}

/// Whether a response can carry a body
fn response_has_body(status: u16, headers: &HashMap<String, Vec<String>>) -> bool {
    !(status == 204 || status == 304 || (100..200).contains(&status))
        && !declares_empty_body(headers)
}

#[async_trait]
impl AgentHandler for DataGuardianAgent {
    async fn on_configure(&self, event: ConfigureEvent) -> AgentResponse {
        info!(agent_id = %event.agent_id, "Received configuration event");

        // Parse the JSON config
        let json_config: DataGuardianConfigJson = match serde_json::from_value(event.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(error = %e, "Failed to parse configuration, using defaults");
                DataGuardianConfigJson::default()
            }
        };

        // Convert to internal config and apply
        if let Err(e) = self.reconfigure(json_config.into()).await {
            warn!(error = %e, "Rejected configuration, keeping previous settings");
            return AgentResponse::default_allow();
        }

        debug!("Configuration applied successfully");
        AgentResponse::default_allow()
    }

    async fn on_request_headers(&self, event: RequestHeadersEvent) -> AgentResponse {
        let correlation_id = event.metadata.correlation_id.clone();
        let content_type = header_value(&event.headers, "content-type").unwrap_or_default();

        let (inspect_request, inspect_response) = {
            let config = self.config.read().await;
            let route = config.should_inspect(&event.method, &event.uri);
            (
                route
                    && config.analyze_requests
                    && config.is_analyzable_content_type(content_type)
                    && request_has_body(&event.method, &event.headers),
                route && config.analyze_responses,
            )
        };

        debug!(
            correlation_id = %correlation_id,
            method = %event.method,
            uri = %event.uri,
            content_type = %content_type,
            inspect_request = inspect_request,
            inspect_response = inspect_response,
            "Request headers received"
        );

        if inspect_request {
            self.requests
                .lock()
                .await
                .insert(correlation_id.clone(), BodyBuffer::new(false));
        }
        if inspect_response {
            self.responses
                .lock()
                .await
                .insert(correlation_id, BodyBuffer::new(false));
        }

        AgentResponse::default_allow()
    }

    async fn on_request_body_chunk(&self, event: RequestBodyChunkEvent) -> AgentResponse {
        let max_body_size = self.config.read().await.max_body_size_bytes;
        let mut requests = self.requests.lock().await;

        let buffer = match requests.get_mut(&event.correlation_id) {
            Some(b) => b,
            None => {
                // Not inspected, allow it
                return AgentResponse::default_allow();
            }
        };

        // Request buffers never hold chunks back
        buffer.push(&event.data, max_body_size);

        // Process on last chunk
        if event.is_last {
            debug!(
                correlation_id = %event.correlation_id,
                bytes = buffer.bytes(),
                "Processing complete request body"
            );
            if let Some(buffer) = requests.remove(&event.correlation_id) {
                // Drop the lock before analysis
                drop(requests);
                return self.finish_request(buffer).await;
            }
        }

        AgentResponse::default_allow()
    }

    async fn on_response_headers(&self, event: ResponseHeadersEvent) -> AgentResponse {
        let content_type = header_value(&event.headers, "content-type").unwrap_or_default();
        let (analyzable, holding) = {
            let config = self.config.read().await;
            (
                config.is_analyzable_content_type(content_type)
                    && response_has_body(event.status, &event.headers),
                config.action == ActionMode::Redact,
            )
        };

        let mut responses = self.responses.lock().await;
        if !responses.contains(&event.correlation_id) {
            return AgentResponse::default_allow();
        }

        debug!(
            correlation_id = %event.correlation_id,
            status = event.status,
            content_type = %content_type,
            inspect = analyzable,
            "Response headers received"
        );

        if analyzable {
            responses.insert(event.correlation_id, BodyBuffer::new(holding));
        } else {
            responses.remove(&event.correlation_id);
        }

        AgentResponse::default_allow()
    }

    async fn on_response_body_chunk(&self, event: ResponseBodyChunkEvent) -> AgentResponse {
        let max_body_size = self.config.read().await.max_body_size_bytes;
        let mut responses = self.responses.lock().await;

        let buffer = match responses.get_mut(&event.correlation_id) {
            Some(b) => b,
            None => return AgentResponse::default_allow(),
        };

        let outcome = buffer.push(&event.data, max_body_size);
        if !event.is_last {
            return with_chunk_outcome(AgentResponse::default_allow(), outcome, event.chunk_index);
        }

        debug!(
            correlation_id = %event.correlation_id,
            bytes = buffer.bytes(),
            "Processing complete response body"
        );
        match responses.remove(&event.correlation_id) {
            Some(buffer) => {
                drop(responses);
                self.finish_response(buffer, outcome, event.chunk_index)
                    .await
            }
            None => AgentResponse::default_allow(),
        }
    }

    async fn on_request_complete(&self, event: RequestCompleteEvent) -> AgentResponse {
        // Bodies that never finished
        let request = self.requests.lock().await.remove(&event.correlation_id);
        let response = self.responses.lock().await.remove(&event.correlation_id);
        if request.is_some() || response.is_some() {
            debug!(
                correlation_id = %event.correlation_id,
                "Dropped unfinished body buffers"
            );
        }
        AgentResponse::default_allow()
    }
}
