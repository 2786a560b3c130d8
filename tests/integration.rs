//! Integration tests for the Data Guardian Agent.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use zentinel_agent_data_guardian::{ActionMode, DataGuardianAgent, DataGuardianConfig};
use zentinel_agent_protocol::{
    AgentClient, AgentHandler, AgentResponse, AgentServer, Decision, EventType, HeaderOp,
    RequestBodyChunkEvent, RequestCompleteEvent, RequestHeadersEvent, RequestMetadata,
    ResponseBodyChunkEvent, ResponseHeadersEvent,
};

/// Helper to create test metadata
fn test_metadata(correlation_id: &str) -> RequestMetadata {
    RequestMetadata {
        correlation_id: correlation_id.to_string(),
        request_id: format!("req-{}", correlation_id),
        client_ip: "127.0.0.1".to_string(),
        client_port: 12345,
        server_name: Some("api.example.com".to_string()),
        protocol: "HTTP/1.1".to_string(),
        tls_version: Some("TLSv1.3".to_string()),
        tls_cipher: None,
        route_id: Some("default".to_string()),
        upstream_id: Some("backend".to_string()),
        traceparent: None,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Headers of a JSON request
fn json_headers() -> HashMap<String, Vec<String>> {
    HashMap::from([(
        "Content-Type".to_string(),
        vec!["application/json; charset=utf-8".to_string()],
    )])
}

/// Start the agent server and return a connected client
async fn start_agent(
    config: DataGuardianConfig,
) -> (AgentClient, tokio::task::JoinHandle<()>, TempDir) {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("test.sock");

    let agent = DataGuardianAgent::new(config).unwrap();
    let server = AgentServer::new("test-data-guardian", socket_path.clone(), Box::new(agent));

    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = AgentClient::unix_socket("test-client", &socket_path, Duration::from_secs(5))
        .await
        .unwrap();

    (client, handle, dir)
}

/// Send headers and the body in `chunks`, return the final response
async fn send_chunked(
    client: &mut AgentClient,
    correlation_id: &str,
    method: &str,
    uri: &str,
    chunks: &[&[u8]],
    headers: HashMap<String, Vec<String>>,
) -> AgentResponse {
    // Send headers
    let headers_event = RequestHeadersEvent {
        metadata: test_metadata(correlation_id),
        method: method.to_string(),
        uri: uri.to_string(),
        headers,
    };

    let _headers_response = client
        .send_event(EventType::RequestHeaders, &headers_event)
        .await
        .unwrap();

    // Send body
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut received = 0;
    let mut last_response = None;
    let mut chunk_index = 0;
    for (index, chunk) in chunks.iter().enumerate() {
        received += chunk.len();
        let body_event = RequestBodyChunkEvent {
            correlation_id: correlation_id.to_string(),
            data: BASE64.encode(chunk),
            is_last: index + 1 == chunks.len(),
            total_size: Some(total),
            chunk_index,
            bytes_received: received,
        };
        chunk_index += 1;
        last_response = Some(
            client
                .send_event(EventType::RequestBodyChunk, &body_event)
                .await
                .unwrap(),
        );
    }

    last_response.unwrap()
}

/// Send a POST with a single-chunk body
async fn send_request(
    client: &mut AgentClient,
    correlation_id: &str,
    uri: &str,
    body: &str,
    headers: HashMap<String, Vec<String>>,
) -> AgentResponse {
    send_chunked(
        client,
        correlation_id,
        "POST",
        uri,
        &[body.as_bytes()],
        headers,
    )
    .await
}

/// Value of a request header set by the agent
fn request_header<'a>(response: &'a AgentResponse, header: &str) -> Option<&'a str> {
    response.request_headers.iter().find_map(|h| match h {
        HeaderOp::Set { name, value } if name == header => Some(value.as_str()),
        _ => None,
    })
}

/// Send response headers and the response body in `chunks`, return the
/// response to every chunk
async fn send_response(
    client: &mut AgentClient,
    correlation_id: &str,
    status: u16,
    chunks: &[&[u8]],
    headers: HashMap<String, Vec<String>>,
) -> Vec<AgentResponse> {
    let headers_event = ResponseHeadersEvent {
        correlation_id: correlation_id.to_string(),
        status,
        headers,
    };
    let _headers_response = client
        .send_event(EventType::ResponseHeaders, &headers_event)
        .await
        .unwrap();

    let total: usize = chunks.iter().map(|c| c.len()).sum();
    let mut sent = 0;
    let mut responses = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        sent += chunk.len();
        let body_event = ResponseBodyChunkEvent {
            correlation_id: correlation_id.to_string(),
            data: BASE64.encode(chunk),
            is_last: index + 1 == chunks.len(),
            total_size: Some(total),
            chunk_index: index as u32,
            bytes_sent: sent,
        };
        responses.push(
            client
                .send_event(EventType::ResponseBodyChunk, &body_event)
                .await
                .unwrap(),
        );
    }
    responses
}

/// Value of a response header set by the agent
fn response_header<'a>(response: &'a AgentResponse, header: &str) -> Option<&'a str> {
    response.response_headers.iter().find_map(|h| match h {
        HeaderOp::Set { name, value } if name == header => Some(value.as_str()),
        _ => None,
    })
}

/// Decoded replacement body of a response chunk
fn replaced_body(response: &AgentResponse) -> Option<String> {
    let data = response.response_body_mutation.as_ref()?.data.as_ref()?;
    String::from_utf8(BASE64.decode(data).unwrap()).ok()
}

fn request_complete(correlation_id: &str) -> RequestCompleteEvent {
    RequestCompleteEvent {
        correlation_id: correlation_id.to_string(),
        status: 200,
        duration_ms: 5,
        request_body_size: 0,
        response_body_size: 0,
        upstream_attempts: 1,
        error: None,
    }
}

const CLEAN_BODY: &str = r#"{"message": "Hello, how is the weather today?"}"#;
const EMAIL_BODY: &str = r#"{"message": "Contact me at jane@example.com"}"#;

// ============================================================================
// Tagging
// ============================================================================

#[tokio::test]
async fn test_clean_request_tagged_with_zero_risk() {
    let (mut client, handle, _dir) = start_agent(DataGuardianConfig::default()).await;

    let response = send_request(
        &mut client,
        "test-1",
        "/api/messages",
        r#"{"message": "Hello, how is the weather today?"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Risk"),
        Some("0.00")
    );
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Detected"),
        Some("")
    );
    assert!(!response
        .audit
        .reason_codes
        .contains(&"PII_DETECTED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_email_detected_and_tagged() {
    let (mut client, handle, _dir) = start_agent(DataGuardianConfig::default()).await;

    let response = send_request(
        &mut client,
        "test-2",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Risk"),
        Some("4.51")
    );
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Detected"),
        Some("EMAIL=1")
    );
    assert!(response
        .audit
        .reason_codes
        .contains(&"PII_DETECTED".to_string()));
    assert!(response.audit.tags.contains(&"pii:EMAIL".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_body_split_across_chunks() {
    let (mut client, handle, _dir) = start_agent(DataGuardianConfig::default()).await;

    let response = send_chunked(
        &mut client,
        "test-3",
        "POST",
        "/api/messages",
        &[br#"{"message": "Contact me at jane@exa"#, br#"mple.com"}"#],
        json_headers(),
    )
    .await;

    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Detected"),
        Some("EMAIL=1")
    );
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_custom_header_prefix() {
    let config = DataGuardianConfig {
        header_prefix: "X-DLP".to_string(),
        ..Default::default()
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-4",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert_eq!(request_header(&response, "X-DLP-Request-Risk"), Some("4.51"));
    assert_eq!(request_header(&response, "X-DataGuardian-Request-Risk"), None);
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_headers_disabled() {
    let config = DataGuardianConfig {
        emit_headers: false,
        ..Default::default()
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-5",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert!(response.request_headers.is_empty());
    assert!(response
        .audit
        .reason_codes
        .contains(&"PII_DETECTED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_turkish_national_id_with_fixed_language() {
    let mut config = DataGuardianConfig::default();
    config.policy.language = Some(zentinel_agent_data_guardian::Language::Turkish);
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-6",
        "/api/customers",
        r#"{"kimlik": "10000000146"}"#,
        json_headers(),
    )
    .await;

    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Detected"),
        Some("NATIONAL_ID=1")
    );
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Risk"),
        Some("7.77")
    );
    client.close().await.unwrap();
    handle.abort();
}

// ============================================================================
// Blocking
// ============================================================================

fn block_config(block_at: f64) -> DataGuardianConfig {
    DataGuardianConfig {
        action: ActionMode::Block,
        block_at,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_credit_card_blocked_above_threshold() {
    let (mut client, handle, _dir) = start_agent(block_config(5.0)).await;

    let response = send_request(
        &mut client,
        "test-10",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(
        response.decision,
        Decision::Block { status: 403, .. }
    ));
    assert!(response
        .audit
        .reason_codes
        .contains(&"PII_RISK_BLOCKED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_risk_below_threshold_allowed() {
    let (mut client, handle, _dir) = start_agent(block_config(5.0)).await;

    let response = send_request(
        &mut client,
        "test-11",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_negative_block_threshold_never_blocks() {
    let (mut client, handle, _dir) = start_agent(block_config(-1.0)).await;

    let response = send_request(
        &mut client,
        "test-12",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1111", "email": "jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Detected"),
        Some("CREDIT_CARD=1;EMAIL=1")
    );
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_invalid_card_number_not_blocked() {
    let (mut client, handle, _dir) = start_agent(block_config(5.0)).await;

    // Fails the Luhn check
    let response = send_request(
        &mut client,
        "test-13",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1112"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    client.close().await.unwrap();
    handle.abort();
}

// ============================================================================
// Redaction
// ============================================================================

#[tokio::test]
async fn test_redact_mode_marks_request() {
    let config = DataGuardianConfig {
        action: ActionMode::Redact,
        ..Default::default()
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-20",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Redaction"),
        Some("required")
    );
    assert!(response
        .audit
        .tags
        .contains(&"redaction-required".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_redact_mode_below_threshold_not_marked() {
    let mut config = DataGuardianConfig {
        action: ActionMode::Redact,
        ..Default::default()
    };
    config.policy.redaction.threshold = 6.0;
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-21",
        "/api/messages",
        r#"{"message": "Contact me at jane@example.com"}"#,
        json_headers(),
    )
    .await;

    assert_eq!(
        request_header(&response, "X-DataGuardian-Request-Redaction"),
        None
    );
    client.close().await.unwrap();
    handle.abort();
}

// ============================================================================
// Filters and limits
// ============================================================================

#[tokio::test]
async fn test_non_text_content_type_skipped() {
    let (mut client, handle, _dir) = start_agent(block_config(0.0)).await;

    let headers = HashMap::from([("content-type".to_string(), vec!["image/png".to_string()])]);
    let response = send_request(
        &mut client,
        "test-30",
        "/upload",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        headers,
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response.request_headers.is_empty());
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_missing_content_type_skipped() {
    let (mut client, handle, _dir) = start_agent(block_config(0.0)).await;

    let response = send_request(
        &mut client,
        "test-31",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        HashMap::new(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_excluded_path_skipped() {
    let config = DataGuardianConfig {
        exclude_paths: vec!["/health".to_string()],
        ..block_config(5.0)
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-32",
        "/health/details?verbose=1",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response.request_headers.is_empty());
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_method_filter() {
    let config = DataGuardianConfig {
        include_methods: vec!["PUT".to_string()],
        ..block_config(5.0)
    };
    let (mut client, handle, _dir) = start_agent(config).await;
    let body: &[u8] = br#"{"payment": "4111 1111 1111 1111"}"#;

    let post = send_chunked(
        &mut client,
        "test-33",
        "POST",
        "/api/payments",
        &[body],
        json_headers(),
    )
    .await;
    assert!(matches!(post.decision, Decision::Allow));

    let put = send_chunked(
        &mut client,
        "test-34",
        "put",
        "/api/payments",
        &[body],
        json_headers(),
    )
    .await;
    assert!(matches!(put.decision, Decision::Block { status: 403, .. }));

    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_oversized_body_not_analyzed() {
    let config = DataGuardianConfig {
        max_body_size_bytes: 16,
        ..block_config(0.0)
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-35",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response.audit.tags.contains(&"body-too-large".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_invalid_utf8_allowed_with_reason() {
    let (mut client, handle, _dir) = start_agent(block_config(0.0)).await;

    let response = send_chunked(
        &mut client,
        "test-36",
        "POST",
        "/api/messages",
        &[&[0xff, 0xfe, 0xfd]],
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response
        .audit
        .reason_codes
        .contains(&"INVALID_UTF8".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_analysis_disabled() {
    let config = DataGuardianConfig {
        analyze_requests: false,
        ..block_config(0.0)
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    let response = send_request(
        &mut client,
        "test-37",
        "/api/payments",
        r#"{"payment": "4111 1111 1111 1111"}"#,
        json_headers(),
    )
    .await;

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response.request_headers.is_empty());
    client.close().await.unwrap();
    handle.abort();
}

// ============================================================================
// Reconfiguration
// ============================================================================

#[tokio::test]
async fn test_reconfigure_rejects_invalid_policy() {
    let agent = DataGuardianAgent::new(DataGuardianConfig::default()).unwrap();

    let mut bad = DataGuardianConfig::default();
    bad.policy.k = 0.0;
    assert!(agent.reconfigure(bad).await.is_err());
    assert_eq!(agent.engine().await.policy().k, 0.15);

    let mut good = DataGuardianConfig::default();
    good.policy.k = 0.3;
    agent.reconfigure(good).await.unwrap();
    assert_eq!(agent.engine().await.policy().k, 0.3);
}

#[tokio::test]
async fn test_invalid_base64_chunk_not_analyzed() {
    let (mut client, handle, _dir) = start_agent(block_config(0.0)).await;

    let headers_event = RequestHeadersEvent {
        metadata: test_metadata("test-38"),
        method: "POST".to_string(),
        uri: "/api/payments".to_string(),
        headers: json_headers(),
    };
    client
        .send_event(EventType::RequestHeaders, &headers_event)
        .await
        .unwrap();

    let first = RequestBodyChunkEvent {
        correlation_id: "test-38".to_string(),
        data: "%%% not base64 %%%".to_string(),
        is_last: false,
        total_size: None,
        chunk_index: 0,
        bytes_received: 18,
    };
    client
        .send_event(EventType::RequestBodyChunk, &first)
        .await
        .unwrap();

    let last = RequestBodyChunkEvent {
        correlation_id: "test-38".to_string(),
        data: BASE64.encode(r#"{"card": "4111 1111 1111 1111"}"#),
        is_last: true,
        total_size: None,
        chunk_index: 1,
        bytes_received: 50,
    };
    let response = client
        .send_event(EventType::RequestBodyChunk, &last)
        .await
        .unwrap();

    assert!(matches!(response.decision, Decision::Allow));
    assert!(response
        .audit
        .reason_codes
        .contains(&"INVALID_BODY_ENCODING".to_string()));
    assert!(response.request_headers.is_empty());
    client.close().await.unwrap();
    handle.abort();
}

// ============================================================================
// Request tracking
// ============================================================================

#[tokio::test]
async fn test_headers_only_request_not_tracked() {
    let agent = DataGuardianAgent::new(DataGuardianConfig::default()).unwrap();

    let get = RequestHeadersEvent {
        metadata: test_metadata("test-50"),
        method: "GET".to_string(),
        uri: "/api/messages".to_string(),
        headers: json_headers(),
    };
    agent.on_request_headers(get).await;
    assert_eq!(agent.pending_requests().await, 0);

    let mut headers = json_headers();
    headers.insert("Content-Length".to_string(), vec!["0".to_string()]);
    let empty_post = RequestHeadersEvent {
        metadata: test_metadata("test-51"),
        method: "POST".to_string(),
        uri: "/api/messages".to_string(),
        headers,
    };
    agent.on_request_headers(empty_post).await;
    assert_eq!(agent.pending_requests().await, 0);

    agent.on_request_complete(request_complete("test-50")).await;
    agent.on_request_complete(request_complete("test-51")).await;
    assert_eq!(agent.pending_responses().await, 0);
}

#[tokio::test]
async fn test_aborted_request_released_on_completion() {
    let agent = DataGuardianAgent::new(DataGuardianConfig::default()).unwrap();

    let post = RequestHeadersEvent {
        metadata: test_metadata("test-52"),
        method: "POST".to_string(),
        uri: "/api/messages".to_string(),
        headers: json_headers(),
    };
    agent.on_request_headers(post).await;
    assert_eq!(agent.pending_requests().await, 1);

    let partial = RequestBodyChunkEvent {
        correlation_id: "test-52".to_string(),
        data: BASE64.encode(r#"{"message": "Contact"#),
        is_last: false,
        total_size: None,
        chunk_index: 0,
        bytes_received: 20,
    };
    agent.on_request_body_chunk(partial).await;
    assert_eq!(agent.pending_requests().await, 1);

    agent.on_request_complete(request_complete("test-52")).await;
    assert_eq!(agent.pending_requests().await, 0);
    assert_eq!(agent.pending_responses().await, 0);
}

#[tokio::test]
async fn test_response_without_body_not_tracked() {
    let agent = DataGuardianAgent::new(DataGuardianConfig::default()).unwrap();

    let get = RequestHeadersEvent {
        metadata: test_metadata("test-53"),
        method: "GET".to_string(),
        uri: "/api/messages".to_string(),
        headers: json_headers(),
    };
    agent.on_request_headers(get).await;
    assert_eq!(agent.pending_responses().await, 1);

    let no_content = ResponseHeadersEvent {
        correlation_id: "test-53".to_string(),
        status: 204,
        headers: json_headers(),
    };
    agent.on_response_headers(no_content).await;
    assert_eq!(agent.pending_responses().await, 0);
}

// ============================================================================
// Responses
// ============================================================================

#[tokio::test]
async fn test_response_tagged_with_risk() {
    let (mut client, handle, _dir) = start_agent(DataGuardianConfig::default()).await;

    let request = send_request(&mut client, "test-60", "/api/users/1", CLEAN_BODY, json_headers())
        .await;
    assert_eq!(
        request_header(&request, "X-DataGuardian-Request-Risk"),
        Some("0.00")
    );

    let responses = send_response(
        &mut client,
        "test-60",
        200,
        &[EMAIL_BODY.as_bytes()],
        json_headers(),
    )
    .await;
    let last = responses.last().unwrap();

    assert!(matches!(last.decision, Decision::Allow));
    assert_eq!(
        response_header(last, "X-DataGuardian-Response-Risk"),
        Some("4.51")
    );
    assert_eq!(
        response_header(last, "X-DataGuardian-Response-Detected"),
        Some("EMAIL=1")
    );
    assert!(last.response_body_mutation.is_none());
    assert!(last.audit.tags.contains(&"response".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_response_blocked_above_threshold() {
    let (mut client, handle, _dir) = start_agent(block_config(4.0)).await;

    let request = send_request(&mut client, "test-61", "/api/users/1", CLEAN_BODY, json_headers())
        .await;
    assert!(matches!(request.decision, Decision::Allow));

    let responses = send_response(
        &mut client,
        "test-61",
        200,
        &[EMAIL_BODY.as_bytes()],
        json_headers(),
    )
    .await;
    let last = responses.last().unwrap();

    assert!(matches!(last.decision, Decision::Block { status: 403, .. }));
    assert_eq!(response_header(last, "X-DataGuardian-Blocked"), Some("true"));
    assert_eq!(
        response_header(last, "X-DataGuardian-Response-Risk"),
        Some("4.51")
    );
    assert!(last
        .audit
        .reason_codes
        .contains(&"PII_RISK_BLOCKED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_response_body_redacted() {
    let config = DataGuardianConfig {
        action: ActionMode::Redact,
        ..Default::default()
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    send_request(&mut client, "test-62", "/api/users/1", CLEAN_BODY, json_headers()).await;

    let responses = send_response(
        &mut client,
        "test-62",
        200,
        &[br#"{"message": "Contact me at jane@exa"#, br#"mple.com"}"#],
        json_headers(),
    )
    .await;

    // The first chunk is held back until the body is complete
    let first = responses[0].response_body_mutation.as_ref().unwrap();
    assert!(first.data.is_none());
    assert_eq!(replaced_body(&responses[0]), None);

    let last = &responses[1];
    assert!(matches!(last.decision, Decision::Allow));
    assert_eq!(
        replaced_body(last).as_deref(),
        Some(r#"{"message": "Contact me at ****************"}"#)
    );
    assert!(last.audit.reason_codes.contains(&"PII_REDACTED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_response_below_redaction_threshold_passed_through() {
    let mut config = DataGuardianConfig {
        action: ActionMode::Redact,
        ..Default::default()
    };
    config.policy.redaction.threshold = 6.0;
    let (mut client, handle, _dir) = start_agent(config).await;

    send_request(&mut client, "test-63", "/api/users/1", CLEAN_BODY, json_headers()).await;

    let responses = send_response(
        &mut client,
        "test-63",
        200,
        &[br#"{"message": "Contact me at jane@exa"#, br#"mple.com"}"#],
        json_headers(),
    )
    .await;

    assert_eq!(replaced_body(&responses[1]).as_deref(), Some(EMAIL_BODY));
    assert!(!responses[1]
        .audit
        .reason_codes
        .contains(&"PII_REDACTED".to_string()));
    client.close().await.unwrap();
    handle.abort();
}

#[tokio::test]
async fn test_response_analysis_disabled() {
    let config = DataGuardianConfig {
        analyze_responses: false,
        ..block_config(0.0)
    };
    let (mut client, handle, _dir) = start_agent(config).await;

    send_request(&mut client, "test-64", "/api/users/1", CLEAN_BODY, json_headers()).await;
    let responses = send_response(
        &mut client,
        "test-64",
        200,
        &[EMAIL_BODY.as_bytes()],
        json_headers(),
    )
    .await;

    assert!(matches!(responses[0].decision, Decision::Allow));
    assert!(responses[0].response_headers.is_empty());
    client.close().await.unwrap();
    handle.abort();
}
