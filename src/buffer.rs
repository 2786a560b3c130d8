//! Per-exchange body buffering.
//!
//! Bodies arrive as base64 chunks keyed by correlation ID. Entries are
//! removed when their body completes or the request completes; anything left
//! behind (aborted clients, bodies that never arrive) is evicted once it is
//! older than the configured TTL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Why a buffered body cannot be analyzed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    /// More bytes than the size limit
    TooLarge,
    /// A chunk was not valid base64
    InvalidEncoding,
    /// The decoded body is not UTF-8
    InvalidUtf8,
}

impl BodyError {
    /// Audit reason code
    pub fn reason_code(&self) -> &'static str {
        match self {
            BodyError::TooLarge => "BODY_TOO_LARGE",
            BodyError::InvalidEncoding => "INVALID_BODY_ENCODING",
            BodyError::InvalidUtf8 => "INVALID_UTF8",
        }
    }
}

/// What the caller should do with the chunk just pushed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Forward the chunk unchanged
    Forward,
    /// The chunk is held back by the buffer
    Held,
    /// Forward these bytes in place of the chunk (previously held chunks
    /// released together with this one)
    Release(Vec<u8>),
}

/// One body being accumulated
#[derive(Debug)]
pub struct BodyBuffer {
    chunks: Vec<Vec<u8>>,
    bytes: usize,
    error: Option<BodyError>,
    /// Chunks are withheld from the proxy until the body is complete
    holding: bool,
    created: Instant,
}

impl BodyBuffer {
    pub fn new(holding: bool) -> Self {
        Self {
            chunks: Vec::new(),
            bytes: 0,
            error: None,
            holding,
            created: Instant::now(),
        }
    }

    /// Whether chunks are currently withheld
    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Decoded bytes seen so far
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Add a base64 chunk, keeping at most `limit` decoded bytes
    pub fn push(&mut self, data: &str, limit: usize) -> ChunkOutcome {
        let decoded = match BASE64.decode(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Body chunk is not valid base64");
                if self.error.is_none() {
                    self.error = Some(BodyError::InvalidEncoding);
                }
                // An undecodable chunk cannot be re-emitted; when holding,
                // the held bytes take its place
                return self.release_held();
            }
        };
        self.bytes += decoded.len();

        if self.error.is_some() {
            return ChunkOutcome::Forward;
        }
        if self.bytes > limit {
            debug!(bytes = self.bytes, limit = limit, "Body exceeds size limit");
            self.error = Some(BodyError::TooLarge);
            if self.holding {
                self.chunks.push(decoded);
                return self.release_held();
            }
            self.chunks.clear();
            return ChunkOutcome::Forward;
        }

        self.chunks.push(decoded);
        if self.holding {
            ChunkOutcome::Held
        } else {
            ChunkOutcome::Forward
        }
    }

    /// Stop holding and hand back whatever was held
    fn release_held(&mut self) -> ChunkOutcome {
        let was_holding = self.holding;
        self.holding = false;
        let held = std::mem::take(&mut self.chunks).concat();
        if was_holding && !held.is_empty() {
            ChunkOutcome::Release(held)
        } else {
            ChunkOutcome::Forward
        }
    }

    /// The complete raw body, as far as it was kept
    pub fn raw(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    /// The complete body as text
    pub fn text(&self) -> Result<String, BodyError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        String::from_utf8(self.raw()).map_err(|_| BodyError::InvalidUtf8)
    }
}

/// Body buffers keyed by correlation ID, with TTL eviction
#[derive(Debug)]
pub struct PendingBodies {
    entries: HashMap<String, BodyBuffer>,
    ttl: Duration,
    last_sweep: Instant,
}

impl PendingBodies {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            last_sweep: Instant::now(),
        }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start tracking a body, evicting stale entries first
    pub fn insert(&mut self, correlation_id: String, buffer: BodyBuffer) {
        self.sweep(Instant::now());
        self.entries.insert(correlation_id, buffer);
    }

    pub fn get_mut(&mut self, correlation_id: &str) -> Option<&mut BodyBuffer> {
        self.entries.get_mut(correlation_id)
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    pub fn remove(&mut self, correlation_id: &str) -> Option<BodyBuffer> {
        self.entries.remove(correlation_id)
    }

    /// Drop entries older than the TTL. Runs at most once per TTL/4.
    fn sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < self.ttl / 4 {
            return;
        }
        self.last_sweep = now;
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, buffer| now.duration_since(buffer.created) < ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted = evicted, "Evicted stale body buffers");
        }
    }
}
