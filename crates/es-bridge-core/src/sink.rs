//! Sink abstractions
//!
//! The document store is opaque to the bridge beyond a single
//! submit-one-document call. Implementations:
//!
//! - `ElasticsearchSink` (in `es-bridge`): REST index API over HTTP
//! - [`MemorySink`]: keeps requests in memory for tests, or drops them for
//!   dry runs

use crate::error::{BridgeError, Result};
use crate::shaper::ShapedRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Store acknowledgement of a submitted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    /// HTTP-style status code
    pub status: u16,

    /// Store-reported result, e.g. "created" or "updated"
    pub result: Option<String>,
}

impl SubmitResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            result: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}

/// Document store boundary
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Submit one shaped request
    async fn submit(&self, request: ShapedRequest) -> Result<SubmitResponse>;

    /// Sink name for logs and metrics
    fn name(&self) -> &'static str;
}

/// Health check capability
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Returns Ok(()) if healthy, Err with details if not.
    async fn health_check(&self) -> Result<()>;

    /// Get component name for health reporting
    fn component_name(&self) -> &'static str;
}

/// In-memory sink
#[derive(Default)]
pub struct MemorySink {
    requests: RwLock<Vec<ShapedRequest>>,
    failing: AtomicBool,
    discard: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that acknowledges every submit without keeping it
    pub fn discarding() -> Self {
        Self {
            discard: true,
            ..Self::default()
        }
    }

    /// A sink that rejects every submit
    pub fn failing() -> Self {
        let sink = Self::new();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests accepted so far, in completion order
    pub async fn requests(&self) -> Vec<ShapedRequest> {
        self.requests.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn submit(&self, request: ShapedRequest) -> Result<SubmitResponse> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::elasticsearch("memory sink rejected request"));
        }
        if !self.discard {
            self.requests.write().await.push(request);
        }
        Ok(SubmitResponse::new(201).with_result("created"))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl HealthCheck for MemorySink {
    async fn health_check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BridgeError::elasticsearch("memory sink is failing"))
        } else {
            Ok(())
        }
    }

    fn component_name(&self) -> &'static str {
        "memory_sink"
    }
}
