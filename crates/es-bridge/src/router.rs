//! Dispatch router
//!
//! The [`Router`] decides whether an event is persisted, runs the kind's
//! normalizer, shapes the document for the configured API generation, and
//! hands it to the sink on a detached task.
//!
//! ```text
//! handle("raddec", payload)
//!     │
//!     ▼
//! ┌──────────────────────────────────────────┐
//! │ 1. kind configured?        no ─► Skip    │
//! │ 2. generation supports it? no ─► Skip    │
//! │ 3. normalize               skip ─► Skip  │
//! │ 4. shape + spawn submit   ─► Submitted   │
//! └──────────────────────────────────────────┘
//!                    │ (detached)
//!                    ▼
//!              sink.submit() ─► log on failure when print_errors
//! ```
//!
//! `handle` never waits for the sink. Submissions may complete in any
//! order and are never retried or cancelled.

use crate::es_sink::ElasticsearchSink;
use es_bridge_core::prelude::*;
use es_bridge_core::{DispatchMetrics, LatencyTimer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// What `handle` did with an event
#[derive(Debug)]
pub enum Dispatch {
    /// Nothing to persist
    Skipped(SkipReason),
    /// A submission is in flight
    Submitted(Submission),
}

impl Dispatch {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            Self::Submitted(_) => None,
        }
    }

    pub fn into_submission(self) -> Option<Submission> {
        match self {
            Self::Submitted(submission) => Some(submission),
            Self::Skipped(_) => None,
        }
    }
}

/// Handle to an in-flight submission.
///
/// Dropping it detaches the task; it still runs to completion.
#[derive(Debug)]
pub struct Submission {
    index: &'static str,
    id: Option<String>,
    task: JoinHandle<()>,
}

impl Submission {
    /// Target index
    pub fn index(&self) -> &str {
        self.index
    }

    /// Document identifier, if any
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the submission to finish, successfully or not
    pub async fn completed(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, index = self.index, "Submission task did not complete");
        }
    }
}

/// Event dispatch router
pub struct Router {
    normalizers: HashMap<EventKind, Box<dyn Normalizer>>,
    profile: BackendProfile,
    sink: Arc<dyn DocumentSink>,
    print_errors: bool,
    metrics: DispatchMetrics,
    runtime: Handle,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Backend profile documents are shaped for
    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    /// Whether events of `kind` are configured to be stored
    pub fn is_configured(&self, kind: EventKind) -> bool {
        self.normalizers.contains_key(&kind)
    }

    /// Handle one event from the bus
    pub fn handle_event(&self, event: &Event) -> Dispatch {
        self.handle(&event.kind, &event.payload)
    }

    /// Handle one event from the bus.
    ///
    /// Never blocks on the sink and never fails: anything that cannot be
    /// persisted comes back as [`Dispatch::Skipped`].
    pub fn handle(&self, kind: &str, payload: &Value) -> Dispatch {
        let kind = kind.parse::<EventKind>().ok();
        let label = kind.map(|k| k.as_str()).unwrap_or("unknown");
        self.metrics.record_received(label);

        match self.prepare(kind, payload) {
            Ok((kind, request)) => Dispatch::Submitted(self.submit(kind, request)),
            Err(reason) => {
                trace!(kind = label, %reason, "Event skipped");
                self.metrics.record_skipped(label, reason.as_label());
                Dispatch::Skipped(reason)
            }
        }
    }

    fn prepare(
        &self,
        kind: Option<EventKind>,
        payload: &Value,
    ) -> std::result::Result<(EventKind, ShapedRequest), SkipReason> {
        let (kind, normalizer) = kind
            .and_then(|k| self.normalizers.get(&k).map(|n| (k, n)))
            .ok_or(SkipReason::UnconfiguredKind)?;

        if !self.profile.supports(kind) {
            return Err(SkipReason::UnsupportedByBackend);
        }

        match normalizer.normalize(payload) {
            Normalized::Document(doc) => Ok((kind, shape(kind.index(), doc, &self.profile))),
            Normalized::Skip(reason) => Err(reason),
        }
    }

    fn submit(&self, kind: EventKind, request: ShapedRequest) -> Submission {
        let index = kind.index();
        let id = request.id.clone();
        let sink = Arc::clone(&self.sink);
        let metrics = self.metrics.clone();
        let print_errors = self.print_errors;
        let ctx = ErrorContext::new("router", "submit")
            .with_index(index)
            .with_document_id(id.clone());

        let task = self.runtime.spawn(async move {
            let timer = LatencyTimer::start(|d| metrics.record_submit_latency(kind.as_str(), d));
            let outcome = sink.submit(request).await;
            timer.stop();

            let outcome = if print_errors {
                outcome.with_context(&ctx)
            } else {
                outcome
            };

            match outcome {
                Ok(response) => {
                    metrics.record_submitted(kind.as_str());
                    debug!(
                        index,
                        status = response.status,
                        result = ?response.result,
                        "Document submitted"
                    );
                }
                Err(e) => {
                    metrics.record_failed(kind.as_str(), e.kind_label());
                }
            }
        });

        Submission { index, id, task }
    }
}

/// Builder for [`Router`]
#[derive(Default)]
pub struct RouterBuilder {
    events: Option<EventConfig>,
    generation: ApiGeneration,
    endpoint: Option<ElasticsearchConfig>,
    sink: Option<Arc<dyn DocumentSink>>,
    print_errors: bool,
    runtime: Option<Handle>,
}

impl RouterBuilder {
    /// Event kinds to store (defaults to raddec and dynamb)
    pub fn events(mut self, events: EventConfig) -> Self {
        self.events = Some(events);
        self
    }

    pub fn api_generation(mut self, generation: ApiGeneration) -> Self {
        self.generation = generation;
        self
    }

    /// Connect to Elasticsearch with this configuration
    pub fn endpoint(mut self, endpoint: ElasticsearchConfig) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Use a pre-built sink
    pub fn sink(mut self, sink: Arc<dyn DocumentSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Log submission failures
    pub fn print_errors(mut self, print_errors: bool) -> Self {
        self.print_errors = print_errors;
        self
    }

    /// Runtime submissions are spawned on (defaults to the current one)
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Router> {
        let sink: Arc<dyn DocumentSink> = match (self.sink, self.endpoint) {
            (Some(_), Some(_)) => {
                return Err(BridgeError::config(
                    "configure either a sink or an Elasticsearch endpoint, not both",
                ))
            }
            (Some(sink), None) => sink,
            (None, endpoint) => Arc::new(ElasticsearchSink::new(endpoint.unwrap_or_default())?),
        };

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                BridgeError::config(format!("router needs a tokio runtime: {}", e))
            })?,
        };

        let events = self.events.unwrap_or_default();
        let profile = BackendProfile::for_generation(self.generation);
        for kind in events.kinds().filter(|k| !profile.supports(*k)) {
            warn!(
                %kind,
                generation = %profile.generation,
                "Event kind not supported by API generation, its events will be skipped"
            );
        }

        let normalizers: HashMap<_, _> = events
            .iter()
            .map(|options| (options.kind(), options.normalizer()))
            .collect();

        let kinds: Vec<EventKind> = events.kinds().collect();
        info!(
            ?kinds,
            generation = %profile.generation,
            sink = sink.name(),
            "Router configured"
        );

        Ok(Router {
            normalizers,
            profile,
            sink,
            print_errors: self.print_errors,
            metrics: DispatchMetrics::new("router"),
            runtime,
        })
    }
}
