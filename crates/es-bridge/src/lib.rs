//! # ES Bridge
//!
//! Dispatches telemetry events from an upstream bus to Elasticsearch.
//!
//! ## Components
//!
//! - [`Router`]: selects, normalizes, shapes and submits events
//! - [`ElasticsearchSink`]: single-document REST index writes
//!
//! ## Usage
//!
//! ```rust,ignore
//! let router = Router::builder()
//!     .events(EventConfig::default().with_kind(EventKind::Spatem))
//!     .api_generation(ApiGeneration::V8)
//!     .endpoint(ElasticsearchConfig::default())
//!     .print_errors(true)
//!     .build()?;
//!
//! router.handle("raddec", &payload);
//! ```
//!
//! ## Delivery
//!
//! Best effort: each persisted event becomes one detached submission.
//! Failures are counted and optionally logged, never retried.

pub mod es_sink;
pub mod router;

pub use es_sink::*;
pub use router::*;
