//! # ES Bridge Core
//!
//! Core types, normalizers, and sink abstractions for the ES event bridge.
//!
//! Telemetry events are normalized per kind, shaped for the configured
//! Elasticsearch API generation, and handed to a [`DocumentSink`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Event    │────►│ Normalizer  │────►│   Shaper    │────►│    Sink     │
//! │ kind+payload│     │  (per kind) │     │ (per API)   │     │  submit()   │
//! └─────────────┘     └──────┬──────┘     └─────────────┘     └─────────────┘
//!                            │
//!                       ┌────┴────┐
//!                       │   geo   │
//!                       └─────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod event_config;
pub mod geo;
pub mod metrics;
pub mod normalize;
pub mod shaper;
pub mod sink;

pub use config::*;
pub use error::*;
pub use event::*;
pub use event_config::*;
pub use metrics::*;
pub use normalize::*;
pub use shaper::*;
pub use sink::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{BridgeConfig, ElasticsearchConfig};
    pub use crate::error::{BridgeError, ErrorContext, ErrorContextExt, Result};
    pub use crate::event::{Event, EventKind};
    pub use crate::event_config::{EventConfig, EventOptions};
    pub use crate::normalize::{Normalized, NormalizedDocument, Normalizer, SkipReason};
    pub use crate::shaper::{shape, ApiGeneration, BackendProfile, ShapedRequest};
    pub use crate::sink::{DocumentSink, HealthCheck, MemorySink, SubmitResponse};
}
