//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`throttle`]: Global concurrency cap, waiting rather than rejecting
//! - [`sequencer`]: Per-actor FIFO serialization
//! - [`metrics`]: Request timing and outcome via `tracing` and `metrics`
//! - [`error_handling`]: Folds failures into a fixed user-facing reply
//! - [`pipeline`]: Composes all layers around a business handler

pub mod error_handling;
pub mod metrics;
pub mod pipeline;
pub mod sequencer;
pub mod throttle;

pub use error_handling::{ErrorHandlingLayer, FALLBACK_TEXT};
pub use metrics::{DefaultObserver, MetricsLayer, Observation, Observer};
pub use pipeline::{build_dispatch_pipeline, dispatch_middlewares};
pub use sequencer::SequencerLayer;
pub use throttle::ThrottleLayer;
