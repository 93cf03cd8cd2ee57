//! Bot runtime: transports and the dispatch loop that feeds the pipeline.
//!
//! - [`runner`]: `Bot`, the receive / dispatch / reply loop with graceful drain
//! - [`shutdown`]: Health state machine and in-flight tracking
//! - [`telegram`]: Telegram Bot API long-polling transport
//! - [`transport`]: In-memory channel transport

pub mod runner;
pub mod shutdown;
pub mod telegram;
pub mod transport;

pub use runner::Bot;
pub use shutdown::{HealthState, InFlightGuard, Lifecycle};
pub use telegram::{TelegramTransport, TransportError, DEFAULT_API_URL};
pub use transport::{ChannelPeer, ChannelTransport};
