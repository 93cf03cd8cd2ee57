//! Feeder bot server: per-actor ordered dispatch pipeline, Telegram transport,
//! and the runtime that ties them together.

pub mod bot;
pub mod cli;
pub mod crawler;
pub mod service;
pub mod telemetry;
pub mod traits;

pub use bot::{Bot, ChannelTransport, HealthState, TelegramTransport};
pub use crawler::HttpPageFetcher;
pub use service::{build_dispatch_pipeline, CommandHandler, DispatchConfig, DispatchError};
pub use traits::{PageFetcher, Transport};
