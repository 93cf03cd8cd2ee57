//! Message dispatch: the handler contract, the policy middleware stacked
//! around it, and the bot's business handler.
//!
//! 1. **Handler** (`handler`): the `tower::Service` contract and `compose`
//! 2. **Middleware** (`middleware`): throttle, sequencer, metrics, error handling
//! 3. **Commands** (`commands`): the terminal business handler

pub mod commands;
pub mod config;
pub mod handler;
pub mod middleware;
pub mod request;

#[cfg(test)]
mod testing;

// Re-export key types for convenient access.
pub use commands::CommandHandler;
pub use config::{ConfigError, DispatchConfig};
pub use handler::{compose, handler_fn, middleware, BoxHandler, Middleware};
pub use middleware::build_dispatch_pipeline;
pub use request::{DispatchError, ErrorKind, Request, WaitStage};
