//! The handler contract and the composer that stacks policies around it.
//!
//! Every pipeline stage and the terminal business handler satisfy the same
//! contract: `tower::Service<Request, Response = Reply, Error = DispatchError>`.
//! `Service::call` is the single `handle` operation.
//!
//! # Composition order
//!
//! [`compose`] folds the middleware list over the base handler in list order.
//! The **first** middleware therefore ends up **innermost** (closest to the
//! business handler) and the **last** one **outermost** (first to see a
//! request, last to see its reply). This is the opposite of
//! `tower::ServiceBuilder`, which lists layers outermost first; choosing the
//! list order means choosing call-stack placement.

use std::future::Future;

use feeder_core::Reply;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use super::request::{DispatchError, Request};

/// Type-erased handler shared by all stages. Cloning is cheap and clones
/// share any state the wrapped stages keep behind `Arc`s. It is `Sync`, so a
/// shared template can be cloned per request without a lock.
pub type BoxHandler = BoxCloneSyncService<Request, Reply, DispatchError>;

/// Wrapper constructor: takes the current handler and returns it wrapped.
pub type Middleware = Box<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Adapts a `tower::Layer` into a [`Middleware`].
pub fn middleware<L>(layer: L) -> Middleware
where
    L: Layer<BoxHandler> + Send + Sync + 'static,
    L::Service:
        Service<Request, Response = Reply, Error = DispatchError> + Clone + Send + Sync + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Box::new(move |inner: BoxHandler| BoxCloneSyncService::new(layer.layer(inner)))
}

/// Wraps `handler` with `middlewares`, first entry innermost.
///
/// Composition never fails; every middleware is assumed well-formed.
pub fn compose<S>(handler: S, middlewares: impl IntoIterator<Item = Middleware>) -> BoxHandler
where
    S: Service<Request, Response = Reply, Error = DispatchError> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    middlewares
        .into_iter()
        .fold(BoxCloneSyncService::new(handler), |current, wrap| wrap(current))
}

/// Turns an async closure into a handler.
pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, DispatchError>> + Send + 'static,
{
    BoxCloneSyncService::new(tower::service_fn(f))
}
