//! Request handlers.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::routing::Vars;

/// An async request handler.
///
/// Receives the request and the path variables captured by the route.
/// Implemented for every `Fn(Request<Body>, Vars) -> impl Future` whose
/// output converts into a response, so plain `async` closures and functions
/// can be registered directly.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request<Body>, vars: Vars) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request<Body>, Vars) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, request: Request<Body>, vars: Vars) -> BoxFuture<'static, Response> {
        let fut = (self)(request, vars);
        async move { fut.await.into_response() }.boxed()
    }
}

/// Handler as stored in the routing tree.
pub type SharedHandler = Arc<dyn Handler>;
