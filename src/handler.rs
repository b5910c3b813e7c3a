use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use mime::TEXT_PLAIN_UTF_8;

use crate::{
    body::Body,
    error::Error,
    request::{Head, Request},
    response::Response,
};

/// The error-returning handler shape.
///
/// A handler owns the request, produces the response, and may fail instead of
/// rendering its own error page. A reported error goes to the
/// [`ErrorHandler`] bound to the [`Router`](crate::router::Router) that
/// registered the handler, and nowhere else.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Request) -> Result<Response, Error>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
    async fn call(&self, req: Request) -> Result<Response, Error> {
        self.as_ref().call(req).await
    }
}

pub type DynHandler = Arc<dyn Handler>;

pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    HandlerFn(f)
}

pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send,
{
    async fn call(&self, req: Request) -> Result<Response, Error> {
        (self.0)(req).await
    }
}

/// The conventional handler shape: it cannot fail, so any error must already
/// be rendered into the response it returns.
#[async_trait]
pub trait PlainHandler: Send + Sync + 'static {
    async fn call(&self, req: Request) -> Response;
}

#[async_trait]
impl<T: PlainHandler + ?Sized> PlainHandler for Arc<T> {
    async fn call(&self, req: Request) -> Response {
        self.as_ref().call(req).await
    }
}

pub type DynPlainHandler = Arc<dyn PlainHandler>;

pub fn plain_handler_fn<F, Fut>(f: F) -> PlainHandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    PlainHandlerFn(f)
}

pub struct PlainHandlerFn<F>(F);

#[async_trait]
impl<F, Fut> PlainHandler for PlainHandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send,
{
    async fn call(&self, req: Request) -> Response {
        (self.0)(req).await
    }
}

/// Renders the user-visible response for a failed dispatch.
///
/// The head is a snapshot taken before the failing handler consumed the
/// request.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, head: &Head, error: Error) -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(&Head, Error) -> Response + Send + Sync + 'static,
{
    fn handle(&self, head: &Head, error: Error) -> Response {
        self(head, error)
    }
}

pub type DynErrorHandler = Arc<dyn ErrorHandler>;

/// The error handler used when none is configured: a 500 whose body is the
/// error's message followed by a newline.
pub fn default_error_handler(_: &Head, error: Error) -> Response {
    http::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(
            CONTENT_TYPE,
            HeaderValue::from_static(TEXT_PLAIN_UTF_8.as_ref()),
        )
        .body(Body::from(format!("{error}\n")))
        .unwrap()
}
