//! Interop between the error-returning and the conventional handler shapes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    error::Error,
    handler::{DynErrorHandler, DynHandler, DynPlainHandler, ErrorHandler, Handler, PlainHandler},
    middleware::Middleware,
    request::Request,
    response::Response,
};

/// An error-returning handler adapted to the conventional shape: failures are
/// rendered by the bound error handler, which runs exactly once per failed
/// dispatch.
pub(crate) struct Adapted {
    pub(crate) inner: DynHandler,
    pub(crate) error_handler: DynErrorHandler,
}

#[async_trait]
impl PlainHandler for Adapted {
    async fn call(&self, req: Request) -> Response {
        // The handler consumes the request, so snapshot the head for the
        // error handler first.
        let head = req.head.clone();

        match self.inner.call(req).await {
            Ok(response) => response,
            Err(error) => self.error_handler.handle(&head, error),
        }
    }
}

/// Converts an error-returning handler plus an error handler into a
/// conventional handler.
pub fn adapt_handler<H, E>(handler: H, error_handler: E) -> DynPlainHandler
where
    H: Handler,
    E: ErrorHandler,
{
    Arc::new(Adapted {
        inner: Arc::new(handler),
        error_handler: Arc::new(error_handler),
    })
}

/// Converts a conventional handler into the error-returning shape. The
/// result always succeeds.
pub fn plain<H>(handler: H) -> Plain<H>
where
    H: PlainHandler,
{
    Plain(handler)
}

pub struct Plain<H>(pub(crate) H);

#[async_trait]
impl<H: PlainHandler> Handler for Plain<H> {
    async fn call(&self, req: Request) -> Result<Response, Error> {
        Ok(self.0.call(req).await)
    }
}

/// Converts a conventional middleware into the error-returning
/// [`Middleware`] shape.
///
/// The conventional middleware wraps a probe that forwards to the inner
/// error-returning handler; an error reported there is stashed aside and
/// re-surfaced once the conventional middleware returns, discarding whatever
/// response it assembled around the failure.
pub fn plain_middleware<F>(middleware: F) -> PlainCompat<F>
where
    F: Fn(DynPlainHandler) -> DynPlainHandler + Send + Sync + 'static,
{
    PlainCompat {
        middleware: Arc::new(middleware),
    }
}

pub struct PlainCompat<F> {
    middleware: Arc<F>,
}

impl<F> Middleware for PlainCompat<F>
where
    F: Fn(DynPlainHandler) -> DynPlainHandler + Send + Sync + 'static,
{
    fn transform(&self, next: DynHandler) -> DynHandler {
        Arc::new(PlainCompatHandler {
            middleware: self.middleware.clone(),
            next,
        })
    }
}

struct PlainCompatHandler<F> {
    middleware: Arc<F>,
    next: DynHandler,
}

#[async_trait]
impl<F> Handler for PlainCompatHandler<F>
where
    F: Fn(DynPlainHandler) -> DynPlainHandler + Send + Sync + 'static,
{
    async fn call(&self, req: Request) -> Result<Response, Error> {
        let slot = Arc::new(Mutex::new(None));

        let probe: DynPlainHandler = Arc::new(Probe {
            next: self.next.clone(),
            slot: slot.clone(),
        });

        let wrapped = (self.middleware)(probe);
        let response = wrapped.call(req).await;

        let stashed = slot.lock().unwrap().take();

        match stashed {
            Some(error) => Err(error),
            None => Ok(response),
        }
    }
}

struct Probe {
    next: DynHandler,
    slot: Arc<Mutex<Option<Error>>>,
}

#[async_trait]
impl PlainHandler for Probe {
    async fn call(&self, req: Request) -> Response {
        match self.next.call(req).await {
            Ok(response) => response,
            Err(error) => {
                *self.slot.lock().unwrap() = Some(error);
                Response::default()
            }
        }
    }
}
