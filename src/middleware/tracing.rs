use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use tracing::Instrument;

use super::Middleware;
use crate::{
    error::Error,
    handler::{DynHandler, Handler},
    request::Request,
    response::Response,
};

/// Opt-in request tracing. The adapter core never logs on its own; wrap a
/// router's dispatch with this middleware to get per-request spans.
#[derive(Clone, Copy)]
pub struct Tracing;

impl Middleware for Tracing {
    fn transform(&self, next: DynHandler) -> DynHandler {
        Arc::new(TracingHandler { inner: next })
    }
}

struct TracingHandler {
    inner: DynHandler,
}

#[async_trait]
impl Handler for TracingHandler {
    async fn call(&self, req: Request) -> Result<Response, Error> {
        let head = &req.head;

        let span = ::tracing::info_span!(
            target: module_path!(),
            "request",
            remote_addr = %head.remote_addr(),
            version = ?head.version,
            method = %head.method,
            uri = %head.original_uri(),
        );

        async move {
            let now = Instant::now();
            let result = self.inner.call(req).await;
            let duration = now.elapsed();

            match &result {
                Ok(response) => {
                    ::tracing::info!(
                        status = %response.status(),
                        duration = ?duration,
                        "response"
                    )
                }
                Err(error) => {
                    ::tracing::info!(
                        duration = ?duration,
                        error = %error,
                        "error"
                    )
                }
            };

            result
        }
        .instrument(span)
        .await
    }
}
