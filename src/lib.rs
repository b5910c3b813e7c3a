#![cfg_attr(docsrs, feature(doc_cfg))]

//! Error-aware routing for hyper.
//!
//! `recourse` adapts the conventional "render your own error page" handler
//! shape into one that returns `Result<Response, Error>`, with a centralized
//! [`ErrorHandler`] invoked whenever a handler or middleware fails. Pattern
//! matching is delegated to [`matchit`] through the plain [`Mux`]; this crate
//! only converts between the two handler shapes and dispatches failures.
//!
//! ```no_run
//! use recourse::{handler_fn, path_param, Body, Error, Response, Router, Server};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!
//!     router.get(
//!         "/users/{id}",
//!         handler_fn(|req| async move {
//!             let id = path_param(&req, "id").ok_or_else(|| Error::msg("missing id"))?;
//!             Ok(Response::new(Body::from(format!("user {id}"))))
//!         }),
//!     )?;
//!
//!     let listener = TcpListener::bind("127.0.0.1:3000").await?;
//!     Server::new(listener).run(router.into_handler()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod body;
pub mod error;
pub mod handler;
mod macros;
pub mod middleware;
mod path_params;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;

pub use self::{
    adapter::{adapt_handler, plain, plain_middleware},
    body::Body,
    error::{BoxError, Error, RouteError},
    handler::{
        default_error_handler, handler_fn, plain_handler_fn, DynErrorHandler, DynHandler,
        DynPlainHandler, ErrorHandler, Handler, PlainHandler,
    },
    middleware::{middleware_fn, Middleware, MiddlewareFn},
    path_params::{path_param, path_param_from_extensions},
    request::{Head, Request},
    response::Response,
    route::Mux,
    router::{Builder, Router},
    server::Server,
};
