use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use http::{Method, StatusCode, Uri};
use snafu::ResultExt;

use crate::{
    body::Body,
    error::{AlreadyMountedSnafu, DuplicateRouteSnafu, InvalidPatternSnafu, RouteError},
    handler::{DynPlainHandler, PlainHandler},
    path_params::PathParams,
    request::Request,
    response::Response,
};

/// A conventional middleware chain link. The first link applied is the
/// outermost one.
pub type PlainMiddleware = Box<dyn Fn(DynPlainHandler) -> DynPlainHandler + Send + Sync>;

/// Reserved parameter name backing [`Mux::mount`]'s catch-all route. Never
/// exposed through path-parameter lookup.
const MOUNT_PARAM: &str = "__mount";

enum Endpoint {
    Methods(HashMap<Method, DynPlainHandler>),
    Mounted(DynPlainHandler),
}

/// The plain multiplexer the error-aware [`Router`](crate::router::Router)
/// delegates to.
///
/// All pattern semantics (static segments, `{name}` parameters, `{*rest}`
/// wildcards) belong to [`matchit`]; this type only maps matches to method
/// tables, fallbacks and mount points. It deals exclusively in the
/// conventional [`PlainHandler`] shape.
pub struct Mux {
    router: matchit::Router<usize>,
    endpoints: Vec<Endpoint>,
    patterns: HashMap<String, usize>,
    middlewares: Vec<PlainMiddleware>,
    not_found: DynPlainHandler,
    method_not_allowed: DynPlainHandler,
}

impl Default for Mux {
    fn default() -> Self {
        Self {
            router: matchit::Router::new(),
            endpoints: Vec::new(),
            patterns: HashMap::new(),
            middlewares: Vec::new(),
            not_found: Arc::new(StatusHandler(StatusCode::NOT_FOUND)),
            method_not_allowed: Arc::new(StatusHandler(StatusCode::METHOD_NOT_ALLOWED)),
        }
    }
}

impl Mux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` at `pattern`. Several methods may
    /// accumulate on the same pattern through separate calls.
    pub fn method(
        &mut self,
        method: Method,
        pattern: &str,
        handler: DynPlainHandler,
    ) -> Result<(), RouteError> {
        if let Some(&slot) = self.patterns.get(pattern) {
            let Endpoint::Methods(methods) = &mut self.endpoints[slot] else {
                return AlreadyMountedSnafu { pattern }.fail();
            };

            if methods.contains_key(&method) {
                return DuplicateRouteSnafu { method, pattern }.fail();
            }

            methods.insert(method, handler);
            return Ok(());
        }

        let slot = self.endpoints.len();
        self.router
            .insert(pattern, slot)
            .context(InvalidPatternSnafu { pattern })?;

        self.endpoints
            .push(Endpoint::Methods(HashMap::from([(method, handler)])));
        self.patterns.insert(pattern.to_owned(), slot);

        Ok(())
    }

    pub fn not_found(&mut self, handler: DynPlainHandler) {
        self.not_found = handler;
    }

    pub fn method_not_allowed(&mut self, handler: DynPlainHandler) {
        self.method_not_allowed = handler;
    }

    pub fn apply(&mut self, middleware: PlainMiddleware) {
        self.middlewares.push(middleware);
    }

    /// Mounts `handler` under `prefix`: the prefix is stripped from the URI
    /// before the mounted handler sees the request, and the query string is
    /// preserved. Named parameters in the prefix are still extracted.
    pub fn mount(&mut self, prefix: &str, handler: DynPlainHandler) -> Result<(), RouteError> {
        let prefix = prefix.trim_end_matches('/');

        let (root, wildcard) = if prefix.is_empty() {
            ("/".to_owned(), format!("/{{*{MOUNT_PARAM}}}"))
        } else {
            (prefix.to_owned(), format!("{prefix}/{{*{MOUNT_PARAM}}}"))
        };

        let slot = self.endpoints.len();
        self.endpoints.push(Endpoint::Mounted(handler));

        self.router
            .insert(root.as_str(), slot)
            .context(InvalidPatternSnafu {
                pattern: root.as_str(),
            })?;
        self.patterns.insert(root, slot);

        self.router
            .insert(wildcard.as_str(), slot)
            .context(InvalidPatternSnafu {
                pattern: wildcard.as_str(),
            })?;
        self.patterns.insert(wildcard, slot);

        Ok(())
    }

    /// Freezes the mux into a servable handler, wrapping the dispatcher in
    /// the registered middleware chain.
    pub fn into_handler(self) -> DynPlainHandler {
        let Self {
            router,
            endpoints,
            patterns: _,
            middlewares,
            not_found,
            method_not_allowed,
        } = self;

        let mut handler: DynPlainHandler = Arc::new(Dispatch {
            router,
            endpoints,
            not_found,
            method_not_allowed,
        });

        for middleware in middlewares.into_iter().rev() {
            handler = middleware(handler);
        }

        handler
    }
}

struct StatusHandler(StatusCode);

#[async_trait]
impl PlainHandler for StatusHandler {
    async fn call(&self, _: Request) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = self.0;
        response
    }
}

struct Dispatch {
    router: matchit::Router<usize>,
    endpoints: Vec<Endpoint>,
    not_found: DynPlainHandler,
    method_not_allowed: DynPlainHandler,
}

#[async_trait]
impl PlainHandler for Dispatch {
    async fn call(&self, mut req: Request) -> Response {
        let matched = match self.router.at(req.head.uri.path()) {
            Ok(matched) => matched,
            Err(_) => return self.not_found.call(req).await,
        };

        match &self.endpoints[*matched.value] {
            Endpoint::Methods(methods) => {
                let Some(handler) = methods.get(&req.head.method) else {
                    return self.method_not_allowed.call(req).await;
                };

                req.head
                    .extensions
                    .get_or_insert_default::<PathParams>()
                    .insert(matched.params.iter());

                handler.call(req).await
            }
            Endpoint::Mounted(handler) => {
                let rest = matched.params.get(MOUNT_PARAM).unwrap_or("").to_owned();

                req.head
                    .extensions
                    .get_or_insert_default::<PathParams>()
                    .insert(matched.params.iter().filter(|&(key, _)| key != MOUNT_PARAM));

                let mut path = String::with_capacity(rest.len() + 1);
                path.push('/');
                path.push_str(rest.trim_start_matches('/'));

                if let Some(query) = req.head.uri.query() {
                    path.push('?');
                    path.push_str(query);
                }

                match path.parse::<Uri>() {
                    Ok(uri) => req.head.uri = uri,
                    Err(_) => return self.not_found.call(req).await,
                }

                handler.call(req).await
            }
        }
    }
}
