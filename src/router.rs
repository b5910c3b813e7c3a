use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use crate::{
    adapter::{Adapted, Plain},
    error::RouteError,
    handler::{
        default_error_handler, DynErrorHandler, DynHandler, DynPlainHandler, ErrorHandler, Handler,
        PlainHandler,
    },
    middleware::Middleware,
    request::Request,
    response::Response,
    route::{Mux, PlainMiddleware},
};

type MuxBuilder = Arc<dyn Fn() -> Mux + Send + Sync>;

/// Configures a [`Router`] before its underlying [`Mux`] is instantiated.
///
/// Options apply in call order and each fully replaces the previous value;
/// the mux itself is only built by [`build`](Builder::build), after all
/// options have been applied.
pub struct Builder {
    mux_builder: MuxBuilder,
    error_handler: DynErrorHandler,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            mux_builder: Arc::new(Mux::default),
            error_handler: Arc::new(default_error_handler),
        }
    }
}

impl Builder {
    /// Replaces the error handler consulted by handlers registered on the
    /// built router.
    pub fn error_handler<E>(mut self, error_handler: E) -> Self
    where
        E: ErrorHandler,
    {
        self.error_handler = Arc::new(error_handler);
        self
    }

    /// Replaces how the underlying mux is constructed, for the built router
    /// and every scope it creates.
    pub fn mux_builder<F>(mut self, mux_builder: F) -> Self
    where
        F: Fn() -> Mux + Send + Sync + 'static,
    {
        self.mux_builder = Arc::new(mux_builder);
        self
    }

    pub fn build(self) -> Router {
        let Self {
            mux_builder,
            error_handler,
        } = self;

        Router {
            mux: (mux_builder)(),
            error_handler,
            mux_builder,
        }
    }
}

/// An error-aware router.
///
/// Every registration accepts the error-returning [`Handler`] shape, adapts
/// it to the conventional shape the underlying [`Mux`] expects, and binds it
/// to the error handler active at registration time. Pattern matching and
/// parameter extraction are entirely the mux's (that is, [`matchit`]'s)
/// business.
pub struct Router {
    mux: Mux,
    error_handler: DynErrorHandler,
    mux_builder: MuxBuilder,
}

impl Default for Router {
    fn default() -> Self {
        Builder::default().build()
    }
}

macro_rules! impl_method_register {
    ($($name:ident => $method:ident),+ $(,)?) => {
        $(
            pub fn $name<H: Handler>(&mut self, pattern: &str, handler: H) -> Result<(), RouteError> {
                self.method(Method::$method, pattern, handler)
            }
        )+
    };
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Replaces the active error handler. Affects only handlers registered
    /// and scopes created after this call; earlier registrations keep the
    /// handler they were bound to.
    pub fn set_error_handler<E>(&mut self, error_handler: E)
    where
        E: ErrorHandler,
    {
        self.error_handler = Arc::new(error_handler);
    }

    fn adapt(&self, handler: DynHandler) -> DynPlainHandler {
        Arc::new(Adapted {
            inner: handler,
            error_handler: self.error_handler.clone(),
        })
    }

    /// Registers `handler` for an arbitrary method at `pattern`.
    pub fn method<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        let handler = self.adapt(Arc::new(handler));
        self.mux.method(method, pattern, handler)
    }

    impl_method_register![
        get => GET,
        post => POST,
        put => PUT,
        delete => DELETE,
        patch => PATCH,
        head => HEAD,
        options => OPTIONS,
        connect => CONNECT,
        trace => TRACE,
    ];

    pub fn not_found<H: Handler>(&mut self, handler: H) {
        let handler = self.adapt(Arc::new(handler));
        self.mux.not_found(handler);
    }

    pub fn method_not_allowed<H: Handler>(&mut self, handler: H) {
        let handler = self.adapt(Arc::new(handler));
        self.mux.method_not_allowed(handler);
    }

    /// Registers a middleware. Middlewares wrap dispatch in registration
    /// order: the first registered is outermost. An error returned by a
    /// middleware goes to the error handler active at registration time,
    /// exactly like a handler error.
    pub fn middleware<M: Middleware>(&mut self, middleware: M) {
        let link = self.adapt_middleware(middleware);
        self.mux.apply(link);
    }

    fn adapt_middleware<M: Middleware>(&self, middleware: M) -> PlainMiddleware {
        let middleware = Arc::new(middleware);
        let error_handler = self.error_handler.clone();

        Box::new(move |next: DynPlainHandler| {
            Arc::new(MiddlewareLink {
                middleware: middleware.clone(),
                error_handler: error_handler.clone(),
                next,
            })
        })
    }

    /// Creates an anonymous scope mounted at the root. The scope snapshots
    /// the current error handler; later [`set_error_handler`] calls on the
    /// parent do not reach it.
    ///
    /// [`set_error_handler`]: Router::set_error_handler
    pub fn group<F>(&mut self, configure: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        self.scope("/", configure)
    }

    /// Creates a scope mounted under `pattern`, with the same error-handler
    /// snapshot semantics as [`group`](Router::group).
    pub fn route<F>(&mut self, pattern: &str, configure: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        self.scope(pattern, configure)
    }

    fn scope<F>(&mut self, prefix: &str, configure: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Router) -> Result<(), RouteError>,
    {
        let mut sub = Router {
            mux: (self.mux_builder)(),
            error_handler: self.error_handler.clone(),
            mux_builder: self.mux_builder.clone(),
        };

        configure(&mut sub)?;

        self.mux.mount(prefix, sub.into_handler())
    }

    /// Mounts an arbitrary conventional handler under `prefix`, unadapted.
    /// The escape hatch for handlers that do not use the error-returning
    /// shape.
    pub fn mount<H: PlainHandler>(&mut self, prefix: &str, handler: H) -> Result<(), RouteError> {
        self.mux.mount(prefix, Arc::new(handler))
    }

    /// Freezes the router into a servable handler. Configuration ends here;
    /// concurrent requests only ever read the frozen state.
    pub fn into_handler(self) -> DynPlainHandler {
        self.mux.into_handler()
    }
}

/// One error-returning middleware, linked into the conventional chain.
///
/// The user transform runs on every request: a terminal handler forwarding to
/// the next conventional link is built, transformed, and dispatched, so a
/// transform that carries state observes each request. The terminal handler
/// always succeeds; the next link's own failures are caught at its own level
/// of the chain.
struct MiddlewareLink<M> {
    middleware: Arc<M>,
    error_handler: DynErrorHandler,
    next: DynPlainHandler,
}

#[async_trait]
impl<M: Middleware> PlainHandler for MiddlewareLink<M> {
    async fn call(&self, req: Request) -> Response {
        let terminal: DynHandler = Arc::new(Plain(self.next.clone()));
        let wrapped = self.middleware.transform(terminal);

        let adapted = Adapted {
            inner: wrapped,
            error_handler: self.error_handler.clone(),
        };

        adapted.call(req).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use http::StatusCode;
    use http_body_util::BodyExt;

    use super::*;
    use crate::{
        body::Body,
        error::Error,
        handler::handler_fn,
        middleware::middleware_fn,
        path_params::path_param,
        request::{test_request, Head, Request},
        response::Response,
    };

    fn text(status: StatusCode, body: &'static str) -> Response {
        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn default_construction_serves_what_the_handler_wrote() {
        let mut router = Router::new();
        router
            .get("/", handler_fn(|_| async { Ok(text(StatusCode::OK, "ok")) }))
            .unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn default_error_handler_writes_the_message_and_a_newline() {
        let mut router = Router::new();
        router
            .get("/fail", handler_fn(|_| async { Err(Error::msg("boom")) }))
            .unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/fail")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[http::header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(response).await, "boom\n");
    }

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[tokio::test]
    async fn custom_error_handler_sees_the_exact_error_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut router = Router::builder()
            .error_handler({
                let calls = calls.clone();
                move |_: &Head, error: Error| {
                    assert!(error.is::<Boom>());
                    calls.fetch_add(1, Ordering::SeqCst);
                    text(StatusCode::IM_A_TEAPOT, "handled")
                }
            })
            .build();

        router
            .get("/fail", handler_fn(|_| async { Err(Error::new(Boom)) }))
            .unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/fail")).await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_string(response).await, "handled");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_handler_is_bound_at_registration_time() {
        let mut router = Router::builder()
            .error_handler(|_: &Head, _: Error| text(StatusCode::BAD_GATEWAY, "first"))
            .build();

        router
            .get("/old", handler_fn(|_| async { Err(Error::msg("x")) }))
            .unwrap();

        router.set_error_handler(|_: &Head, _: Error| text(StatusCode::BAD_GATEWAY, "second"));

        router
            .get("/new", handler_fn(|_| async { Err(Error::msg("x")) }))
            .unwrap();

        let handler = router.into_handler();

        let response = handler.call(test_request(Method::GET, "/old")).await;
        assert_eq!(body_string(response).await, "first");

        let response = handler.call(test_request(Method::GET, "/new")).await;
        assert_eq!(body_string(response).await, "second");
    }

    #[tokio::test]
    async fn scopes_snapshot_the_error_handler_at_creation() {
        let mut router = Router::builder()
            .error_handler(|_: &Head, _: Error| text(StatusCode::BAD_GATEWAY, "first"))
            .build();

        router
            .route("/a", |r| {
                r.get("/x", handler_fn(|_| async { Err(Error::msg("x")) }))
            })
            .unwrap();

        router.set_error_handler(|_: &Head, _: Error| text(StatusCode::BAD_GATEWAY, "second"));

        router
            .route("/b", |r| {
                r.get("/x", handler_fn(|_| async { Err(Error::msg("x")) }))
            })
            .unwrap();

        let handler = router.into_handler();

        let response = handler.call(test_request(Method::GET, "/a/x")).await;
        assert_eq!(body_string(response).await, "first");

        let response = handler.call(test_request(Method::GET, "/b/x")).await;
        assert_eq!(body_string(response).await, "second");
    }

    fn record(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> impl Middleware {
        middleware_fn(move |next: DynHandler| -> DynHandler {
            let log = log.clone();
            Arc::new(handler_fn(move |req| {
                let log = log.clone();
                let next = next.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}:pre"));
                    let result = next.call(req).await;
                    log.lock().unwrap().push(format!("{name}:post"));
                    result
                }
            }))
        })
    }

    #[tokio::test]
    async fn first_registered_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut router = Router::new();
        router.middleware(record(log.clone(), "a"));
        router.middleware(record(log.clone(), "b"));
        router.middleware(record(log.clone(), "c"));

        router
            .get("/", {
                let log = log.clone();
                handler_fn(move |_| {
                    let log = log.clone();
                    async move {
                        log.lock().unwrap().push("handler".to_owned());
                        Ok(text(StatusCode::OK, "ok"))
                    }
                })
            })
            .unwrap();

        let handler = router.into_handler();
        handler.call(test_request(Method::GET, "/")).await;

        assert_eq!(
            *log.lock().unwrap(),
            ["a:pre", "b:pre", "c:pre", "handler", "c:post", "b:post", "a:post"]
        );
    }

    #[tokio::test]
    async fn middleware_transform_runs_on_every_request() {
        let applications = Arc::new(AtomicUsize::new(0));

        let mut router = Router::new();
        router.middleware(middleware_fn({
            let applications = applications.clone();
            move |next: DynHandler| -> DynHandler {
                applications.fetch_add(1, Ordering::SeqCst);
                next
            }
        }));

        router
            .get("/", handler_fn(|_| async { Ok(text(StatusCode::OK, "ok")) }))
            .unwrap();

        let handler = router.into_handler();

        handler.call(test_request(Method::GET, "/")).await;
        handler.call(test_request(Method::GET, "/")).await;

        assert_eq!(applications.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn erroring_middleware_short_circuits_the_chain() {
        let reached = Arc::new(AtomicBool::new(false));

        let mut router = Router::new();
        router.middleware(middleware_fn(|_next: DynHandler| -> DynHandler {
            Arc::new(handler_fn(|_| async { Err(Error::msg("denied")) }))
        }));

        router
            .get("/", {
                let reached = reached.clone();
                handler_fn(move |_| {
                    let reached = reached.clone();
                    async move {
                        reached.store(true, Ordering::SeqCst);
                        Ok(text(StatusCode::OK, "ok"))
                    }
                })
            })
            .unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/")).await;

        assert!(!reached.load(Ordering::SeqCst));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "denied\n");
    }

    #[tokio::test]
    async fn named_parameters_are_extracted_verbatim() {
        let mut router = Router::new();
        router
            .get(
                "/users/{id}",
                handler_fn(|req| async move {
                    assert!(path_param(&req, "missing").is_none());
                    let id = path_param(&req, "id").unwrap_or("").to_owned();
                    Ok(Response::new(Body::from(id)))
                }),
            )
            .unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/users/123")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "123");
    }

    #[tokio::test]
    async fn scoped_routes_extract_parameters_after_prefix_stripping() {
        let mut router = Router::new();
        router
            .route("/api", |r| {
                r.get(
                    "/users/{id}",
                    handler_fn(|req| async move {
                        let id = path_param(&req, "id").unwrap_or("").to_owned();
                        Ok(Response::new(Body::from(id)))
                    }),
                )
            })
            .unwrap();

        let handler = router.into_handler();
        let response = handler
            .call(test_request(Method::GET, "/api/users/7"))
            .await;

        assert_eq!(body_string(response).await, "7");
    }

    #[tokio::test]
    async fn groups_share_the_parent_mount_point() {
        let mut router = Router::new();
        router
            .get("/top", handler_fn(|_| async { Ok(text(StatusCode::OK, "top")) }))
            .unwrap();

        router
            .group(|r| {
                r.get("/hello", handler_fn(|_| async { Ok(text(StatusCode::OK, "hello")) }))
            })
            .unwrap();

        let handler = router.into_handler();

        let response = handler.call(test_request(Method::GET, "/top")).await;
        assert_eq!(body_string(response).await, "top");

        let response = handler.call(test_request(Method::GET, "/hello")).await;
        assert_eq!(body_string(response).await, "hello");
    }

    struct EchoPath;

    #[async_trait]
    impl PlainHandler for EchoPath {
        async fn call(&self, req: Request) -> Response {
            Response::new(Body::from(req.head.uri.path().to_owned()))
        }
    }

    #[tokio::test]
    async fn opaque_mount_bypasses_adaptation() {
        let mut router = Router::builder()
            .error_handler(|_: &Head, _: Error| unreachable!("mounted handlers are not adapted"))
            .build();

        router.mount("/raw", EchoPath).unwrap();

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/raw/a/b")).await;

        assert_eq!(body_string(response).await, "/a/b");
    }

    #[tokio::test]
    async fn custom_fallbacks_go_through_the_error_path() {
        let mut router = Router::new();
        router.not_found(handler_fn(|_| async { Err(Error::msg("nowhere")) }));

        let handler = router.into_handler();
        let response = handler.call(test_request(Method::GET, "/missing")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "nowhere\n");
    }

    #[tokio::test]
    async fn default_fallbacks_answer_404_and_405() {
        let mut router = Router::new();
        router
            .get("/", handler_fn(|_| async { Ok(text(StatusCode::OK, "ok")) }))
            .unwrap();

        let handler = router.into_handler();

        let response = handler.call(test_request(Method::GET, "/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handler.call(test_request(Method::POST, "/")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
