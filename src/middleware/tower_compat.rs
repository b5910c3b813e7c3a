use std::sync::{Arc, Mutex};

use tower::{Layer, Service};

use self::private::{HandlerToService, ServiceToHandler};
use super::Middleware;
use crate::{error::Error, handler::DynHandler, request::Request, response::Response};

pub trait TowerLayerCompatExt {
    fn compat(self) -> TowerCompatMiddleware<Self>
    where
        Self: Sized,
    {
        TowerCompatMiddleware(self)
    }
}

impl<L> TowerLayerCompatExt for L {}

pub struct TowerCompatMiddleware<L>(L);

impl<L> Middleware for TowerCompatMiddleware<L>
where
    L: Layer<HandlerToService> + Send + Sync + 'static,
    L::Service: Service<Request, Response = Response> + Send + 'static,
    <L::Service as Service<Request>>::Future: Send,
    <L::Service as Service<Request>>::Error: Into<Error>,
{
    fn transform(&self, next: DynHandler) -> DynHandler {
        let svc = self.0.layer(HandlerToService(next));
        Arc::new(ServiceToHandler(Arc::new(Mutex::new(svc))))
    }
}

mod private {
    use std::{
        future::poll_fn,
        sync::{Arc, Mutex},
        task::{Context, Poll},
    };

    use async_trait::async_trait;
    use futures_util::{future::BoxFuture, FutureExt};
    use tower::Service;

    use crate::{
        error::Error,
        handler::{DynHandler, Handler},
        request::Request,
        response::Response,
    };

    pub struct HandlerToService(pub DynHandler);

    impl Service<Request> for HandlerToService {
        type Error = Error;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;
        type Response = Response;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request) -> Self::Future {
            let handler = self.0.clone();
            async move { handler.call(req).await }.boxed()
        }
    }

    pub struct ServiceToHandler<S>(pub Arc<Mutex<S>>);

    #[async_trait]
    impl<S> Handler for ServiceToHandler<S>
    where
        S: Service<Request, Response = Response> + Send + 'static,
        S::Error: Into<Error>,
        S::Future: Send,
    {
        async fn call(&self, req: Request) -> Result<Response, Error> {
            let svc = self.0.clone();

            poll_fn(|cx| svc.lock().unwrap().poll_ready(cx))
                .await
                .map_err(Into::into)?;

            let fut = svc.lock().unwrap().call(req);

            fut.await.map_err(Into::into)
        }
    }
}
