mod tracing;
#[cfg_attr(docsrs, doc(cfg(feature = "tower-compat")))]
#[cfg(feature = "tower-compat")]
mod tower_compat;

#[cfg_attr(docsrs, doc(cfg(feature = "tower-compat")))]
#[cfg(feature = "tower-compat")]
pub use self::tower_compat::{TowerCompatMiddleware, TowerLayerCompatExt};
pub use self::tracing::Tracing;
use crate::handler::DynHandler;

/// Transforms an error-returning handler into another error-returning
/// handler.
///
/// Object-safe so a router can hold an ordered, heterogeneous chain of them;
/// use [`middleware_fn`] to build one from a closure.
pub trait Middleware: Send + Sync + 'static {
    fn transform(&self, next: DynHandler) -> DynHandler;
}

pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: Fn(DynHandler) -> DynHandler + Send + Sync + 'static,
{
    MiddlewareFn(f)
}

pub struct MiddlewareFn<F>(F);

impl<F> Middleware for MiddlewareFn<F>
where
    F: Fn(DynHandler) -> DynHandler + Send + Sync + 'static,
{
    fn transform(&self, next: DynHandler) -> DynHandler {
        (self.0)(next)
    }
}
