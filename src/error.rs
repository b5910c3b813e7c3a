use std::{error::Error as StdError, fmt};

use http::Method;
use snafu::Snafu;

/// Alias for a type-erased error type.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An opaque error reported by a [`Handler`](crate::handler::Handler) or a
/// middleware.
///
/// The routing layer imposes no structure on it: it is never retried, logged
/// or transformed, only handed verbatim to the
/// [`ErrorHandler`](crate::handler::ErrorHandler) bound to the router that
/// registered the failing handler.
pub struct Error {
    inner: BoxError,
}

impl Error {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Box::new(error),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display,
    {
        Self {
            inner: Box::new(MessageError(message.to_string())),
        }
    }

    /// Creates an error from an already boxed error.
    ///
    /// A dedicated constructor because a `From<BoxError>` impl would overlap
    /// with the blanket `From<E: std::error::Error>` below.
    pub fn from_boxed(error: BoxError) -> Self {
        Self { inner: error }
    }

    pub fn is<T>(&self) -> bool
    where
        T: StdError + 'static,
    {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: StdError + 'static,
    {
        self.inner.downcast_ref::<T>()
    }

    pub fn into_inner(self) -> BoxError {
        self.inner
    }
}

impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl AsRef<dyn StdError + Send + Sync> for Error {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.inner
    }
}

struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl StdError for MessageError {}

/// Errors surfaced by route registration.
///
/// Pattern syntax is entirely [`matchit`]'s business; this layer only
/// forwards what it reports.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RouteError {
    #[snafu(display("invalid route pattern {pattern:?}"))]
    InvalidPattern {
        pattern: String,
        source: matchit::InsertError,
    },

    #[snafu(display("{method} {pattern:?} is already registered"))]
    DuplicateRoute { method: Method, pattern: String },

    #[snafu(display("{pattern:?} is already mounted"))]
    AlreadyMounted { pattern: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Marker;

    impl fmt::Display for Marker {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("marker")
        }
    }

    impl StdError for Marker {}

    #[test]
    fn downcast_preserves_the_original_value() {
        let error = Error::new(Marker);

        assert!(error.is::<Marker>());
        assert!(error.downcast_ref::<Marker>().is_some());
        assert_eq!(error.to_string(), "marker");
    }

    #[test]
    fn msg_displays_verbatim() {
        let error = Error::msg("something broke");
        assert_eq!(error.to_string(), "something broke");
        assert!(!error.is::<Marker>());
    }
}
