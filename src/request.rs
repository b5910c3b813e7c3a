use std::{fmt, net::SocketAddr};

use bytes::Bytes;
use http::{request::Parts, Extensions, HeaderMap, HeaderValue, Method, Uri, Version};

use crate::{
    body::Body,
    error::BoxError,
    macros::{impl_deref, impl_display},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalAddr(pub SocketAddr);

impl_deref!(LocalAddr : SocketAddr);
impl_display!(LocalAddr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemoteAddr(pub SocketAddr);

impl_deref!(RemoteAddr : SocketAddr);
impl_display!(RemoteAddr);

/// The URI as received from the client, before any mount-point rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginalUri(pub Uri);

impl_deref!(OriginalUri : Uri);
impl_display!(OriginalUri);

#[derive(Debug)]
pub struct Request {
    pub head: Head,
    pub body: Body,
}

impl Request {
    pub fn new<B>(request: http::Request<B>, local_addr: LocalAddr, remote_addr: RemoteAddr) -> Self
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (
            Parts {
                method,
                uri,
                version,
                headers,
                extensions,
                ..
            },
            body,
        ) = request.into_parts();

        Self {
            head: Head {
                method,
                uri: uri.clone(),
                version,
                headers,
                extensions,
                local_addr,
                remote_addr,
                original_uri: OriginalUri(uri),
            },
            body: Body::new(body),
        }
    }

    pub fn split(self) -> (Head, Body) {
        let Self { head, body } = self;
        (head, body)
    }
}

#[derive(Clone)]
#[non_exhaustive]
pub struct Head {
    /// The request's method
    pub method: Method,

    /// The request's URI
    pub uri: Uri,

    /// The request's version
    pub version: Version,

    /// The request's headers
    pub headers: HeaderMap<HeaderValue>,

    /// The request's extensions
    pub extensions: Extensions,

    pub(crate) local_addr: LocalAddr,

    pub(crate) remote_addr: RemoteAddr,

    pub(crate) original_uri: OriginalUri,
}

impl Head {
    pub fn local_addr(&self) -> LocalAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> RemoteAddr {
        self.remote_addr
    }

    pub fn original_uri(&self) -> &OriginalUri {
        &self.original_uri
    }
}

impl fmt::Debug for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Head")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("original_uri", &self.original_uri)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn test_request(method: Method, uri: &str) -> Request {
    let request = http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));

    Request::new(request, LocalAddr(addr), RemoteAddr(addr))
}
