/* src/middleware.rs */

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{HeaderMap, request::Parts},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    net::SocketAddr,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::extractor::IpExtractor;

/// Extension that holds the resolved client address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Layer that resolves the client address of every request and stores it
/// as a [`ClientIp`] extension.
///
/// The peer address comes from `ConnectInfo<SocketAddr>`, so the router must
/// be served with `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone, Default)]
pub struct ClientIpLayer {
    extractor: IpExtractor,
}

impl ClientIpLayer {
    /// Create a layer with the default forwarding header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer with a custom extractor configuration.
    pub fn with_extractor(extractor: IpExtractor) -> Self {
        Self { extractor }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            extractor: self.extractor.clone(),
        }
    }
}

/// Service produced by [`ClientIpLayer`].
#[derive(Debug, Clone)]
pub struct ClientIpService<S> {
    inner: S,
    extractor: IpExtractor,
}

impl<S> Service<Request> for ClientIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let header_map = headers_to_map(req.headers());
        let peer_addr = peer_addr(req.extensions().get::<ConnectInfo<SocketAddr>>());

        let client_ip = self.extractor.extract(&header_map, &peer_addr);
        req.extensions_mut().insert(ClientIp(client_ip));

        let future = self.inner.call(req);
        Box::pin(future)
    }
}

fn peer_addr(connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

/// Convert axum headers to the resolver's map. Names are lowercased and the
/// first value of a repeated header is kept. Values are decoded lossily so a
/// bad byte only spoils the token it appears in.
fn headers_to_map(headers: &HeaderMap) -> crate::extractor::HeaderMap {
    let mut map = std::collections::HashMap::new();

    for (name, value) in headers.iter() {
        map.entry(name.as_str().to_lowercase())
            .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    map
}

/// Axum extractor for the resolved client address.
///
/// Without [`ClientIpLayer`] in front of the handler the address is resolved
/// on the spot with the default header list.
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(client_ip) = parts.extensions.get::<ClientIp>() {
            return Ok(client_ip.clone());
        }

        let header_map = headers_to_map(&parts.headers);
        let peer_addr = peer_addr(parts.extensions.get::<ConnectInfo<SocketAddr>>());
        Ok(ClientIp(
            IpExtractor::default().extract(&header_map, &peer_addr),
        ))
    }
}
