use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Accepts connections forever, building one service per connection.
///
/// `make_service` receives the peer address so handlers can resolve the client IP.
pub async fn run_http_service<F, S, E>(host: &str, port: u16, make_service: F) -> Result<(), E>
where
    F: Fn(SocketAddr) -> S,
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = make_service(peer_addr);

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(peer = %peer_addr, error = %e, "Connection closed with error");
            }
        });
    }
}

/// Wraps a complete in-memory body.
pub fn full_body<E: 'static>(body: impl Into<Bytes>) -> BoxBody<Bytes, E> {
    Full::new(body.into()).map_err(|never| match never {}).boxed()
}

/// Plain-text response carrying the canonical reason of the status code.
pub fn make_error_response<E: 'static>(status_code: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    let mut response = Response::new(full_body(message));
    *response.status_mut() = status_code;
    response
}
