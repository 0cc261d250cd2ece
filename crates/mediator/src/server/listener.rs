//! Accept loop serving the router over plain TCP or TLS.
//!
//! For each TLS connection the peer's certificate chain, if any, is attached
//! to every request on that connection as a
//! [`PeerCertificate`](crate::auth::PeerCertificate) extension.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use hyper::{body::Incoming, Request};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, error, info, warn};

use crate::auth::PeerCertificate;

/// Accept connections on `listener` forever, serving `router`.
///
/// TLS is terminated when `tls` is set. Per-connection failures (handshake,
/// protocol errors) are logged and do not stop the loop.
pub async fn serve(
    listener: TcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
    router: Router,
) -> Result<()> {
    let acceptor = tls.map(TlsAcceptor::from);
    info!(
        addr = %listener.local_addr()?,
        tls = acceptor.is_some(),
        "listening"
    );

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "accept error");
                continue;
            }
        };
        debug!(%peer_addr, "accepted connection");
        let router = router.clone();
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, acceptor, router).await {
                warn!(%peer_addr, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    router: Router,
) -> Result<()> {
    match acceptor {
        Some(acceptor) => {
            let tls = acceptor.accept(stream).await?;
            let peer = tls
                .get_ref()
                .1
                .peer_certificates()
                .map(|chain| PeerCertificate::new(chain.to_vec()));
            debug!(%peer_addr, client_cert = peer.is_some(), "TLS handshake complete");
            serve_connection(tls, peer, router).await
        }
        None => serve_connection(stream, None, router).await,
    }
}

async fn serve_connection<S>(io: S, peer: Option<PeerCertificate>, router: Router) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut req: Request<Incoming>| {
        if let Some(peer) = &peer {
            req.extensions_mut().insert(peer.clone());
        }
        router.clone().call(req)
    });

    auto::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(io), service)
        .await
        .map_err(|e| anyhow::anyhow!("failed to serve connection: {e}"))
}
