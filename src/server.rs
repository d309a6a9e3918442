use std::{future::Future, io::Result, net::SocketAddr, sync::Arc};

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::Instrument;

use crate::{
    config::ConnConfig,
    error::Error,
    ws::{Dispatcher, handle},
};

/// Accepts TCP connections and serves each one on its own task.
pub struct BridgeServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    conn: ConnConfig,
}

impl BridgeServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        dispatcher: Dispatcher,
        conn: ConnConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            mode = %dispatcher.mode(),
            "listening"
        );
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            conn,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> { self.listener.local_addr() }

    /// Serves until the process exits.
    pub async fn run(self) { self.run_until(std::future::pending()).await }

    /// Serves until `shutdown` resolves. Sessions already running are left to
    /// finish on their own.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutting down listener");
                    return;
                }
                res = self.listener.accept() => match res {
                    Ok((stream, addr)) => self.spawn(stream, addr),
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                },
            }
        }
    }

    fn spawn(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not set TCP_NODELAY");
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let conn = self.conn;
        let span = tracing::info_span!("conn", peer = %addr);
        tokio::spawn(
            async move {
                match handle(stream, addr.to_string(), &dispatcher, &conn).await {
                    Ok(()) => tracing::info!("session ended by client"),
                    Err(Error::PeerClosed) => tracing::info!("peer hung up"),
                    Err(e) => tracing::warn!(error = %e, "session ended"),
                }
            }
            .instrument(span),
        );
    }
}
