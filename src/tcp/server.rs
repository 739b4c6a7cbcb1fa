//! Accept loop and per-connection session of the TCP adapter
//!
//! A session authenticates within [`AUTH_TIMEOUT`], writes the current
//! states of the requested regions, then streams fresh updates with a
//! ping every [`PING_INTERVAL`] of silence. Every write has a
//! [`WRITE_TIMEOUT`] deadline.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::protocol::{AuthRequest, Line};
use crate::api::ApiKeys;
use crate::pubsub::Topic;
use crate::shutdown::Shutdown;
use crate::types::{SharedState, Update};

/// Time a client has to send its authentication line
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Deadline for every write once authenticated
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Keepalive interval when no update arrives
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Longest authentication line read from a client
const AUTH_LINE_LIMIT: u64 = 128;

#[derive(Debug, Error)]
pub enum TcpServerError {
    #[error("tcpserver: listen {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("tcpserver: accept: {0}")]
    Accept(#[source] io::Error),
}

/// Accepts connections and runs one task per client
pub struct TcpServer {
    state: SharedState,
    updates: Arc<Topic<Update>>,
    api_keys: ApiKeys,
    shutdown: Shutdown,
}

impl TcpServer {
    pub fn new(
        state: SharedState,
        updates: Arc<Topic<Update>>,
        api_keys: ApiKeys,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            state,
            updates,
            api_keys,
            shutdown,
        }
    }

    /// Bind `addr` and serve until shutdown
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), TcpServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TcpServerError::Bind { addr, source })?;
        info!(%addr, "tcpserver: listen");
        self.run(listener).await
    }

    /// Serve clients accepted on `listener` until shutdown, then wait for
    /// every connection task to finish
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<(), TcpServerError> {
        let mut connections = JoinSet::new();

        let result = loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
                // Reap finished connection tasks
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "tcpserver: accept");
                    let server = Arc::clone(&self);
                    connections.spawn(async move { server.handle_conn(stream, peer).await });
                }
                Err(e) => break Err(TcpServerError::Accept(e)),
            }
        };

        drop(listener);
        while connections.join_next().await.is_some() {}
        debug!("tcpserver: exit");
        result
    }

    async fn handle_conn(&self, mut stream: TcpStream, peer: SocketAddr) {
        let Some(request) = self.authenticate(&mut stream, peer).await else {
            let _ = stream.shutdown().await;
            return;
        };

        self.stream_updates(&mut stream, peer, request.region).await;
        let _ = stream.shutdown().await;
        debug!(%peer, "tcpserver: close");
    }

    /// Read and check the authentication line, answering the client.
    /// Returns the request only if the connection may proceed.
    async fn authenticate(&self, stream: &mut TcpStream, peer: SocketAddr) -> Option<AuthRequest> {
        let mut line = String::new();
        let read = {
            let mut reader = BufReader::new((&mut *stream).take(AUTH_LINE_LIMIT));
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                read = tokio::time::timeout(AUTH_TIMEOUT, reader.read_line(&mut line)) => read,
            }
        };

        match read {
            Ok(Ok(n)) if n > 0 => {}
            Ok(Ok(_)) => {
                error!(%peer, "tcpserver: read auth: connection closed");
                let _ = write_line(stream, Line::AuthTimeout).await;
                return None;
            }
            Ok(Err(e)) => {
                error!(%peer, "tcpserver: read auth: {e}");
                let _ = write_line(stream, Line::AuthTimeout).await;
                return None;
            }
            Err(_) => {
                error!(%peer, "tcpserver: read auth: timeout");
                let _ = write_line(stream, Line::AuthTimeout).await;
                return None;
            }
        }

        let request = AuthRequest::parse(&line);
        let authorized = self.api_keys.contains(&request.api_key);
        debug!(%peer, authorized, region = request.region, "tcpserver: client auth");

        if !authorized {
            let _ = write_line(stream, Line::WrongApiKey).await;
            return None;
        }

        if let Err(e) = write_line(stream, Line::AuthOk).await {
            error!(%peer, "tcpserver: write auth success: {e}");
            return None;
        }

        Some(request)
    }

    /// Send the current states, then every fresh update and a periodic ping
    async fn stream_updates(&self, stream: &mut TcpStream, peer: SocketAddr, region: u32) {
        let lines: Vec<Line> = self
            .state
            .read()
            .regions
            .iter()
            .filter(|r| region == 0 || r.id == region)
            .map(|r| Line::State {
                region: r.id,
                alert: r.alert,
            })
            .collect();

        for line in lines {
            if let Err(e) = write_line(stream, line).await {
                error!(%peer, "tcpserver: write state: {e}");
                return;
            }
        }

        let mut subscription = self
            .updates
            .subscribe(format!("tcpserver-{peer}"), move |u: &Update| {
                u.matches_live(region)
            })
            .await;

        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                update = subscription.recv() => match update {
                    Some(update) => Line::State {
                        region: update.region.id,
                        alert: update.region.alert,
                    },
                    None => break,
                },
                _ = tokio::time::sleep(PING_INTERVAL) => {
                    let nonce = rand::thread_rng().gen_range(0..10000);
                    Line::Ping(nonce)
                }
            };

            if let Err(e) = write_line(stream, line).await {
                error!(%peer, "tcpserver: write {line}: {e}");
                break;
            }
        }

        self.updates.unsubscribe(subscription).await;
    }
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: Line) -> io::Result<()> {
    let wire = line.to_wire();
    tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(wire.as_bytes()))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))?
}
