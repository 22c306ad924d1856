// src/api/mod.rs

//! Control API: a small HTTP/1.1 server over the engine.
//!
//! Endpoints (one request per connection):
//! - `GET /status`, `GET /status.txt`, `GET /artifacts`, `GET /watcher`
//! - `POST /execute/{name}`, `POST /stop/{name}`
//! - `POST /watcher/on`, `POST /watcher/off`
//!
//! There is no authentication; bind it to loopback.

pub mod http;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::Engine;

pub use http::{Method, Request, Response};
pub use routes::route;

/// How long a client gets to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct ControlApi {
    listener: TcpListener,
    engine: Arc<Engine>,
}

impl ControlApi {
    /// Bind the listener. Use port 0 to let the OS pick one.
    pub async fn bind(engine: Arc<Engine>, addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding control API on {addr}"))?;
        Ok(Self { listener, engine })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires; each is served on its own task.
    pub async fn serve(self, shutdown: CancellationToken) {
        let local_addr = self.listener.local_addr().ok();
        info!(addr = ?local_addr, "control API listening");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("control API stopped");
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let engine = Arc::clone(&self.engine);
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, &engine).await {
                                debug!(peer = %peer, error = %format!("{err:#}"), "control API connection error");
                            }
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to accept control API connection");
                    }
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, engine: &Engine) -> Result<()> {
    let response = match tokio::time::timeout(READ_TIMEOUT, http::read_head(&mut stream)).await {
        Ok(Ok(head)) => match Request::parse(&head) {
            Ok(req) => {
                debug!(method = ?req.method, path = %req.path, "control API request");
                route(engine, &req).await
            }
            Err(err) => Response::error(400, &err.to_string()),
        },
        Ok(Err(err)) => Response::error(400, &err.to_string()),
        Err(_) => Response::error(400, "timed out reading request"),
    };

    stream
        .write_all(&response.to_bytes())
        .await
        .context("writing response")?;
    stream.shutdown().await.context("closing connection")?;
    Ok(())
}
