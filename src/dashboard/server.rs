//! Line-oriented JSON report endpoint
//!
//! A client sends `report` (or an empty line) and receives the current
//! report as one JSON line. Anomaly alerts are pushed to every connected
//! client as they happen.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::data::{SchedulerReport, ServerMessage};
use crate::core::anomaly::AnomalyAlert;

/// Longest request line accepted, newline included.
const MAX_REQUEST_LEN: usize = 1024;

/// Anything that can produce a fresh report on demand.
pub trait ReportProvider: Send + Sync {
    fn report(&self) -> SchedulerReport;
}

pub struct ReportServer {
    listener: TcpListener,
}

impl ReportServer {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Report server listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until `token` is cancelled.
    pub async fn serve(
        self,
        provider: Arc<dyn ReportProvider>,
        alerts: broadcast::Sender<AnomalyAlert>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Report client connected: {}", peer);
                        tokio::spawn(handle_client(
                            stream,
                            Arc::clone(&provider),
                            alerts.subscribe(),
                            token.clone(),
                        ));
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
            }
        }
        info!("Report server stopped");
    }
}

async fn handle_client(
    stream: TcpStream,
    provider: Arc<dyn ReportProvider>,
    mut alerts: broadcast::Receiver<AnomalyAlert>,
    token: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    // Partial lines survive an alert winning the select.
    let mut buf = Vec::with_capacity(128);

    loop {
        let mut limited = (&mut reader).take((MAX_REQUEST_LEN - buf.len()) as u64);
        let mut close = false;
        let message = tokio::select! {
            _ = token.cancelled() => break,
            result = limited.read_until(b'\n', &mut buf) => match result {
                Ok(0) => break,
                Ok(_) if buf.ends_with(b"\n") => {
                    let request = String::from_utf8_lossy(&buf);
                    let message = respond(request.trim(), provider.as_ref());
                    buf.clear();
                    message
                }
                Ok(_) if buf.len() >= MAX_REQUEST_LEN => {
                    warn!("Report client sent an oversized request, closing");
                    close = true;
                    ServerMessage::Error {
                        message: format!("request longer than {} bytes", MAX_REQUEST_LEN),
                    }
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("Read error: {}", e);
                    break;
                }
            },
            result = alerts.recv() => match result {
                Ok(alert) => ServerMessage::Alert(alert),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Report client lagged, dropped {} alerts", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        let json = match serde_json::to_string(&message) {
            Ok(json) => json + "\n",
            Err(e) => {
                error!("Failed to encode message: {}", e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(json.as_bytes()).await {
            debug!("Report client went away: {}", e);
            break;
        }
        if close {
            break;
        }
    }
}

fn respond(request: &str, provider: &dyn ReportProvider) -> ServerMessage {
    match request {
        "" | "report" => ServerMessage::Report(provider.report()),
        other => ServerMessage::Error { message: format!("unknown request: {}", other) },
    }
}
