//! Gateway - TCP listener serving the line-based command protocol.
//!
//! Each connection gets a guest [`Caller`] identity and its own task. Lines
//! are parsed with [`tuffy_proto::Request`] and dispatched against the
//! currently published [`CommandTable`], so module changes take effect on
//! the next line without reconnecting.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{Framed, FramedParts, LinesCodec, LinesCodecError};
use tracing::{Instrument, debug, error, info, warn};
use tuffy_proto::{MAX_LINE_LEN, ParseError, Reply, Request};

use crate::modules::{Caller, Invocation};
use crate::publish::CommandTable;
use crate::telemetry::{CommandTimer, spans};

/// Accepts connections and spawns a task per client.
pub struct Gateway {
    listener: TcpListener,
    table: CommandTable,
    prefix: Arc<str>,
    shutdown: watch::Receiver<bool>,
    next_caller: AtomicU64,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        table: CommandTable,
        prefix: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Gateway listener bound");
        Ok(Self {
            listener,
            table,
            prefix: Arc::from(prefix),
            shutdown,
            next_caller: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let caller = self.next_caller.fetch_add(1, Ordering::Relaxed);
                        info!(%peer, caller, "Connection accepted");
                        let table = self.table.clone();
                        let prefix = Arc::clone(&self.prefix);
                        let shutdown = self.shutdown.clone();
                        tokio::spawn(
                            serve_connection(stream, Caller::guest(caller), table, prefix, shutdown)
                                .instrument(spans::connection(caller, peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("Gateway stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    caller: Caller,
    table: CommandTable,
    prefix: Arc<str>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    loop {
        let line = tokio::select! {
            next = framed.next() => match next {
                Some(Ok(line)) => Some(line),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => None,
                Some(Err(e)) => {
                    warn!(error = %e, "Read error");
                    break;
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        };

        let Some(line) = line else {
            debug!("Discarding over-long line");
            framed = resume(framed);
            if framed
                .send(format!("Invalid command: {}", ParseError::TooLong(MAX_LINE_LEN + 1)))
                .await
                .is_err()
            {
                break;
            }
            continue;
        };

        let ctx = Invocation::new(caller.clone());
        let Some(reply) = dispatch(&table, &prefix, &ctx, &line).await else {
            continue;
        };
        let mut sent = Ok(());
        for out in reply.to_lines() {
            sent = framed.send(out).await;
            if sent.is_err() {
                break;
            }
        }
        if let Err(e) = sent {
            warn!(error = %e, "Write error");
            break;
        }
    }

    info!("Connection closed");
}

/// Rebuild the framed stream after a decode error.
///
/// `Framed` reports end of stream once after any decode error. The codec and
/// buffered bytes carry over, so the codec keeps skipping to the next newline.
fn resume(framed: Framed<TcpStream, LinesCodec>) -> Framed<TcpStream, LinesCodec> {
    let old = framed.into_parts();
    let mut parts = FramedParts::new::<String>(old.io, old.codec);
    parts.read_buf = old.read_buf;
    parts.write_buf = old.write_buf;
    Framed::from_parts(parts)
}

/// Run one request line against the published table.
///
/// Returns `None` for lines that are not commands, which get no reply.
pub async fn dispatch(
    table: &CommandTable,
    prefix: &str,
    ctx: &Invocation,
    line: &str,
) -> Option<Reply> {
    let request = match Request::parse(line, prefix) {
        Ok(Some(request)) => request,
        Ok(None) | Err(ParseError::NotACommand) => return None,
        Err(e) => return Some(Reply::text(format!("Invalid command: {e}"))),
    };

    let name = request.key();
    let Some(command) = table.get(&name) else {
        debug!(command = %name, "Unknown command");
        return Some(Reply::text(format!("Unknown command: {name}")));
    };

    let _timer = CommandTimer::new(name.as_str());
    let result = command
        .invoke(ctx, request.args)
        .instrument(spans::command(&name, ctx.caller.id))
        .await;
    match result {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(command = %name, code = e.error_code(), error = %e, "Command failed");
            crate::metrics::record_command_error(&name, e.error_code());
            Some(Reply::text(format!("An error occurred: {e}")))
        }
    }
}
