// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Unix socket transport for the secret keeper.
//!
//! Each connection is one client endpoint. Its uid comes from the socket's
//! peer credentials. Requests from all connections funnel through one
//! mutex around the whole keeper, so the slot sees one request at a time.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use secretkeeper_core::protocol::{self, Response};
use secretkeeper_core::{
    CallerId, Endpoint, PeerRegistry, SecretKeeper, SecretKeeperError, SecretKeeperResult, Session,
};

/// Keeper shared by all connection tasks.
pub type SharedKeeper = Arc<Mutex<SecretKeeper<Arc<PeerRegistry>>>>;

/// Accept connections until the task is dropped.
pub async fn serve(listener: UnixListener, keeper: SharedKeeper, peers: Arc<PeerRegistry>) {
    let mut next_endpoint = 1u64;

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let endpoint = Endpoint::new(next_endpoint);
                next_endpoint += 1;

                let keeper = Arc::clone(&keeper);
                let peers = Arc::clone(&peers);
                tokio::spawn(async move {
                    handle_connection(stream, endpoint, keeper, peers).await;
                });
            }
            Err(e) => {
                tracing::error!(error = %e, "Socket accept error");
            }
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    endpoint: Endpoint,
    keeper: SharedKeeper,
    peers: Arc<PeerRegistry>,
) {
    // Without credentials the peer stays unregistered and every open it
    // attempts fails the identity lookup.
    match stream.peer_cred() {
        Ok(cred) => peers.register(endpoint, CallerId::new(cred.uid())),
        Err(e) => tracing::warn!(endpoint = %endpoint, error = %e, "No peer credentials"),
    }

    let mut session = Session::new(endpoint);
    if let Err(e) = process_requests(stream, &mut session, &keeper).await {
        tracing::warn!(endpoint = %endpoint, error = %e, "Connection ended with error");
    }

    // A client that goes away drops its handles, like a process exiting
    // with open file descriptors.
    session.release_all(&mut *keeper.lock().await);
    peers.unregister(endpoint);
    tracing::debug!(endpoint = %endpoint, "Connection closed");
}

/// One request line, as read off the socket.
#[derive(Debug, PartialEq, Eq)]
enum RequestLine {
    Line(String),
    /// The line ran past the limit. Nothing after the limit was read.
    TooLong,
    Eof,
}

/// Read one newline-terminated line of at most `limit` bytes.
async fn read_request_line<R>(reader: &mut R, limit: usize) -> std::io::Result<RequestLine>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(limit as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(RequestLine::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() > limit {
        return Ok(RequestLine::TooLong);
    }

    Ok(RequestLine::Line(String::from_utf8_lossy(&buf).into_owned()))
}

async fn process_requests(
    stream: UnixStream,
    session: &mut Session,
    keeper: &SharedKeeper,
) -> SecretKeeperResult<()> {
    let limit = protocol::request_line_limit(keeper.lock().await.slot().capacity());
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let line = read_request_line(&mut reader, limit)
            .await
            .map_err(|e| SecretKeeperError::Io {
                context: "reading request",
                source: e,
            })?;

        let (response, keep_going) = match line {
            RequestLine::Eof => break,
            RequestLine::TooLong => {
                tracing::warn!(
                    endpoint = %session.endpoint(),
                    limit,
                    "Request line too long, dropping connection"
                );
                let response = Response::Malformed {
                    message: format!("request line exceeds {} bytes", limit),
                };
                (response, false)
            }
            RequestLine::Line(line) if line.trim().is_empty() => continue,
            RequestLine::Line(line) => {
                let response = match protocol::decode_request(&line) {
                    Ok(request) => {
                        let mut keeper = keeper.lock().await;
                        protocol::dispatch(session, &mut *keeper, request)
                    }
                    Err(e) => Response::Malformed {
                        message: e.to_string(),
                    },
                };
                (response, true)
            }
        };

        let reply = protocol::encode_line(&response)?;
        writer
            .write_all(reply.as_bytes())
            .await
            .map_err(|e| SecretKeeperError::Io {
                context: "writing response",
                source: e,
            })?;

        if !keep_going {
            break;
        }
    }

    Ok(())
}
