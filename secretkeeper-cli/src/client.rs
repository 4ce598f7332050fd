// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Client side of the Unix socket protocol.

use std::path::Path;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use secretkeeper_core::protocol::{self, Request, Response};
use secretkeeper_core::{ErrorCode, HandleId, SecretKeeperError};

/// Errors seen by a client of the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Cannot connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{code}: {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("Daemon could not parse request: {message}")]
    Malformed { message: String },

    #[error("Unexpected reply: {reply:?}")]
    UnexpectedReply { reply: Response },

    #[error("Daemon closed the connection")]
    Disconnected,

    #[error(transparent)]
    Protocol(#[from] SecretKeeperError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection to a running daemon.
pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| ClientError::Connect {
                path: path.display().to_string(),
                source: e,
            })?;

        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Send one request and wait for its reply. Error replies become errors.
    pub async fn call(&mut self, request: &Request) -> Result<Response, ClientError> {
        let line = protocol::encode_line(request)?;
        self.writer.write_all(line.as_bytes()).await?;

        let reply = self
            .lines
            .next_line()
            .await?
            .ok_or(ClientError::Disconnected)?;

        match protocol::decode_response(&reply)? {
            Response::Error { code, message } => Err(ClientError::Rejected { code, message }),
            Response::Malformed { message } => Err(ClientError::Malformed { message }),
            response => Ok(response),
        }
    }

    pub async fn open(&mut self, mode: u32) -> Result<HandleId, ClientError> {
        match self.call(&Request::Open { mode }).await? {
            Response::Opened { handle } => Ok(handle),
            reply => Err(ClientError::UnexpectedReply { reply }),
        }
    }

    /// Close a handle. Returns true if the close erased the secret.
    pub async fn close(&mut self, handle: HandleId) -> Result<bool, ClientError> {
        match self.call(&Request::Close { handle }).await? {
            Response::Closed { erased } => Ok(erased),
            reply => Err(ClientError::UnexpectedReply { reply }),
        }
    }
}
