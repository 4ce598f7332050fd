// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `skeeper write` command - Store a secret.

use tokio::io::AsyncReadExt;

use secretkeeper_core::protocol::{Request, Response};
use secretkeeper_core::types::FLAG_WRITE_ONLY;
use secretkeeper_core::ConfigLoader;

use crate::client::{Client, ClientError};

pub async fn execute(config_path: &str, file: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;

    let data = match file {
        Some(path) => tokio::fs::read(path).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };

    let mut client = Client::connect(&config.server.socket_path).await?;
    let requested = data.len();
    let written = write_secret(&mut client, data).await?;

    if written < requested {
        tracing::warn!(written, requested, "Secret truncated to device capacity");
    }

    println!(
        "✓ Stored {} byte(s) for uid {}",
        written,
        nix::unistd::Uid::current()
    );
    Ok(())
}

/// Open write-only, write `data` and close. The handle is closed whatever
/// the write reply was, so the slot's open count stays straight.
async fn write_secret(client: &mut Client, data: Vec<u8>) -> Result<usize, ClientError> {
    let handle = client.open(FLAG_WRITE_ONLY).await?;
    let request = Request::Write {
        handle,
        offset: 0,
        data,
    };
    let written = match client.call(&request).await {
        Ok(Response::Written { bytes }) => bytes,
        other => {
            let _ = client.close(handle).await;
            return Err(match other {
                Ok(reply) => ClientError::UnexpectedReply { reply },
                Err(e) => e,
            });
        }
    };
    client.close(handle).await?;
    Ok(written)
}
