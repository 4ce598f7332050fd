// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `skeeper read` command - Read back and destroy your secret.

use tokio::io::AsyncWriteExt;

use secretkeeper_core::protocol::{Request, Response};
use secretkeeper_core::types::FLAG_READ_ONLY;
use secretkeeper_core::ConfigLoader;

use crate::client::{Client, ClientError};

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let mut client = Client::connect(&config.server.socket_path).await?;

    let len = match client.call(&Request::Stat).await? {
        Response::Stat { geometry, .. } => geometry.size as usize,
        reply => return Err(ClientError::UnexpectedReply { reply }.into()),
    };

    let (data, erased) = read_secret(&mut client, len).await?;
    tracing::debug!(bytes = data.len(), erased, "Secret read");

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&data).await?;
    stdout.flush().await?;
    Ok(())
}

/// Open read-only, read up to `len` bytes and close. The handle is closed
/// whatever the read reply was. Returns the bytes and whether the close
/// erased the secret.
async fn read_secret(client: &mut Client, len: usize) -> Result<(Vec<u8>, bool), ClientError> {
    let handle = client.open(FLAG_READ_ONLY).await?;
    let request = Request::Read {
        handle,
        offset: 0,
        len,
    };
    let data = match client.call(&request).await {
        Ok(Response::Data { data }) => data,
        other => {
            let _ = client.close(handle).await;
            return Err(match other {
                Ok(reply) => ClientError::UnexpectedReply { reply },
                Err(e) => e,
            });
        }
    };
    let erased = client.close(handle).await?;
    Ok((data, erased))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::scripted_daemon;
    use secretkeeper_core::HandleId;

    #[tokio::test]
    async fn test_unexpected_read_reply_still_closes() {
        let handle = HandleId::new(7);
        let (_dir, path, daemon) = scripted_daemon(vec![
            Response::Opened { handle },
            Response::Written { bytes: 0 },
            Response::Closed { erased: false },
        ]);

        let mut client = Client::connect(&path).await.unwrap();
        let err = read_secret(&mut client, 8).await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedReply { .. }));
        drop(client);

        let requests = daemon.await.unwrap();
        assert_eq!(requests.last(), Some(&Request::Close { handle }));
    }

    #[tokio::test]
    async fn test_read_secret() {
        let handle = HandleId::new(1);
        let (_dir, path, daemon) = scripted_daemon(vec![
            Response::Opened { handle },
            Response::Data {
                data: b"hello".to_vec(),
            },
            Response::Closed { erased: true },
        ]);

        let mut client = Client::connect(&path).await.unwrap();
        let (data, erased) = read_secret(&mut client, 8).await.unwrap();
        assert_eq!(data, b"hello");
        assert!(erased);
        drop(client);

        assert_eq!(daemon.await.unwrap().len(), 3);
    }
}
