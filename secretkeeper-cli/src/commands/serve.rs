// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `skeeper serve` command - Run the daemon.
//!
//! Binds the Unix socket, serves requests until Ctrl+C, then checkpoints
//! the open counter and removes the socket.

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use secretkeeper_core::{ConfigLoader, FileCheckpointStore, InitKind, PeerRegistry, SecretKeeper};

use crate::server;

pub async fn execute(config_path: &str, kind: InitKind) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, start = %kind, "Starting secret keeper");

    // Load and validate configuration - fail fast on invalid config
    let config = ConfigLoader::load_or_default(config_path)?;
    let store = FileCheckpointStore::new(&config.checkpoint.path);

    let peers = PeerRegistry::new_shared();
    let keeper = SecretKeeper::start(kind, config.device.capacity, Arc::clone(&peers), &store);
    let keeper = Arc::new(Mutex::new(keeper));

    // Create socket directory and clear a stale socket
    let socket_path = &config.server.socket_path;
    if let Some(dir) = socket_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    clear_stale_socket(socket_path).await?;

    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(
        socket_path,
        std::fs::Permissions::from_mode(config.server.socket_mode),
    )?;

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     SECRETKEEPER DAEMON                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("  Device:   {}", config.device.name);
    println!("  Capacity: {}", config.device.capacity);
    println!("  Socket:   {}", socket_path.display());
    println!();
    println!("Press Ctrl+C to stop...");

    tokio::select! {
        _ = server::serve(listener, Arc::clone(&keeper), Arc::clone(&peers)) => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    println!();
    println!("Shutting down...");
    tracing::info!("Shutting down secret keeper");

    // Checkpoint for the next instance; the secret itself dies with us
    let keeper = keeper.lock().await;
    keeper.save_state(&store)?;
    tracing::info!(
        open_counter = keeper.open_counter(),
        path = %store.path().display(),
        "State saved"
    );

    let _ = std::fs::remove_file(socket_path);

    println!("Secret keeper stopped.");
    Ok(())
}

/// Remove a socket left behind by a daemon that is gone. A socket that
/// still accepts connections belongs to a running daemon and is kept.
async fn clear_stale_socket(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        return Ok(());
    }

    match UnixStream::connect(path).await {
        Ok(_) => Err(std::io::Error::new(
            ErrorKind::AddrInUse,
            format!("a daemon is already serving {}", path.display()),
        )),
        Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
            tracing::debug!(path = %path.display(), "Removing stale socket");
            std::fs::remove_file(path)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_live_socket_is_kept() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("secret.sock");
        let _listener = UnixListener::bind(&path).unwrap();

        let err = clear_stale_socket(&path).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddrInUse);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_removed() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("secret.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        clear_stale_socket(&path).await.unwrap();
        assert!(!path.exists());

        // Nothing there at all is fine too.
        clear_stale_socket(&path).await.unwrap();
    }
}
