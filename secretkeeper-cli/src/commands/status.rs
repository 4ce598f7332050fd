// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `skeeper status` command - Show slot status.

use secretkeeper_core::protocol::{Request, Response};
use secretkeeper_core::ConfigLoader;

use crate::client::{Client, ClientError};

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_or_default(config_path)?;
    let mut client = Client::connect(&config.server.socket_path).await?;

    let (geometry, metrics) = match client.call(&Request::Stat).await? {
        Response::Stat { geometry, metrics } => (geometry, metrics),
        reply => return Err(ClientError::UnexpectedReply { reply }.into()),
    };

    let state = if metrics.occupied { "FULL" } else { "EMPTY" };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    SECRETKEEPER STATUS                       ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║ Device:        {:<46}║", config.device.name);
    println!("║ Capacity:      {:<46}║", format!("{} bytes", geometry.size));
    println!("║ Slot:          {:<46}║", state);
    println!("║ Content:       {:<46}║", format!("{} bytes", metrics.content_len));
    println!("║ Open handles:  {:<46}║", metrics.open_count);
    println!("║ Pending read:  {:<46}║", metrics.pending_read);
    println!("║ Total opens:   {:<46}║", metrics.total_opens);
    println!("╚══════════════════════════════════════════════════════════════╝");

    Ok(())
}
