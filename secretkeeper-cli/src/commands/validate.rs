// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `skeeper validate` command - Validate configuration file.

use secretkeeper_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Device Settings:");
            println!("  Name:            {}", config.device.name);
            println!("  Capacity:        {}", config.device.capacity);
            println!();
            println!("Server Settings:");
            println!("  Socket Path:     {}", config.server.socket_path.display());
            println!("  Socket Mode:     {:#o}", config.server.socket_mode);
            println!();
            println!("Checkpoint:");
            println!("  Path:            {}", config.checkpoint.path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
