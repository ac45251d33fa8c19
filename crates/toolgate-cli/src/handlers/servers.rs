//! Server configuration handlers.

use std::path::Path;

use anyhow::Result;
use toolgate_core::ServerConfig;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{print_separator, truncate_string};

/// List an owner's servers with their runtime state.
pub async fn list(ctx: &CliContext, owner: &str) -> Result<()> {
    let servers = ctx.service().list_servers_with_status(owner).await?;

    if servers.is_empty() {
        println!("Owner '{owner}' has no servers configured.");
        println!("Use 'toolgate server add <file> --owner {owner}' to add one.");
        return Ok(());
    }

    println!(
        "{:<3} {:<16} {:<20} {:<18} {:<10} {:<6} Flags",
        "#", "ID", "Name", "Transport", "Status", "Tools"
    );
    print_separator(90);

    for (position, info) in servers.iter().enumerate() {
        let mut flags = Vec::new();
        if info.config.disabled {
            flags.push("disabled");
        }
        if info.config.auto_start {
            flags.push("auto-start");
        }
        println!(
            "{:<3} {:<16} {:<20} {:<18} {:<10} {:<6} {}",
            position + 1,
            truncate_string(&info.config.id, 15),
            truncate_string(&info.config.name, 19),
            info.config.transport.label(),
            info.runtime.status.label(),
            info.runtime.tools.len(),
            flags.join(",")
        );
        if let Some(error) = info.runtime.last_error.as_ref() {
            println!("    last error: {error}");
        }
    }

    Ok(())
}

/// Read and validate a server config file.
pub async fn read_config(file: &Path) -> Result<ServerConfig, CliError> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", file.display())))?;
    let config: ServerConfig = serde_json::from_str(&text)
        .map_err(|e| CliError::Arguments(format!("{}: {e}", file.display())))?;
    config
        .validate()
        .map_err(|e| CliError::Config(format!("server {}: {e}", config.id)))?;
    Ok(config)
}

/// Add a server and grant it to every existing token.
pub async fn add(ctx: &CliContext, file: &Path, owner: Option<&str>) -> Result<()> {
    let config = read_config(file).await?;
    ctx.store()
        .add_server(config.clone(), owner)
        .await
        .map_err(CliError::from)?;
    let granted = ctx.service().server_created(&config).await?;

    println!(
        "Added server '{}' ({}); granted to {} existing token(s).",
        config.id,
        config.transport.label(),
        granted.len()
    );
    Ok(())
}

/// Remove a server and revoke it from every token.
pub async fn remove(ctx: &CliContext, server: &str) -> Result<()> {
    let removed = ctx
        .store()
        .remove_server(server)
        .await
        .map_err(CliError::from)?;
    let revoked = ctx.service().server_deleted(&removed.id).await?;

    println!(
        "Removed server '{}'; revoked from {} token(s).",
        removed.id,
        revoked.len()
    );
    Ok(())
}
