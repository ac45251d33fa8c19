//! Tool permission handlers.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

/// Rebuild an owner's permissions from the live catalogs.
pub async fn sync(ctx: &CliContext, owner: &str) -> Result<()> {
    let report = ctx.service().synchronize_permissions(owner).await?;

    let tools: usize = report.permissions.iter().map(|(_, e)| e.len()).sum();
    println!(
        "Synchronized '{owner}': {tools} tool(s) on {} server(s){}.",
        report.permissions.server_ids().count(),
        if report.changed { "" } else { ", no changes" }
    );
    if !report.skipped_servers.is_empty() {
        println!(
            "Unreachable, entries kept: {}",
            report.skipped_servers.join(", ")
        );
    }
    Ok(())
}

/// Enable or disable one tool.
pub async fn set(
    ctx: &CliContext,
    owner: &str,
    server: &str,
    tool: &str,
    enabled: bool,
) -> Result<()> {
    ctx.service()
        .set_tool_enabled(owner, server, tool, enabled)
        .await?;
    println!(
        "{} '{tool}' on '{server}' for '{owner}'.",
        if enabled { "Enabled" } else { "Disabled" }
    );
    Ok(())
}

/// Show the stored permissions of an owner.
pub async fn show(ctx: &CliContext, owner: &str) -> Result<()> {
    let permissions = ctx.service().permissions(owner).await?;

    if permissions.is_empty() {
        println!("No permissions stored for '{owner}'. Run 'toolgate sync --owner {owner}'.");
        return Ok(());
    }

    println!("{:<16} {:<28} Enabled", "Server", "Tool");
    print_separator(54);
    for (server_id, entries) in permissions.iter() {
        for entry in entries {
            println!(
                "{:<16} {:<28} {}",
                truncate_string(server_id, 15),
                truncate_string(&entry.tool_name, 27),
                if entry.enabled { "yes" } else { "no" }
            );
        }
    }
    Ok(())
}
