//! Server start/stop/status handlers.

use anyhow::Result;
use toolgate_core::ServerRuntimeInfo;

use crate::bootstrap::CliContext;
use crate::presentation::format_optional;

fn print_runtime(info: &ServerRuntimeInfo) {
    println!("Server:        {}", info.server_id);
    println!("Status:        {}", info.status);
    println!("Attempts:      {}", info.connect_attempts);
    let connected_at = info
        .last_connected_at
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S"));
    println!("Connected at:  {}", format_optional(connected_at.as_ref(), "--"));
    if let Some(error) = info.last_error.as_deref() {
        println!("Last error:    {error}");
    }
    if !info.tools.is_empty() {
        println!("Tools:");
        for tool in &info.tools {
            match tool.description.as_deref() {
                Some(description) => println!("  {} - {description}", tool.name),
                None => println!("  {}", tool.name),
            }
        }
    }
}

/// Connect a server and show its catalog.
pub async fn start(ctx: &CliContext, owner: &str, server: &str) -> Result<()> {
    let info = ctx.service().start_server(owner, server).await?;
    print_runtime(&info);
    Ok(())
}

/// Disconnect a server.
pub async fn stop(ctx: &CliContext, owner: &str, server: &str) -> Result<()> {
    if ctx.service().stop_server(owner, server).await? {
        println!("Stopped server '{server}'.");
    } else {
        println!("Server '{server}' was not running.");
    }
    Ok(())
}

/// Show a server's runtime state.
pub async fn status(ctx: &CliContext, owner: &str, server: &str) -> Result<()> {
    let info = ctx.service().get_server_status(owner, server).await?;
    print_runtime(&info);
    Ok(())
}
