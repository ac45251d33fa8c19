//! Foreground gateway run.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Connect every auto-start server and hold the connections until Ctrl-C.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    ctx.service().initialize().await?;

    let connected = ctx.service().connected_servers().await;
    if connected.is_empty() {
        println!("No servers connected.");
    } else {
        println!("Connected: {}", connected.join(", "));
    }
    println!("Press Ctrl-C to stop.");

    // The caller stops every server once this returns
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    Ok(())
}
