//! Tool catalog handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

/// List the tools an owner can reach, optionally filtered by token.
pub async fn execute(ctx: &CliContext, owner: &str, token: Option<&str>, json: bool) -> Result<()> {
    let catalogs = match token {
        Some(token) => ctx.service().list_tools_for_token(owner, token).await?,
        None => ctx.service().list_tools(owner).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&catalogs)?);
        return Ok(());
    }

    if catalogs.is_empty() {
        println!("No reachable servers for owner '{owner}'.");
        return Ok(());
    }

    let permissions = ctx.service().permissions(owner).await?;

    println!("{:<16} {:<28} {:<8} Description", "Server", "Tool", "Enabled");
    print_separator(100);

    for catalog in &catalogs {
        for tool in &catalog.tools {
            let enabled = permissions
                .is_enabled(&catalog.server_id, &tool.name)
                .unwrap_or(true);
            println!(
                "{:<16} {:<28} {:<8} {}",
                truncate_string(&catalog.server_id, 15),
                truncate_string(&tool.name, 27),
                if enabled { "yes" } else { "no" },
                truncate_string(tool.description.as_deref().unwrap_or(""), 46)
            );
        }
    }

    Ok(())
}
