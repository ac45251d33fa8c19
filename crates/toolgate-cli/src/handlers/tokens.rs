//! Access token handlers.

use anyhow::Result;
use toolgate_core::{AccessToken, Scope};

use crate::bootstrap::CliContext;
use crate::commands::TokenCommand;
use crate::error::CliError;
use crate::presentation::{print_separator, truncate_string};

fn scope_list(scopes: &[Scope]) -> String {
    if scopes.is_empty() {
        return "--".to_string();
    }
    scopes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn print_token(token: &AccessToken) {
    println!("Token:    {}", token.id);
    println!("Client:   {}", token.owner_client_id);
    println!(
        "Issued:   {}",
        token
            .issued_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    println!("Scopes:   {}", scope_list(&token.scopes));
    if token.server_ids.is_empty() {
        println!("Servers:  --");
    } else {
        println!("Servers:  {}", token.server_ids.join(", "));
    }
}

/// Dispatch a token subcommand.
pub async fn execute(ctx: &CliContext, command: TokenCommand) -> Result<()> {
    let access = ctx.service().access();

    match command {
        TokenCommand::Issue {
            client,
            servers,
            scopes,
        } => {
            let token = access
                .issue_token(&client, servers, scopes)
                .await
                .map_err(CliError::from)?;
            print_token(&token);
        }
        TokenCommand::List => {
            let tokens = access.tokens().await.map_err(CliError::from)?;
            if tokens.is_empty() {
                println!("No tokens issued.");
                return Ok(());
            }
            println!("{:<34} {:<16} {:<36} Servers", "Token", "Client", "Scopes");
            print_separator(100);
            for token in tokens {
                println!(
                    "{:<34} {:<16} {:<36} {}",
                    token.id,
                    truncate_string(&token.owner_client_id, 15),
                    scope_list(&token.scopes),
                    token.server_ids.len()
                );
            }
        }
        TokenCommand::Show { token } => print_token(&access.token(&token).await?),
        TokenCommand::Grant { token, server } => {
            print_token(&access.grant_server(&token, &server).await?);
        }
        TokenCommand::Revoke { token, server } => {
            print_token(&access.revoke_server(&token, &server).await?);
        }
        TokenCommand::Scopes { token, scopes } => {
            print_token(&access.replace_scopes(&token, scopes).await?);
        }
        TokenCommand::Delete { token } => {
            access.revoke_token(&token).await?;
            println!("Deleted token {token}.");
        }
    }

    Ok(())
}
