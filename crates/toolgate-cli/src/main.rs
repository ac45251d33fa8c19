//! toolgate CLI entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use toolgate_cli::{
    Cli, CliConfig, CliContext, Commands, ServerCommand, bootstrap, exit_code_for, handlers,
};

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Bootstrap the CLI context (composition root)
    let ctx = bootstrap(CliConfig::resolve(cli.config)?).await?;

    let outcome = dispatch(&ctx, command).await;
    ctx.service().shutdown().await;
    outcome
}

async fn dispatch(ctx: &CliContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Server { command } => match command {
            ServerCommand::List { owner } => handlers::servers::list(ctx, &owner).await?,
            ServerCommand::Add { file, owner } => {
                handlers::servers::add(ctx, &file, owner.as_deref()).await?;
            }
            ServerCommand::Remove { server } => handlers::servers::remove(ctx, &server).await?,
        },
        Commands::Tools { owner, token, json } => {
            handlers::tools::execute(ctx, &owner, token.as_deref(), json).await?;
        }
        Commands::Call {
            owner,
            tool,
            args,
            token,
        } => {
            handlers::call::execute(ctx, &owner, &tool, args.as_deref(), &token).await?;
        }
        Commands::Start { owner, server } => {
            handlers::lifecycle::start(ctx, &owner, &server).await?;
        }
        Commands::Stop { owner, server } => {
            handlers::lifecycle::stop(ctx, &owner, &server).await?;
        }
        Commands::Status { owner, server } => {
            handlers::lifecycle::status(ctx, &owner, &server).await?;
        }
        Commands::Sync { owner } => handlers::permissions::sync(ctx, &owner).await?,
        Commands::Enable {
            owner,
            server,
            tool,
        } => handlers::permissions::set(ctx, &owner, &server, &tool, true).await?,
        Commands::Disable {
            owner,
            server,
            tool,
        } => handlers::permissions::set(ctx, &owner, &server, &tool, false).await?,
        Commands::Permissions { owner } => handlers::permissions::show(ctx, &owner).await?,
        Commands::Token { command } => handlers::tokens::execute(ctx, command).await?,
        Commands::Run => handlers::run::execute(ctx).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables before parsing so .env can set TOOLGATE_CONFIG
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}
