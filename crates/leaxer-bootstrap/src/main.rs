//! Entry point. The only place wiring is invoked; command dispatch
//! routes to `handlers`, mirroring `gglib_cli::main`.

use clap::Parser;
use leaxer_bootstrap::{BootstrapConfig, Cli, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    let config = BootstrapConfig::load()?;
    let ctx = bootstrap(&config).await?;

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Enqueue { snapshot } => handlers::enqueue::execute(&ctx, &snapshot).await?,
        Commands::Status => handlers::status::execute(&ctx).await?,
        Commands::Cancel { job_id } => handlers::cancel::execute(&ctx, &job_id).await?,
        Commands::ClearPending => handlers::clear_pending::execute(&ctx).await?,
        Commands::Paths => handlers::paths::execute(&ctx)?,
        Commands::Serve => handlers::serve::execute(&ctx).await?,
    }

    Ok(())
}
