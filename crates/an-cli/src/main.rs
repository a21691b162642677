//! an - AN (安装) Unified Package Manager CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use an_cli::cmd;
use an_cli::{Cli, Commands, FormulaCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Install { targets, head } => cmd::install::install(&targets, head, dry_run).await,
        Commands::Remove { packages, yes } => cmd::remove::remove(&packages, yes, dry_run).await,
        Commands::List => cmd::list::list(),
        Commands::Search { query } => cmd::search::search(&query),
        Commands::Info { name } => cmd::info::info(&name),
        Commands::Sync => cmd::sync::sync().await,
        Commands::Update => cmd::update::update(dry_run).await,
        Commands::Hash { files } => cmd::hash::hash(&files),
        Commands::Formula { command } => match command {
            FormulaCommands::New { name, output_dir } => cmd::formula::new(&name, &output_dir),
            FormulaCommands::Check { path } => cmd::formula::check(&path),
            FormulaCommands::Bump {
                path,
                version,
                url,
                sha256,
            } => cmd::formula::bump(&path, &version, &url, sha256.as_deref()),
        },
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
