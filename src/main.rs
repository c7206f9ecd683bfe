//! callmap - file-level call maps from language server analysis

mod map_cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "callmap")]
#[command(about = "Render call maps of a code base as Graphviz diagrams", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a call map
    Render(map_cli::RenderArgs),
    /// Analyze a project and save the snapshot as JSON
    Analyze(map_cli::AnalyzeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => map_cli::render(args).await?,
        Commands::Analyze(args) => map_cli::analyze(args).await?,
    }

    Ok(())
}
