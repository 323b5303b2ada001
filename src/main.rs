use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use discoverfm::{cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    /// Print every discovery decision and remote call
    #[clap(long, short, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of the data directory .env
    #[clap(long, global = true, value_name = "FILE")]
    env_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Discover new albums and queue them in the music service
    Sync,

    /// Validate the configuration and test the music service
    Check,

    /// Inspect and maintain the discovery cache
    Cache(CacheOptions),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct CacheOptions {
    /// Subcommands under `cache` (e.g., `prune`)
    #[command(subcommand)]
    pub command: Option<CacheSubcommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheSubcommand {
    /// Remove expired similarity lists
    Prune,

    /// Remove all similarity lists, keeping the queued albums
    ClearSimilar,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = config::load_env(cli.env_file.clone()).await {
        error!("Cannot load environment. Err: {}", e);
    }

    match cli.command {
        Command::Sync => cli::sync(cli.verbose).await,
        Command::Check => cli::check(cli.verbose).await,
        Command::Cache(opt) => match opt.command {
            Some(CacheSubcommand::Prune) => cli::cache_prune().await,
            Some(CacheSubcommand::ClearSimilar) => cli::cache_clear_similar().await,
            None => cli::cache_info().await,
        },
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
