//! Hypersecretary CLI
//!
//! `hypersec serve` runs the webhook server and Telegram bot; the other
//! subcommands inspect the local inbox.

use anyhow::Result;
use clap::{Parser, Subcommand};
use hypersecretary::cli::{
    apply_overrides, handle_actions, handle_inbox, handle_search, handle_serve, handle_status, InboxArgs,
    JsonArgs, SearchArgs, ServeArgs,
};
use hypersecretary::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hypersec")]
#[command(about = "Hypersecretary - unified inbox and personal assistant bot")]
#[command(version)]
struct Cli {
    /// Data directory (overrides HYPERSEC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server and Telegram bot
    Serve(ServeArgs),
    /// List recent inbox items (does not mark them read)
    Inbox(InboxArgs),
    /// Search the inbox by keyword
    Search(SearchArgs),
    /// List configured actions
    Actions(JsonArgs),
    /// Inbox and configuration summary
    Status(JsonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=debug hypersec serve
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hypersecretary=info,hypersec=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::auto_load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Serve(args) => {
            let config = apply_overrides(config, &args);
            handle_serve(config, args).await?;
        }
        Commands::Inbox(args) => println!("{}", handle_inbox(&config, args)?),
        Commands::Search(args) => println!("{}", handle_search(&config, args)?),
        Commands::Actions(args) => println!("{}", handle_actions(&config, args)?),
        Commands::Status(args) => println!("{}", handle_status(&config, args)?),
    }

    Ok(())
}
