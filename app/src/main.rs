#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod command;

use command::{
    CommandStrategy, InfoStrategy, InitStrategy, LookupInput, LookupStrategy, TelegramInput,
    TelegramStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "lookupbot")]
#[command(about = "Telegram lookup bot with quotas and subscriptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Init,
    /// Show configuration and store statistics
    Info,
    /// Run the Telegram bot
    Run {
        /// Bot token (overrides config)
        #[arg(short, long)]
        token: Option<String>,

        /// Keep all state in memory instead of the database
        #[arg(long)]
        memory: bool,
    },
    /// Run a single lookup from the terminal
    Lookup {
        /// User the lookup is accounted to
        #[arg(short, long)]
        user: String,

        /// Text to look up
        query: String,

        /// Keep all state in memory instead of the database
        #[arg(long)]
        memory: bool,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Run { token, memory } => {
            TelegramStrategy
                .execute(TelegramInput { token, memory })
                .await
        }
        Commands::Lookup {
            user,
            query,
            memory,
        } => {
            LookupStrategy
                .execute(LookupInput {
                    user,
                    query,
                    memory,
                })
                .await
        }
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
