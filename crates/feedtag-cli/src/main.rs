use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod corpus;

use commands::Step;

#[derive(Debug, Parser)]
#[command(name = "feedtag")]
#[command(about = "Tag recent RSS feed items against a reference corpus")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download, window, tag and export in one recorded run
    Run,
    /// Download every listed feed into the raw directory
    Download,
    /// Write the interval file from the raw directory
    Window,
    /// Tag the interval file and persist the rows
    Tag,
    /// Send the tagged interval file to the spreadsheet
    Export,
    /// Reference corpus maintenance
    Corpus {
        #[command(subcommand)]
        command: CorpusCommands,
    },
    /// Show recent pipeline runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum CorpusCommands {
    /// Seed an empty corpus from previously tagged rows
    Init {
        /// CSV to seed from (defaults to the backend file)
        #[arg(long)]
        from: Option<PathBuf>,
    },
    /// Print the number of corpus documents
    Count,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = feedtag_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = feedtag_db::PoolConfig::from_app_config(&config);
    // Lazy so the pipeline steps still run while the database is down.
    let pool = feedtag_db::connect_lazy_pool(&config.database_url, pool_config)?;

    let status = match cli.command {
        Commands::Run => commands::run_pipeline(&config, &pool).await?,
        Commands::Download => commands::run_step(&config, &pool, Step::Download).await?,
        Commands::Window => commands::run_step(&config, &pool, Step::Window).await?,
        Commands::Tag => commands::run_step(&config, &pool, Step::Tag).await?,
        Commands::Export => commands::run_step(&config, &pool, Step::Export).await?,
        Commands::Corpus {
            command: CorpusCommands::Init { from },
        } => {
            let source = from.unwrap_or_else(|| config.backend_file.clone());
            feedtag_db::run_migrations(&pool).await?;
            commands::corpus_init(&pool, &source).await?
        }
        Commands::Corpus {
            command: CorpusCommands::Count,
        } => {
            feedtag_db::run_migrations(&pool).await?;
            commands::corpus_count(&pool).await?
        }
        Commands::Runs { limit } => {
            feedtag_db::run_migrations(&pool).await?;
            commands::list_runs(&pool, limit).await?
        }
    };

    Ok(ExitCode::from(status.exit_code()))
}

#[cfg(test)]
mod tests;
