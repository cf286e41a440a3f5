mod candidates;
mod research;

use clap::{Parser, Subcommand};
use newsroom_core::CandidateStatus;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "newsroom-cli")]
#[command(about = "Newsroom candidate discovery command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run candidate discovery for one publication now
    Research {
        /// Publication id
        publication_id: i64,
    },
    /// Research every publication whose last run is stale
    Sweep {
        /// List due publications without running them
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored candidates for a publication
    Candidates {
        /// Publication id
        publication_id: i64,
        /// Status filter (defaults from the publication's review mode)
        #[arg(long)]
        status: Option<CandidateStatus>,
        /// Minimum relevance score
        #[arg(long)]
        min_score: Option<f64>,
        /// Maximum number of candidates to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert publications and sources from the seed file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("newsroom-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = newsroom_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = newsroom_db::PoolConfig::from_app_config(&config);
    let pool = newsroom_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => run_db(&pool, &config, command).await?,
        Commands::Research { publication_id } => {
            research::run_research(&pool, &config, publication_id).await?;
        }
        Commands::Sweep { dry_run } => research::run_sweep(&pool, &config, dry_run).await?,
        Commands::Candidates {
            publication_id,
            status,
            min_score,
            limit,
        } => {
            candidates::run_list_candidates(&pool, publication_id, status, min_score, limit)
                .await?;
        }
    }

    Ok(())
}

async fn run_db(
    pool: &sqlx::PgPool,
    config: &newsroom_core::AppConfig,
    command: DbCommands,
) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            newsroom_db::ping(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = newsroom_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let seed = newsroom_core::load_seed_file(&config.seed_path)?;
            let summary = newsroom_db::seed_publications(pool, &seed.publications).await?;
            println!(
                "seeded {} publication(s) and {} source(s) from {}",
                summary.publications,
                summary.sources,
                config.seed_path.display()
            );
        }
    }
    Ok(())
}
