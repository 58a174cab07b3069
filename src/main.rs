// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! `standings` - seed a leaderboard and query it from the command line.
//!
//! ```text
//! standings range --seed 1000 --start 1 --end 10
//! standings -c standings.toml neighbors --seed 1000 --customer 500 --above 2 --below 2
//! ```

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use standings::config::LeaderboardConfig;
use standings::leaderboard::CustomerId;
use standings::leaderboard::Leaderboard;
use standings::leaderboard::LeaderboardEntry;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "standings", version, about = "Live customer leaderboard")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the customers holding ranks `start..=end`.
    Range {
        /// Seed customers 1..=N, customer i scoring i points.
        #[arg(short, long, default_value = "1000")]
        seed: u64,

        #[arg(long, default_value = "1")]
        start: usize,

        #[arg(long, default_value = "10")]
        end: usize,
    },

    /// Print the window of customers around one customer.
    Neighbors {
        /// Seed customers 1..=N, customer i scoring i points.
        #[arg(short, long, default_value = "1000")]
        seed: u64,

        #[arg(long)]
        customer: CustomerId,

        /// Better-ranked customers to include.
        #[arg(long, default_value = "0")]
        above: usize,

        /// Worse-ranked customers to include.
        #[arg(long, default_value = "0")]
        below: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LeaderboardConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LeaderboardConfig::default(),
    };
    init_tracing(&config.log.level);

    let board = Leaderboard::new(&config).context("building leaderboard")?;

    let entries = match cli.command {
        Commands::Range { seed, start, end } => {
            board.seed(seed).await.context("seeding")?;
            board.range(start, end).await.context("range query")?
        }
        Commands::Neighbors {
            seed,
            customer,
            above,
            below,
        } => {
            board.seed(seed).await.context("seeding")?;
            board
                .neighbors(customer, above, below)
                .await
                .context("neighbor query")?
        }
    };

    info!(rows = entries.len(), "query complete");
    print_entries(&entries);
    Ok(())
}

/// Console tracing, filtered by `RUST_LOG` or the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_entries(entries: &[LeaderboardEntry]) {
    println!("{:>6}  {:>10}  {:>12}", "rank", "customer", "score");
    for entry in entries {
        println!(
            "{:>6}  {:>10}  {:>12}",
            entry.rank,
            entry.customer_id,
            entry.score.to_string()
        );
    }
}
