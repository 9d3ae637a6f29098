//! tabula CLI
//!
//! Inspects and maintains SQLite schemas.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tabula_sqlite::{ClientOptions, SqliteClient};

/// Schema inspection and maintenance for SQLite databases.
#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL")]
    database: Option<String>,

    /// JSON client options; `--database` overrides their url.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a table exists.
    Exists {
        /// Table name.
        table: String,
    },

    /// Print the schema of a table or view as JSON.
    Inspect {
        /// Table or view name.
        name: String,
    },

    /// Drop a table or view.
    Drop {
        /// Table or view name.
        name: String,

        /// Drop a view instead of a table.
        #[arg(long)]
        view: bool,
    },

    /// Delete every row of a table.
    Truncate {
        /// Table name.
        table: String,

        /// Restart the autoincrement counter.
        #[arg(long)]
        reset_sequence: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut options = match &cli.config {
        Some(path) => ClientOptions::from_file(path)?,
        None => ClientOptions::new("sqlite:db.sqlite3"),
    };
    if let Some(database) = cli.database {
        options.url = database;
    }
    let client = SqliteClient::connect(options).await?;

    match cli.command {
        Commands::Exists { table } => {
            println!("{}", client.table_exists(&table).await?);
        }

        Commands::Inspect { name } => match client.schema(&name).await? {
            Some(descriptor) => println!("{}", serde_json::to_string_pretty(&descriptor)?),
            None => anyhow::bail!("No table or view named '{name}'"),
        },

        Commands::Drop { name, view } => {
            if view {
                client.drop_view(&name).await?;
            } else {
                client.drop_table(&name).await?;
            }
            info!("Dropped '{}'", name);
        }

        Commands::Truncate {
            table,
            reset_sequence,
        } => {
            let rows = client.truncate(&table, reset_sequence).await?;
            info!("Deleted {} row(s) from '{}'", rows, table);
        }
    }

    Ok(())
}
