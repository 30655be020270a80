//! rowmap CLI
//!
//! Operator commands for a rowmap database: run bulk scripts, inspect tables
//! and rebuild tables to drop columns.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rowmap::{Db, DbOptions, DriverRegistry, Session};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Record mapping and schema maintenance for SQLite.
#[derive(Parser)]
#[command(name = "rowmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data source string.
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Dialect name.
    #[arg(long, default_value = "sqlite")]
    dialect: String,

    /// JSON file with connection options; overrides --database and --dialect.
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
    /// Run a script of SET/CREATE/INSERT/DROP statements in one transaction.
    Exec {
        /// Script file.
        file: PathBuf,
    },

    /// Show the current database and driver.
    Info,

    /// List user tables.
    Tables,

    /// Show the columns of a table.
    Columns {
        /// Table name.
        table: String,
    },

    /// Print the stored CREATE TABLE statement of a table.
    Ddl {
        /// Table name.
        table: String,
    },

    /// Drop a column by rebuilding the table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },
}

fn load_options(cli: &Cli) -> anyhow::Result<DbOptions> {
    let Some(path) = &cli.config else {
        return Ok(DbOptions::new(&cli.dialect, &cli.database));
    };
    read_options(path)
}

fn read_options(path: &Path) -> anyhow::Result<DbOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let options: DbOptions = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

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

    let options = load_options(&cli)?;
    let db = Db::open(options, &DriverRegistry::with_builtins()).await?;
    let driver = db.driver();

    match cli.command {
        Commands::Exec { file } => {
            let script =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let count = db.exec_script(&script).await?;
            info!(statements = count, file = %file.display(), "script applied");
        }

        Commands::Info => {
            println!("database: {}", driver.current_database().await?);
            println!("driver:   {}", driver.name());
        }

        Commands::Tables => {
            for table in driver.tables().await? {
                println!("{table}");
            }
        }

        Commands::Columns { table } => {
            let columns = driver.column_types(&table).await?;
            if columns.is_empty() {
                anyhow::bail!("table `{table}` has no columns or does not exist");
            }
            println!("{:<24} {:<20} {:<6} NOT NULL", "NAME", "TYPE", "SIZE");
            println!("{:-<60}", "");
            for column in columns {
                let size = column.size.map(|s| s.to_string()).unwrap_or_default();
                println!(
                    "{:<24} {:<20} {:<6} {}",
                    column.name,
                    column.data_type,
                    size,
                    if column.not_null { "yes" } else { "no" }
                );
            }
        }

        Commands::Ddl { table } => {
            println!("{}", driver.raw_ddl(&table).await?);
        }

        Commands::DropColumn { table, column } => {
            driver.drop_column(&table, &column).await?;
            info!(table = %table, column = %column, "column dropped");
        }

        Commands::DropIndex { table, index } => {
            driver.drop_index(&table, &index).await?;
            info!(table = %table, index = %index, "index dropped");
        }
    }

    db.close().await;
    Ok(())
}
