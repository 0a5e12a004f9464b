//! oxide-bulk CLI
//!
//! Compiles and runs bulk jobs described in JSON files.

mod job;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use oxide_bulk::BulkExecutor;
use serde_json::{json, Value};
use sqlx::{Connection, PgConnection};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::job::{summary, Job, Operation};

/// Bulk UPDATE, UPSERT, MERGE and COPY for PostgreSQL.
#[derive(Parser)]
#[command(name = "oxide-bulk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PostgreSQL connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL and parameters of a job without executing it.
    Sql {
        /// Job file.
        job: PathBuf,
    },

    /// Execute a job.
    Run {
        /// Job file.
        job: PathBuf,
    },
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
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sql { job } => {
            let job = Job::load(&job)?;
            print!("{}", job.render_sql()?);
        }

        Commands::Run { job } => {
            let job = Job::load(&job)?;
            let Some(url) = cli.database_url else {
                anyhow::bail!("no database given, pass --database-url or set DATABASE_URL");
            };
            let mut conn = PgConnection::connect(&url).await?;
            info!(
                table = %job.table.name,
                operation = job.operation.name(),
                rows = job.rows.len(),
                "Running job"
            );
            let output = run(&mut conn, &job).await?;
            conn.close().await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn run(conn: &mut PgConnection, job: &Job) -> anyhow::Result<Value> {
    let executor = BulkExecutor::new(job.config.clone());
    let output = match &job.operation {
        Operation::Update(spec) => {
            let result = executor.update(conn, &job.table, &job.rows, spec).await?;
            summary(&[
                ("affected", json!(result.affected)),
                (
                    "rows",
                    Value::Array(result.rows.iter().map(oxide_bulk::Row::to_json).collect()),
                ),
            ])
        }
        Operation::Upsert(spec) => {
            let result = executor.upsert(conn, &job.table, &job.rows, spec).await?;
            upsert_summary(&result)
        }
        Operation::Merge { spec, chain } => {
            let result = executor
                .merge(conn, &job.table, &job.rows, spec, chain)
                .await?;
            let rows = result
                .rows
                .iter()
                .map(|row| {
                    json!({
                        "outcome": format!("{:?}", row.outcome),
                        "values": row.values.to_json(),
                    })
                })
                .collect();
            summary(&[
                ("affected", json!(result.affected)),
                ("inserted", json!(result.created().count())),
                ("updated", json!(result.updated().count())),
                ("deleted", json!(result.deleted().count())),
                ("rows", Value::Array(rows)),
            ])
        }
        Operation::Copy => {
            let copied = executor.copy_in(conn, &job.table, &job.rows).await?;
            summary(&[("copied", json!(copied))])
        }
        Operation::CopyUpsert(spec) => {
            let result = executor
                .copy_upsert(conn, &job.table, &job.rows, spec)
                .await?;
            summary(&[
                ("copied", json!(result.copied)),
                ("upsert", upsert_summary(&result.upsert)),
            ])
        }
    };
    Ok(output)
}

fn upsert_summary(result: &oxide_bulk::UpsertResult) -> Value {
    let rows = result
        .rows
        .iter()
        .map(|row| {
            json!({
                "status": row.status.map(|status| format!("{status:?}")),
                "values": row.values.to_json(),
            })
        })
        .collect();
    summary(&[
        ("affected", json!(result.affected)),
        ("inserted", json!(result.inserted().count())),
        ("updated", json!(result.updated().count())),
        ("rows", Value::Array(rows)),
    ])
}
