//! External interface: reads complete `;`-terminated statements from stdin,
//! runs them against the hybrid router, and renders results as a
//! fixed-width table. Exits zero iff every statement ran without error.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser as ClapParser, ValueEnum};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use dualstore_exec::{execute, EngineError, QueryResult};
use dualstore_olap::OlapReplica;
use dualstore_oltp::OltpEngine;
use dualstore_router::Router;
use dualstore_sql::lexer::{Lexer, TokenKind};
use dualstore_sql::parser::{MetaCommand, Parser as SqlParser, Projection};
use dualstore_sql::value::{Row, Scalar};

#[derive(ClapParser, Debug)]
#[command(name = "dualstore", author, version, about = "hybrid OLTP/OLAP SQL engine")]
struct Config {
    /// OLTP B-tree file path.
    #[arg(long, env = "DUALSTORE_STORAGE_PATH")]
    storage_path: PathBuf,

    /// OLAP replica directory. Defaults to `<storage_path>-replica/`.
    #[arg(long, env = "DUALSTORE_REPLICA_DIR")]
    replica_dir: Option<PathBuf>,

    /// Sync interval, in seconds.
    #[arg(long, env = "DUALSTORE_SYNC_INTERVAL_SECS", default_value_t = 300)]
    sync_interval_secs: u64,

    /// Which engine(s) to run.
    #[arg(long, env = "DUALSTORE_ENGINE_MODE", value_enum, default_value_t = EngineMode::Hybrid)]
    engine_mode: EngineMode,

    /// Verbose (debug-level) logging.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EngineMode {
    InMemory,
    Json,
    Btree,
    Hybrid,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("engine mode {0:?} is not supported; only Btree and Hybrid are wired up")]
    UnsupportedEngineMode(EngineMode),
}

type CliResult<T> = Result<T, CliError>;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run(config: Config) -> CliResult<ExitCode> {
    if !matches!(config.engine_mode, EngineMode::Btree | EngineMode::Hybrid) {
        return Err(CliError::UnsupportedEngineMode(config.engine_mode));
    }

    let replica_dir = config.replica_dir.clone().unwrap_or_else(|| {
        let mut path = config.storage_path.clone().into_os_string();
        path.push("-replica");
        PathBuf::from(path)
    });

    let primary = OltpEngine::open(&config.storage_path).map_err(|e| CliError::Engine(e.into()))?;
    let replica = OlapReplica::open(&replica_dir).map_err(|e| CliError::Engine(e.into()))?;
    let router = Router::new(primary, replica, Duration::from_secs(config.sync_interval_secs));

    if config.engine_mode == EngineMode::Hybrid {
        router.spawn_sync_worker();
    }

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let mut any_error = false;
    for text in split_statements(&input) {
        match run_one(&router, &text).await {
            Ok(()) => {}
            Err(e) => {
                eprintln!("error: {e}");
                any_error = true;
            }
        }
    }

    router.close().await.map_err(|e| CliError::Engine(e.into()))?;

    Ok(if any_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Splits raw input into individual statement texts at top-level `;`
/// tokens (i.e. not inside a string literal), using the lexer itself so a
/// semicolon inside a quoted string is never mistaken for a terminator.
fn split_statements(input: &str) -> Vec<String> {
    let tokens = Lexer::new(input).tokenize();
    let mut statements = Vec::new();
    let mut start = 0usize;

    for token in &tokens {
        if matches!(token.kind, TokenKind::Semicolon) {
            let text = input[start..token.span.end].trim();
            if !text.is_empty() {
                statements.push(text.to_string());
            }
            start = token.span.end;
        }
    }

    let trailing = input[start..].trim();
    if !trailing.is_empty() {
        statements.push(trailing.to_string());
    }
    statements
}

async fn run_one(router: &Router, text: &str) -> Result<(), EngineError> {
    let mut parser = SqlParser::new(text);
    if let Some(meta) = parser.try_parse_meta()? {
        return run_meta(router, meta).await;
    }
    let statement = parser.parse_statement()?;
    let result = execute(router, statement).await?;
    print_result(&result);
    Ok(())
}

async fn run_meta(router: &Router, meta: MetaCommand) -> Result<(), EngineError> {
    match meta {
        MetaCommand::ShowTables => {
            print_result(&QueryResult::Tables(router.show_tables().await?));
        }
        MetaCommand::ShowTable(table) => {
            let schema = router.get_schema(&table).await?;
            println!("table {}", schema.name);
            for column in &schema.columns {
                println!(
                    "  {} {}{}",
                    column.name,
                    column.ty,
                    if column.nullable { "" } else { " NOT NULL" }
                );
            }
        }
        MetaCommand::Explain(select) => {
            let columns = projection_columns(&select.projection);
            let classification = router.explain(&columns, &select.predicate);
            println!(
                "{:?} -> {}",
                classification,
                classification.engine_name()
            );
        }
        MetaCommand::ForceSync => {
            let elapsed = router.sync_now().await?;
            println!("synced in {elapsed:?}");
        }
    }
    Ok(())
}

fn projection_columns(projection: &Projection) -> Vec<String> {
    match projection {
        Projection::Star => vec!["*".to_string()],
        Projection::Columns(columns) => columns.clone(),
    }
}

fn print_result(result: &QueryResult) {
    match result {
        QueryResult::Rows(rows) => print_rows(rows),
        QueryResult::RowsAffected(n) => println!("{n} row{}", if *n == 1 { "" } else { "s" }),
        QueryResult::TableCreated(name) => println!("table '{name}' created"),
        QueryResult::Tables(names) => {
            for name in names {
                println!("{name}");
            }
        }
    }
}

/// Renders rows as a fixed-width table, columns in alphabetical order
/// (`Row` is `BTreeMap`-backed, so that order falls out of iteration).
fn print_rows(rows: &[Row]) {
    let Some(first) = rows.first() else {
        println!("(0 rows)");
        return;
    };

    let columns: Vec<String> = first.0.keys().cloned().collect();
    let cell = |row: &Row, column: &str| -> String {
        row.get(column).map_or_else(String::new, Scalar::to_display_string)
    };

    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in rows {
        for (width, column) in widths.iter_mut().zip(&columns) {
            *width = (*width).max(cell(row, column).len());
        }
    }

    let render_row = |values: Vec<String>| {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", render_row(columns.clone()));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for row in rows {
        println!(
            "{}",
            render_row(columns.iter().map(|c| cell(row, c)).collect())
        );
    }
    println!("({} row{})", rows.len(), if rows.len() == 1 { "" } else { "s" });
}
