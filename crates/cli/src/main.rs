mod error_presentation;
mod plan;

use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use error_presentation::{CliError, CliResult, render_runtime_error};
use plan::{LinkPlan, OrderArg, Planner, ScanRequest, load_config, load_table};
use tablelink_core::{AdapterConfig, TableLockMode};
use tablelink_dialect_oracle::Maintenance;
use tracing_subscriber::EnvFilter;

/// Prints the statements tablelink would send to each shard link.
#[derive(Debug, Parser)]
#[command(name = "tablelink", version, about)]
struct Cli {
    /// Adapter configuration (YAML).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Host table definition (YAML).
    #[arg(long, value_name = "PATH", global = true)]
    table: Option<PathBuf>,

    /// Plan for a single link instead of every configured one.
    #[arg(long, value_name = "N", global = true)]
    link: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the configured links and their status.
    Links,
    /// Plan a SELECT, with pagination emulated through ROW_NUMBER().
    Scan {
        /// Columns to select, by name or index; all columns when omitted.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// Sort keys as COLUMN[:asc|:desc].
        #[arg(long, value_delimiter = ',')]
        order: Vec<OrderArg>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long)]
        for_update: bool,
    },
    /// Plan a LOCK TABLE statement.
    Lock {
        #[arg(long, value_enum, default_value_t = LockModeArg::Read)]
        mode: LockModeArg,
    },
    /// Plan a table maintenance command.
    Maintenance {
        #[arg(value_enum)]
        command: MaintenanceArg,
    },
    /// Plan removal of every row.
    Truncate {
        /// Use DELETE instead of TRUNCATE TABLE.
        #[arg(long)]
        delete: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LockModeArg {
    ReadLocal,
    Read,
    LowPriorityWrite,
    Write,
}

impl From<LockModeArg> for TableLockMode {
    fn from(value: LockModeArg) -> Self {
        match value {
            LockModeArg::ReadLocal => Self::ReadLocal,
            LockModeArg::Read => Self::Read,
            LockModeArg::LowPriorityWrite => Self::LowPriorityWrite,
            LockModeArg::Write => Self::Write,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MaintenanceArg {
    Analyze,
    Check,
    Optimize,
    Repair,
    DisableKeys,
    EnableKeys,
}

impl From<MaintenanceArg> for Maintenance {
    fn from(value: MaintenanceArg) -> Self {
        match value {
            MaintenanceArg::Analyze => Self::Analyze,
            MaintenanceArg::Check => Self::Check,
            MaintenanceArg::Optimize => Self::Optimize,
            MaintenanceArg::Repair => Self::Repair,
            MaintenanceArg::DisableKeys => Self::DisableKeys,
            MaintenanceArg::EnableKeys => Self::EnableKeys,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", render_runtime_error(error));
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("tablelink=debug,tablelink_dialect_oracle=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> CliResult<String> {
    let config_path = cli.config.ok_or(CliError::MissingInput("--config"))?;
    let config = load_config(&config_path)?;
    if let Command::Links = cli.command {
        return render_links(&config, cli.link);
    }

    let table_path = cli.table.ok_or(CliError::MissingInput("--table"))?;
    let table = load_table(&table_path)?;
    let mut planner = Planner::open(config, table)?;
    let links = planner.links(cli.link)?;

    let plans = match cli.command {
        Command::Links => Vec::new(),
        Command::Scan {
            columns,
            order,
            offset,
            limit,
            for_update,
        } => {
            let request = ScanRequest {
                columns,
                order,
                offset,
                limit,
                for_update,
            };
            planner.scan(&request, &links)?
        }
        Command::Lock { mode } => planner.lock(mode.into(), &links)?,
        Command::Maintenance { command } => planner.maintenance(command.into(), &links)?,
        Command::Truncate { delete } => planner.delete_all(!delete, &links)?,
    };
    Ok(plans.iter().map(LinkPlan::render).collect())
}

fn render_links(config: &AdapterConfig, only: Option<usize>) -> CliResult<String> {
    let links = match only {
        Some(link) => vec![(link, config.link(link)?)],
        None => config.links.iter().enumerate().collect(),
    };
    Ok(links
        .into_iter()
        .map(|(index, link)| {
            format!(
                "{index}\t{}.{}\t{}:{}/{}\t{}\t{}\n",
                link.database,
                link.table,
                link.host,
                link.port,
                link.service,
                link.wrapper,
                link.link_status.as_str()
            )
        })
        .collect())
}
