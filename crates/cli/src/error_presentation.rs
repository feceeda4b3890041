use std::{io, path::PathBuf};

use miette::Report;
use tablelink_core::{ConfigError, Error};

const CONFIG_CONTEXT: &str = "while loading adapter configuration";
const TABLE_READ_CONTEXT: &str = "while reading table definition file";
const TABLE_PARSE_CONTEXT: &str = "while parsing table definition file";
const PLAN_CONTEXT: &str = "while planning remote statements";

pub(crate) type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug)]
pub(crate) enum CliError {
    MissingInput(&'static str),
    Config(ConfigError),
    ReadTable {
        path: PathBuf,
        source: io::Error,
    },
    ParseTable {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    UnknownColumn(String),
    Core(Error),
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<Error> for CliError {
    fn from(value: Error) -> Self {
        Self::Core(value)
    }
}

pub(crate) fn render_runtime_error(error: CliError) -> String {
    match error {
        CliError::MissingInput(flag) => {
            format!("[usage] missing required input: pass {flag} <PATH>")
        }
        CliError::Config(source) => {
            let report = report_with_context(source, CONFIG_CONTEXT);
            format!("[config] {report}")
        }
        CliError::ReadTable { path, source } => {
            let context = format!("{TABLE_READ_CONTEXT} `{}`", path.display());
            format!("[io] {}", report_with_context(source, context))
        }
        CliError::ParseTable { path, source } => {
            let context = format!("{TABLE_PARSE_CONTEXT} `{}`", path.display());
            format!("[parse] {}", report_with_context(source, context))
        }
        CliError::UnknownColumn(column) => {
            format!("[usage] table definition has no column `{column}`")
        }
        CliError::Core(source) => {
            let category = core_category(&source);
            let report = report_with_context(source, PLAN_CONTEXT);
            format!("[{category}] {report}")
        }
    }
}

fn report_with_context<E, C>(source: E, context: C) -> Report
where
    E: std::error::Error + Send + Sync + 'static,
    C: Into<String>,
{
    let anyhow_error = anyhow::Error::new(source).context(context.into());
    miette::miette!("{anyhow_error:#}")
}

fn core_category(error: &Error) -> &'static str {
    match error {
        Error::Unsupported => "unsupported",
        Error::OutOfMemory { .. } => "memory",
        Error::DuplicateKey { .. } => "duplicate",
        Error::EndOfData => "eof",
        Error::ConnectionGone { .. } => "connection",
        Error::Native(_) => "remote",
        Error::Config(_) => "config",
        Error::Spill(_) => "spill",
        Error::Marshal { .. } => "marshal",
        Error::InvalidState { .. } => "state",
        Error::Worker { .. } => "worker",
    }
}
