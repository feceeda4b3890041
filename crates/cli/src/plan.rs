use std::{fs, path::Path, str::FromStr};

use tablelink_core::{AdapterConfig, Error, OrderKey, Page, TableDef, TableLockMode};
use tablelink_dialect_oracle::{Maintenance, OracleHandler, OracleShare};
use tracing::debug;

use crate::error_presentation::{CliError, CliResult};

/// Statements planned for one shard link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkPlan {
    pub(crate) link: usize,
    pub(crate) target: String,
    pub(crate) statements: Vec<String>,
}

impl LinkPlan {
    pub(crate) fn render(&self) -> String {
        let mut out = format!("-- link {} {}\n", self.link, self.target);
        for statement in &self.statements {
            out.push_str(statement);
            out.push('\n');
        }
        out
    }
}

/// `COLUMN[:asc|:desc]`, where `COLUMN` is a name or a zero-based index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderArg {
    column: String,
    descending: bool,
}

impl FromStr for OrderArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (column, direction) = match value.rsplit_once(':') {
            Some((column, direction)) => (column, Some(direction)),
            None => (value, None),
        };
        if column.is_empty() {
            return Err(format!("missing column in order key `{value}`"));
        }
        let descending = match direction.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => return Err(format!("unknown sort direction `{other}`")),
        };
        Ok(Self {
            column: column.to_string(),
            descending,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScanRequest {
    pub(crate) columns: Vec<String>,
    pub(crate) order: Vec<OrderArg>,
    pub(crate) offset: u64,
    pub(crate) limit: Option<u64>,
    pub(crate) for_update: bool,
}

pub(crate) fn load_config(path: &Path) -> CliResult<AdapterConfig> {
    let config = AdapterConfig::from_path(path)?;
    debug!(links = config.links.len(), "loaded adapter configuration");
    Ok(config)
}

pub(crate) fn load_table(path: &Path) -> CliResult<TableDef> {
    let source = fs::read_to_string(path).map_err(|source| CliError::ReadTable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&source).map_err(|source| CliError::ParseTable {
        path: path.to_path_buf(),
        source,
    })
}

/// Renders the statements one handler would send, without connecting anywhere.
pub(crate) struct Planner {
    handler: OracleHandler,
}

impl Planner {
    pub(crate) fn open(config: AdapterConfig, table: TableDef) -> CliResult<Self> {
        let share = OracleShare::open(table, config)?;
        Ok(Self {
            handler: OracleHandler::new(share),
        })
    }

    /// Every configured link, or just `only` after a range check.
    pub(crate) fn links(&self, only: Option<usize>) -> CliResult<Vec<usize>> {
        let config = self.handler.share().config();
        match only {
            Some(link) => {
                config.link(link).map_err(Error::from)?;
                Ok(vec![link])
            }
            None => Ok((0..config.links.len()).collect()),
        }
    }

    pub(crate) fn scan(&mut self, request: &ScanRequest, links: &[usize]) -> CliResult<Vec<LinkPlan>> {
        let columns = request
            .columns
            .iter()
            .map(|column| self.resolve_column(column))
            .collect::<CliResult<Vec<_>>>()?;
        let order = request
            .order
            .iter()
            .map(|key| {
                let column = self.resolve_column(&key.column)?;
                Ok(if key.descending {
                    OrderKey::desc(column)
                } else {
                    OrderKey::asc(column)
                })
            })
            .collect::<CliResult<Vec<_>>>()?;

        // Built once for the first link and retargeted for the rest.
        let first = links.first().copied().unwrap_or_default();
        self.handler.reset_select(first)?;
        self.handler.append_select_part(&columns)?;
        self.handler.append_order_by(&order)?;
        self.handler
            .append_limit(Page::new(request.offset, request.limit))?;
        self.handler.append_select_lock(request.for_update)?;

        let mut plans = Vec::with_capacity(links.len());
        for &link in links {
            let sql = self.handler.set_sql_for_exec(link)?.to_string();
            plans.push(self.plan(link, vec![sql])?);
        }
        Ok(plans)
    }

    pub(crate) fn lock(&self, mode: TableLockMode, links: &[usize]) -> CliResult<Vec<LinkPlan>> {
        links
            .iter()
            .map(|&link| {
                let statement = self.handler.lock_statement(link, mode)?;
                self.plan(link, vec![statement])
            })
            .collect()
    }

    pub(crate) fn maintenance(
        &self,
        command: Maintenance,
        links: &[usize],
    ) -> CliResult<Vec<LinkPlan>> {
        links
            .iter()
            .map(|&link| {
                let statements = self.handler.maintenance_statements(command, link)?;
                self.plan(link, statements)
            })
            .collect()
    }

    pub(crate) fn delete_all(&self, truncate: bool, links: &[usize]) -> CliResult<Vec<LinkPlan>> {
        links
            .iter()
            .map(|&link| {
                let statement = self.handler.delete_all_statement(link, truncate)?;
                self.plan(link, vec![statement])
            })
            .collect()
    }

    fn plan(&self, link: usize, statements: Vec<String>) -> CliResult<LinkPlan> {
        let target = self.handler.share().names().db_table_name(link)?.to_string();
        Ok(LinkPlan {
            link,
            target,
            statements,
        })
    }

    fn resolve_column(&self, column: &str) -> CliResult<usize> {
        let table = self.handler.share().table();
        if let Some(index) = table.column_index(column) {
            return Ok(index);
        }
        match column.parse::<usize>() {
            Ok(index) if index < table.columns.len() => Ok(index),
            _ => Err(CliError::UnknownColumn(column.to_string())),
        }
    }
}
