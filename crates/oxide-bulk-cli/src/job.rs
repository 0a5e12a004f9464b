//! Job files: a table, a batch of rows and the operation to run.
//!
//! ```json
//! {
//!   "table": { "name": "items", "columns": [...], "unique_constraints": [["sku"]] },
//!   "rows": [{ "sku": "A", "qty": 1 }],
//!   "operation": { "kind": "upsert", "match_fields": ["sku"], "ignore_unchanged": true }
//! }
//! ```

use std::fmt::{self, Write as _};
use std::path::Path;

use anyhow::{bail, Context};
use oxide_bulk::BulkConfig;
use oxide_bulk_core::{Compiler, MergeChain, MergeSpec, OperationSpec, Row, Statement, TableDescriptor};
use serde::Deserialize;
use serde_json::{Map, Value};

/// What to do with the rows.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Update(OperationSpec),
    Upsert(OperationSpec),
    Merge { spec: MergeSpec, chain: MergeChain },
    Copy,
    CopyUpsert(OperationSpec),
}

impl Operation {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Upsert(_) => "upsert",
            Self::Merge { .. } => "merge",
            Self::Copy => "copy",
            Self::CopyUpsert(_) => "copy_upsert",
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobFile {
    table: TableDescriptor,
    #[serde(default)]
    rows: Vec<Value>,
    #[serde(default)]
    config: BulkConfig,
    operation: Operation,
}

/// A parsed job with typed rows.
#[derive(Debug, Clone)]
pub struct Job {
    pub table: TableDescriptor,
    pub rows: Vec<Row>,
    pub config: BulkConfig,
    pub operation: Operation,
}

impl Job {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let file: JobFile = serde_json::from_str(text)?;
        file.table.validate()?;
        let mut rows = Vec::with_capacity(file.rows.len());
        for (index, value) in file.rows.iter().enumerate() {
            let Some(object) = value.as_object() else {
                bail!("row {index} is not a JSON object");
            };
            rows.push(Row::from_json(object, &file.table, index)?);
        }
        Ok(Self {
            table: file.table,
            rows,
            config: file.config,
            operation: file.operation,
        })
    }

    /// Renders every statement the job would run, without a database.
    pub fn render_sql(&self) -> anyhow::Result<String> {
        let compiler = Compiler::with_options(&self.table, self.config.compile_options());
        let mut out = String::new();
        match &self.operation {
            Operation::Update(spec) => {
                render_statement(&mut out, compiler.update(&self.rows, spec)?.as_ref())?;
            }
            Operation::Upsert(spec) => {
                render_statement(&mut out, compiler.upsert(&self.rows, spec)?.as_ref())?;
            }
            Operation::Merge { spec, chain } => {
                render_statement(&mut out, compiler.merge(&self.rows, spec, chain)?.as_ref())?;
            }
            Operation::Copy => match compiler.copy_in(&self.rows)? {
                Some(copy) => {
                    writeln!(out, "{};", copy.sql)?;
                    out.push_str(&String::from_utf8_lossy(&copy.payload(&self.rows)));
                    out.push_str("\\.\n");
                }
                None => out.push_str("-- empty batch\n"),
            },
            Operation::CopyUpsert(spec) => {
                let staging = format!("{}_0", self.config.staging_prefix);
                match compiler.staged_upsert(&self.rows, spec, &staging)? {
                    Some(plan) => {
                        writeln!(out, "{};", plan.create_sql)?;
                        writeln!(out, "{};", plan.copy.sql)?;
                        writeln!(out, "-- {} rows", plan.copy.row_count)?;
                        render_statement(&mut out, Some(&plan.upsert))?;
                        writeln!(out, "{};", plan.drop_sql)?;
                    }
                    None => out.push_str("-- empty batch\n"),
                }
            }
        }
        Ok(out)
    }
}

fn render_statement(out: &mut String, statement: Option<&Statement>) -> fmt::Result {
    let Some(statement) = statement else {
        out.push_str("-- empty batch\n");
        return Ok(());
    };
    writeln!(out, "{};", statement.sql)?;
    for (index, param) in statement.params.iter().enumerate() {
        writeln!(out, "-- ${} = {param:?}", index + 1)?;
    }
    Ok(())
}

/// Builds a JSON object from key/value pairs.
pub fn summary(pairs: &[(&str, Value)]) -> Value {
    Value::Object(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect::<Map<_, _>>(),
    )
}
