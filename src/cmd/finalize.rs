//! Finalize command - derive residual fields for extracted records

use crate::cmd::{read_inputs, SchemaCache};
use anyhow::Context;
use clap::Args;
use edufin::{FinalizedRecord, Record, ResidualCalculator, ResidualPolicy, SchemaFactory};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct FinalizeCommand {
    /// JSON file with one record input or an array of them ("-" for stdin)
    #[arg(short, long)]
    records: PathBuf,

    /// Output one CSV row per field instead of JSON
    #[arg(long)]
    csv: bool,

    /// When a total is present but none of its components are, report the
    /// total as the residual instead of leaving it null
    #[arg(long)]
    allow_empty_components: bool,
}

#[derive(Debug, Serialize)]
struct FieldRow<'a> {
    schema: &'a str,
    fiscal_year: i32,
    field: &'a str,
    value: String,
}

impl FinalizeCommand {
    pub fn exec(&self, factory: &SchemaFactory) -> anyhow::Result<()> {
        let inputs = read_inputs(&self.records)?;
        let mut schemas = SchemaCache::new(factory);
        let records = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let schema = schemas.get(input)?;
                Record::from_input(schema, input)
                    .with_context(|| format!("record {} ({} {})", i + 1, input.category, input.fiscal_year))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let policy = if self.allow_empty_components {
            ResidualPolicy::TotalWhenComponentsMissing
        } else {
            ResidualPolicy::RequireComponent
        };
        let finalized = ResidualCalculator::new(policy).finalize_batch(records);
        log::info!("Finalized {} record(s)", finalized.len());

        if self.csv {
            self.write_csv(&finalized)
        } else {
            println!("{}", serde_json::to_string_pretty(&finalized)?);
            Ok(())
        }
    }

    fn write_csv(&self, records: &[FinalizedRecord]) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for row in field_rows(records) {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn field_rows(records: &[FinalizedRecord]) -> Vec<FieldRow<'_>> {
    records
        .iter()
        .flat_map(|record| {
            let schema = record.schema();
            record.iter().map(move |(field, value)| FieldRow {
                schema: &schema.name,
                fiscal_year: schema.fiscal_year.value(),
                field: &field.name,
                value: value.map(|v| v.to_string()).unwrap_or_default(),
            })
        })
        .collect()
}
