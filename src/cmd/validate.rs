//! Validate command - surface record problems without finalizing

use crate::cmd::{read_inputs, SchemaCache};
use clap::Args;
use edufin::{check_input, RecordError, SchemaError, SchemaFactory};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// JSON file with one record input or an array of them ("-" for stdin)
    #[arg(short, long)]
    records: PathBuf,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    record: usize,
    #[serde(rename = "type")]
    issue_type: &'static str,
    category: String,
    fiscal_year: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct ValidationOutput {
    record_count: usize,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self, factory: &SchemaFactory) -> anyhow::Result<()> {
        let inputs = read_inputs(&self.records)?;
        let mut schemas = SchemaCache::new(factory);

        let mut issues = Vec::new();
        for (i, input) in inputs.iter().enumerate() {
            let errors = match schemas.get(input) {
                Ok(schema) => check_input(&schema, input),
                // A year the factory rejects has no schema to check against
                Err(e) => match e.downcast_ref::<SchemaError>() {
                    Some(SchemaError::InvalidYear(year)) => vec![RecordError::InvalidYear(*year)],
                    _ => return Err(e),
                },
            };
            issues.extend(errors.into_iter().map(|e| ValidationIssue {
                record: i + 1,
                issue_type: issue_type_name(&e),
                category: input.category.to_string(),
                fiscal_year: input.fiscal_year,
                message: e.to_string(),
            }));
        }

        if self.json {
            let output = ValidationOutput {
                record_count: inputs.len(),
                issue_count: issues.len(),
                issues: issues.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(inputs.len(), &issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(record_count: usize, issues: &[ValidationIssue]) {
    println!();
    println!("VALIDATION RESULTS ({} record(s))", record_count);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        println!(
            "  {}. [{}] record {} ({} {})",
            i + 1,
            issue.issue_type,
            issue.record,
            issue.category,
            issue.fiscal_year
        );
        println!("     {}", issue.message);
        println!();
    }
}

fn issue_type_name(error: &RecordError) -> &'static str {
    match error {
        RecordError::UnknownField { .. } => "UnknownField",
        RecordError::KindMismatch { .. } => "KindMismatch",
        RecordError::NotNumeric { .. } => "NotNumeric",
        RecordError::DerivedField(_) => "DerivedField",
        RecordError::CategoryMismatch { .. } => "CategoryMismatch",
        RecordError::YearMismatch { .. } => "YearMismatch",
        RecordError::InvalidYear(_) => "InvalidYear",
    }
}
