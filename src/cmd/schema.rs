//! Schema command - print the record definition handed to the extraction engine

use clap::Args;
use edufin::{RecordInput, SchemaDefinition, SchemaFactory, StatementCategory};
use schemars::schema_for;
use tabled::{
    settings::{object::Columns, Modify, Style, Width},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Statement category
    #[arg(value_enum)]
    category: StatementCategory,

    /// Fiscal year ending June 30 (e.g. 2024 for FY2024)
    #[arg(short, long)]
    year: i64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema of the object the extraction engine returns
    JsonSchema,
    /// Prompt text asking for the whole record
    Prompt,
    /// Table of fields with type, unit and instruction
    Fields,
    /// CSV header row with the extraction field names
    CsvHeader,
    /// Full definition as JSON, including derived fields and residual rules
    Definition,
    /// JSON Schema of the record input accepted by finalize and validate
    RecordInput,
}

#[derive(Debug, Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Derived")]
    derived: String,
    #[tabled(rename = "Instruction")]
    instruction: String,
}

impl SchemaCommand {
    pub fn exec(&self, factory: &SchemaFactory) -> anyhow::Result<()> {
        let schema = factory.generate(self.category, self.year)?;
        log::info!("{} fingerprint {}", schema.name, schema.fingerprint());
        match self.format {
            SchemaFormat::JsonSchema => {
                println!("{}", serde_json::to_string_pretty(&schema.json_schema())?)
            }
            SchemaFormat::Prompt => print!("{}", schema.prompt()),
            SchemaFormat::Fields => self.print_fields(&schema),
            SchemaFormat::CsvHeader => {
                let names: Vec<&str> = schema.extraction_fields().map(|f| f.name.as_str()).collect();
                println!("{}", names.join(","));
            }
            SchemaFormat::Definition => println!("{}", serde_json::to_string_pretty(&schema)?),
            SchemaFormat::RecordInput => {
                println!("{}", serde_json::to_string_pretty(&schema_for!(RecordInput))?)
            }
        }
        Ok(())
    }

    fn print_fields(&self, schema: &SchemaDefinition) {
        let rows: Vec<FieldRow> = schema
            .fields
            .iter()
            .map(|f| FieldRow {
                name: f.name.clone(),
                kind: f.kind.to_string(),
                unit: f.unit.to_string(),
                derived: if f.derived { "yes".into() } else { String::new() },
                instruction: f.instruction.clone(),
            })
            .collect();

        println!("{} ({} fields)", schema.name, rows.len());
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::one(4)).with(Width::wrap(80)))
            .to_string();
        println!("{}", table);
    }
}
