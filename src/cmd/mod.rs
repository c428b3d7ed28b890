pub mod finalize;
pub mod schema;
pub mod validate;

use edufin::{RecordInput, SchemaDefinition, SchemaFactory, StatementCategory};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(RecordInput),
    Many(Vec<RecordInput>),
}

/// Read record inputs (JSON object or array) from a file, or stdin with "-"
pub fn read_inputs(path: &Path) -> anyhow::Result<Vec<RecordInput>> {
    let mut buffer = Vec::new();
    if path.as_os_str() == "-" {
        let stdin = io::stdin();
        BufReader::new(stdin.lock()).read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
    } else {
        BufReader::new(File::open(path)?).read_to_end(&mut buffer)?;
    }

    let inputs = match serde_json::from_slice(&buffer)? {
        OneOrMany::One(input) => vec![input],
        OneOrMany::Many(inputs) => inputs,
    };
    log::info!("Read {} record(s) from {}", inputs.len(), path.display());
    Ok(inputs)
}

/// Generates each (category, year) schema once and hands out shared copies
pub struct SchemaCache<'a> {
    factory: &'a SchemaFactory<'a>,
    schemas: HashMap<(StatementCategory, i64), Arc<SchemaDefinition>>,
}

impl<'a> SchemaCache<'a> {
    pub fn new(factory: &'a SchemaFactory<'a>) -> Self {
        SchemaCache {
            factory,
            schemas: HashMap::new(),
        }
    }

    pub fn get(&mut self, input: &RecordInput) -> anyhow::Result<Arc<SchemaDefinition>> {
        let key = (input.category, input.fiscal_year);
        if let Some(schema) = self.schemas.get(&key) {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(self.factory.generate(input.category, input.fiscal_year)?);
        self.schemas.insert(key, Arc::clone(&schema));
        Ok(schema)
    }
}
