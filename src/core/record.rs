use super::category::StatementCategory;
use super::field::{FieldDescriptor, FieldValue, ValueKind};
use super::schema::SchemaDefinition;
use super::year::FiscalYear;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("{schema} has no field {field}")]
    UnknownField { schema: String, field: String },
    #[error("{field} expects {expected}, got {value}")]
    KindMismatch {
        field: String,
        expected: ValueKind,
        value: String,
    },
    #[error("{field} is not numeric: {value}")]
    NotNumeric { field: String, value: String },
    #[error("{0} is derived by the residual calculator and cannot be set directly")]
    DerivedField(String),
    #[error("record is for {found}, schema is for {expected}")]
    CategoryMismatch {
        expected: StatementCategory,
        found: StatementCategory,
    },
    #[error("record is for fiscal year {found}, schema is for {expected}")]
    YearMismatch { expected: FiscalYear, found: i64 },
    #[error("invalid fiscal year {0}")]
    InvalidYear(i64),
}

/// Wire form of a record exchanged with the extraction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordInput {
    pub category: StatementCategory,
    pub fiscal_year: i64,
    /// Field name to number or null. Missing keys are absent values.
    #[serde(default)]
    pub values: Map<String, Value>,
}

/// Extraction result for one (category, fiscal year, document), before the
/// residual pass
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<SchemaDefinition>,
    values: Vec<Option<FieldValue>>,
}

impl Record {
    /// A record with every field absent
    pub fn new(schema: Arc<SchemaDefinition>) -> Self {
        let values = vec![None; schema.fields.len()];
        Record { schema, values }
    }

    pub fn schema(&self) -> &Arc<SchemaDefinition> {
        &self.schema
    }

    pub fn category(&self) -> StatementCategory {
        self.schema.category
    }

    pub fn fiscal_year(&self) -> FiscalYear {
        self.schema.fiscal_year
    }

    /// Value of a field; `None` when absent or not part of the schema
    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.schema.index_of(name).and_then(|i| self.values[i])
    }

    /// Set an extraction field. Derived fields are owned by the residual
    /// calculator and rejected here.
    pub fn set(&mut self, name: &str, value: Option<FieldValue>) -> Result<(), RecordError> {
        let (index, field) = self.lookup(name)?;
        if field.derived {
            return Err(RecordError::DerivedField(name.to_string()));
        }
        let value = match value {
            Some(v) => Some(coerce(field, v)?),
            None => None,
        };
        self.values[index] = value;
        Ok(())
    }

    pub(crate) fn set_derived(&mut self, name: &str, value: Option<FieldValue>) {
        if let Some(index) = self.schema.index_of(name) {
            self.values[index] = value;
        }
    }

    /// Fields with their values, in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, Option<FieldValue>)> {
        self.schema.fields.iter().zip(self.values.iter().copied())
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Key-value form in schema order with explicit nulls for absent fields
    pub fn to_map(&self) -> Map<String, Value> {
        self.iter()
            .map(|(field, value)| {
                let json = value.map_or(Value::Null, FieldValue::to_json);
                (field.name.clone(), json)
            })
            .collect()
    }

    /// Build a record from a key-value map. Keys missing from the map and
    /// explicit nulls are absent values. Derived fields are accepted so that
    /// a serialized finalized record loads back unchanged.
    pub fn from_map(schema: Arc<SchemaDefinition>, map: &Map<String, Value>) -> Result<Self, RecordError> {
        let mut record = Record::new(schema);
        for (key, value) in map {
            let (index, parsed) = parse_entry(&record.schema, key, value)?;
            record.values[index] = parsed;
        }
        Ok(record)
    }

    pub fn to_input(&self) -> RecordInput {
        RecordInput {
            category: self.category(),
            fiscal_year: i64::from(self.fiscal_year().value()),
            values: self.to_map(),
        }
    }

    /// Build a record from its wire form, checking it belongs to `schema`
    pub fn from_input(schema: Arc<SchemaDefinition>, input: &RecordInput) -> Result<Self, RecordError> {
        check_scope(&schema, input)?;
        Record::from_map(schema, &input.values)
    }

    fn lookup(&self, name: &str) -> Result<(usize, &FieldDescriptor), RecordError> {
        self.schema
            .index_of(name)
            .map(|i| (i, &self.schema.fields[i]))
            .ok_or_else(|| RecordError::UnknownField {
                schema: self.schema.name.clone(),
                field: name.to_string(),
            })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_input().serialize(serializer)
    }
}

/// A record after the residual pass. Read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedRecord(Record);

impl FinalizedRecord {
    pub(crate) fn new(record: Record) -> Self {
        FinalizedRecord(record)
    }

    pub fn as_record(&self) -> &Record {
        &self.0
    }

    pub fn schema(&self) -> &Arc<SchemaDefinition> {
        self.0.schema()
    }

    pub fn get(&self, name: &str) -> Option<FieldValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, Option<FieldValue>)> {
        self.0.iter()
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.0.to_map()
    }

    pub fn to_input(&self) -> RecordInput {
        self.0.to_input()
    }
}

impl Serialize for FinalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Every problem with a record's wire form, rather than only the first.
/// Derived fields supplied by the extractor are reported as
/// [`RecordError::DerivedField`]; they are recomputed on finalize.
pub fn check_input(schema: &SchemaDefinition, input: &RecordInput) -> Vec<RecordError> {
    let mut issues = Vec::new();
    if let Err(e) = check_scope(schema, input) {
        issues.push(e);
    }
    for (key, value) in &input.values {
        match parse_entry(schema, key, value) {
            Ok((index, parsed)) => {
                if schema.fields[index].derived && parsed.is_some() {
                    issues.push(RecordError::DerivedField(key.clone()));
                }
            }
            Err(e) => issues.push(e),
        }
    }
    issues
}

fn check_scope(schema: &SchemaDefinition, input: &RecordInput) -> Result<(), RecordError> {
    if FiscalYear::new(input.fiscal_year).is_err() {
        return Err(RecordError::InvalidYear(input.fiscal_year));
    }
    if input.category != schema.category {
        return Err(RecordError::CategoryMismatch {
            expected: schema.category,
            found: input.category,
        });
    }
    if input.fiscal_year != i64::from(schema.fiscal_year.value()) {
        return Err(RecordError::YearMismatch {
            expected: schema.fiscal_year,
            found: input.fiscal_year,
        });
    }
    Ok(())
}

fn parse_entry(
    schema: &SchemaDefinition,
    key: &str,
    value: &Value,
) -> Result<(usize, Option<FieldValue>), RecordError> {
    let index = schema
        .index_of(key)
        .ok_or_else(|| RecordError::UnknownField {
            schema: schema.name.clone(),
            field: key.to_string(),
        })?;
    if value.is_null() {
        return Ok((index, None));
    }
    let field = &schema.fields[index];
    let parsed = FieldValue::from_json(value).ok_or_else(|| RecordError::NotNumeric {
        field: key.to_string(),
        value: value.to_string(),
    })?;
    Ok((index, Some(coerce(field, parsed)?)))
}

fn coerce(field: &FieldDescriptor, value: FieldValue) -> Result<FieldValue, RecordError> {
    value
        .coerce(field.kind)
        .ok_or_else(|| RecordError::KindMismatch {
            field: field.name.clone(),
            expected: field.kind,
            value: value.to_string(),
        })
}
