use super::catalog::{render, Catalog, CatalogError};
use super::category::StatementCategory;
use super::field::{FieldDescriptor, ValueKind};
use super::record::Record;
use super::residual::ResidualRule;
use super::year::FiscalYear;
use schemars::schema::{
    InstanceType, Metadata, ObjectValidation, RootSchema, Schema, SchemaObject, SingleOrVec,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid fiscal year {0}: expected a positive calendar year")]
    InvalidYear(i64),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A year-scoped record definition handed to the extraction engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDefinition {
    /// Unique per (category, year), e.g. `IncomeStatement_2024`
    pub name: String,
    pub category: StatementCategory,
    pub fiscal_year: FiscalYear,
    pub preamble: String,
    /// Extraction fields in catalog order, then derived fields
    pub fields: Vec<FieldDescriptor>,
    pub residual_rules: Vec<ResidualRule>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl SchemaDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Fields the extraction engine is asked to fill
    pub fn extraction_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.derived)
    }

    /// Fields computed by the residual calculator
    pub fn derived_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.derived)
    }

    /// A record for this schema with every field absent
    pub fn empty_record(self: &Arc<Self>) -> Record {
        Record::new(Arc::clone(self))
    }

    /// Draft-07 JSON Schema of the object the extraction engine returns.
    /// Every extraction field is required but nullable; derived fields are
    /// not part of the extraction target.
    pub fn json_schema(&self) -> RootSchema {
        let mut object = ObjectValidation::default();
        for field in self.extraction_fields() {
            let property = SchemaObject {
                metadata: Some(Box::new(Metadata {
                    description: Some(field.instruction.clone()),
                    ..Default::default()
                })),
                instance_type: Some(SingleOrVec::Vec(vec![
                    instance_type(field.kind),
                    InstanceType::Null,
                ])),
                ..Default::default()
            };
            object
                .properties
                .insert(field.name.clone(), Schema::Object(property));
            object.required.insert(field.name.clone());
        }
        object.additional_properties = Some(Box::new(Schema::Bool(false)));

        RootSchema {
            meta_schema: Some("http://json-schema.org/draft-07/schema#".to_string()),
            schema: SchemaObject {
                metadata: Some(Box::new(Metadata {
                    title: Some(self.name.clone()),
                    description: Some(self.preamble.clone()),
                    ..Default::default()
                })),
                instance_type: Some(SingleOrVec::Single(Box::new(InstanceType::Object))),
                object: Some(Box::new(object)),
                ..Default::default()
            },
            definitions: Default::default(),
        }
    }

    /// Single prompt text asking for the whole record as one JSON object
    pub fn prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.preamble);
        prompt.push_str("\n\nIf a line item is missing, return null. Output exactly one JSON object with these keys:\n{\n");
        let fields: Vec<_> = self.extraction_fields().collect();
        for (i, field) in fields.iter().enumerate() {
            let sep = if i + 1 < fields.len() { "," } else { "" };
            prompt.push_str(&format!("  \"{}\": null{}\n", field.name, sep));
        }
        prompt.push_str("}\n\nField guidance:\n");
        for field in &fields {
            prompt.push_str(&format!(
                "  • {} ({}, {}): {}\n",
                field.name, field.kind, field.unit, field.instruction
            ));
        }
        prompt
    }

    /// SHA-256 of the canonical JSON form of the definition
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain strings and numbers cannot fail
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.update(&bytes);
        }
        hex::encode(hasher.finalize())
    }
}

fn instance_type(kind: ValueKind) -> InstanceType {
    match kind {
        ValueKind::Integer => InstanceType::Integer,
        ValueKind::Float => InstanceType::Number,
    }
}

/// Builds year-scoped schema definitions from a catalog. Stateless: every call
/// renders a fresh definition, so one factory can serve many threads.
#[derive(Debug, Clone, Copy)]
pub struct SchemaFactory<'a> {
    catalog: &'a Catalog,
}

impl SchemaFactory<'static> {
    pub fn builtin() -> Self {
        SchemaFactory {
            catalog: Catalog::builtin(),
        }
    }
}

impl<'a> SchemaFactory<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        SchemaFactory { catalog }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn generate(
        &self,
        category: StatementCategory,
        year: i64,
    ) -> Result<SchemaDefinition, SchemaError> {
        let fiscal_year = FiscalYear::new(year)?;
        self.generate_for(category, fiscal_year)
    }

    pub fn generate_for(
        &self,
        category: StatementCategory,
        fiscal_year: FiscalYear,
    ) -> Result<SchemaDefinition, SchemaError> {
        let template = self.catalog.template(category)?;

        let mut fields: Vec<FieldDescriptor> = template
            .fields
            .iter()
            .map(|f| FieldDescriptor {
                name: f.name.clone(),
                kind: f.kind,
                nullable: true,
                unit: f.unit.unwrap_or(template.default_unit),
                instruction: template.render_instruction(&f.instruction, &fiscal_year),
                derived: false,
            })
            .collect();

        let mut residual_rules = Vec::with_capacity(template.residuals.len());
        for rule in &template.residuals {
            fields.push(FieldDescriptor {
                name: rule.output.clone(),
                kind: template.residual_kind(rule),
                nullable: true,
                unit: template.default_unit,
                instruction: render(&rule.instruction, &fiscal_year),
                derived: true,
            });
            residual_rules.push(ResidualRule {
                output: rule.output.clone(),
                total: rule.total.clone(),
                components: rule.components.clone(),
            });
        }

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        let name = format!("{}_{}", category.type_name(), fiscal_year);
        log::debug!(
            "Generated {} with {} fields ({} derived)",
            name,
            fields.len(),
            residual_rules.len()
        );

        Ok(SchemaDefinition {
            name,
            category,
            fiscal_year,
            preamble: render(&template.preamble, &fiscal_year),
            fields,
            residual_rules,
            index,
        })
    }
}

/// Generate a schema definition from the built-in catalog
pub fn generate_schema(
    category: StatementCategory,
    year: i64,
) -> Result<SchemaDefinition, SchemaError> {
    SchemaFactory::builtin().generate(category, year)
}
