//! Field catalogs: the per-category field sets, instruction templates and
//! residual rules. The built-in catalogs are JSON files embedded at compile
//! time; a directory of `<category>.json` files can replace any of them at
//! runtime.

use super::category::StatementCategory;
use super::field::{Unit, ValueKind};
use super::year::{FiscalYear, PLACEHOLDERS};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("enrollment.json", include_str!("../../catalogs/enrollment.json")),
    (
        "financial_position.json",
        include_str!("../../catalogs/financial_position.json"),
    ),
    ("cash_flows.json", include_str!("../../catalogs/cash_flows.json")),
    (
        "income_statement.json",
        include_str!("../../catalogs/income_statement.json"),
    ),
    (
        "endowment_investments.json",
        include_str!("../../catalogs/endowment_investments.json"),
    ),
];

static BUILTIN: Lazy<Catalog> = Lazy::new(|| {
    let mut templates = BTreeMap::new();
    for (name, json) in BUILTIN_SOURCES {
        let template = CategoryTemplate::from_json(name, json)
            .unwrap_or_else(|e| panic!("built-in catalog {name} is invalid: {e}"));
        templates.insert(template.category, template);
    }
    Catalog { templates }
});

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("catalog {file} declares category {found}, expected {expected}")]
    CategoryMismatch {
        file: String,
        expected: StatementCategory,
        found: StatementCategory,
    },
    #[error("no catalog for category {0}")]
    MissingCategory(StatementCategory),
    #[error("catalog {0} declares no fields")]
    NoFields(StatementCategory),
    #[error("duplicate field {field} in catalog {category}")]
    DuplicateField {
        category: StatementCategory,
        field: String,
    },
    #[error("unknown placeholder {{{placeholder}}} in {context}")]
    UnknownPlaceholder {
        context: String,
        placeholder: String,
    },
    #[error("unterminated placeholder in {context}")]
    UnterminatedPlaceholder { context: String },
    #[error("instruction for {context} does not reference the fiscal year")]
    UnscopedInstruction { context: String },
    #[error("hard-coded year {year} in {context}")]
    HardcodedYear { context: String, year: String },
    #[error("residual {output} has no components")]
    EmptyRule { output: String },
    #[error("residual {output} references unknown field {field}")]
    UnknownRuleField { output: String, field: String },
    #[error("residual {output} mixes value kinds at field {field}")]
    RuleKindMismatch { output: String, field: String },
}

/// Instruction template for one extraction field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTemplate {
    pub name: String,
    pub kind: ValueKind,
    /// Overrides the catalog's `default_unit`
    #[serde(default)]
    pub unit: Option<Unit>,
    pub instruction: String,
}

/// A derived "other" field: `output = total - sum(present components)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResidualTemplate {
    pub output: String,
    pub total: String,
    pub components: Vec<String>,
    pub instruction: String,
}

/// Everything needed to generate the schema of one category for any year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryTemplate {
    pub category: StatementCategory,
    pub preamble: String,
    /// Prepended to every field instruction
    #[serde(default)]
    pub field_prefix: Option<String>,
    /// Appended to every field instruction
    #[serde(default)]
    pub field_suffix: Option<String>,
    #[serde(default)]
    pub default_unit: Unit,
    pub fields: Vec<FieldTemplate>,
    #[serde(default)]
    pub residuals: Vec<ResidualTemplate>,
}

impl CategoryTemplate {
    /// Parse and validate a catalog document
    pub fn from_json(name: &str, json: &str) -> Result<Self, CatalogError> {
        let template: CategoryTemplate =
            serde_json::from_str(json).map_err(|source| CatalogError::Parse {
                name: name.to_string(),
                source,
            })?;
        template.validate()?;
        Ok(template)
    }

    /// Check the invariants the schema factory and residual calculator rely on:
    /// unique names, every instruction scoped to the fiscal year with no literal
    /// year, and residual rules whose inputs are extraction fields of one kind.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let category = self.category;
        if self.fields.is_empty() {
            return Err(CatalogError::NoFields(category));
        }

        check_template(&self.preamble, &format!("{category} preamble"))?;
        if let Some(prefix) = &self.field_prefix {
            check_template(prefix, &format!("{category} field prefix"))?;
        }
        if let Some(suffix) = &self.field_suffix {
            check_template(suffix, &format!("{category} field suffix"))?;
        }

        let mut kinds: HashMap<&str, ValueKind> = HashMap::new();
        for field in &self.fields {
            if kinds.insert(field.name.as_str(), field.kind).is_some() {
                return Err(CatalogError::DuplicateField {
                    category,
                    field: field.name.clone(),
                });
            }
            check_scoped(&field.instruction, &format!("{category}.{}", field.name))?;
        }

        let mut outputs = HashSet::new();
        for rule in &self.residuals {
            if kinds.contains_key(rule.output.as_str()) || !outputs.insert(rule.output.as_str()) {
                return Err(CatalogError::DuplicateField {
                    category,
                    field: rule.output.clone(),
                });
            }
            check_scoped(&rule.instruction, &format!("{category}.{}", rule.output))?;
            if rule.components.is_empty() {
                return Err(CatalogError::EmptyRule {
                    output: rule.output.clone(),
                });
            }

            let total_kind = *kinds.get(rule.total.as_str()).ok_or_else(|| {
                CatalogError::UnknownRuleField {
                    output: rule.output.clone(),
                    field: rule.total.clone(),
                }
            })?;
            for component in &rule.components {
                let kind = kinds.get(component.as_str()).ok_or_else(|| {
                    CatalogError::UnknownRuleField {
                        output: rule.output.clone(),
                        field: component.clone(),
                    }
                })?;
                if *kind != total_kind {
                    return Err(CatalogError::RuleKindMismatch {
                        output: rule.output.clone(),
                        field: component.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Kind of a residual output: the kind of its total
    pub fn residual_kind(&self, rule: &ResidualTemplate) -> ValueKind {
        self.fields
            .iter()
            .find(|f| f.name == rule.total)
            .map(|f| f.kind)
            .unwrap_or_default()
    }

    /// Full instruction for a field: prefix, own text, suffix
    pub fn render_instruction(&self, instruction: &str, year: &FiscalYear) -> String {
        [
            self.field_prefix.as_deref(),
            Some(instruction),
            self.field_suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(|part| render(part, year))
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// The complete set of category templates
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    templates: BTreeMap<StatementCategory, CategoryTemplate>,
}

impl Catalog {
    /// Catalogs compiled into the binary
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// Built-in catalogs with any `<category>.json` found in `dir` replacing
    /// the built-in template for that category.
    pub fn with_overrides(dir: &Path) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog::builtin().clone();
        for category in StatementCategory::ALL {
            let file = format!("{}.json", category.key());
            let path = dir.join(&file);
            if !path.exists() {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            let template = CategoryTemplate::from_json(&file, &json)?;
            if template.category != category {
                return Err(CatalogError::CategoryMismatch {
                    file,
                    expected: category,
                    found: template.category,
                });
            }
            log::info!("Loaded {} catalog from {}", category, path.display());
            catalog.templates.insert(category, template);
        }
        Ok(catalog)
    }

    pub fn template(&self, category: StatementCategory) -> Result<&CategoryTemplate, CatalogError> {
        self.templates
            .get(&category)
            .ok_or(CatalogError::MissingCategory(category))
    }

    pub fn categories(&self) -> impl Iterator<Item = StatementCategory> + '_ {
        self.templates.keys().copied()
    }
}

/// Substitute every `{placeholder}` with the fiscal year label. Unknown
/// placeholders are left untouched; validation rejects them up front.
pub fn render(template: &str, year: &FiscalYear) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match year.placeholder(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Placeholder names used by a template
fn placeholders<'a>(template: &'a str, context: &str) -> Result<Vec<&'a str>, CatalogError> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| CatalogError::UnterminatedPlaceholder {
                context: context.to_string(),
            })?;
        let name = &after[..end];
        if !PLACEHOLDERS.contains(&name) {
            return Err(CatalogError::UnknownPlaceholder {
                context: context.to_string(),
                placeholder: name.to_string(),
            });
        }
        names.push(name);
        rest = &after[end + 1..];
    }
    Ok(names)
}

fn check_template(template: &str, context: &str) -> Result<(), CatalogError> {
    placeholders(template, context)?;
    if let Some(year) = literal_year(template) {
        return Err(CatalogError::HardcodedYear {
            context: context.to_string(),
            year,
        });
    }
    Ok(())
}

fn check_scoped(template: &str, context: &str) -> Result<(), CatalogError> {
    check_template(template, context)?;
    if placeholders(template, context)?.is_empty() {
        return Err(CatalogError::UnscopedInstruction {
            context: context.to_string(),
        });
    }
    Ok(())
}

/// First standalone four-digit run that looks like a year (19xx or 20xx)
fn literal_year(text: &str) -> Option<String> {
    let mut digits = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        if digits.len() == 4 && (digits.starts_with("19") || digits.starts_with("20")) {
            return Some(digits);
        }
        digits.clear();
    }
    None
}
