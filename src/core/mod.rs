pub mod catalog;
pub mod category;
pub mod field;
pub mod record;
pub mod residual;
pub mod schema;
pub mod year;

// Flat public surface for domain types and functions.
pub use catalog::{Catalog, CatalogError, CategoryTemplate};
pub use category::StatementCategory;
pub use field::{FieldDescriptor, FieldValue, Unit, ValueKind};
pub use record::{check_input, FinalizedRecord, Record, RecordError, RecordInput};
pub use residual::{compute_residual, ResidualCalculator, ResidualPolicy, ResidualRule};
pub use schema::{generate_schema, SchemaDefinition, SchemaError, SchemaFactory};
pub use year::FiscalYear;
