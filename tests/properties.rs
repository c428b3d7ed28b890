//! Library-level checks across every category and a spread of fiscal years

use edufin::{
    generate_schema, FieldValue, Record, ResidualCalculator, ResidualPolicy, StatementCategory,
};
use std::sync::Arc;

const YEARS: [i64; 5] = [1998, 2009, 2019, 2024, 2031];

fn income(year: i64) -> Arc<edufin::SchemaDefinition> {
    Arc::new(generate_schema(StatementCategory::IncomeStatement, year).unwrap())
}

#[test]
fn schemas_for_different_years_never_mention_each_other() {
    for category in StatementCategory::ALL {
        for &y1 in &YEARS {
            for &y2 in YEARS.iter().filter(|&&y| y != y1) {
                let a = generate_schema(category, y1).unwrap();
                let b = generate_schema(category, y2).unwrap();
                assert_ne!(a.name, b.name);
                for field in &a.fields {
                    assert!(field.instruction.contains(&y1.to_string()), "{}", field.name);
                    assert!(!field.instruction.contains(&y2.to_string()), "{}", field.name);
                }
            }
        }
    }
}

#[test]
fn other_operating_revenue_ignores_unrelated_fields() {
    let schema = income(2024);
    let mut record = schema.empty_record();
    record
        .set("total_operating_revenue", Some(FieldValue::Integer(1000)))
        .unwrap();
    record
        .set("gross_tuition_revenue", Some(FieldValue::Integer(600)))
        .unwrap();
    // Not a component of operating revenue
    record
        .set("financial_aid", Some(FieldValue::Integer(-250)))
        .unwrap();
    record
        .set("instructional_expense", Some(FieldValue::Integer(99)))
        .unwrap();

    let finalized = ResidualCalculator::default().finalize(record);
    assert_eq!(
        finalized.get("other_operating_revenue"),
        Some(FieldValue::Integer(400))
    );
}

#[test]
fn absent_total_wins_over_any_components() {
    let schema = income(2024);
    let rule = schema
        .residual_rules
        .iter()
        .find(|r| r.output == "other_operating_revenue")
        .unwrap();

    for present in 0..=rule.components.len() {
        let mut record = schema.empty_record();
        for (i, component) in rule.components.iter().take(present).enumerate() {
            record
                .set(component, Some(FieldValue::Integer(10 * (i as i64 + 1))))
                .unwrap();
        }
        for policy in [
            ResidualPolicy::RequireComponent,
            ResidualPolicy::TotalWhenComponentsMissing,
        ] {
            let finalized = ResidualCalculator::new(policy).finalize(record.clone());
            assert_eq!(finalized.get("other_operating_revenue"), None);
        }
    }
}

#[test]
fn total_without_components() {
    let schema = income(2024);
    let mut record = schema.empty_record();
    record
        .set("non_operating_revenue", Some(FieldValue::Integer(50)))
        .unwrap();

    let strict = ResidualCalculator::default().finalize(record.clone());
    assert_eq!(strict.get("other_non_op_revenue"), None);

    let lenient =
        ResidualCalculator::new(ResidualPolicy::TotalWhenComponentsMissing).finalize(record);
    assert_eq!(
        lenient.get("other_non_op_revenue"),
        Some(FieldValue::Integer(50))
    );
}

#[test]
fn rule_inputs_and_outputs_are_disjoint() {
    let schema = income(2024);
    for rule in &schema.residual_rules {
        assert!(schema.field(&rule.output).unwrap().derived);
        assert!(!schema.field(&rule.total).unwrap().derived);
        for component in &rule.components {
            assert!(!schema.field(component).unwrap().derived);
        }
    }
}

#[test]
fn finalized_map_round_trips_through_json() {
    let schema = income(2024);
    let mut record = schema.empty_record();
    for (i, field) in schema.extraction_fields().enumerate().step_by(3) {
        record
            .set(&field.name, Some(FieldValue::Integer(i as i64 * 1_000_003 - 7)))
            .unwrap();
    }
    let finalized = ResidualCalculator::default().finalize(record);

    let json = serde_json::to_string(&finalized.to_map()).unwrap();
    let map = serde_json::from_str(&json).unwrap();
    let back = Record::from_map(Arc::clone(&schema), &map).unwrap();
    assert_eq!(&back, finalized.as_record());
}
