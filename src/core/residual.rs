use super::field::FieldValue;
use super::record::{FinalizedRecord, Record};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// `output = total - sum(present components)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualRule {
    pub output: String,
    pub total: String,
    pub components: Vec<String>,
}

/// What to do when the total is present but every component is absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResidualPolicy {
    /// Leave the residual absent: nothing was itemized, so nothing is "other"
    #[default]
    RequireComponent,
    /// Treat the missing components as zero, so the residual equals the total
    TotalWhenComponentsMissing,
}

/// Compute one residual. Absent components contribute nothing; an absent
/// total always yields an absent residual.
pub fn compute_residual(
    total: Option<FieldValue>,
    components: &[Option<FieldValue>],
    policy: ResidualPolicy,
) -> Option<FieldValue> {
    let total = total?;
    let present: Vec<FieldValue> = components.iter().flatten().copied().collect();
    if present.is_empty() && policy == ResidualPolicy::RequireComponent {
        return None;
    }

    match total {
        FieldValue::Integer(t) if present.iter().all(|c| matches!(c, FieldValue::Integer(_))) => {
            let sum = present.iter().try_fold(0i64, |acc, c| match c {
                FieldValue::Integer(v) => acc.checked_add(*v),
                FieldValue::Float(_) => None,
            });
            match sum.and_then(|s| t.checked_sub(s)) {
                Some(v) => Some(FieldValue::Integer(v)),
                None => {
                    log::warn!("Residual overflowed i64 (total {}), leaving it absent", t);
                    None
                }
            }
        }
        _ => {
            let sum: f64 = present.iter().map(FieldValue::as_f64).sum();
            let value = total.as_f64() - sum;
            if !value.is_finite() {
                log::warn!("Residual is not finite (total {}), leaving it absent", total);
                return None;
            }
            Some(FieldValue::Float(value))
        }
    }
}

/// Applies a schema's residual rules to its records
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualCalculator {
    policy: ResidualPolicy,
}

impl ResidualCalculator {
    pub fn new(policy: ResidualPolicy) -> Self {
        ResidualCalculator { policy }
    }

    pub fn policy(&self) -> ResidualPolicy {
        self.policy
    }

    /// Recompute every residual of the record in place. Only derived fields
    /// are written, and rule inputs are never derived, so repeated application
    /// gives the same result.
    pub fn apply(&self, record: &mut Record) {
        let schema = record.schema().clone();
        for rule in &schema.residual_rules {
            let total = record.get(&rule.total);
            let components: Vec<Option<FieldValue>> =
                rule.components.iter().map(|c| record.get(c)).collect();
            let value = compute_residual(total, &components, self.policy);
            log::debug!(
                "{}: {} = {}",
                schema.name,
                rule.output,
                value.map_or("null".to_string(), |v| v.to_string())
            );
            record.set_derived(&rule.output, value);
        }
    }

    /// Apply the rules once and seal the record
    pub fn finalize(&self, mut record: Record) -> FinalizedRecord {
        self.apply(&mut record);
        FinalizedRecord::new(record)
    }

    /// Finalize records independently in parallel, keeping input order
    pub fn finalize_batch(&self, records: Vec<Record>) -> Vec<FinalizedRecord> {
        records
            .into_par_iter()
            .map(|record| self.finalize(record))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::category::StatementCategory;
    use crate::core::schema::generate_schema;
    use std::sync::Arc;

    fn int(v: i64) -> Option<FieldValue> {
        Some(FieldValue::Integer(v))
    }

    fn income_record(values: &[(&str, i64)]) -> Record {
        let schema = Arc::new(generate_schema(StatementCategory::IncomeStatement, 2024).unwrap());
        let mut record = schema.empty_record();
        for (name, value) in values {
            record.set(name, int(*value)).unwrap();
        }
        record
    }

    #[test]
    fn residual_is_total_minus_present_components() {
        let r = compute_residual(int(1000), &[int(600), None, int(150)], ResidualPolicy::default());
        assert_eq!(r, int(250));
    }

    #[test]
    fn absent_total_gives_absent_residual() {
        for policy in [
            ResidualPolicy::RequireComponent,
            ResidualPolicy::TotalWhenComponentsMissing,
        ] {
            assert_eq!(compute_residual(None, &[int(600)], policy), None);
        }
    }

    #[test]
    fn all_components_absent_depends_on_policy() {
        assert_eq!(
            compute_residual(int(50), &[None], ResidualPolicy::RequireComponent),
            None
        );
        assert_eq!(
            compute_residual(int(50), &[None], ResidualPolicy::TotalWhenComponentsMissing),
            int(50)
        );
    }

    #[test]
    fn zero_total_is_a_real_value() {
        assert_eq!(
            compute_residual(int(0), &[int(10)], ResidualPolicy::default()),
            int(-10)
        );
    }

    #[test]
    fn overflow_leaves_residual_absent() {
        assert_eq!(
            compute_residual(int(i64::MIN), &[int(1)], ResidualPolicy::default()),
            None
        );
    }

    #[test]
    fn non_finite_float_leaves_residual_absent() {
        let r = compute_residual(
            Some(FieldValue::Float(1e308)),
            &[Some(FieldValue::Float(-1e308))],
            ResidualPolicy::default(),
        );
        assert_eq!(r, None);
    }

    #[test]
    fn float_residuals() {
        let r = compute_residual(
            Some(FieldValue::Float(10.5)),
            &[Some(FieldValue::Float(0.5)), None],
            ResidualPolicy::default(),
        );
        assert_eq!(r, Some(FieldValue::Float(10.0)));
    }

    #[test]
    fn other_operating_revenue_from_tuition() {
        let record = income_record(&[
            ("total_operating_revenue", 1000),
            ("gross_tuition_revenue", 600),
        ]);
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.get("other_operating_revenue"), int(400));
        assert_eq!(finalized.get("total_operating_revenue"), int(1000));
        assert_eq!(finalized.get("gross_tuition_revenue"), int(600));
    }

    #[test]
    fn missing_total_leaves_other_absent() {
        let record = income_record(&[
            ("gross_tuition_revenue", 600),
            ("auxiliary_enterprise_revenue", 100),
        ]);
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.get("other_operating_revenue"), None);
    }

    #[test]
    fn every_rule_computed_independently() {
        let record = income_record(&[
            ("investment_income_total", 300),
            ("investment_income_operations", 120),
            ("total_operating_expense", 900),
            ("instructional_expense", 400),
            ("research_expense", 200),
            ("non_operating_revenue", 50),
            ("non_operating_expense", 80),
            ("non_op_realized_losses", 30),
            ("change_net_assets_without_donor_restrictions", 70),
            ("net_assets_released_for_capital", 20),
            ("total_change_in_net_assets", 110),
            ("change_net_assets_with_donor_restrictions", 25),
        ]);
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.get("other_investment_income"), int(180));
        assert_eq!(finalized.get("other_operating_expense"), int(300));
        assert_eq!(finalized.get("other_non_op_revenue"), None);
        assert_eq!(finalized.get("other_non_op_expense"), int(50));
        assert_eq!(finalized.get("other_adj_net_assets_without_restrictions"), int(50));
        assert_eq!(finalized.get("other_adj_to_net_assets"), int(15));
        assert_eq!(finalized.get("other_operating_revenue"), None);
    }

    #[test]
    fn apply_is_idempotent() {
        let mut record = income_record(&[
            ("total_operating_revenue", 1000),
            ("gross_tuition_revenue", 600),
            ("non_operating_revenue", 50),
        ]);
        let calculator = ResidualCalculator::default();
        calculator.apply(&mut record);
        let once = record.clone();
        calculator.apply(&mut record);
        assert_eq!(record, once);
    }

    #[test]
    fn stale_residual_is_cleared() {
        let schema = Arc::new(generate_schema(StatementCategory::IncomeStatement, 2024).unwrap());
        let mut map = serde_json::Map::new();
        map.insert("other_non_op_revenue".into(), serde_json::json!(999));
        map.insert("non_op_realized_gains".into(), serde_json::json!(10));
        let record = Record::from_map(schema, &map).unwrap();
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.get("other_non_op_revenue"), None);
    }

    #[test]
    fn batch_matches_single_and_keeps_order() {
        let records: Vec<Record> = (0..20)
            .map(|i| {
                income_record(&[
                    ("total_operating_revenue", 1000 + i),
                    ("gross_tuition_revenue", 600),
                ])
            })
            .collect();
        let calculator = ResidualCalculator::default();
        let single: Vec<_> = records.iter().cloned().map(|r| calculator.finalize(r)).collect();
        let batch = calculator.finalize_batch(records);
        assert_eq!(batch, single);
        assert_eq!(batch[7].get("other_operating_revenue"), int(407));
    }

    #[test]
    fn schemas_without_rules_are_unchanged() {
        let schema = Arc::new(generate_schema(StatementCategory::CashFlows, 2024).unwrap());
        let mut record = schema.empty_record();
        record
            .set("change_in_cash_and_equivalents", Some(FieldValue::Float(12.5)))
            .unwrap();
        let before = record.clone();
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.as_record(), &before);
    }

    #[test]
    fn overflowing_float_rule_round_trips() {
        use crate::core::catalog::Catalog;
        use crate::core::schema::SchemaFactory;

        let dir = std::env::temp_dir().join(format!("edufin-float-rule-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let json = r#"{"category": "cash_flows", "preamble": "Cash flows {fy}.",
            "fields": [
                {"name": "net_change", "kind": "float", "instruction": "Net change {fy}"},
                {"name": "operating", "kind": "float", "instruction": "Operating {fy}"}
            ],
            "residuals": [
                {"output": "other_change", "total": "net_change", "components": ["operating"],
                 "instruction": "Other change {fy}"}
            ]}"#;
        std::fs::write(dir.join("cash_flows.json"), json).unwrap();
        let catalog = Catalog::with_overrides(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let schema = Arc::new(
            SchemaFactory::new(&catalog)
                .generate(StatementCategory::CashFlows, 2024)
                .unwrap(),
        );
        let mut record = schema.empty_record();
        record.set("net_change", Some(FieldValue::Float(1e308))).unwrap();
        record.set("operating", Some(FieldValue::Float(-1e308))).unwrap();
        let finalized = ResidualCalculator::default().finalize(record);
        assert_eq!(finalized.get("other_change"), None);

        let back = Record::from_map(Arc::clone(&schema), &finalized.to_map()).unwrap();
        assert_eq!(&back, finalized.as_record());
    }
}
