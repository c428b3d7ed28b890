use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement or disclosure a record is extracted from
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementCategory {
    /// Headcounts, FTE, admissions funnel, staffing and pricing
    Enrollment,
    /// Statement of Financial Position (balance sheet)
    #[value(alias = "balance-sheet")]
    FinancialPosition,
    /// Statement of Cash Flows
    CashFlows,
    /// Statement of Activities (income statement)
    IncomeStatement,
    /// Endowment rollforward and fair value hierarchy notes
    #[value(alias = "endowment")]
    EndowmentInvestments,
}

impl StatementCategory {
    pub const ALL: [StatementCategory; 5] = [
        StatementCategory::Enrollment,
        StatementCategory::FinancialPosition,
        StatementCategory::CashFlows,
        StatementCategory::IncomeStatement,
        StatementCategory::EndowmentInvestments,
    ];

    /// Identifier used in catalog files and record input
    pub fn key(self) -> &'static str {
        match self {
            StatementCategory::Enrollment => "enrollment",
            StatementCategory::FinancialPosition => "financial_position",
            StatementCategory::CashFlows => "cash_flows",
            StatementCategory::IncomeStatement => "income_statement",
            StatementCategory::EndowmentInvestments => "endowment_investments",
        }
    }

    /// Base of the generated record type name, e.g. `IncomeStatement_2024`
    pub fn type_name(self) -> &'static str {
        match self {
            StatementCategory::Enrollment => "Enrollment",
            StatementCategory::FinancialPosition => "StatementOfFinancialPosition",
            StatementCategory::CashFlows => "StatementOfCashFlows",
            StatementCategory::IncomeStatement => "IncomeStatement",
            StatementCategory::EndowmentInvestments => "EndowmentAndInvestmentLevels",
        }
    }

    pub fn from_key(key: &str) -> Option<StatementCategory> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl fmt::Display for StatementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
