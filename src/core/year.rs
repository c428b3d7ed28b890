use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::SchemaError;

/// Fiscal year ending 30 June, identified by the calendar year it ends in
/// (2024 = FY2024, year end June 30, 2024).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i32")]
pub struct FiscalYear(i32);

impl FiscalYear {
    /// Validate a caller supplied year. Zero and negative years are rejected.
    pub fn new(year: i64) -> Result<Self, SchemaError> {
        match i32::try_from(year) {
            Ok(value) if value > 0 => Ok(FiscalYear(value)),
            _ => Err(SchemaError::InvalidYear(year)),
        }
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Last day of the fiscal year (30 June)
    pub fn end_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.0, 6, 30)
    }

    /// Display as "FY2024"
    pub fn fy_label(&self) -> String {
        format!("FY{}", self.0)
    }

    /// Display as "2024–25". The following year is abbreviated to two digits.
    pub fn academic_year(&self) -> String {
        format!("{}–{:02}", self.0, (i64::from(self.0) + 1) % 100)
    }

    /// Display as "Fall 2024"
    pub fn fall_term(&self) -> String {
        format!("Fall {}", self.0)
    }

    /// Display as "June 30, 2024". Years past chrono's range are formatted
    /// directly.
    pub fn year_end(&self) -> String {
        match self.end_date() {
            Some(date) => date.format("%B %-d, %Y").to_string(),
            None => format!("June 30, {}", self.0),
        }
    }

    /// Value substituted for a `{placeholder}` in instruction templates
    pub fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "year" => Some(self.0.to_string()),
            "fy" => Some(self.fy_label()),
            "academic_year" => Some(self.academic_year()),
            "fall_term" => Some(self.fall_term()),
            "year_end" => Some(self.year_end()),
            _ => None,
        }
    }
}

/// Placeholder names understood by [`FiscalYear::placeholder`]
pub const PLACEHOLDERS: &[&str] = &["year", "fy", "academic_year", "fall_term", "year_end"];

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for FiscalYear {
    type Error = SchemaError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        FiscalYear::new(value)
    }
}

impl From<FiscalYear> for i32 {
    fn from(year: FiscalYear) -> Self {
        year.0
    }
}
