use chrono::{Duration, NaiveDate};

use crate::models::{col, LoanRecord};

/// Date and amount fields computed from a record and the reporting date.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub maturity_date: Option<NaiveDate>,
    pub days_to_maturity: Option<i64>,
    pub commission_in_period: f64,
    pub amount_as_of_date: f64,
}

/// Origin date plus term in days. Absent unless both inputs are present and
/// the sum is a representable date.
pub fn maturity_date(record: &LoanRecord) -> Option<NaiveDate> {
    let origin = record.origin_date()?;
    let days = record.term_days()?;
    Duration::try_days(days).and_then(|d| origin.checked_add_signed(d))
}

pub fn days_to_maturity(maturity: Option<NaiveDate>, reporting_date: NaiveDate) -> Option<i64> {
    maturity.map(|m| (m - reporting_date).num_days())
}

pub fn commission_in_period(record: &LoanRecord) -> f64 {
    col::COMMISSION_TERMS
        .iter()
        .fold(0.0, |acc, (column, sign)| acc + sign * record.number(*column))
}

pub fn derive(record: &LoanRecord, reporting_date: NaiveDate) -> Derived {
    let maturity = maturity_date(record);
    Derived {
        maturity_date: maturity,
        days_to_maturity: days_to_maturity(maturity, reporting_date),
        commission_in_period: commission_in_period(record),
        amount_as_of_date: record.amount_as_of_date(),
    }
}
