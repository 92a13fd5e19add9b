use chrono::NaiveDate;

use crate::normalize::{normalize, ColumnRole, FieldValue, RawCell};

/// Number of positional columns in a ledger extract.
pub const COLUMN_COUNT: usize = 38;

/// Role of a 1-based ledger column.
pub fn column_role(column: usize) -> ColumnRole {
    match column {
        1..=6 | 37 => ColumnRole::Text,
        7 | 8 | 36 => ColumnRole::Date,
        9 => ColumnRole::IntOrBlank,
        _ => ColumnRole::NumberOrZero,
    }
}

/// Columns the classification and derivation stages read, by meaning.
pub mod col {
    pub const ORIGIN_DATE: usize = 8;
    pub const TERM_DAYS: usize = 9;
    pub const DISBURSED_AMOUNT: usize = 14;
    pub const AMOUNT_AS_OF_DATE: usize = 34;
    pub const CLOSED_BALANCE: usize = 35;
    pub const STATUS_KEY: usize = 37;
    pub const OVERDUE: usize = 38;

    /// Signed columns summed into the in-period commission: 29 - 13 + 22 - 28.
    pub const COMMISSION_TERMS: [(usize, f64); 4] = [(29, 1.0), (13, -1.0), (22, 1.0), (28, -1.0)];
}

/// One normalized loan line. Always holds exactly [`COLUMN_COUNT`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanRecord {
    fields: Vec<FieldValue>,
}

impl LoanRecord {
    /// Normalize a raw row. Missing trailing cells are treated as blank and
    /// cells past the last column are ignored.
    pub fn from_raw(row: &[RawCell]) -> Self {
        let fields = (1..=COLUMN_COUNT)
            .map(|c| normalize(column_role(c), row.get(c - 1).unwrap_or(&RawCell::Empty)))
            .collect();
        Self { fields }
    }

    /// Field by 1-based column number.
    pub fn field(&self, column: usize) -> &FieldValue {
        &self.fields[column - 1]
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn number(&self, column: usize) -> f64 {
        self.field(column).number_or_zero()
    }

    pub fn origin_date(&self) -> Option<NaiveDate> {
        match self.field(col::ORIGIN_DATE) {
            FieldValue::Date(d) => *d,
            _ => None,
        }
    }

    pub fn term_days(&self) -> Option<i64> {
        match self.field(col::TERM_DAYS) {
            FieldValue::Int(i) => *i,
            _ => None,
        }
    }

    pub fn status_key(&self) -> &str {
        match self.field(col::STATUS_KEY) {
            FieldValue::Text(s) => s,
            _ => "",
        }
    }

    pub fn disbursed_amount(&self) -> f64 {
        self.number(col::DISBURSED_AMOUNT)
    }

    pub fn amount_as_of_date(&self) -> f64 {
        self.number(col::AMOUNT_AS_OF_DATE)
    }

    pub fn closed_balance(&self) -> f64 {
        self.number(col::CLOSED_BALANCE)
    }

    pub fn overdue(&self) -> f64 {
        self.number(col::OVERDUE)
    }
}
