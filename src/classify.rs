use std::fmt;

use crate::derivation::Derived;
use crate::models::{col, LoanRecord};
use crate::normalize::is_blank_text;
use crate::rules::{RangeRuleList, RuleBook, DEFAULT_CODE};

/// Primary classification of a loan line.
///
/// The built-in categories render with the labels the rule configuration
/// uses as S070 keys, so they can be mapped like any rule-provided value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Active,
    Overdue,
    Closed,
    /// The status key was present but absent from the status map.
    NotFound,
    /// Value taken verbatim from the status map.
    Mapped(String),
}

impl StatusCategory {
    pub fn label(&self) -> &str {
        match self {
            Self::Active => "Активний",
            Self::Overdue => "Прострочений",
            Self::Closed => "Закритий",
            Self::NotFound => "Ненашли",
            Self::Mapped(v) => v,
        }
    }

    fn from_overdue(overdue: f64) -> Self {
        if overdue == 0.0 {
            Self::Active
        } else {
            Self::Overdue
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which range block a classification came from. The blocks differ only in
/// the code they report when a rule has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBlock {
    S186,
    S190,
    S242,
}

impl RangeBlock {
    fn empty_code(self) -> &'static str {
        match self {
            Self::S186 => "",
            Self::S190 | Self::S242 => DEFAULT_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeClass {
    pub text: String,
    pub code: String,
}

impl RangeClass {
    /// `"{code}-{text}"`.
    pub fn composite(&self) -> String {
        format!("{}-{}", self.code.trim(), self.text.trim())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: StatusCategory,
    pub s070_code: String,
    pub s070_composite: String,
    pub s186: RangeClass,
    pub s190: RangeClass,
    pub s242: RangeClass,
}

/// Evaluates the shared rule tables against records.
pub struct Classifier<'a> {
    rules: &'a RuleBook,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a RuleBook) -> Self {
        Self { rules }
    }

    pub fn status(&self, record: &LoanRecord) -> StatusCategory {
        let key = record.field(col::STATUS_KEY);
        if key.is_blank() {
            if record.closed_balance() == 0.0 {
                return StatusCategory::Closed;
            }
            return StatusCategory::from_overdue(record.overdue());
        }
        match self.rules.status.lookup(record.status_key()) {
            None => StatusCategory::NotFound,
            Some(rule) if rule.needs_overdue_check => StatusCategory::from_overdue(record.overdue()),
            Some(rule) => StatusCategory::Mapped(rule.value.clone()),
        }
    }

    /// S070 code and `"{code}-{label}"` for a status.
    pub fn s070(&self, status: &StatusCategory) -> (String, String) {
        let raw = status.label();
        let key = if is_blank_text(raw) { "" } else { raw };
        let code = self.rules.s070.code(key);
        let label = self.rules.s070.label(key);
        (code.to_string(), format!("{}-{}", code.trim(), label.trim()))
    }

    pub fn range(&self, block: RangeBlock, value: Option<f64>) -> RangeClass {
        let list: &RangeRuleList = match block {
            RangeBlock::S186 => &self.rules.s186,
            RangeBlock::S190 => &self.rules.s190,
            RangeBlock::S242 => &self.rules.s242,
        };
        let (text, code) = list.match_value(value);
        let (text, code) = (text.trim(), code.trim());
        RangeClass {
            text: if text.is_empty() { DEFAULT_CODE } else { text }.to_string(),
            code: if code.is_empty() { block.empty_code() } else { code }.to_string(),
        }
    }

    /// Full classification. Needs the derived days-to-maturity for S242.
    pub fn classify(&self, record: &LoanRecord, derived: &Derived) -> Classification {
        let status = self.status(record);
        let (s070_code, s070_composite) = self.s070(&status);
        let term = record.field(col::TERM_DAYS).as_number();
        Classification {
            s186: self.range(RangeBlock::S186, term),
            s190: self.range(RangeBlock::S190, Some(record.overdue())),
            s242: self.range(RangeBlock::S242, derived.days_to_maturity.map(|d| d as f64)),
            status,
            s070_code,
            s070_composite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive;
    use crate::normalize::RawCell;
    use chrono::NaiveDate;

    const RULES: &str = r#"{
        "статус2БЛОК": {
            "ACT": "Активний",
            "CHK": {"value": "Реструктуризований", "проверкаколонка38": "да"},
            "RST": {"value": "Реструктуризований"}
        },
        "S070БЛОК": {
            "Активний": {"код": "1", "кодстрокдоп": "Діючий"},
            "Прострочений": "2",
            "Закритий": "3",
            "Реструктуризований": {"код": "4"}
        },
        "S186БЛОК": [
            {"start": 0, "end": 365, "value": "Короткостроковий", "code": "1"},
            {"start": 366, "end": 100000, "value": "Довгостроковий", "code": ""}
        ],
        "S190БЛОК": [
            {"start": 0, "end": 0, "value": "Без прострочення", "code": "A"},
            {"start": 1, "end": 30, "value": "", "code": ""}
        ],
        "S242БЛОК": [
            {"start": -100000, "end": 0, "value": "Погашено", "code": "0"},
            {"start": 1, "end": 90, "value": "До 3 місяців", "code": "3"}
        ]
    }"#;

    fn rules() -> RuleBook {
        RuleBook::from_json_str(RULES).unwrap()
    }

    fn record_with(cells: &[(usize, RawCell)]) -> LoanRecord {
        let mut row = vec![RawCell::Empty; 38];
        row[0] = RawCell::from("L-1");
        for (column, cell) in cells {
            row[column - 1] = cell.clone();
        }
        LoanRecord::from_raw(&row)
    }

    fn reporting() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()
    }

    #[test]
    fn test_blank_key_zero_closed_balance_is_closed() {
        let book = rules();
        let rec = record_with(&[(35, RawCell::Int(0)), (38, RawCell::Int(5))]);
        assert_eq!(Classifier::new(&book).status(&rec), StatusCategory::Closed);
    }

    #[test]
    fn test_blank_key_open_balance_no_overdue_is_active() {
        let book = rules();
        let rec = record_with(&[(35, RawCell::Int(10)), (38, RawCell::Int(0))]);
        assert_eq!(Classifier::new(&book).status(&rec), StatusCategory::Active);
    }

    #[test]
    fn test_blank_key_open_balance_with_overdue_is_overdue() {
        let book = rules();
        let rec = record_with(&[(35, RawCell::Int(10)), (38, RawCell::Int(3))]);
        assert_eq!(Classifier::new(&book).status(&rec), StatusCategory::Overdue);
    }

    #[test]
    fn test_dash_key_counts_as_blank() {
        let book = rules();
        let rec = record_with(&[(37, RawCell::from("-")), (35, RawCell::Int(0))]);
        assert_eq!(Classifier::new(&book).status(&rec), StatusCategory::Closed);
    }

    #[test]
    fn test_unknown_key_is_not_found() {
        let book = rules();
        let rec = record_with(&[(37, RawCell::from("ZZZ")), (35, RawCell::Int(0))]);
        let status = Classifier::new(&book).status(&rec);
        assert_eq!(status, StatusCategory::NotFound);
        assert_eq!(status.label(), "Ненашли");
    }

    #[test]
    fn test_mapped_value_is_verbatim() {
        let book = rules();
        let rec = record_with(&[(37, RawCell::from("RST")), (38, RawCell::Int(9))]);
        assert_eq!(
            Classifier::new(&book).status(&rec),
            StatusCategory::Mapped("Реструктуризований".into())
        );
    }

    #[test]
    fn test_secondary_check_ignores_mapped_value() {
        let book = rules();
        let c = Classifier::new(&book);
        let overdue = record_with(&[(37, RawCell::from("CHK")), (38, RawCell::Int(9))]);
        assert_eq!(c.status(&overdue), StatusCategory::Overdue);
        let active = record_with(&[(37, RawCell::from("CHK")), (38, RawCell::Int(0))]);
        assert_eq!(c.status(&active), StatusCategory::Active);
    }

    #[test]
    fn test_s070_composite() {
        let book = rules();
        let c = Classifier::new(&book);
        assert_eq!(c.s070(&StatusCategory::Active), ("1".into(), "1-Діючий".into()));
        assert_eq!(c.s070(&StatusCategory::Overdue), ("2".into(), "2-Прострочений".into()));
        assert_eq!(c.s070(&StatusCategory::NotFound), ("00".into(), "00-Ненашли".into()));
    }

    #[test]
    fn test_range_defaults_per_block() {
        let book = rules();
        let c = Classifier::new(&book);
        let long = c.range(RangeBlock::S186, Some(400.0));
        assert_eq!((long.text.as_str(), long.code.as_str()), ("Довгостроковий", ""));
        assert_eq!(long.composite(), "-Довгостроковий");

        let empty = c.range(RangeBlock::S190, Some(10.0));
        assert_eq!(empty.composite(), "00-00");

        let miss186 = c.range(RangeBlock::S186, None);
        assert_eq!(miss186.composite(), "-00");
        let miss242 = c.range(RangeBlock::S242, Some(1000.0));
        assert_eq!(miss242.composite(), "00-00");
    }

    #[test]
    fn test_classify_uses_days_to_maturity_for_s242() {
        let book = rules();
        let rec = record_with(&[
            (8, RawCell::from("01.07.2025")),
            (9, RawCell::Int(60)),
            (35, RawCell::Int(100)),
            (38, RawCell::Int(0)),
        ]);
        let derived = derive(&rec, reporting());
        assert_eq!(derived.days_to_maturity, Some(29));
        let class = Classifier::new(&book).classify(&rec, &derived);
        assert_eq!(class.status, StatusCategory::Active);
        assert_eq!(class.s186.composite(), "1-Короткостроковий");
        assert_eq!(class.s190.composite(), "A-Без прострочення");
        assert_eq!(class.s242.composite(), "3-До 3 місяців");
    }

    #[test]
    fn test_classify_without_maturity_falls_back() {
        let book = rules();
        let rec = record_with(&[(35, RawCell::Int(0))]);
        let derived = derive(&rec, reporting());
        let class = Classifier::new(&book).classify(&rec, &derived);
        assert_eq!(class.status, StatusCategory::Closed);
        assert_eq!(class.s186.composite(), "-00");
        assert_eq!(class.s242.composite(), "00-00");
    }
}
