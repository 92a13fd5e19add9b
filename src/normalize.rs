use chrono::{Duration, NaiveDate, NaiveDateTime};

/// One cell as it comes out of a spreadsheet or CSV reader, before any
/// column role is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::Text(s.to_string())
    }
}

/// How a positional column is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Text,
    Date,
    IntOrBlank,
    NumberOrZero,
}

/// Canonical value of a normalized column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Date(Option<NaiveDate>),
    Int(Option<i64>),
    Number(f64),
}

impl FieldValue {
    /// Numeric view used by rule matching and arithmetic. Text is parsed
    /// leniently; blanks and unparsable values have no number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Int(i) => i.map(|v| v as f64),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
            FieldValue::Date(_) => None,
        }
    }

    /// Numeric view where anything without a number counts as zero.
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().unwrap_or(0.0)
    }

    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Text(s) => is_blank_text(s),
            FieldValue::Date(d) => d.is_none(),
            FieldValue::Int(i) => i.is_none(),
            FieldValue::Number(_) => false,
        }
    }

    /// Display form: dates as DD.MM.YYYY, blanks as the empty string.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Date(d) => d.map(format_date).unwrap_or_default(),
            FieldValue::Int(i) => i.map(|v| v.to_string()).unwrap_or_default(),
            FieldValue::Number(n) => format_number(*n),
        }
    }
}

// ---------------------------------------------------------------------------
// Blank detection and number parsing
// ---------------------------------------------------------------------------

pub fn is_blank_text(s: &str) -> bool {
    let s = s.trim().to_lowercase();
    s.is_empty() || s == "-" || s == "null"
}

pub fn is_blank_like(cell: &RawCell) -> bool {
    match cell {
        RawCell::Empty => true,
        RawCell::Text(s) => is_blank_text(s),
        RawCell::Float(f) => f.is_nan(),
        _ => false,
    }
}

/// Parse a number tolerating inner spaces and a comma decimal separator.
pub fn parse_lenient(raw: &str) -> Option<f64> {
    let s: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    s.parse::<f64>().ok()
}

fn cell_number(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Int(i) => Some(*i as f64),
        RawCell::Float(f) => Some(*f),
        RawCell::Text(s) => parse_lenient(s),
        RawCell::Empty | RawCell::Bool(_) | RawCell::Date(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Integers render without a fractional part; other values keep at most six
/// decimals with trailing zeros and a dangling point stripped.
pub fn format_number(val: f64) -> String {
    if !val.is_finite() {
        return String::new();
    }
    if val.fract() == 0.0 && val.abs() < 1e15 {
        return format!("{}", val as i64);
    }
    let s = format!("{val:.6}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Spreadsheet serial day number (1900 date system, epoch 1899-12-30).
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    Duration::try_days(serial.trunc() as i64).and_then(|d| base.checked_add_signed(d))
}

/// Day-first date parsing. `/` and `-` are accepted as separators and a
/// trailing time part is ignored. A four-digit leading part is read as
/// year-month-day; an impossible day-month order falls back to month-day.
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().replace(['/', '-'], ".");
    let date_part = s.split(|c: char| c.is_whitespace() || c == 'T').next()?;
    let parts: Vec<&str> = date_part.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() != 3 || parts.iter().any(|p| !p.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    let nums: Vec<u32> = parts.iter().map(|p| p.parse().ok()).collect::<Option<_>>()?;

    if parts[0].len() == 4 {
        return NaiveDate::from_ymd_opt(nums[0] as i32, nums[1], nums[2]);
    }
    let year = match parts[2].len() {
        4 => nums[2] as i32,
        2 if nums[2] < 69 => 2000 + nums[2] as i32,
        2 => 1900 + nums[2] as i32,
        _ => return None,
    };
    NaiveDate::from_ymd_opt(year, nums[1], nums[0])
        .or_else(|| NaiveDate::from_ymd_opt(year, nums[0], nums[1]))
}

// ---------------------------------------------------------------------------
// Role normalizers
// ---------------------------------------------------------------------------

pub fn to_text(cell: &RawCell) -> String {
    if is_blank_like(cell) {
        return String::new();
    }
    match cell {
        RawCell::Text(s) => s.clone(),
        RawCell::Int(i) => i.to_string(),
        RawCell::Float(f) => format_number(*f),
        RawCell::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        RawCell::Date(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        RawCell::Empty => String::new(),
    }
}

pub fn to_date(cell: &RawCell) -> Option<NaiveDate> {
    if is_blank_like(cell) {
        return None;
    }
    match cell {
        RawCell::Date(dt) => Some(dt.date()),
        RawCell::Int(i) => excel_serial_to_date(*i as f64),
        RawCell::Float(f) => excel_serial_to_date(*f),
        RawCell::Text(s) => parse_day_first(s),
        RawCell::Bool(_) | RawCell::Empty => None,
    }
}

/// Rounds half to even, so 2.5 becomes 2.
pub fn to_int_or_blank(cell: &RawCell) -> Option<i64> {
    if is_blank_like(cell) {
        return None;
    }
    let n = cell_number(cell)?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round_ties_even() as i64)
}

pub fn to_number_or_zero(cell: &RawCell) -> f64 {
    if is_blank_like(cell) {
        return 0.0;
    }
    match cell_number(cell) {
        Some(n) if !n.is_nan() => n,
        _ => 0.0,
    }
}

pub fn normalize(role: ColumnRole, cell: &RawCell) -> FieldValue {
    match role {
        ColumnRole::Text => FieldValue::Text(to_text(cell)),
        ColumnRole::Date => FieldValue::Date(to_date(cell)),
        ColumnRole::IntOrBlank => FieldValue::Int(to_int_or_blank(cell)),
        ColumnRole::NumberOrZero => FieldValue::Number(to_number_or_zero(cell)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_blank_like_values() {
        assert!(is_blank_like(&RawCell::Empty));
        assert!(is_blank_like(&text("")));
        assert!(is_blank_like(&text("  - ")));
        assert!(is_blank_like(&text("NULL")));
        assert!(is_blank_like(&RawCell::Float(f64::NAN)));
        assert!(!is_blank_like(&text("0")));
        assert!(!is_blank_like(&RawCell::Int(0)));
    }

    #[test]
    fn test_text_role() {
        assert_eq!(to_text(&text("null")), "");
        assert_eq!(to_text(&RawCell::Int(42)), "42");
        assert_eq!(to_text(&RawCell::Float(12.0)), "12");
        assert_eq!(to_text(&RawCell::Float(12.50)), "12.5");
        assert_eq!(to_text(&RawCell::Float(0.1234567)), "0.123457");
        assert_eq!(to_text(&text(" AB-12 ")), " AB-12 ");
    }

    #[test]
    fn test_date_role_from_serial() {
        assert_eq!(to_date(&RawCell::Float(45667.0)), Some(ymd(2025, 1, 10)));
        assert_eq!(to_date(&RawCell::Int(45667)), Some(ymd(2025, 1, 10)));
    }

    #[test]
    fn test_out_of_range_serial_is_blank() {
        assert_eq!(to_date(&RawCell::Float(1e13)), None);
        assert_eq!(to_date(&RawCell::Float(-1e13)), None);
        assert_eq!(to_date(&RawCell::Int(i64::MAX)), None);
        assert_eq!(excel_serial_to_date(f64::INFINITY), None);
        let record = crate::models::LoanRecord::from_raw(&[
            RawCell::from("L-1"),
            RawCell::Empty,
            RawCell::Empty,
            RawCell::Empty,
            RawCell::Empty,
            RawCell::Empty,
            RawCell::Empty,
            RawCell::Float(1e13),
        ]);
        assert_eq!(record.origin_date(), None);
    }

    #[test]
    fn test_date_role_from_text() {
        assert_eq!(to_date(&text("15.01.2025")), Some(ymd(2025, 1, 15)));
        assert_eq!(to_date(&text("15/01/2025")), Some(ymd(2025, 1, 15)));
        assert_eq!(to_date(&text("15-01-25")), Some(ymd(2025, 1, 15)));
        assert_eq!(to_date(&text("2025-01-15 00:00:00")), Some(ymd(2025, 1, 15)));
        assert_eq!(to_date(&text("not a date")), None);
        assert_eq!(to_date(&text("-")), None);
    }

    #[test]
    fn test_date_role_is_day_first() {
        assert_eq!(to_date(&text("02.03.2025")), Some(ymd(2025, 3, 2)));
        // impossible as day-month, read as month-day
        assert_eq!(to_date(&text("03.25.2025")), Some(ymd(2025, 3, 25)));
    }

    #[test]
    fn test_date_role_from_date_cell() {
        let dt = ymd(2024, 12, 31).and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(normalize(ColumnRole::Date, &RawCell::Date(dt)).render(), "31.12.2024");
    }

    #[test]
    fn test_int_or_blank_role() {
        assert_eq!(to_int_or_blank(&text("")), None);
        assert_eq!(to_int_or_blank(&text("abc")), None);
        assert_eq!(to_int_or_blank(&text("1 234,6")), Some(1235));
        assert_eq!(to_int_or_blank(&RawCell::Float(2.5)), Some(2));
        assert_eq!(to_int_or_blank(&RawCell::Float(3.5)), Some(4));
        assert_eq!(to_int_or_blank(&text("0")), Some(0));
    }

    #[test]
    fn test_int_or_blank_is_distinct_from_zero() {
        let blank = normalize(ColumnRole::IntOrBlank, &text(""));
        assert_eq!(blank, FieldValue::Int(None));
        assert_ne!(blank, FieldValue::Int(Some(0)));
        assert!(blank.is_blank());
    }

    #[test]
    fn test_number_or_zero_role() {
        assert_eq!(to_number_or_zero(&text("")), 0.0);
        assert_eq!(to_number_or_zero(&text("abc")), 0.0);
        assert_eq!(to_number_or_zero(&text("nan")), 0.0);
        assert_eq!(to_number_or_zero(&text("1 000,25")), 1000.25);
        assert_eq!(to_number_or_zero(&RawCell::Int(-7)), -7.0);
        assert_eq!(to_number_or_zero(&RawCell::Bool(true)), 0.0);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(75.0), "75");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "");
    }
}
