use chrono::NaiveDate;

use crate::aggregate::{
    self, CommissionRow, CommissionTotalsRow, SelectionRow, COMMISSION_KEY_HEADERS,
    SELECTION_KEY_HEADERS,
};
use crate::models::COLUMN_COUNT;
use crate::normalize::{format_number, FieldValue};
use crate::pipeline::{Batch, Diagnostics, ProcessedRecord};

pub const FULL_SHEET: &str = "Лист1";
pub const SELECTION_SHEET: &str = "Выборка";
pub const SELECTION_NBU_SHEET: &str = "ДляНБУ";
pub const COMMISSION_SHEET: &str = "КомисссияПоКредитамВсе";
pub const COMMISSION_NBU_SHEET: &str = "КомисссияПоКредитамНБУ";

pub const DERIVED_HEADERS: [&str; 16] = [
    "статус2",
    "поточнадата",
    "датазакинчення",
    "S070Код",
    "S070Строка",
    "S186Строка",
    "S186Код",
    "S186КодиСтрока",
    "S190Строка",
    "S190Код",
    "S190КодИСтрока",
    "СтрокДоПогашення",
    "S242Строка",
    "S242Код",
    "S242КодИСтрока",
    "КомКредСумаУзвітномуперіоді",
];

const SUM: &str = "сумма";
const COUNT: &str = "колличество";
const COMMISSION: &str = "КомКредСумаУзвітномуперіоді";
const AS_OF_DATE: &str = "СумаНазвітнудату";

/// A typed output cell. Writers decide how each kind is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Int(Option<i64>),
    Date(Option<NaiveDate>),
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Int(i) => i.map(|v| v.to_string()).unwrap_or_default(),
            Cell::Date(d) => d.map(crate::normalize::format_date).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(name: &'static str, headers: Vec<String>) -> Self {
        Self { name, headers, rows: Vec::new() }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Every table a run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub full: Table,
    pub selection: Table,
    pub selection_nbu: Table,
    pub commission: Table,
    pub commission_nbu: Table,
    pub diagnostics: Diagnostics,
}

impl Report {
    pub fn sheets(&self) -> [&Table; 5] {
        [
            &self.full,
            &self.selection,
            &self.selection_nbu,
            &self.commission,
            &self.commission_nbu,
        ]
    }
}

fn headers(keys: &[&str], extra: &[&str]) -> Vec<String> {
    keys.iter().chain(extra).map(|s| s.to_string()).collect()
}

fn key_cells(key: &[String]) -> Vec<Cell> {
    key.iter().map(|k| Cell::Text(k.clone())).collect()
}

fn field_cell(value: &FieldValue) -> Cell {
    match value {
        FieldValue::Number(n) => Cell::Number(*n),
        FieldValue::Int(i) => Cell::Int(*i),
        other => Cell::Text(other.render()),
    }
}

fn full_row(r: &ProcessedRecord, reporting_date: NaiveDate) -> Vec<Cell> {
    let c = &r.class;
    let mut cells: Vec<Cell> = r.record.fields().iter().map(field_cell).collect();
    cells.extend([
        Cell::Text(c.status.label().to_string()),
        Cell::Date(Some(reporting_date)),
        Cell::Date(r.derived.maturity_date),
        Cell::Text(c.s070_code.clone()),
        Cell::Text(c.s070_composite.clone()),
        Cell::Text(c.s186.text.clone()),
        Cell::Text(c.s186.code.clone()),
        Cell::Text(c.s186.composite()),
        Cell::Text(c.s190.text.clone()),
        Cell::Text(c.s190.code.clone()),
        Cell::Text(c.s190.composite()),
        Cell::Int(r.derived.days_to_maturity),
        Cell::Text(c.s242.text.clone()),
        Cell::Text(c.s242.code.clone()),
        Cell::Text(c.s242.composite()),
        Cell::Number(r.derived.commission_in_period),
    ]);
    cells
}

fn full_table(batch: &Batch, source_headers: &[String]) -> Table {
    let mut hdr: Vec<String> = source_headers.iter().take(COLUMN_COUNT).cloned().collect();
    hdr.resize(COLUMN_COUNT, String::new());
    hdr.extend(DERIVED_HEADERS.iter().map(|s| s.to_string()));

    let mut table = Table::new(FULL_SHEET, hdr);
    table.rows = batch.records.iter().map(|r| full_row(r, batch.reporting_date)).collect();
    table
}

fn selection_table(name: &'static str, rows: &[SelectionRow]) -> Table {
    let mut table = Table::new(name, headers(&SELECTION_KEY_HEADERS, &[SUM, COUNT]));
    table.rows = rows
        .iter()
        .map(|r| {
            let mut cells = key_cells(&r.key);
            cells.push(Cell::Number(r.sum));
            cells.push(Cell::Int(Some(r.count as i64)));
            cells
        })
        .collect();
    table
}

fn commission_table(rows: &[CommissionRow]) -> Table {
    let mut table = Table::new(
        COMMISSION_SHEET,
        headers(&COMMISSION_KEY_HEADERS, &[COMMISSION, AS_OF_DATE, COUNT]),
    );
    table.rows = rows
        .iter()
        .map(|r| {
            let mut cells = key_cells(&r.key);
            cells.push(Cell::Number(r.commission));
            cells.push(Cell::Number(r.amount));
            cells.push(Cell::Int(Some(r.count as i64)));
            cells
        })
        .collect();
    table
}

fn commission_nbu_table(rows: &[CommissionTotalsRow]) -> Table {
    let mut table = Table::new(
        COMMISSION_NBU_SHEET,
        headers(&COMMISSION_KEY_HEADERS, &[COMMISSION, AS_OF_DATE]),
    );
    table.rows = rows
        .iter()
        .map(|r| {
            let mut cells = key_cells(&r.key);
            cells.push(Cell::Number(r.commission));
            cells.push(Cell::Number(r.amount));
            cells
        })
        .collect();
    table
}

/// Build all output tables from a processed batch. `source_headers` is the
/// header row of the first input file.
pub fn build(batch: &Batch, source_headers: &[String]) -> Report {
    let selection = aggregate::selection(&batch.records);
    let selection_nbu = aggregate::selection_for_nbu(&selection);
    let commission = aggregate::commission(&batch.records);
    let commission_nbu = aggregate::commission_for_nbu(&commission);

    Report {
        full: full_table(batch, source_headers),
        selection: selection_table(SELECTION_SHEET, &selection),
        selection_nbu: selection_table(SELECTION_NBU_SHEET, &selection_nbu),
        commission: commission_table(&commission),
        commission_nbu: commission_nbu_table(&commission_nbu),
        diagnostics: batch.diagnostics.clone(),
    }
}
