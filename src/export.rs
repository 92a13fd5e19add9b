use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;

use crate::error::Result;
#[cfg(feature = "xlsx")]
use crate::normalize::format_date;
use crate::pipeline::Diagnostics;
use crate::report::{Report, Table};

pub const STATUS_KEYS_FILE: &str = "статусыКолонки37.csv";
pub const STATUS_MISSES_FILE: &str = "Ошибкистатусов.csv";
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(40);

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[cfg(feature = "xlsx")]
    #[default]
    Xlsx,
    #[cfg_attr(not(feature = "xlsx"), default)]
    Csv,
}

impl OutputFormat {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            #[cfg(feature = "xlsx")]
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Files written by one export.
#[derive(Debug, Default)]
pub struct Written {
    pub tables: Vec<PathBuf>,
    pub diagnostics: Vec<PathBuf>,
}

fn period_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(\d{4}-\d{2})").ok()).as_ref()
}

/// `YYYY-MM` fragment of a file name, or `unknown`.
pub fn period_of(file_path: &Path) -> String {
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    period_re()
        .and_then(|re| re.captures(&name))
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `result_<period>_<period>...` over the input files, in order.
pub fn output_stem(files: &[PathBuf]) -> String {
    let periods: Vec<String> = files.iter().map(|f| period_of(f)).collect();
    if periods.is_empty() {
        "result_unknown".to_string()
    } else {
        format!("result_{}", periods.join("_"))
    }
}

/// Calls `progress(done, total)` at most once per interval.
struct Throttle<'a> {
    progress: &'a mut dyn FnMut(usize, usize),
    interval: Duration,
    last: Instant,
}

impl<'a> Throttle<'a> {
    fn new(progress: &'a mut dyn FnMut(usize, usize), interval: Duration) -> Self {
        Self { progress, interval, last: Instant::now() }
    }

    fn tick(&mut self, done: usize, total: usize) {
        if self.last.elapsed() >= self.interval {
            (self.progress)(done, total);
            self.last = Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Workbook
// ---------------------------------------------------------------------------

/// Spreadsheet date for `date`, or `None` outside the 1900-9999 range the
/// format can hold.
#[cfg(feature = "xlsx")]
fn excel_date(date: chrono::NaiveDate) -> Option<rust_xlsxwriter::ExcelDateTime> {
    use chrono::Datelike;
    let year = u16::try_from(date.year()).ok()?;
    rust_xlsxwriter::ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8).ok()
}

#[cfg(feature = "xlsx")]
fn write_sheet(
    workbook: &mut rust_xlsxwriter::Workbook,
    table: &Table,
    date_format: &rust_xlsxwriter::Format,
    throttle: Option<&mut Throttle<'_>>,
) -> Result<()> {
    use crate::report::Cell;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(table.name)?;
    for (c, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, c as u16, header)?;
    }

    let total = table.rows.len();
    let mut throttle = throttle;
    for (r, row) in table.rows.iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let col16 = c as u16;
            match cell {
                Cell::Text(s) if s.is_empty() => {}
                Cell::Text(s) => {
                    worksheet.write_string(row32, col16, s)?;
                }
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(row32, col16, *n)?;
                }
                Cell::Number(_) => {}
                Cell::Int(Some(i)) => {
                    worksheet.write_number(row32, col16, *i as f64)?;
                }
                Cell::Int(None) | Cell::Date(None) => {}
                Cell::Date(Some(d)) => match excel_date(*d) {
                    Some(dt) => {
                        worksheet.write_datetime_with_format(row32, col16, &dt, date_format)?;
                    }
                    None => {
                        worksheet.write_string(row32, col16, format_date(*d))?;
                    }
                },
            }
        }
        if let Some(t) = throttle.as_deref_mut() {
            t.tick(r + 1, total);
        }
    }
    Ok(())
}

/// Write every table of the report as one sheet of `path`. The full-record
/// sheet reports progress through `progress`.
#[cfg(feature = "xlsx")]
pub fn write_workbook(
    report: &Report,
    path: &Path,
    progress: &mut dyn FnMut(usize, usize),
    interval: Duration,
) -> Result<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let date_format = rust_xlsxwriter::Format::new().set_num_format("DD.MM.YYYY");
    let mut throttle = Throttle::new(progress, interval);

    for table in report.sheets() {
        let t = if std::ptr::eq(table, &report.full) { Some(&mut throttle) } else { None };
        write_sheet(&mut workbook, table, &date_format, t)?;
    }
    workbook.save(path)?;
    tracing::info!(path = %path.display(), "workbook saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn bom_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(BOM)?;
    Ok(csv::Writer::from_writer(file))
}

fn write_table_csv(
    table: &Table,
    path: &Path,
    throttle: Option<&mut Throttle<'_>>,
) -> Result<()> {
    let mut wtr = bom_writer(path)?;
    wtr.write_record(&table.headers)?;
    let total = table.rows.len();
    let mut throttle = throttle;
    for (r, row) in table.rows.iter().enumerate() {
        wtr.write_record(row.iter().map(|c| c.render()))?;
        if let Some(t) = throttle.as_deref_mut() {
            t.tick(r + 1, total);
        }
    }
    wtr.flush()?;
    Ok(())
}

/// One `<stem>_<sheet>.csv` per table.
pub fn write_csv_tables(
    report: &Report,
    dir: &Path,
    stem: &str,
    progress: &mut dyn FnMut(usize, usize),
    interval: Duration,
) -> Result<Vec<PathBuf>> {
    let mut throttle = Throttle::new(progress, interval);
    let mut paths = Vec::new();
    for table in report.sheets() {
        let path = dir.join(format!("{stem}_{}.csv", table.name));
        let t = if std::ptr::eq(table, &report.full) { Some(&mut throttle) } else { None };
        write_table_csv(table, &path, t)?;
        paths.push(path);
    }
    Ok(paths)
}

pub fn write_diagnostics(diagnostics: &Diagnostics, dir: &Path) -> Result<Vec<PathBuf>> {
    let keys_path = dir.join(STATUS_KEYS_FILE);
    let mut wtr = bom_writer(&keys_path)?;
    wtr.write_record(["статус37"])?;
    for key in &diagnostics.status_keys {
        wtr.write_record([key])?;
    }
    wtr.flush()?;

    let misses_path = dir.join(STATUS_MISSES_FILE);
    let mut wtr = bom_writer(&misses_path)?;
    wtr.write_record(["ключ", "значение"])?;
    for (key, value) in &diagnostics.status_misses {
        wtr.write_record([key, value])?;
    }
    wtr.flush()?;

    Ok(vec![keys_path, misses_path])
}

/// Write a single table to `path`. A `.csv` extension selects BOM CSV,
/// anything else a one-sheet workbook.
pub fn write_single_table(table: &Table, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        return write_table_csv(table, path, None);
    }
    write_single_sheet(table, path)
}

#[cfg(feature = "xlsx")]
fn write_single_sheet(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let date_format = rust_xlsxwriter::Format::new().set_num_format("DD.MM.YYYY");
    write_sheet(&mut workbook, table, &date_format, None)?;
    workbook.save(path)?;
    tracing::info!(path = %path.display(), "table saved");
    Ok(())
}

#[cfg(not(feature = "xlsx"))]
fn write_single_sheet(_table: &Table, path: &Path) -> Result<()> {
    Err(crate::error::LoanbookError::UnknownFormat(path.to_path_buf()))
}

/// Write the report tables in `format` plus the diagnostic files into `dir`.
pub fn export(
    report: &Report,
    format: OutputFormat,
    dir: &Path,
    stem: &str,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Written> {
    std::fs::create_dir_all(dir)?;
    let tables = match format {
        #[cfg(feature = "xlsx")]
        OutputFormat::Xlsx => {
            let path = dir.join(format!("{stem}.xlsx"));
            write_workbook(report, &path, progress, PROGRESS_INTERVAL)?;
            vec![path]
        }
        OutputFormat::Csv => write_csv_tables(report, dir, stem, progress, PROGRESS_INTERVAL)?,
    };
    let diagnostics = write_diagnostics(&report.diagnostics, dir)?;
    Ok(Written { tables, diagnostics })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Cell, FULL_SHEET};

    fn read_bom_csv(path: &Path) -> String {
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(BOM));
        String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap()
    }

    fn tiny_report() -> Report {
        let table = |name| Table {
            name,
            headers: vec!["a".into(), "b".into()],
            rows: vec![
                vec![Cell::Text("x".into()), Cell::Number(1.5)],
                vec![Cell::Text("".into()), Cell::Int(None)],
            ],
        };
        Report {
            full: table(FULL_SHEET),
            selection: table(crate::report::SELECTION_SHEET),
            selection_nbu: table(crate::report::SELECTION_NBU_SHEET),
            commission: table(crate::report::COMMISSION_SHEET),
            commission_nbu: table(crate::report::COMMISSION_NBU_SHEET),
            diagnostics: Diagnostics {
                status_keys: vec!["K1".into(), "K2".into()],
                status_misses: vec![],
            },
        }
    }

    #[test]
    fn test_period_of() {
        assert_eq!(period_of(Path::new("/data/MC_NBU_2025-07.xlsx")), "2025-07");
        assert_eq!(period_of(Path::new("ledger.xlsx")), "unknown");
        // fragment must follow an underscore
        assert_eq!(period_of(Path::new("2025-07.xlsx")), "unknown");
    }

    #[test]
    fn test_output_stem() {
        let files = vec![PathBuf::from("a_2025-06.xlsx"), PathBuf::from("b_2025-07_x.xlsx")];
        assert_eq!(output_stem(&files), "result_2025-06_2025-07");
        assert_eq!(output_stem(&[PathBuf::from("plain.csv")]), "result_unknown");
        assert_eq!(output_stem(&[]), "result_unknown");
    }

    #[test]
    fn test_diagnostics_files_have_bom_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_diagnostics(&tiny_report().diagnostics, dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        let keys = read_bom_csv(&dir.path().join(STATUS_KEYS_FILE));
        assert_eq!(keys, "статус37\nK1\nK2\n");
        let misses = read_bom_csv(&dir.path().join(STATUS_MISSES_FILE));
        assert_eq!(misses, "ключ,значение\n");
    }

    #[test]
    fn test_csv_tables() {
        let dir = tempfile::tempdir().unwrap();
        let mut calls = Vec::new();
        let mut progress = |done: usize, total: usize| calls.push((done, total));
        let paths =
            write_csv_tables(&tiny_report(), dir.path(), "result_x", &mut progress, Duration::ZERO)
                .unwrap();
        assert_eq!(paths.len(), 5);
        let full = read_bom_csv(&dir.path().join("result_x_Лист1.csv"));
        assert_eq!(full, "a,b\nx,1.5\n,\n");
        // only the full sheet reports progress
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_repeated_runs_write_identical_csv() {
        use crate::models::LoanRecord;
        use crate::normalize::RawCell;

        let rules = crate::rules::RuleBook::from_json_str(
            r#"{"статус2БЛОК": {"A": "Активний", "B": "Прострочений"},
                "S070БЛОК": {"Активний": "1", "Прострочений": "2"},
                "S190БЛОК": [{"начало": 0, "конец": 0, "значение": "Ні", "кодстроки": "A"},
                             {"начало": 1, "конец": 99, "значение": "Так", "кодстроки": "B"}]}"#,
        )
        .unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        let records = || {
            [("A", 0, 0.1), ("B", 5, 0.2), ("A", 0, 0.3), ("ZZ", 7, 1e6), ("B", 40, 2500.5)]
                .iter()
                .enumerate()
                .map(|(i, (status, overdue, disbursed))| {
                    let mut row = vec![RawCell::Empty; 38];
                    row[0] = RawCell::Text(format!("L-{i}"));
                    row[7] = RawCell::from("01.07.2025");
                    row[8] = RawCell::Int(30 + i as i64);
                    row[13] = RawCell::Float(*disbursed);
                    row[34] = RawCell::Float(disbursed / 10.0);
                    row[36] = RawCell::from(*status);
                    row[37] = RawCell::Int(*overdue);
                    LoanRecord::from_raw(&row)
                })
                .collect::<Vec<_>>()
        };
        let headers = vec!["Номер".to_string()];

        let mut outputs = Vec::new();
        let mut reports = Vec::new();
        for _ in 0..2 {
            let batch = crate::pipeline::process(records(), &rules, date);
            let report = crate::report::build(&batch, &headers);
            let dir = tempfile::tempdir().unwrap();
            let mut progress = |_: usize, _: usize| {};
            let paths =
                write_csv_tables(&report, dir.path(), "result", &mut progress, Duration::ZERO)
                    .unwrap();
            let bytes: Vec<Vec<u8>> = paths.iter().map(|p| std::fs::read(p).unwrap()).collect();
            outputs.push(bytes);
            reports.push(report);
        }
        assert_eq!(reports[0], reports[1]);
        assert_eq!(outputs[0], outputs[1]);
        assert!(!reports[0].selection.rows.is_empty());
    }

    #[test]
    fn test_single_table_csv_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("merged.CSV");
        write_single_table(&tiny_report().full, &path).unwrap();
        assert_eq!(read_bom_csv(&path), "a,b\nx,1.5\n,\n");
    }

    #[test]
    fn test_progress_is_throttled() {
        let mut calls = 0;
        let mut progress = |_: usize, _: usize| calls += 1;
        let mut throttle = Throttle::new(&mut progress, Duration::from_secs(3600));
        for i in 0..100 {
            throttle.tick(i, 100);
        }
        drop(throttle);
        assert_eq!(calls, 0);
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_excel_date_range() {
        let ymd = |y, m, d| chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert!(excel_date(ymd(2025, 7, 31)).is_some());
        assert!(excel_date(ymd(1899, 1, 31)).is_none());
        assert!(excel_date(ymd(10000, 1, 1)).is_none());
        assert!(excel_date(ymd(-5, 1, 1)).is_none());
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_workbook_writes_out_of_range_dates_as_text() {
        use calamine::Reader;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result_unknown.xlsx");
        let mut report = tiny_report();
        report.full.rows.push(vec![
            Cell::Date(chrono::NaiveDate::from_ymd_opt(1899, 1, 31)),
            Cell::Date(chrono::NaiveDate::from_ymd_opt(2025, 7, 31)),
        ]);
        write_workbook(&report, &path, &mut |_: usize, _: usize| {}, PROGRESS_INTERVAL).unwrap();

        let mut wb = calamine::open_workbook_auto(&path).unwrap();
        let range = wb.worksheet_range("Лист1").unwrap();
        assert_eq!(
            range.get_value((3, 0)),
            Some(&calamine::Data::String("31.01.1899".to_string()))
        );
        assert!(!matches!(range.get_value((3, 1)), Some(calamine::Data::String(_))));
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_workbook_sheets_round_trip_through_reader() {
        use calamine::Reader;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result_unknown.xlsx");
        let mut report = tiny_report();
        report.full.rows.push(vec![
            Cell::Date(chrono::NaiveDate::from_ymd_opt(2025, 7, 31)),
            Cell::Int(Some(3)),
        ]);
        write_workbook(&report, &path, &mut |_: usize, _: usize| {}, PROGRESS_INTERVAL).unwrap();

        let mut wb = calamine::open_workbook_auto(&path).unwrap();
        assert_eq!(
            wb.sheet_names(),
            vec![
                "Лист1",
                "Выборка",
                "ДляНБУ",
                "КомисссияПоКредитамВсе",
                "КомисссияПоКредитамНБУ"
            ]
        );
        let range = wb.worksheet_range("Лист1").unwrap();
        assert_eq!(range.get_value((1, 1)), Some(&calamine::Data::Float(1.5)));
        assert_eq!(range.get_value((2, 0)), Some(&calamine::Data::Empty));
        assert!(matches!(
            range.get_value((3, 0)),
            Some(calamine::Data::DateTime(_)) | Some(calamine::Data::Float(_))
        ));
    }
}
