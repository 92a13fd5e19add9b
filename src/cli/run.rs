use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};
use tracing::warn;

use crate::aggregate::SELECTION_KEY_HEADERS;
use crate::error::{LoanbookError, Result};
use crate::export::{self, OutputFormat};
use crate::fmt::amount;
use crate::models::LoanRecord;
use crate::pipeline;
use crate::reader::read_source;
use crate::report::{self, Report};
use crate::rules::RuleBook;
use crate::settings::{
    parse_reporting_date, resolve_config_path, RunSettings, DEFAULT_SHEET, RULES_FILE,
    SETTINGS_FILE,
};

pub struct RunArgs {
    pub files: Vec<PathBuf>,
    pub settings: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub date: Option<String>,
    pub sheet: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub format: Option<String>,
}

fn joined(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Settings are optional when the command line already names the inputs
/// and the reporting date.
fn load_settings(args: &RunArgs) -> Result<Option<RunSettings>> {
    let path = resolve_config_path(args.settings.as_deref(), SETTINGS_FILE);
    if args.settings.is_none() && !path.exists() && !args.files.is_empty() && args.date.is_some() {
        return Ok(None);
    }
    RunSettings::load(&path).map(Some)
}

fn available(files: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let (found, missing): (Vec<_>, Vec<_>) = files.iter().cloned().partition(|f| f.exists());
    for f in &missing {
        warn!(file = %f.display(), "input file not found, skipping");
        println!("{} {}", "Skipping missing file:".yellow(), f.display());
    }
    if found.is_empty() {
        return Err(LoanbookError::NoInputFiles(joined(&files)));
    }
    Ok(found)
}

fn read_records(files: &[PathBuf], sheet: &str) -> Result<(Vec<String>, Vec<LoanRecord>)> {
    let mut headers = None;
    let mut records = Vec::new();
    for file in files {
        let source = read_source(file, sheet)?;
        println!("Read {} rows from {}", source.rows.len(), file.display());
        headers.get_or_insert(source.headers);
        records.extend(source.rows.iter().map(|row| LoanRecord::from_raw(row)));
    }
    if records.is_empty() {
        return Err(LoanbookError::NoRecords(joined(files)));
    }
    Ok((headers.unwrap_or_default(), records))
}

fn print_summary(report: &Report) {
    let mut table = Table::new();
    table.set_header(vec!["Sheet", "Rows", "Columns"]);
    for sheet in report.sheets() {
        table.add_row(vec![
            Cell::new(sheet.name),
            Cell::new(sheet.rows.len()).set_alignment(CellAlignment::Right),
            Cell::new(sheet.width()).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    let selected: f64 = report
        .selection
        .rows
        .iter()
        .filter_map(|r| match r.get(SELECTION_KEY_HEADERS.len()) {
            Some(report::Cell::Number(n)) => Some(*n),
            _ => None,
        })
        .sum();
    println!("Disbursed amount in selection: {}", amount(selected).green().bold());

    let misses = report.diagnostics.status_misses.len();
    if misses > 0 {
        println!(
            "{}",
            format!("{misses} status key(s) missing from the status map").yellow()
        );
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let settings = load_settings(&args)?;

    let rules_path = resolve_config_path(args.rules.as_deref(), RULES_FILE);
    let rules = RuleBook::load(&rules_path)?;

    let reporting_date = match (&args.date, &settings) {
        (Some(d), _) => parse_reporting_date(d)?,
        (None, Some(s)) => s.reporting_date()?,
        (None, None) => return Err(LoanbookError::Other("No reporting date given".into())),
    };
    let sheet = args
        .sheet
        .clone()
        .or_else(|| settings.as_ref().map(|s| s.sheet_name.clone()))
        .unwrap_or_else(|| DEFAULT_SHEET.to_string());
    let configured = if args.files.is_empty() {
        settings.as_ref().map(|s| s.input_files()).unwrap_or_default()
    } else {
        args.files.clone()
    };
    let format = match args.format.as_deref() {
        Some(key) => OutputFormat::from_key(key)
            .ok_or_else(|| LoanbookError::Other(format!("Unknown output format: {key}")))?,
        None => OutputFormat::default(),
    };

    let files = available(configured)?;
    let (headers, records) = read_records(&files, &sheet)?;

    let batch = pipeline::process(records, &rules, reporting_date);
    let report = report::build(&batch, &headers);

    let out_dir = args.output_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let stem = export::output_stem(&files);
    let mut progress = |done: usize, total: usize| {
        println!("Written rows: {done} of {total}");
    };
    let written = export::export(&report, format, &out_dir, &stem, &mut progress)?;

    print_summary(&report);
    for path in written.tables.iter().chain(&written.diagnostics) {
        println!("Saved {}", path.display().to_string().cyan());
    }
    println!("{}", "Done.".green().bold());
    Ok(())
}
