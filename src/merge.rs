//! Two-table merge: a keyed join or a side-by-side concatenation.

use std::collections::HashMap;
use std::path::Path;

use clap::ValueEnum;

use crate::error::{LoanbookError, Result};
use crate::normalize::{to_text, RawCell};
use crate::reader::DataTable;
use crate::report::{Cell, Table};

pub const MERGED_SHEET: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeMode {
    /// Match rows on a key column from each file.
    Join,
    /// Place the tables side by side, row by row.
    Hconcat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JoinHow {
    Inner,
    Left,
    Right,
    Outer,
}

/// Key columns for a join, by header name.
#[derive(Debug, Clone)]
pub struct JoinKeys<'a> {
    pub left: &'a str,
    pub right: &'a str,
}

/// Columns of `left` then `right`, row by row. The shorter table is padded
/// with empty cells.
pub fn hconcat(left: &DataTable, right: &DataTable) -> DataTable {
    let height = left.rows.len().max(right.rows.len());
    let blank = |width: usize| vec![RawCell::Empty; width];
    let rows = (0..height)
        .map(|i| {
            let mut row = left.rows.get(i).cloned().unwrap_or_else(|| blank(left.width()));
            row.extend(right.rows.get(i).cloned().unwrap_or_else(|| blank(right.width())));
            row
        })
        .collect();
    let headers = left.headers.iter().chain(&right.headers).cloned().collect();
    DataTable { headers, rows }
}

fn key_column(table: &DataTable, key: &str, file: &Path) -> Result<usize> {
    table.column(key).ok_or_else(|| LoanbookError::MissingJoinKey {
        file: file.to_path_buf(),
        key: key.to_string(),
    })
}

/// Output headers. Names present on both sides get `_x` / `_y` suffixes;
/// a key shared by name appears once.
fn joined_headers(left: &DataTable, right: &DataTable, rk: usize, shared_key: bool) -> Vec<String> {
    let clash = |name: &String, other: &DataTable, skip: Option<usize>| {
        other.headers.iter().enumerate().any(|(i, h)| Some(i) != skip && h == name)
    };
    let right_skip = shared_key.then_some(rk);
    let mut headers: Vec<String> = left
        .headers
        .iter()
        .map(|h| if clash(h, right, right_skip) { format!("{h}_x") } else { h.clone() })
        .collect();
    for (i, h) in right.headers.iter().enumerate() {
        if Some(i) == right_skip {
            continue;
        }
        headers.push(if clash(h, left, None) { format!("{h}_y") } else { h.clone() });
    }
    headers
}

/// Relational join on one key column per side. Keys compare by their text
/// form. Inner and left keep left-row order, right keeps right-row order,
/// outer is sorted by key.
pub fn join(
    left: &DataTable,
    right: &DataTable,
    keys: &JoinKeys<'_>,
    how: JoinHow,
    files: (&Path, &Path),
) -> Result<DataTable> {
    let lk = key_column(left, keys.left, files.0)?;
    let rk = key_column(right, keys.right, files.1)?;
    let shared_key = keys.left == keys.right;

    let key_of = |row: &Vec<RawCell>, col: usize| to_text(&row[col]);
    let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows.iter().enumerate() {
        right_index.entry(key_of(row, rk)).or_default().push(i);
    }

    let combine = |l: Option<&Vec<RawCell>>, r: Option<&Vec<RawCell>>| -> Vec<RawCell> {
        let mut out = match l {
            Some(row) => row.clone(),
            None => vec![RawCell::Empty; left.width()],
        };
        if shared_key && l.is_none() {
            if let Some(row) = r {
                out[lk] = row[rk].clone();
            }
        }
        for i in 0..right.width() {
            if shared_key && i == rk {
                continue;
            }
            out.push(r.map(|row| row[i].clone()).unwrap_or(RawCell::Empty));
        }
        out
    };

    let mut keyed: Vec<(String, Vec<RawCell>)> = Vec::new();
    match how {
        JoinHow::Right => {
            let mut left_index: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, row) in left.rows.iter().enumerate() {
                left_index.entry(key_of(row, lk)).or_default().push(i);
            }
            for r in &right.rows {
                let key = key_of(r, rk);
                match left_index.get(&key) {
                    Some(hits) => {
                        for &i in hits {
                            keyed.push((key.clone(), combine(Some(&left.rows[i]), Some(r))));
                        }
                    }
                    None => keyed.push((key, combine(None, Some(r)))),
                }
            }
        }
        JoinHow::Inner | JoinHow::Left | JoinHow::Outer => {
            let mut matched = vec![false; right.rows.len()];
            for l in &left.rows {
                let key = key_of(l, lk);
                match right_index.get(&key) {
                    Some(hits) => {
                        for &i in hits {
                            matched[i] = true;
                            keyed.push((key.clone(), combine(Some(l), Some(&right.rows[i]))));
                        }
                    }
                    None if how != JoinHow::Inner => keyed.push((key, combine(Some(l), None))),
                    None => {}
                }
            }
            if how == JoinHow::Outer {
                for (i, r) in right.rows.iter().enumerate() {
                    if !matched[i] {
                        keyed.push((key_of(r, rk), combine(None, Some(r))));
                    }
                }
                keyed.sort_by(|a, b| a.0.cmp(&b.0));
            }
        }
    }

    Ok(DataTable {
        headers: joined_headers(left, right, rk, shared_key),
        rows: keyed.into_iter().map(|(_, row)| row).collect(),
    })
}

fn output_cell(cell: &RawCell) -> Cell {
    match cell {
        RawCell::Int(i) => Cell::Int(Some(*i)),
        RawCell::Float(f) => Cell::Number(*f),
        RawCell::Date(dt) => Cell::Date(Some(dt.date())),
        other => Cell::Text(to_text(other)),
    }
}

/// The merged table as a single output sheet.
pub fn to_sheet(table: &DataTable) -> Table {
    Table {
        name: MERGED_SHEET,
        headers: table.headers.clone(),
        rows: table.rows.iter().map(|row| row.iter().map(output_cell).collect()).collect(),
    }
}
