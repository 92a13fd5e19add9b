use std::path::PathBuf;

use colored::Colorize;
use tracing::info;

use crate::error::{LoanbookError, Result};
use crate::export::write_single_table;
use crate::merge::{self, JoinHow, JoinKeys, MergeMode};
use crate::reader::read_table;

pub const DEFAULT_OUTPUT: &str = "merged_result.xlsx";

pub struct MergeArgs {
    pub file1: PathBuf,
    pub file2: PathBuf,
    pub mode: MergeMode,
    pub how: JoinHow,
    pub left_key: Option<String>,
    pub right_key: Option<String>,
    pub output: Option<PathBuf>,
    pub sheet: Option<String>,
}

pub fn run(args: MergeArgs) -> Result<()> {
    let sheet = args.sheet.unwrap_or_default();
    let left = read_table(&args.file1, &sheet)?;
    let right = read_table(&args.file2, &sheet)?;
    println!(
        "Read {} rows from {}, {} rows from {}",
        left.rows.len(),
        args.file1.display(),
        right.rows.len(),
        args.file2.display()
    );

    let merged = match args.mode {
        MergeMode::Hconcat => merge::hconcat(&left, &right),
        MergeMode::Join => {
            let (Some(lk), Some(rk)) = (args.left_key.as_deref(), args.right_key.as_deref())
            else {
                return Err(LoanbookError::Other(
                    "Join mode needs both --left-key and --right-key".into(),
                ));
            };
            let keys = JoinKeys { left: lk, right: rk };
            let files = (args.file1.as_path(), args.file2.as_path());
            merge::join(&left, &right, &keys, args.how, files)?
        }
    };
    info!(rows = merged.rows.len(), columns = merged.width(), "merged");

    let output = args.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    write_single_table(&merge::to_sheet(&merged), &output)?;
    println!(
        "Merged {} rows x {} columns into {}",
        merged.rows.len(),
        merged.width(),
        output.display().to_string().cyan()
    );
    Ok(())
}
