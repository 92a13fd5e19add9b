pub mod init;
pub mod merge;
pub mod rules;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::merge::{JoinHow, MergeMode};

#[derive(Parser)]
#[command(
    name = "loanbook",
    version,
    about = "Loan-ledger classification and regulatory summary CLI."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize, classify and summarize ledger extracts into a result workbook.
    Run {
        /// Input files (default: the files listed in the settings file)
        files: Vec<PathBuf>,
        /// Run settings file (default: app_settings.json)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Rule configuration file (default: status2_map.json)
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Reporting date DD.MM.YYYY, overrides the settings file
        #[arg(long)]
        date: Option<String>,
        /// Worksheet to read from workbook inputs
        #[arg(long)]
        sheet: Option<String>,
        /// Directory for the result workbook and diagnostic files
        #[arg(long = "output-dir")]
        output_dir: Option<PathBuf>,
        /// Output format for the tables: xlsx or csv
        #[arg(long)]
        format: Option<String>,
    },
    /// Show the parsed rule configuration.
    Rules {
        /// Rule configuration file (default: status2_map.json)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Write template settings and rule files.
    Init {
        /// Target directory (default: current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Join two tables on key columns, or place them side by side.
    Merge {
        /// Left input table (workbook or CSV)
        file1: PathBuf,
        /// Right input table (workbook or CSV)
        file2: PathBuf,
        /// Merge mode
        #[arg(long, value_enum, default_value_t = MergeMode::Join)]
        mode: MergeMode,
        /// Join type for join mode
        #[arg(long, value_enum, default_value_t = JoinHow::Inner)]
        how: JoinHow,
        /// Key column in the first file
        #[arg(long = "left-key")]
        left_key: Option<String>,
        /// Key column in the second file
        #[arg(long = "right-key")]
        right_key: Option<String>,
        /// Output path; a .csv extension writes CSV (default: merged_result.xlsx)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Worksheet to read from workbook inputs (default: the first sheet)
        #[arg(long)]
        sheet: Option<String>,
    },
}
