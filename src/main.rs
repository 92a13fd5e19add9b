mod aggregate;
mod classify;
mod cli;
mod derivation;
mod error;
mod export;
mod fmt;
mod merge;
mod models;
mod normalize;
mod pipeline;
mod reader;
mod report;
mod rules;
mod settings;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            files,
            settings,
            rules,
            date,
            sheet,
            output_dir,
            format,
        } => cli::run::run(cli::run::RunArgs {
            files,
            settings,
            rules,
            date,
            sheet,
            output_dir,
            format,
        }),
        Commands::Rules { rules } => cli::rules::list(rules),
        Commands::Init { dir, force } => cli::init::run(dir, force),
        Commands::Merge {
            file1,
            file2,
            mode,
            how,
            left_key,
            right_key,
            output,
            sheet,
        } => cli::merge::run(cli::merge::MergeArgs {
            file1,
            file2,
            mode,
            how,
            left_key,
            right_key,
            output,
            sheet,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
